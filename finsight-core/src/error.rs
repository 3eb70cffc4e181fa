use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinsightError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
