use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid JSON document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Document nesting exceeds the maximum depth of {limit}")]
    DepthExceeded { limit: usize },
}
