use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use finsight_core::{ChatBackend, FinsightConfig};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use finsight_server::subsystems::agent::QueryAgent;
use finsight_server::subsystems::executor::PgQueryExecutor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "finsight.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience - production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match FinsightConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Connect to DB
    let pool = match finsight_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match finsight_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match finsight_core::db::ensure_schema(&pool).await {
            Ok(()) => println!("✅ financial_records table ready"),
            Err(e) => {
                println!("❌ Schema bootstrap failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Finsight DB health check passed");
        return Ok(());
    }

    finsight_core::db::ensure_schema(&pool).await?;

    let llm = finsight_core::create_failover_client(&config.llm)?;
    if !llm.is_configured() {
        tracing::warn!(
            "No LLM provider credential found; questions will be answered in degraded mode"
        );
    } else {
        tracing::info!(providers = ?llm.backend_names(), "LLM failover chain ready");
    }

    let executor = PgQueryExecutor::new(
        pool.clone(),
        Duration::from_secs(config.agent.query_timeout_secs),
    );
    let agent = Arc::new(QueryAgent::new(
        Arc::new(llm),
        Arc::new(executor),
        config.agent.clone(),
    ));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();
    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
        shutdown_cancel.cancel();
    });

    finsight_server::http::start_http_server(pool, agent, config, tx.subscribe(), cancel).await?;

    Ok(())
}
