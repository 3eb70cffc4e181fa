pub mod agent;
pub mod executor;
pub mod ingest;
