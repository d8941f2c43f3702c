pub mod analyzers;
pub mod fetch;
pub mod infra;
pub mod ingest;
pub mod output;
pub mod services;
