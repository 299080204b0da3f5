pub mod fixture;
pub mod ingest;
pub mod metrics;
pub mod sink;

pub use fixture::Fixture;
pub use ingest::{ingest_lines, IngestStats};
pub use sink::run_sink;
