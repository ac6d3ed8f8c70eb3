pub mod ingest;
pub mod reorder;
pub mod retry;
pub mod throughput;
