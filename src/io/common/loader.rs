use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Worth retrying: timeouts, interrupted transfers, server side hiccups.
    #[error("{0}")]
    Transient(String),

    /// Retrying will not help: missing files, rejected requests.
    #[error("{0}")]
    Fatal(String),
}

impl LoadError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LoadError::Transient(_))
    }
}

#[derive(Debug, Clone)]
pub struct LoadedBytes {
    pub data: Vec<u8>,
    /// Bytes put on the wire to request the data, zero for local sources.
    pub sent_bytes: u64,
}

/// Blocking access to the manifest and segments of one asset. Locations are relative to the asset root.
/// Called from the worker pool only.
pub trait SegmentLoader: Send + Sync {
    fn load(&self, location: &str) -> Result<LoadedBytes, LoadError>;

    /// Used as cache key prefix and in log output.
    fn describe(&self) -> String;

    /// Whether fetches count as network traffic (stats, throughput estimation).
    fn is_remote(&self) -> bool {
        false
    }
}
