use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::asset::catalog::AbrConfig;
use crate::errors::ConfigError;
use crate::interface::log_buffer::LogLevel;
use crate::networking::retry::RetryPolicy;
use crate::rendering::lod::LodConfig;

/// Everything `Interface::initialise` needs. Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for ingest and decode.
    pub thread_pool_size: usize,
    pub log_level: LogLevel,
    /// Entries kept for `pop_log_entry` before the oldest are dropped.
    pub log_capacity: usize,
    /// Default forward buffer in seconds, assets may override it.
    pub buffer_time: f64,
    /// Seconds kept behind the playback position.
    pub back_buffer_window: f64,
    /// How long PrepareRender may wait for an in-flight decode.
    pub prepare_timeout_ms: u64,
    /// Segment slots per asset that may be fetched or decoded concurrently.
    pub max_in_flight_segments: usize,
    pub segment_cache_capacity: usize,
    pub offline_probe_interval_ms: u64,
    pub http_timeout_ms: u64,
    /// Upper bound for decoded frame memory, unbounded if unset.
    pub memory_budget_bytes: Option<u64>,
    pub abr: AbrConfig,
    pub retry: RetryPolicy,
    pub lod: LodConfig,
    pub app_id: String,
    pub app_version: String,
    pub extension_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 2,
            log_level: LogLevel::Info,
            log_capacity: 1024,
            buffer_time: 2.0,
            back_buffer_window: 1.0,
            prepare_timeout_ms: 4,
            max_in_flight_segments: 2,
            segment_cache_capacity: 64,
            offline_probe_interval_ms: 5000,
            http_timeout_ms: 10_000,
            memory_budget_bytes: None,
            abr: AbrConfig::default(),
            retry: RetryPolicy::default(),
            lod: LodConfig::default(),
            app_id: String::new(),
            app_version: String::new(),
            extension_path: String::new(),
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid {
        field,
        reason: reason.into(),
    })
}

fn positive_seconds(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return invalid(field, format!("must be a positive number of seconds, got {}", value));
    }
    Ok(())
}

impl EngineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(format!("{}: {}", path.display(), e)))?;
        let config: EngineConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Unreadable(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_pool_size == 0 {
            return invalid("thread_pool_size", "at least one worker thread is required");
        }

        if self.log_capacity == 0 {
            return invalid("log_capacity", "must not be zero");
        }

        positive_seconds("buffer_time", self.buffer_time)?;
        if !(self.back_buffer_window.is_finite() && self.back_buffer_window >= 0.0) {
            return invalid("back_buffer_window", "must not be negative");
        }

        if self.max_in_flight_segments == 0 {
            return invalid("max_in_flight_segments", "must not be zero");
        }

        if self.segment_cache_capacity == 0 {
            return invalid("segment_cache_capacity", "must not be zero");
        }

        if self.offline_probe_interval_ms == 0 {
            return invalid("offline_probe_interval_ms", "must not be zero");
        }

        if self.abr.demote_after == 0 || self.abr.upgrade_after == 0 {
            return invalid("abr", "demote_after and upgrade_after must be at least 1");
        }

        if !(0.0..=1.0).contains(&self.abr.upgrade_min_fill) {
            return invalid("abr.upgrade_min_fill", "must be within [0, 1]");
        }

        if self.abr.throughput_window == 0 {
            return invalid("abr.throughput_window", "must not be zero");
        }

        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts", "must be at least 1");
        }

        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return invalid("retry.multiplier", "must be at least 1");
        }

        if !(0.0..1.0).contains(&self.retry.jitter) {
            return invalid("retry.jitter", "must be within [0, 1)");
        }

        if self.lod.medium_min_pixels > self.lod.high_min_pixels {
            return invalid("lod", "medium_min_pixels must not exceed high_min_pixels");
        }

        Ok(())
    }

    pub fn prepare_timeout(&self) -> Duration {
        Duration::from_millis(self.prepare_timeout_ms)
    }

    pub fn offline_probe_interval(&self) -> Duration {
        Duration::from_millis(self.offline_probe_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;
    use crate::errors::ConfigError;

    #[test]
    pub fn defaults_are_valid() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    pub fn rejects_an_empty_thread_pool() {
        let config = EngineConfig {
            thread_pool_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "thread_pool_size",
                ..
            })
        ));
    }

    #[test]
    pub fn partial_json_keeps_defaults() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "thread_pool_size": 4, "abr": { "demote_after": 3 } }"#)?;

        let config = EngineConfig::from_json_file(&path)?;
        assert_eq!(config.thread_pool_size, 4);
        assert_eq!(config.abr.demote_after, 3);
        assert_eq!(config.abr.upgrade_after, 2);
        assert_eq!(config.buffer_time, 2.0);

        std::fs::write(&path, "{ not json")?;
        assert!(matches!(EngineConfig::from_json_file(&path), Err(ConfigError::Unreadable(_))));
        Ok(())
    }
}
