use std::path::PathBuf;
use std::time::Duration;

use log::{debug, trace, warn};
use ureq::Agent;

use crate::io::common::loader::{LoadError, LoadedBytes, SegmentLoader};

const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Fetches relative locations below `base_url`. With a cache directory, every response is mirrored to disk and
/// used as fallback when the network is unavailable.
pub struct HttpLoader {
    agent: Agent,
    base_url: String,
    cache_dir: Option<PathBuf>,
}

impl HttpLoader {
    pub fn new(base_url: &str, timeout: Duration, cache_dir: Option<PathBuf>) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        let base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        Self {
            agent,
            base_url,
            cache_dir,
        }
    }

    fn cache_path(&self, location: &str) -> Option<PathBuf> {
        // keep mirrored files inside the cache directory
        if location.split('/').any(|part| part == "..") {
            return None;
        }
        self.cache_dir.as_ref().map(|dir| dir.join(location))
    }

    fn fetch(&self, location: &str) -> Result<LoadedBytes, LoadError> {
        let url = format!("{}{}", self.base_url, location);
        trace!("GET {}", url);

        let mut response = self.agent.get(&url).call().map_err(|e| classify_request_error(&url, e))?;
        let status = response.status();
        if !status.is_success() {
            let message = format!("{}: HTTP {}", url, status.as_u16());
            return Err(match status.as_u16() {
                408 | 429 => LoadError::Transient(message),
                code if code >= 500 => LoadError::Transient(message),
                _ => LoadError::Fatal(message),
            });
        }

        let data = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| LoadError::Transient(format!("{}: {}", url, e)))?;

        Ok(LoadedBytes {
            data,
            // request line plus the few headers ureq sends
            sent_bytes: (url.len() + 128) as u64,
        })
    }
}

fn classify_request_error(url: &str, error: ureq::Error) -> LoadError {
    let message = format!("{}: {}", url, error);
    match error {
        ureq::Error::BadUri(_) => LoadError::Fatal(message),
        _ => LoadError::Transient(message),
    }
}

impl SegmentLoader for HttpLoader {
    fn load(&self, location: &str) -> Result<LoadedBytes, LoadError> {
        match self.fetch(location) {
            Ok(loaded) => {
                if let Some(path) = self.cache_path(location) {
                    let mirrored = path
                        .parent()
                        .map(std::fs::create_dir_all)
                        .unwrap_or(Ok(()))
                        .and_then(|_| std::fs::write(&path, &loaded.data));
                    if let Err(e) = mirrored {
                        warn!("Cannot mirror {} to {}: {}", location, path.display(), e);
                    }
                }
                Ok(loaded)
            }
            Err(LoadError::Transient(reason)) => {
                let cached = self.cache_path(location).and_then(|path| std::fs::read(path).ok());
                match cached {
                    Some(data) => {
                        debug!("Serving {} from the disk cache: {}", location, reason);
                        Ok(LoadedBytes { data, sent_bytes: 0 })
                    }
                    None => Err(LoadError::Transient(reason)),
                }
            }
            Err(fatal) => Err(fatal),
        }
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn is_remote(&self) -> bool {
        true
    }
}
