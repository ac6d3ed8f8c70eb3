use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::io::common::loader::{LoadError, SegmentLoader};
use crate::io::fs::loader::FsLoader;
use crate::io::http::loader::HttpLoader;

pub const MANIFEST_FILE_NAME: &str = "manifest.xml";

/// Where an asset lives: the loader for its files and the location of the manifest relative to it.
#[derive(Clone)]
pub struct AssetSource {
    pub loader: Arc<dyn SegmentLoader>,
    pub manifest_location: String,
}

/// Resolves an asset path: http(s) urls point at a manifest, local paths at a manifest or a directory holding one.
pub fn open_source(path: &str, cache_dir: Option<PathBuf>, http_timeout: Duration) -> Result<AssetSource, LoadError> {
    if path.starts_with("http://") || path.starts_with("https://") {
        let (base, file) = match path.rsplit_once('/') {
            Some((base, file)) if !file.is_empty() && base.contains("://") && base.len() > "https://".len() => {
                (base, file)
            }
            _ => (path.trim_end_matches('/'), MANIFEST_FILE_NAME),
        };

        return Ok(AssetSource {
            loader: Arc::new(HttpLoader::new(base, http_timeout, cache_dir)),
            manifest_location: file.to_string(),
        });
    }

    let local = Path::new(path);
    if local.is_dir() {
        return Ok(AssetSource {
            loader: Arc::new(FsLoader::new(local)),
            manifest_location: MANIFEST_FILE_NAME.to_string(),
        });
    }

    if local.is_file() {
        let file = local
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| LoadError::Fatal(format!("{} has no file name", path)))?;
        let root = local.parent().unwrap_or_else(|| Path::new("."));
        return Ok(AssetSource {
            loader: Arc::new(FsLoader::new(root)),
            manifest_location: file,
        });
    }

    Err(LoadError::Fatal(format!("{} does not exist", path)))
}

#[cfg(test)]
mod tests {
    use super::open_source;
    use std::time::Duration;

    #[test]
    pub fn resolves_urls_and_directories() -> Result<(), anyhow::Error> {
        let source = open_source("https://cdn.example.com/assets/dancer/show.xml", None, Duration::from_secs(1))?;
        assert_eq!(source.manifest_location, "show.xml");
        assert_eq!(source.loader.describe(), "https://cdn.example.com/assets/dancer/");
        assert!(source.loader.is_remote());

        let dir = tempfile::tempdir()?;
        let source = open_source(&dir.path().to_string_lossy(), None, Duration::from_secs(1))?;
        assert_eq!(source.manifest_location, "manifest.xml");
        assert!(!source.loader.is_remote());

        assert!(open_source("/definitely/not/here", None, Duration::from_secs(1)).is_err());
        Ok(())
    }
}
