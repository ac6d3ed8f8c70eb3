use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::trace;

use crate::io::common::loader::{LoadError, LoadedBytes, SegmentLoader};

pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

pub(crate) fn classify_io_error(location: &str, error: std::io::Error) -> LoadError {
    let message = format!("{}: {}", location, error);
    match error.kind() {
        ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::UnexpectedEof => {
            LoadError::Transient(message)
        }
        _ => LoadError::Fatal(message),
    }
}

impl SegmentLoader for FsLoader {
    fn load(&self, location: &str) -> Result<LoadedBytes, LoadError> {
        let path = self.root.join(location);
        trace!("Reading {}", path.display());
        let data = std::fs::read(&path).map_err(|e| classify_io_error(location, e))?;
        Ok(LoadedBytes { data, sent_bytes: 0 })
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}

#[cfg(test)]
mod tests {
    use super::FsLoader;
    use crate::io::common::loader::{LoadError, SegmentLoader};

    #[test]
    pub fn missing_files_are_fatal() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("present.bin"), [1u8, 2, 3])?;

        let loader = FsLoader::new(dir.path());
        assert_eq!(loader.load("present.bin")?.data, vec![1, 2, 3]);
        assert!(matches!(loader.load("missing.bin"), Err(LoadError::Fatal(_))));
        Ok(())
    }
}
