//! Filesystem adapter for the hourly-CSV / daily-gzip persistence tiers.
//!
//! ESP-IDF mounts LittleFS over its VFS at a fixed root, after which the
//! mount point behaves like any other `std::fs`-visible path — so both
//! targets share one implementation, differing only in the mount root.

use crate::app::ports::FilesystemPort;
use crate::error::StorageError;

#[cfg(target_os = "espidf")]
const MOUNT_ROOT: &str = "/data";
#[cfg(not(target_os = "espidf"))]
const MOUNT_ROOT: &str = "./data";

pub struct StdFilesystem {
    root: std::path::PathBuf,
}

impl StdFilesystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: std::path::PathBuf::from(MOUNT_ROOT),
        }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Default for StdFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FilesystemPort for StdFilesystem {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn create_dir_all(&mut self, path: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(self.resolve(path)).map_err(|_| StorageError::IoError)
    }

    fn append(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        use std::io::Write;
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(full)
            .map_err(|_| StorageError::IoError)?;
        file.write_all(data).map_err(|_| StorageError::IoError)
    }

    fn read_to_vec(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        std::fs::read(self.resolve(path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound
            } else {
                StorageError::IoError
            }
        })
    }

    fn write_all(&mut self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(full, data).map_err(|_| StorageError::IoError)
    }

    fn remove(&mut self, path: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(_) => Err(StorageError::IoError),
        }
    }

    fn list_with_prefix(&self, dir: &str, prefix: &str) -> Vec<String> {
        let full_dir = self.resolve(dir);
        let Ok(entries) = std::fs::read_dir(&full_dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| name.starts_with(prefix))
            .collect()
    }
}

/// Build a filesystem adapter rooted at a fresh scratch directory, wiped
/// before use. Shared with other modules' host-side tests (persistence).
#[cfg(test)]
pub(crate) fn scratch_fs(test_name: &str) -> StdFilesystem {
    let mut fs = StdFilesystem::new();
    fs.root = std::env::temp_dir().join(format!("energyme-fs-test-{test_name}"));
    let _ = std::fs::remove_dir_all(&fs.root);
    fs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut fs = scratch_fs("roundtrip");
        fs.write_all("2024-01-01.csv", b"hour,wh\n0,100\n").unwrap();
        assert!(fs.exists("2024-01-01.csv"));
        let data = fs.read_to_vec("2024-01-01.csv").unwrap();
        assert_eq!(data, b"hour,wh\n0,100\n");
    }

    #[test]
    fn append_accumulates() {
        let mut fs = scratch_fs("append");
        fs.append("log.csv", b"a\n").unwrap();
        fs.append("log.csv", b"b\n").unwrap();
        assert_eq!(fs.read_to_vec("log.csv").unwrap(), b"a\nb\n");
    }

    #[test]
    fn list_with_prefix_filters() {
        let mut fs = scratch_fs("list");
        fs.write_all("2024-01-01.csv", b"x").unwrap();
        fs.write_all("2024-01-02.csv", b"x").unwrap();
        fs.write_all("2024-01-01.csv.gz", b"x").unwrap();
        let matches = fs.list_with_prefix("", "2024-01-01");
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let mut fs = scratch_fs("remove-missing");
        assert!(fs.remove("nope.csv").is_ok());
    }
}
