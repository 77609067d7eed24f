//! Read/write port over kernel pseudo-files

use std::fmt::Debug;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::NodeError;

/// Everything above this port is testable without a kernel
pub trait NodePort: Debug + Send + Sync {
    fn read(&self, path: &Path) -> Result<String, NodeError>;
    fn write(&self, path: &Path, value: &str) -> Result<(), NodeError>;
    fn is_writable(&self, path: &Path) -> bool;
}

/// The real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct Sysfs;

impl NodePort for Sysfs {
    fn read(&self, path: &Path) -> Result<String, NodeError> {
        fs::read_to_string(path).map_err(|source| NodeError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, value: &str) -> Result<(), NodeError> {
        fs::write(path, format!("{}\n", value).as_bytes()).map_err(|source| NodeError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn is_writable(&self, path: &Path) -> bool {
        fs::OpenOptions::new().write(true).open(path).is_ok()
    }
}

pub fn read_trimmed(port: &dyn NodePort, path: &Path) -> Result<String, NodeError> {
    port.read(path).map(|s| s.trim().to_string())
}

pub fn read_parsed<T: FromStr>(port: &dyn NodePort, path: &Path) -> Result<T, NodeError> {
    let value = read_trimmed(port, path)?;
    value.parse::<T>().map_err(|_| NodeError::Malformed {
        path: path.to_path_buf(),
        value,
    })
}

/// In-memory nodes for tests
#[cfg(test)]
pub mod fake {
    use std::collections::{HashMap, HashSet};
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use super::NodePort;
    use crate::error::NodeError;

    #[derive(Debug, Default)]
    pub struct MemoryNodes {
        values: Mutex<HashMap<PathBuf, String>>,
        read_only: Mutex<HashSet<PathBuf>>,
        writes: Mutex<Vec<(PathBuf, String)>>,
    }

    impl MemoryNodes {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set(&self, path: impl AsRef<Path>, value: impl Into<String>) {
            self.values
                .lock()
                .unwrap()
                .insert(path.as_ref().to_path_buf(), value.into());
        }

        pub fn make_read_only(&self, path: impl AsRef<Path>) {
            self.read_only
                .lock()
                .unwrap()
                .insert(path.as_ref().to_path_buf());
        }

        pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
            self.values.lock().unwrap().get(path.as_ref()).cloned()
        }

        /// Every successful write, oldest first
        pub fn writes(&self) -> Vec<(PathBuf, String)> {
            self.writes.lock().unwrap().clone()
        }

        pub fn writes_to(&self, path: impl AsRef<Path>) -> Vec<String> {
            self.writes()
                .into_iter()
                .filter(|(p, _)| p == path.as_ref())
                .map(|(_, v)| v)
                .collect()
        }
    }

    impl NodePort for MemoryNodes {
        fn read(&self, path: &Path) -> Result<String, NodeError> {
            self.get(path).ok_or_else(|| NodeError::Read {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such node"),
            })
        }

        fn write(&self, path: &Path, value: &str) -> Result<(), NodeError> {
            if !self.is_writable(path) {
                return Err(NodeError::Write {
                    path: path.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only node"),
                });
            }
            self.set(path, format!("{}\n", value));
            self.writes
                .lock()
                .unwrap()
                .push((path.to_path_buf(), value.to_string()));
            Ok(())
        }

        fn is_writable(&self, path: &Path) -> bool {
            self.values.lock().unwrap().contains_key(path)
                && !self.read_only.lock().unwrap().contains(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::MemoryNodes;
    use super::*;

    #[test]
    fn test_read_parsed() {
        let nodes = MemoryNodes::new();
        nodes.set("/n/int", " 42\n");
        nodes.set("/n/bad", "forty two\n");
        assert_eq!(read_parsed::<i32>(&nodes, Path::new("/n/int")).unwrap(), 42);
        assert!(matches!(
            read_parsed::<i32>(&nodes, Path::new("/n/bad")),
            Err(NodeError::Malformed { value, .. }) if value == "forty two"
        ));
        assert!(matches!(
            read_parsed::<i32>(&nodes, Path::new("/n/missing")),
            Err(NodeError::Read { .. })
        ));
    }

    #[test]
    fn test_sysfs_missing_file() {
        let path = Path::new("/definitely/not/a/sysfs/node");
        assert!(Sysfs.read(path).is_err());
        assert!(!Sysfs.is_writable(path));
    }

    #[test]
    fn test_sysfs_write_appends_newline() {
        let path = std::env::temp_dir().join(format!("pixelparts-node-{}", std::process::id()));
        Sysfs.write(&path, "1").unwrap();
        assert_eq!(Sysfs.read(&path).unwrap(), "1\n");
        assert_eq!(read_parsed::<u8>(&Sysfs, &path).unwrap(), 1);
        let _ = fs::remove_file(&path);
    }
}
