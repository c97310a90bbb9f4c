use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{TrackerError, TrackerResult};

/// Durable string storage keyed by name, the client-side analog of
/// browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> TrackerResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> TrackerResult<()>;
    fn remove(&self, key: &str) -> TrackerResult<()>;
}

/// One file per key under a data directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> TrackerResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> TrackerResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(TrackerError::Validation(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> TrackerResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> TrackerResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> TrackerResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> TrackerResult<Option<String>> {
        let map = self.values.read().map_err(|_| lock_error())?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> TrackerResult<()> {
        let mut map = self.values.write().map_err(|_| lock_error())?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> TrackerResult<()> {
        let mut map = self.values.write().map_err(|_| lock_error())?;
        map.remove(key);
        Ok(())
    }
}

fn lock_error() -> TrackerError {
    TrackerError::Storage(std::io::Error::new(ErrorKind::Other, "storage lock poisoned"))
}
