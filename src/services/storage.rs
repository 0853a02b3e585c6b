//! Object storage for produced clips

use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, SpotmixError};

/// Key/value blob store
pub trait ObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()>;

    fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Store backed by a local directory; keys map to relative paths
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(SpotmixError::Storage {
                key: key.to_string(),
                reason: "key must be a relative path without '..'".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let storage_err = |e: std::io::Error| SpotmixError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        };

        let parent = path.parent().unwrap_or(self.root.as_path());
        std::fs::create_dir_all(parent).map_err(storage_err)?;

        let mut staged = NamedTempFile::new_in(parent).map_err(storage_err)?;
        staged.write_all(bytes).map_err(storage_err)?;
        staged.persist(&path).map_err(|e| storage_err(e.error))?;

        debug!("Stored {} ({} bytes, {})", key, bytes.len(), content_type);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        std::fs::read(&path).map_err(|e| SpotmixError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

/// In-process store, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored key, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|o| o.content_type.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<()> {
        self.lock().insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.lock()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| SpotmixError::Storage {
                key: key.to_string(),
                reason: "no such key".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_local_put_get() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());

        store
            .put("primary--distribution/pyro_abc1234", b"ID3", "audio/mpeg")
            .unwrap();

        assert_eq!(
            store.get("primary--distribution/pyro_abc1234").unwrap(),
            b"ID3".to_vec()
        );
        assert!(dir
            .path()
            .join("primary--distribution")
            .join("pyro_abc1234")
            .exists());
    }

    #[test]
    fn test_local_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(store.put("../outside", b"x", "audio/mpeg").is_err());
        assert!(store.get("/etc/passwd").is_err());
        assert!(store.get("").is_err());
    }

    #[test]
    fn test_local_missing_key() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path());
        let err = store.get("primary--distribution/pyro_missing").unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryObjectStore::new();
        store.put("b", b"2", "audio/wav").unwrap();
        store.put("a", b"1", "audio/mpeg").unwrap();

        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.get("a").unwrap(), b"1".to_vec());
        assert_eq!(store.content_type("b").as_deref(), Some("audio/wav"));
        assert!(store.get("c").is_err());
    }
}
