use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[cfg(target_arch = "wasm32")]
pub trait StorageBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> StorageBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait StorageBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> StorageBounds for T {}

/// Durable string key-value store with the semantics of browser local storage.
pub trait KeyValueStorage: StorageBounds {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    /// Removes every key, not only the ones this crate writes.
    fn clear(&self) -> Result<()>;
}

// --- In-memory Implementation ---

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        Ok(items.keys().cloned().collect())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory storage lock poisoned"))?;
        items.clear();
        Ok(())
    }
}

// --- Native Implementation ---

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Context;
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

/// Keeps the whole map in a single JSON file, rewritten on every `set_item`.
#[cfg(not(target_arch = "wasm32"))]
pub struct NativeStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl NativeStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        log::debug!("Opened storage {} ({} keys)", path.display(), items.len());
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn flush(&self, items: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl KeyValueStorage for NativeStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Storage lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Storage lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        self.flush(&items)
    }

    fn clear(&self) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("Storage lock poisoned"))?;
        items.clear();
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

// --- Web Implementation ---

#[cfg(target_arch = "wasm32")]
use anyhow::anyhow;

#[cfg(target_arch = "wasm32")]
pub struct WebLocalStorage {
    storage: web_sys::Storage,
}

#[cfg(target_arch = "wasm32")]
impl WebLocalStorage {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| anyhow!("No window available"))?;
        let storage = window
            .local_storage()
            .map_err(|e| anyhow!("Local storage error: {:?}", e))?
            .ok_or_else(|| anyhow!("Local storage unavailable"))?;
        Ok(Self { storage })
    }
}

#[cfg(target_arch = "wasm32")]
impl KeyValueStorage for WebLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.storage
            .get_item(key)
            .map_err(|e| anyhow!("Get error: {:?}", e))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| anyhow!("Set error: {:?}", e))
    }

    fn clear(&self) -> Result<()> {
        self.storage.clear().map_err(|e| anyhow!("Clear error: {:?}", e))
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_overwrite_and_clear() -> Result<()> {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("currentNodeId")?, None);

        storage.set_item("currentNodeId", "\"n-001\"")?;
        storage.set_item("currentNodeId", "\"n-002\"")?;
        storage.set_item("unrelated", "1")?;
        assert_eq!(storage.get_item("currentNodeId")?.as_deref(), Some("\"n-002\""));
        assert_eq!(storage.keys()?, vec!["currentNodeId", "unrelated"]);

        storage.clear()?;
        assert!(storage.keys()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_memory_storage_poisoned_lock_is_error() {
        let storage = MemoryStorage::new();
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let _items = storage.items.lock().unwrap();
                panic!("poison the lock");
            });
            assert!(handle.join().is_err());
        });

        assert!(storage.keys().is_err());
        assert!(storage.get_item("currentNodeId").is_err());
        assert!(storage.set_item("currentNodeId", "\"n-001\"").is_err());
    }

    #[test]
    fn test_native_storage_survives_reopen() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("nested").join("storage.json");

        {
            let storage = NativeStorage::open(&path)?;
            storage.set_item("playbackPosition", "42.5")?;
        }

        let reopened = NativeStorage::open(&path)?;
        assert_eq!(reopened.get_item("playbackPosition")?.as_deref(), Some("42.5"));
        Ok(())
    }

    #[test]
    fn test_native_storage_clear_removes_file() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("storage.json");

        let storage = NativeStorage::open(&path)?;
        storage.set_item("teasedItems", "[]")?;
        assert!(path.exists());

        storage.clear()?;
        assert!(!path.exists());
        assert_eq!(storage.get_item("teasedItems")?, None);

        let reopened = NativeStorage::open(&path)?;
        assert_eq!(reopened.get_item("teasedItems")?, None);
        Ok(())
    }
}
