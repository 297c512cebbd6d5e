//! Running-plugin store backends

use crate::io::atomic::write_atomic;
use crate::io::error::StoreError;
use crate::io::lock::{acquire_lock, DEFAULT_LOCK_RETRIES};
use crate::schema::RunningPluginSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Read/write access to the persisted set of plugins that should be running.
pub trait RunningPluginStore: Send + Sync {
    /// Load the set. A store that was never written yields an empty map.
    fn read(&self) -> Result<RunningPluginSet, StoreError>;

    /// Replace the persisted set.
    fn write(&self, plugins: &RunningPluginSet) -> Result<(), StoreError>;
}

/// JSON file store at `<dir>/datastore/plugins.json`
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Store rooted at the long-running plugin state directory
    pub fn new(longrunning_dir: &Path) -> Self {
        let dir = longrunning_dir.join("datastore");
        Self {
            path: dir.join("plugins.json"),
            lock_path: dir.join("plugins.lock"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl RunningPluginStore for FileStore {
    fn read(&self) -> Result<RunningPluginSet, StoreError> {
        if !self.path.exists() {
            return Ok(RunningPluginSet::new());
        }

        let content = std::fs::read(&self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        if content.iter().all(u8::is_ascii_whitespace) {
            return Ok(RunningPluginSet::new());
        }

        serde_json::from_slice(&content).map_err(|e| StoreError::Json {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write(&self, plugins: &RunningPluginSet) -> Result<(), StoreError> {
        self.ensure_dir()?;
        let _lock = acquire_lock(&self.lock_path, DEFAULT_LOCK_RETRIES)?;

        let content = serde_json::to_vec_pretty(plugins).map_err(|e| StoreError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        write_atomic(&self.path, &content)
    }
}

/// In-process store, for embedding and tests
#[derive(Default)]
pub struct MemoryStore {
    plugins: Mutex<RunningPluginSet>,
    fail_reads: bool,
}

impl MemoryStore {
    pub fn new(plugins: RunningPluginSet) -> Self {
        Self {
            plugins: Mutex::new(plugins),
            fail_reads: false,
        }
    }

    /// A store whose every read fails
    pub fn failing() -> Self {
        Self {
            plugins: Mutex::new(RunningPluginSet::new()),
            fail_reads: true,
        }
    }

    /// Current contents
    pub fn snapshot(&self) -> RunningPluginSet {
        self.plugins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RunningPluginStore for MemoryStore {
    fn read(&self) -> Result<RunningPluginSet, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Unavailable {
                message: "memory store configured to fail reads".to_string(),
            });
        }
        Ok(self.snapshot())
    }

    fn write(&self, plugins: &RunningPluginSet) -> Result<(), StoreError> {
        *self.plugins.lock().unwrap_or_else(PoisonError::into_inner) = plugins.clone();
        Ok(())
    }
}
