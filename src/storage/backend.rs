//! Durable key/value adapters
//!
//! Each namespace holds a single serialized value that is replaced wholesale.
//! Adapters enforce an optional byte budget shared by all namespaces and
//! report a write that would exceed it as [`StorageError::CapacityExceeded`].

use crate::env;
use crate::storage::types::StorageError;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub trait KeyValueStore: Send + Sync {
    fn read<'a>(&'a self, namespace: &'a str)
    -> BoxFuture<'a, Result<Option<String>, StorageError>>;

    /// Atomically replace the value of a namespace
    fn write<'a>(
        &'a self,
        namespace: &'a str,
        value: String,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    fn remove<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Bytes a write to `namespace` may use, if the store is bounded
    fn available_capacity<'a>(
        &'a self,
        namespace: &'a str,
    ) -> BoxFuture<'a, Result<Option<usize>, StorageError>>;
}

fn capacity_error(needed: usize, budget: usize) -> StorageError {
    StorageError::CapacityExceeded { needed, budget }
}

fn map_io_error(error: io::Error, needed: usize, budget: Option<usize>) -> StorageError {
    match error.kind() {
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => {
            capacity_error(needed, budget.unwrap_or(0))
        }
        _ => StorageError::Other(error.to_string()),
    }
}

/// One JSON file per namespace, replaced through a temp file and rename
#[derive(Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    budget: Option<usize>,
}

impl FileStore {
    pub fn new(data_dir: PathBuf, budget: Option<usize>) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            StorageError::Other(format!(
                "Failed to create directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        Ok(Self { data_dir, budget })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Bytes held by namespaces other than `namespace`
    async fn used_by_others(&self, namespace: &str) -> Result<usize, StorageError> {
        let own = env::namespace_file_path(&self.data_dir, namespace);
        let mut used = 0usize;

        let mut entries = async_fs::read_dir(&self.data_dir)
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::Other(e.to_string()))?
        {
            let path = entry.path();
            let is_namespace = path
                .extension()
                .is_some_and(|ext| ext == env::storage::NAMESPACE_EXTENSION);
            if !is_namespace || path == own {
                continue;
            }
            if let Ok(metadata) = entry.metadata().await {
                used += metadata.len() as usize;
            }
        }

        Ok(used)
    }
}

impl KeyValueStore for FileStore {
    fn read<'a>(
        &'a self,
        namespace: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        Box::pin(async move {
            let path = env::namespace_file_path(&self.data_dir, namespace);
            match async_fs::read_to_string(&path).await {
                Ok(content) => Ok(Some(content)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StorageError::Other(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                ))),
            }
        })
    }

    fn write<'a>(
        &'a self,
        namespace: &'a str,
        value: String,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let needed = value.len();
            if let Some(available) = self.available_capacity(namespace).await?
                && needed > available
            {
                return Err(capacity_error(needed, available));
            }

            let final_path = env::namespace_file_path(&self.data_dir, namespace);
            let temp_path = env::namespace_temp_file_path(&self.data_dir, namespace);

            let result = async {
                let mut file = async_fs::File::create(&temp_path).await?;
                file.write_all(value.as_bytes()).await?;
                file.sync_all().await?;
                async_fs::rename(&temp_path, &final_path).await
            }
            .await;

            if let Err(e) = result {
                let _ = async_fs::remove_file(&temp_path).await;
                return Err(map_io_error(e, needed, self.budget));
            }

            debug!("Wrote {} bytes to {}", needed, final_path.display());
            Ok(())
        })
    }

    fn remove<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let path = env::namespace_file_path(&self.data_dir, namespace);
            match async_fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::Other(e.to_string())),
            }
        })
    }

    fn available_capacity<'a>(
        &'a self,
        namespace: &'a str,
    ) -> BoxFuture<'a, Result<Option<usize>, StorageError>> {
        Box::pin(async move {
            match self.budget {
                Some(budget) => {
                    let used = self.used_by_others(namespace).await?;
                    Ok(Some(budget.saturating_sub(used)))
                }
                None => Ok(None),
            }
        })
    }
}

/// In-memory store with a byte budget and failure injection
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    budget: Option<usize>,
    hide_budget: bool,
    failing_writes: AtomicU32,
    failing_removes: AtomicU32,
    writes: AtomicU32,
    write_sizes: Mutex<Vec<usize>>,
}

impl MemoryStore {
    pub fn new(budget: Option<usize>) -> Self {
        Self {
            budget,
            ..Default::default()
        }
    }

    /// Enforce the budget on writes but report no capacity up front
    pub fn with_hidden_budget(mut self) -> Self {
        self.hide_budget = true;
        self
    }

    /// Make the next `count` writes fail with a non-capacity error
    pub fn fail_next_writes(&self, count: u32) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` removes fail with a non-capacity error
    pub fn fail_next_removes(&self, count: u32) {
        self.failing_removes.store(count, Ordering::SeqCst);
    }

    /// Number of write attempts seen so far
    pub fn write_attempts(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Byte length of every attempted write, in order
    pub fn write_sizes(&self) -> Vec<usize> {
        self.write_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }

    pub fn raw(&self, namespace: &str) -> Option<String> {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(namespace).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.values
            .lock()
            .map_err(|_| StorageError::Other("memory store poisoned".to_string()))
    }

    fn available_for(&self, values: &HashMap<String, String>, namespace: &str) -> Option<usize> {
        self.budget.map(|budget| {
            let used: usize = values
                .iter()
                .filter(|(key, _)| key.as_str() != namespace)
                .map(|(_, value)| value.len())
                .sum();
            budget.saturating_sub(used)
        })
    }
}

impl KeyValueStore for MemoryStore {
    fn read<'a>(
        &'a self,
        namespace: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, StorageError>> {
        Box::pin(async move { Ok(self.lock()?.get(namespace).cloned()) })
    }

    fn write<'a>(
        &'a self,
        namespace: &'a str,
        value: String,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut sizes) = self.write_sizes.lock() {
                sizes.push(value.len());
            }

            let injected = self
                .failing_writes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StorageError::Other("injected write failure".to_string()));
            }

            let mut values = self.lock()?;
            if let Some(available) = self.available_for(&values, namespace)
                && value.len() > available
            {
                return Err(capacity_error(value.len(), available));
            }
            values.insert(namespace.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, namespace: &'a str) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let injected = self
                .failing_removes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if injected {
                return Err(StorageError::Other("injected remove failure".to_string()));
            }

            self.lock()?.remove(namespace);
            Ok(())
        })
    }

    fn available_capacity<'a>(
        &'a self,
        namespace: &'a str,
    ) -> BoxFuture<'a, Result<Option<usize>, StorageError>> {
        Box::pin(async move {
            if self.hide_budget {
                return Ok(None);
            }
            let values = self.lock()?;
            Ok(self.available_for(&values, namespace))
        })
    }
}
