//! Capped, durable log of completed operations
//!
//! The whole log is one JSON array (newest first) stored in the `activity`
//! namespace. The in-memory view only changes once the backend accepted the
//! new value, or after a deliberate clear.

use crate::env::storage::ACTIVITY_NAMESPACE;
use crate::storage::backend::KeyValueStore;
use crate::storage::fit::fit;
use crate::storage::types::{ActivityRecord, AppendOutcome, ResultUpdate, StorageError};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub struct PersistentActivityStore {
    backend: Arc<dyn KeyValueStore>,
    history_cap: usize,
    records: Mutex<Vec<ActivityRecord>>,
    last_id: AtomicI64,
}

impl PersistentActivityStore {
    pub fn new(backend: Arc<dyn KeyValueStore>, history_cap: usize) -> Self {
        Self {
            backend,
            history_cap: history_cap.max(1),
            records: Mutex::new(Vec::new()),
            last_id: AtomicI64::new(0),
        }
    }

    /// Create a store and load whatever the backend already holds
    pub async fn open(backend: Arc<dyn KeyValueStore>, history_cap: usize) -> Self {
        let store = Self::new(backend, history_cap);
        store.load().await;
        store
    }

    /// Replace the in-memory view with the persisted log.
    ///
    /// An unreadable or corrupt value is logged and treated as empty.
    pub async fn load(&self) -> usize {
        let mut loaded = match self.backend.read(ACTIVITY_NAMESPACE).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<ActivityRecord>>(&raw) {
                Ok(records) => records,
                Err(e) => {
                    warn!("Ignoring corrupt activity history: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read activity history: {}", e);
                Vec::new()
            }
        };
        loaded.truncate(self.history_cap);

        let newest_id = loaded
            .iter()
            .filter_map(|record| record.id.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        self.last_id.fetch_max(newest_id, Ordering::SeqCst);

        let count = loaded.len();
        *self.records.lock().await = loaded;
        debug!("Loaded {} activity records", count);
        count
    }

    /// Time-derived unique id: epoch milliseconds, bumped past the last one issued
    pub fn next_id(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let previous = match self.last_id.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        }) {
            Ok(previous) | Err(previous) => previous,
        };
        now.max(previous + 1).to_string()
    }

    /// Add a record as the newest entry.
    ///
    /// Never fails: a write rejected for capacity is retried with the oldest
    /// remaining record dropped, down to an empty store.
    pub async fn append(&self, record: ActivityRecord) -> AppendOutcome {
        let mut records = self.records.lock().await;
        let previous = records.len();

        let mut candidates = Vec::with_capacity(self.history_cap);
        candidates.push(record);
        candidates.extend(
            records
                .iter()
                .take(self.history_cap.saturating_sub(1))
                .cloned(),
        );

        match self.backend.available_capacity(ACTIVITY_NAMESPACE).await {
            Ok(Some(budget)) => candidates = fit(candidates, serialized_len, budget),
            Ok(None) => {}
            Err(e) => debug!("Could not query storage budget: {}", e),
        }

        loop {
            if candidates.is_empty() {
                if let Err(e) = self.backend.remove(ACTIVITY_NAMESPACE).await {
                    error!("Failed to clear activity history: {}", e);
                    return AppendOutcome::Abandoned;
                }
                records.clear();
                warn!("Activity history cleared, not even the newest record fits");
                return AppendOutcome::Cleared;
            }

            let value = match serde_json::to_string(&candidates) {
                Ok(value) => value,
                Err(e) => {
                    error!("Failed to serialize activity history: {}", e);
                    return AppendOutcome::Abandoned;
                }
            };

            match self.backend.write(ACTIVITY_NAMESPACE, value).await {
                Ok(()) => {
                    let evicted = previous + 1 - candidates.len();
                    if evicted > 0 {
                        info!("Evicted {} old activity records", evicted);
                    }
                    *records = candidates;
                    return AppendOutcome::Persisted { evicted };
                }
                Err(e) if e.is_capacity() => {
                    debug!("{}; dropping oldest of {} records", e, candidates.len());
                    candidates.pop();
                }
                Err(e) => {
                    error!("Failed to persist activity history: {}", e);
                    return AppendOutcome::Abandoned;
                }
            }
        }
    }

    /// Newest first
    pub async fn list(&self) -> Vec<ActivityRecord> {
        self.records.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<ActivityRecord> {
        self.records
            .lock()
            .await
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Drop the given ids; returns whether the result is durable
    pub async fn remove(&self, ids: &[String]) -> bool {
        let mut records = self.records.lock().await;
        let remaining: Vec<ActivityRecord> = records
            .iter()
            .filter(|record| !ids.contains(&record.id))
            .cloned()
            .collect();

        if remaining.len() == records.len() {
            return true;
        }

        match self.persist(&remaining).await {
            Ok(()) => {
                debug!("Removed {} activity records", records.len() - remaining.len());
                *records = remaining;
                true
            }
            Err(e) => {
                error!("Failed to remove activity records: {}", e);
                false
            }
        }
    }

    pub async fn clear(&self) -> bool {
        let mut records = self.records.lock().await;
        match self.backend.remove(ACTIVITY_NAMESPACE).await {
            Ok(()) => {
                records.clear();
                info!("Activity history cleared");
                true
            }
            Err(e) => {
                error!("Failed to clear activity history: {}", e);
                false
            }
        }
    }

    /// Mutate one result item of a record and persist the log
    pub async fn update_result(
        &self,
        id: &str,
        index: usize,
        update: ResultUpdate,
    ) -> Result<(), StorageError> {
        let mut records = self.records.lock().await;
        let mut updated = records.clone();

        let item = updated
            .iter_mut()
            .find(|record| record.id == id)
            .and_then(|record| record.results.get_mut(index))
            .ok_or_else(|| StorageError::RecordNotFound(format!("{}#{}", id, index)))?;

        match update {
            ResultUpdate::ApplyFilter(filter) => item.applied_filter = Some(filter),
            ResultUpdate::RecordUpscale { factor, payload } => {
                item.payload = payload;
                item.applied_upscale = Some(factor);
                item.is_derived = true;
            }
        }

        self.persist(&updated).await?;
        *records = updated;
        Ok(())
    }

    async fn persist(&self, records: &[ActivityRecord]) -> Result<(), StorageError> {
        if records.is_empty() {
            return self.backend.remove(ACTIVITY_NAMESPACE).await;
        }
        let value = serde_json::to_string(records)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.write(ACTIVITY_NAMESPACE, value).await
    }
}

fn serialized_len(records: &[ActivityRecord]) -> usize {
    serde_json::to_vec(records).map_or(0, |bytes| bytes.len())
}
