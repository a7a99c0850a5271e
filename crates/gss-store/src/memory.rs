use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use gss_notify::{ChangeEvent, ChangeNotifier};
use gss_types::TypedValue;

use crate::error::{StoreError, StoreResult};
use crate::traits::StateStore;

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

/// In-memory, HashMap-based state store.
///
/// Entries sit behind a `RwLock` so reads proceed in parallel. Writers
/// additionally serialize on `writer`, which also holds the last applied
/// sequence number; it stays locked across the map update and the publish
/// so subscribers see writes in the order they were applied.
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<String, TypedValue>>,
    writer: Mutex<u64>,
    notifier: Arc<ChangeNotifier>,
}

impl InMemoryStateStore {
    /// Create a new empty store publishing to `notifier`.
    pub fn new(notifier: Arc<ChangeNotifier>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writer: Mutex::new(0),
            notifier,
        }
    }

    /// The notifier this store publishes to.
    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if no key has been set yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the most recent write, `0` before the first.
    pub fn last_sequence(&self) -> StoreResult<u64> {
        Ok(*self.writer.lock().map_err(poisoned)?)
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> StoreResult<TypedValue> {
        let entries = self.entries.read().map_err(poisoned)?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: TypedValue) -> StoreResult<u64> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key must not be empty".into(),
            });
        }

        let mut last = self.writer.lock().map_err(poisoned)?;
        let sequence = *last + 1;
        {
            let mut entries = self.entries.write().map_err(poisoned)?;
            entries.insert(key.to_string(), value.clone());
        }
        *last = sequence;

        debug!(sequence, key, kind = %value.kind(), "value set");
        self.notifier.publish(&ChangeEvent::new(sequence, key, value));
        Ok(sequence)
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateStore")
            .field("entry_count", &self.len())
            .finish()
    }
}
