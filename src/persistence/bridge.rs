//! Snapshot persistence for session aggregates

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use super::store::{KeyValueStore, StoreError};

/// Something that went wrong while reading or writing a snapshot.
///
/// None of these interrupt the caller; they are logged and handed to the
/// observer, if one is installed.
#[derive(Debug)]
pub enum PersistenceFailure<'a> {
    Read { key: &'a str, error: &'a StoreError },
    Corrupt { key: &'a str, error: &'a serde_json::Error },
    Encode { key: &'a str, error: &'a serde_json::Error },
    Write { key: &'a str, error: &'a StoreError },
    Clear { key: &'a str, error: &'a StoreError },
}

impl PersistenceFailure<'_> {
    pub fn key(&self) -> &str {
        match self {
            Self::Read { key, .. } | Self::Corrupt { key, .. } | Self::Encode { key, .. } | Self::Write { key, .. } | Self::Clear { key, .. } => key,
        }
    }
}

impl fmt::Display for PersistenceFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { key, error } => write!(f, "failed to read {key}: {error}"),
            Self::Corrupt { key, error } => write!(f, "discarded unreadable snapshot {key}: {error}"),
            Self::Encode { key, error } => write!(f, "failed to encode {key}: {error}"),
            Self::Write { key, error } => write!(f, "failed to write {key}: {error}"),
            Self::Clear { key, error } => write!(f, "failed to clear {key}: {error}"),
        }
    }
}

/// Callback told about every swallowed persistence failure.
pub type PersistenceObserver = Arc<dyn Fn(&PersistenceFailure<'_>) + Send + Sync>;

pub fn observer<F>(f: F) -> PersistenceObserver
where
    F: Fn(&PersistenceFailure<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Builds the storage key for one slot of one session: `{prefix}:{session}:{slot}`.
pub fn namespaced_key(prefix: &str, session: &str, slot: &str) -> String {
    format!("{prefix}:{session}:{slot}")
}

/// Loads and saves a sequence of `E` as a JSON array under one storage key.
///
/// Best effort both ways: a missing or unreadable snapshot loads as empty,
/// and a failed write leaves the in-memory state as the only copy. The bridge
/// remembers that until a later write or clear succeeds.
pub struct PersistenceBridge<E> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    observer: Option<PersistenceObserver>,
    unsaved: AtomicBool,
    _snapshot: PhantomData<fn() -> E>,
}

impl<E> fmt::Debug for PersistenceBridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceBridge").field("key", &self.key).field("observed", &self.observer.is_some()).field("unsaved", &self.unsaved.load(Ordering::Acquire)).finish()
    }
}

impl<E: Serialize + DeserializeOwned> PersistenceBridge<E> {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self { store, key: key.into(), observer: None, unsaved: AtomicBool::new(false), _snapshot: PhantomData }
    }

    pub fn with_observer(mut self, observer: Option<PersistenceObserver>) -> Self { self.observer = observer; self }

    pub fn key(&self) -> &str { &self.key }

    /// True when the last write or clear failed, i.e. storage is behind memory.
    pub fn has_unsaved_changes(&self) -> bool { self.unsaved.load(Ordering::Acquire) }

    pub fn load(&self) -> Vec<E> { self.try_load().unwrap_or_default() }

    /// Like [`load`](Self::load), but `None` when the snapshot could not be
    /// read or decoded. A missing snapshot is `Some(vec![])`.
    pub fn try_load(&self) -> Option<Vec<E>> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Some(Vec::new()),
            Err(error) => { self.report(&PersistenceFailure::Read { key: &self.key, error: &error }); return None; }
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Some(items),
            Err(error) => { self.report(&PersistenceFailure::Corrupt { key: &self.key, error: &error }); None }
        }
    }

    pub fn save(&self, items: &[E]) {
        let raw = match serde_json::to_string(items) {
            Ok(raw) => raw,
            Err(error) => {
                self.unsaved.store(true, Ordering::Release);
                return self.report(&PersistenceFailure::Encode { key: &self.key, error: &error });
            }
        };
        match self.store.set(&self.key, &raw) {
            Ok(()) => {
                self.unsaved.store(false, Ordering::Release);
                debug!(key = %self.key, bytes = raw.len(), "snapshot saved");
            }
            Err(error) => {
                self.unsaved.store(true, Ordering::Release);
                self.report(&PersistenceFailure::Write { key: &self.key, error: &error });
            }
        }
    }

    pub fn clear(&self) {
        match self.store.remove(&self.key) {
            Ok(_) => self.unsaved.store(false, Ordering::Release),
            Err(error) => {
                self.unsaved.store(true, Ordering::Release);
                self.report(&PersistenceFailure::Clear { key: &self.key, error: &error });
            }
        }
    }

    fn report(&self, failure: &PersistenceFailure<'_>) {
        warn!(key = %failure.key(), "{failure}");
        if let Some(observer) = &self.observer { observer(failure); }
    }
}
