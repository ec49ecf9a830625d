use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use tastebridge_core::model::{Artist, TimeWindow, Track};

/// A cached value with the time and quality of its last refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    pub refreshed_at: DateTime<Utc>,
    /// `true` when every intended source contributed to this value.
    pub high_fidelity: bool,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, refreshed_at: DateTime<Utc>, high_fidelity: bool) -> Self {
        Self {
            value,
            refreshed_at,
            high_fidelity,
        }
    }

    /// `true` while `now` is strictly before `refreshed_at + ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now < self.refreshed_at + ttl
    }
}

/// Values the cache stores; an empty value is never served as fresh.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync {
    fn is_empty_value(&self) -> bool;
}

impl<T: Clone + Serialize + DeserializeOwned + Send + Sync> CacheValue for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

/// Top tracks and artists for one time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowItems {
    pub window: TimeWindow,
    pub tracks: Vec<Track>,
    pub artists: Vec<Artist>,
}

/// The merged top-items entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopItems {
    /// Deduplicated tracks, highest-priority source first.
    pub tracks: Vec<Track>,
    /// Artists ranked by weighted mention count.
    pub artists: Vec<Artist>,
    /// Per-window lists, present only when the top-items source answered.
    #[serde(default)]
    pub windows: Vec<WindowItems>,
}

impl TopItems {
    pub fn window(&self, window: TimeWindow) -> Option<&WindowItems> {
        self.windows.iter().find(|w| w.window == window)
    }
}

impl CacheValue for TopItems {
    fn is_empty_value(&self) -> bool {
        self.tracks.is_empty() && self.artists.is_empty()
    }
}

/// In-memory slot for one cache entry plus the lock serializing its refresh.
///
/// Reads take only the short synchronous `state` lock, so a fresh hit never
/// suspends. `refresh` is held across network I/O.
#[derive(Debug)]
pub(crate) struct EntrySlot<T> {
    state: std::sync::RwLock<Option<CacheEntry<T>>>,
    refresh: Mutex<()>,
}

impl<T: Clone> EntrySlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: std::sync::RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub(crate) fn snapshot(&self) -> Option<CacheEntry<T>> {
        self.state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn replace(&self, entry: CacheEntry<T>) {
        *self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(entry);
    }

    /// Install `entry` unless the slot already holds something newer.
    pub(crate) fn offer(&self, entry: CacheEntry<T>) {
        let mut state = self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if state
            .as_ref()
            .is_none_or(|current| current.refreshed_at < entry.refreshed_at)
        {
            *state = Some(entry);
        }
    }

    pub(crate) fn clear(&self) {
        *self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }
}
