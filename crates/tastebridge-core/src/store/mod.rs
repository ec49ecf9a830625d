//! Durable storage seams.
//!
//! [`KeyValueStore`] holds opaque byte values (session token, profile cache
//! entries). [`MatchStore`] holds cross-catalog track matches and enforces
//! the manual-override rule at the storage layer, so no caller can replace
//! a user's choice by accident.

mod memory;

pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::model::TrackMatch;

/// An opaque durable key/value store.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// Persistent cross-catalog match cache.
pub trait MatchStore: Send + Sync + std::fmt::Debug {
    fn get_match(&self, source_id: &str) -> Result<Option<TrackMatch>>;

    /// Save an automatic match.
    ///
    /// Returns `false` (and leaves the stored entry untouched) when a manual
    /// override already exists for the same source id.
    fn save_automatic_match(&self, entry: &TrackMatch) -> Result<bool>;

    /// Save a user-chosen match, replacing whatever was stored.
    fn save_override(&self, entry: &TrackMatch) -> Result<()>;

    /// Delete an automatic match. Manual overrides are never deleted here.
    ///
    /// Returns `true` if an entry was removed.
    fn delete_automatic_match(&self, source_id: &str) -> Result<bool>;

    /// All entries pointing at a given catalog-B item.
    fn matches_for_target(&self, target_id: &str) -> Result<Vec<TrackMatch>>;
}

/// Read and decode a JSON value stored under `key`.
///
/// A value that no longer decodes (for example after a format change) is
/// reported as an error; callers typically treat that as a cache miss.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Encode `value` as JSON and store it under `key`.
pub fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    store.set(key, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    #[test]
    fn test_json_helpers_round_trip() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "x".to_string(),
            count: 3,
        };
        save_json(&store, "sample", &sample).unwrap();
        let loaded: Option<Sample> = load_json(&store, "sample").unwrap();
        assert_eq!(loaded, Some(sample));
    }

    #[test]
    fn test_load_json_missing_key() {
        let store = MemoryStore::new();
        let loaded: Option<Sample> = load_json(&store, "nope").unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_load_json_corrupt_value_is_error() {
        let store = MemoryStore::new();
        store.set("sample", b"not json").unwrap();
        let loaded: Result<Option<Sample>> = load_json(&store, "sample");
        assert!(loaded.is_err());
    }
}
