use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::model::TrackMatch;
use crate::store::{KeyValueStore, MatchStore};

/// In-process implementation of both storage seams.
///
/// Used for tests and for running without a database file. Nothing
/// survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
    matches: Mutex<HashMap<String, TrackMatch>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored key/value entries.
    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let values = self
            .values
            .lock()
            .map_err(|_| Error::LockPoisoned("memory values"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::LockPoisoned("memory values"))?;
        values.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::LockPoisoned("memory values"))?;
        values.remove(key);
        Ok(())
    }
}

impl MatchStore for MemoryStore {
    fn get_match(&self, source_id: &str) -> Result<Option<TrackMatch>> {
        let matches = self
            .matches
            .lock()
            .map_err(|_| Error::LockPoisoned("memory matches"))?;
        Ok(matches.get(source_id).cloned())
    }

    fn save_automatic_match(&self, entry: &TrackMatch) -> Result<bool> {
        let mut matches = self
            .matches
            .lock()
            .map_err(|_| Error::LockPoisoned("memory matches"))?;
        if matches
            .get(&entry.source_id)
            .is_some_and(|existing| existing.is_manual_override)
        {
            return Ok(false);
        }
        let mut entry = entry.clone();
        entry.is_manual_override = false;
        matches.insert(entry.source_id.clone(), entry);
        Ok(true)
    }

    fn save_override(&self, entry: &TrackMatch) -> Result<()> {
        let mut matches = self
            .matches
            .lock()
            .map_err(|_| Error::LockPoisoned("memory matches"))?;
        let mut entry = entry.clone();
        entry.is_manual_override = true;
        matches.insert(entry.source_id.clone(), entry);
        Ok(())
    }

    fn delete_automatic_match(&self, source_id: &str) -> Result<bool> {
        let mut matches = self
            .matches
            .lock()
            .map_err(|_| Error::LockPoisoned("memory matches"))?;
        match matches.get(source_id) {
            Some(existing) if !existing.is_manual_override => {
                matches.remove(source_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn matches_for_target(&self, target_id: &str) -> Result<Vec<TrackMatch>> {
        let matches = self
            .matches
            .lock()
            .map_err(|_| Error::LockPoisoned("memory matches"))?;
        let mut found: Vec<TrackMatch> = matches
            .values()
            .filter(|m| m.target_id == target_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.source_id.cmp(&b.source_id));
        Ok(found)
    }
}
