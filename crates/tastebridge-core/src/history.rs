//! Local play-history seam.
//!
//! On-device play history is owned by another component; this crate only
//! reads it, through [`PlayHistory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Track;

/// A track together with how often it was played locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedTrack {
    pub track: Track,
    pub play_count: u32,
}

/// Read-only access to local play history.
#[async_trait]
pub trait PlayHistory: Send + Sync + std::fmt::Debug {
    /// Most-played tracks since `since`, highest play count first.
    async fn most_played(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<PlayedTrack>>;
}

/// A history source that never has anything to report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

#[async_trait]
impl PlayHistory for NoHistory {
    async fn most_played(&self, _since: DateTime<Utc>, _limit: usize) -> Result<Vec<PlayedTrack>> {
        Ok(Vec::new())
    }
}
