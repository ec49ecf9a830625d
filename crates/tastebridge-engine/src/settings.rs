//! Tunable weights and limits for recommendation and resolution.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recommendation engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Lifetime of a built taste profile.
    pub profile_ttl_secs: i64,
    /// Items read per window and entity type when building the profile.
    pub items_per_window: usize,
    pub short_window_weight: f64,
    pub medium_window_weight: f64,
    pub long_window_weight: f64,

    /// Seed-track artists whose top tracks become candidates.
    pub seed_artist_limit: usize,
    pub seed_artist_weight: f64,
    pub same_album_weight: f64,
    pub genre_neighbor_weight: f64,
    pub user_pool_weight: f64,

    pub neighbor_limit: usize,
    /// Neighbors scoring below this are dropped.
    pub neighbor_floor: f64,
    pub neighbor_genre_weight: f64,
    pub neighbor_affinity_weight: f64,

    pub source_score_weight: f64,
    pub affinity_score_weight: f64,
    pub genre_score_weight: f64,
    pub popularity_score_weight: f64,
    pub recency_score_weight: f64,

    /// Most tracks per primary artist in one result.
    pub artist_cap: usize,
    /// Consecutive picks from one bucket before another bucket is preferred.
    pub bucket_run_limit: usize,

    pub recommendation_timeout_secs: u64,
    /// Budget for resolving the seed before the queue starts without it.
    pub seed_resolution_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            profile_ttl_secs: 30 * 60,
            items_per_window: 50,
            short_window_weight: 1.0,
            medium_window_weight: 0.7,
            long_window_weight: 0.4,
            seed_artist_limit: 2,
            seed_artist_weight: 1.0,
            same_album_weight: 0.85,
            genre_neighbor_weight: 0.65,
            user_pool_weight: 0.45,
            neighbor_limit: 6,
            neighbor_floor: 0.1,
            neighbor_genre_weight: 0.6,
            neighbor_affinity_weight: 0.4,
            source_score_weight: 0.25,
            affinity_score_weight: 0.30,
            genre_score_weight: 0.20,
            popularity_score_weight: 0.10,
            recency_score_weight: 0.15,
            artist_cap: 3,
            bucket_run_limit: 3,
            recommendation_timeout_secs: 10,
            seed_resolution_timeout_secs: 5,
        }
    }
}

impl EngineSettings {
    pub fn profile_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.profile_ttl_secs)
    }

    pub const fn recommendation_timeout(&self) -> Duration {
        Duration::from_secs(self.recommendation_timeout_secs)
    }

    pub const fn seed_resolution_timeout(&self) -> Duration {
        Duration::from_secs(self.seed_resolution_timeout_secs)
    }
}

/// Track resolver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub title_weight: f64,
    pub artist_weight: f64,
    pub duration_weight: f64,
    /// Added for official studio recordings.
    pub studio_bonus: f64,
    /// Minimum score for an automatic match.
    pub threshold: f64,
    /// Tracks resolved concurrently per batch.
    pub batch_size: usize,
    /// A catalog-B search taking longer counts as failed.
    pub search_timeout_secs: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            title_weight: 0.45,
            artist_weight: 0.35,
            duration_weight: 0.20,
            studio_bonus: 0.05,
            threshold: 0.35,
            batch_size: 5,
            search_timeout_secs: 5,
        }
    }
}

impl ResolverSettings {
    pub const fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}
