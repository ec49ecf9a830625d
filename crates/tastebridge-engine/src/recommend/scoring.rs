//! Candidate scoring.

use std::collections::BTreeSet;

use serde::Serialize;

use tastebridge_core::model::Track;

use super::profile::TasteProfile;
use crate::settings::EngineSettings;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceBucket {
    SeedArtist,
    SameAlbum,
    GenreNeighbor,
    UserPool,
}

impl SourceBucket {
    pub const fn weight(self, settings: &EngineSettings) -> f64 {
        match self {
            Self::SeedArtist => settings.seed_artist_weight,
            Self::SameAlbum => settings.same_album_weight,
            Self::GenreNeighbor => settings.genre_neighbor_weight,
            Self::UserPool => settings.user_pool_weight,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SeedArtist => "seed_artist",
            Self::SameAlbum => "same_album",
            Self::GenreNeighbor => "genre_neighbor",
            Self::UserPool => "user_pool",
        }
    }
}

/// Individual score terms, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreComponents {
    pub source: f64,
    pub affinity: f64,
    pub genre_overlap: f64,
    pub popularity_similarity: f64,
    pub recency: f64,
}

impl ScoreComponents {
    pub fn composite(&self, settings: &EngineSettings) -> f64 {
        settings.source_score_weight * self.source
            + settings.affinity_score_weight * self.affinity
            + settings.genre_score_weight * self.genre_overlap
            + settings.popularity_score_weight * self.popularity_similarity
            + settings.recency_score_weight * self.recency
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub track: Track,
    pub bucket: SourceBucket,
    pub components: ScoreComponents,
    pub score: f64,
}

impl ScoredCandidate {
    /// Key for the per-artist cap: the primary artist, or the track itself
    /// when it has no credited artist.
    pub fn artist_key(&self) -> &str {
        self.track
            .primary_artist()
            .map_or(self.track.id.as_str(), |a| a.id.as_str())
    }
}

/// Jaccard index of two genre sets. Two empty sets share nothing.
pub fn genre_jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

pub fn popularity_similarity(a: u8, b: u8) -> f64 {
    1.0 - f64::from(a.abs_diff(b)) / 100.0
}

/// Union of the profile genres of every artist credited on `track`.
pub fn track_genres(track: &Track, profile: &TasteProfile) -> BTreeSet<String> {
    track
        .artists
        .iter()
        .filter_map(|a| profile.genres_of(&a.id))
        .flatten()
        .cloned()
        .collect()
}

/// Score one candidate relative to the seed.
pub fn score(
    track: Track,
    bucket: SourceBucket,
    seed: &Track,
    seed_genres: &BTreeSet<String>,
    profile: &TasteProfile,
    settings: &EngineSettings,
) -> ScoredCandidate {
    let affinity = track
        .artists
        .iter()
        .map(|a| profile.affinity_of(&a.id))
        .fold(0.0_f64, f64::max);

    let recency = if track
        .artists
        .iter()
        .any(|a| profile.short_term_artists.contains(&a.id))
    {
        1.0
    } else {
        0.0
    };

    let components = ScoreComponents {
        source: bucket.weight(settings),
        affinity,
        genre_overlap: genre_jaccard(seed_genres, &track_genres(&track, profile)),
        popularity_similarity: popularity_similarity(seed.popularity, track.popularity),
        recency,
    };
    let score = components.composite(settings);

    ScoredCandidate {
        track,
        bucket,
        components,
        score,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};

    use chrono::Utc;

    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn profile() -> TasteProfile {
        TasteProfile {
            affinity: HashMap::from([("x".to_string(), 0.9), ("y".to_string(), 0.4)]),
            genres: HashMap::from([
                ("x".to_string(), set(&["rock"])),
                ("y".to_string(), set(&["rock", "pop"])),
            ]),
            track_pool: Vec::new(),
            short_term_artists: HashSet::from(["x".to_string()]),
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(genre_jaccard(&set(&[]), &set(&[])), 0.0);
        assert_eq!(genre_jaccard(&set(&["rock"]), &set(&["rock"])), 1.0);
        assert!((genre_jaccard(&set(&["rock"]), &set(&["rock", "pop"])) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_popularity_similarity() {
        assert_eq!(popularity_similarity(60, 60), 1.0);
        assert!((popularity_similarity(60, 40) - 0.8).abs() < 1e-9);
        assert_eq!(popularity_similarity(0, 100), 0.0);
    }

    #[test]
    fn test_components() {
        let settings = EngineSettings::default();
        let seed = Track::new("s", "Song A").with_artist("x", "X").with_popularity(60);
        let candidate = Track::new("c", "Other").with_artist("y", "Y").with_popularity(50);
        let scored = score(
            candidate,
            SourceBucket::GenreNeighbor,
            &seed,
            &set(&["rock"]),
            &profile(),
            &settings,
        );
        assert_eq!(scored.components.source, 0.65);
        assert_eq!(scored.components.affinity, 0.4);
        assert!((scored.components.genre_overlap - 0.5).abs() < 1e-9);
        assert!((scored.components.popularity_similarity - 0.9).abs() < 1e-9);
        assert_eq!(scored.components.recency, 0.0);
        let expected = 0.25 * 0.65 + 0.30 * 0.4 + 0.20 * 0.5 + 0.10 * 0.9;
        assert!((scored.score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_best_affinity_over_all_credits() {
        let settings = EngineSettings::default();
        let seed = Track::new("s", "Song A").with_artist("x", "X");
        let candidate = Track::new("c", "Duet").with_artist("y", "Y").with_artist("x", "X");
        let scored = score(
            candidate,
            SourceBucket::UserPool,
            &seed,
            &set(&[]),
            &profile(),
            &settings,
        );
        assert_eq!(scored.components.affinity, 0.9);
        assert_eq!(scored.components.recency, 1.0);
        assert_eq!(scored.artist_key(), "y");
    }
}
