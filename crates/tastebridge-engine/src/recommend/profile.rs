//! Taste profile: the aggregated, time-decayed summary of listening.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use tastebridge_core::model::{Artist, TimeWindow, Track};

use crate::settings::EngineSettings;

/// Top items of one window as read from the profile cache.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub window: TimeWindow,
    pub tracks: Vec<Track>,
    pub artists: Vec<Artist>,
}

/// A pool track and its accumulated weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTrack {
    pub track: Track,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TasteProfile {
    /// Artist id → affinity in `[0, 1]`; the strongest artist is 1.0.
    pub affinity: HashMap<String, f64>,
    /// Artist id → lower-cased genres.
    pub genres: HashMap<String, BTreeSet<String>>,
    /// Deduplicated tracks, heaviest first.
    pub track_pool: Vec<WeightedTrack>,
    /// Artists present in the short window.
    pub short_term_artists: HashSet<String>,
    pub built_at: DateTime<Utc>,
}

/// Rank decay from 1.0 for the first item down toward 0.5 for the last.
fn rank_decay(index: usize, len: usize) -> f64 {
    1.0 - 0.5 * (index as f64 / len.max(1) as f64)
}

fn window_weight(window: TimeWindow, settings: &EngineSettings) -> f64 {
    match window {
        TimeWindow::Short => settings.short_window_weight,
        TimeWindow::Medium => settings.medium_window_weight,
        TimeWindow::Long => settings.long_window_weight,
    }
}

impl TasteProfile {
    /// Combine windowed top items. Returns `None` when every list is empty.
    pub fn build(
        windows: &[WindowSnapshot],
        settings: &EngineSettings,
        built_at: DateTime<Utc>,
    ) -> Option<Self> {
        if windows
            .iter()
            .all(|w| w.tracks.is_empty() && w.artists.is_empty())
        {
            return None;
        }

        let mut affinity: HashMap<String, f64> = HashMap::new();
        let mut genres: HashMap<String, BTreeSet<String>> = HashMap::new();
        let mut pool: Vec<WeightedTrack> = Vec::new();
        let mut pool_index: HashMap<String, usize> = HashMap::new();
        let mut short_term_artists = HashSet::new();

        for snapshot in windows {
            let weight = window_weight(snapshot.window, settings);
            let is_short = snapshot.window == TimeWindow::Short;

            for (i, artist) in snapshot.artists.iter().enumerate() {
                *affinity.entry(artist.id.clone()).or_insert(0.0) +=
                    weight * rank_decay(i, snapshot.artists.len());
                if !artist.genres.is_empty() {
                    genres
                        .entry(artist.id.clone())
                        .or_default()
                        .extend(artist.genres.iter().map(|g| g.to_lowercase()));
                }
                if is_short {
                    short_term_artists.insert(artist.id.clone());
                }
            }

            for (i, track) in snapshot.tracks.iter().enumerate() {
                let track_weight = weight * rank_decay(i, snapshot.tracks.len());
                // A track mention counts half as much as an artist ranking.
                for credit in &track.artists {
                    *affinity.entry(credit.id.clone()).or_insert(0.0) += 0.5 * track_weight;
                    if is_short {
                        short_term_artists.insert(credit.id.clone());
                    }
                }
                match pool_index.get(&track.id) {
                    Some(&at) => pool[at].weight += track_weight,
                    None => {
                        pool_index.insert(track.id.clone(), pool.len());
                        pool.push(WeightedTrack {
                            track: track.clone(),
                            weight: track_weight,
                        });
                    }
                }
            }
        }

        let max = affinity.values().copied().fold(0.0_f64, f64::max);
        if max > 0.0 {
            for value in affinity.values_mut() {
                *value /= max;
            }
        }

        pool.sort_by(|a, b| b.weight.total_cmp(&a.weight));

        Some(Self {
            affinity,
            genres,
            track_pool: pool,
            short_term_artists,
            built_at,
        })
    }

    pub fn affinity_of(&self, artist_id: &str) -> f64 {
        self.affinity.get(artist_id).copied().unwrap_or(0.0)
    }

    pub fn genres_of(&self, artist_id: &str) -> Option<&BTreeSet<String>> {
        self.genres.get(artist_id)
    }
}
