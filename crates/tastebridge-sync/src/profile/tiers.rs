//! Pure merge helpers for the tiered top-items refresh.

use std::collections::{HashMap, HashSet};

use tastebridge_core::model::{Artist, Track};
use tastebridge_core::PlayedTrack;

/// Deduplicate by id, keeping the first occurrence.
pub(crate) fn dedupe_tracks(tracks: impl IntoIterator<Item = Track>) -> Vec<Track> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect()
}

pub(crate) fn dedupe_artists(artists: impl IntoIterator<Item = Artist>) -> Vec<Artist> {
    let mut seen = HashSet::new();
    artists
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect()
}

/// Stable reorder: tracks found in `played` move to the front in play-rank
/// order; the rest keep their relative order behind them.
pub(crate) fn reorder_by_play_rank(tracks: Vec<Track>, played: &[PlayedTrack]) -> Vec<Track> {
    let rank: HashMap<&str, usize> = played
        .iter()
        .enumerate()
        .rev()
        .map(|(i, p)| (p.track.id.as_str(), i))
        .collect();
    let mut indexed: Vec<(usize, Track)> = tracks
        .into_iter()
        .map(|t| (rank.get(t.id.as_str()).copied().unwrap_or(usize::MAX), t))
        .collect();
    indexed.sort_by_key(|(r, _)| *r);
    indexed.into_iter().map(|(_, t)| t).collect()
}

/// Rank artists by mention count across `tier2_artists` and the merged
/// track list. Mentions of an artist the top-items source contributed count
/// double. Ties keep first-seen order.
pub(crate) fn rank_artists(tracks: &[Track], tier2_artists: &[Artist]) -> Vec<Artist> {
    let contributed: HashSet<&str> = tier2_artists.iter().map(|a| a.id.as_str()).collect();

    let mut order: Vec<Artist> = Vec::new();
    let mut counts: HashMap<String, u32> = HashMap::new();
    let mut mention = |artist: Artist, weight: u32| {
        let count = counts.entry(artist.id.clone()).or_insert_with(|| {
            order.push(artist);
            0
        });
        *count += weight;
    };

    for artist in tier2_artists {
        mention(artist.clone(), 2);
    }
    for track in tracks {
        for credit in &track.artists {
            let weight = if contributed.contains(credit.id.as_str()) { 2 } else { 1 };
            mention(Artist::from(credit), weight);
        }
    }

    let mut ranked: Vec<(usize, u32, Artist)> = order
        .into_iter()
        .enumerate()
        .map(|(i, a)| (i, counts.get(&a.id).copied().unwrap_or(0), a))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(_, _, a)| a).collect()
}

/// Normalize an artist name for set membership ("  The  Band " → "the band").
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
