//! Cross-catalog track resolution.
//!
//! A catalog-A track is matched to its best catalog-B equivalent by fuzzy
//! title, artist and duration comparison. Matches are cached in a
//! [`MatchStore`]; user-chosen overrides are never replaced by automatic
//! resolution.

mod catalog_b;
pub mod normalize;
pub mod similarity;

pub use catalog_b::{CatalogB, CatalogBItem, ContentPreferences, ResultType};

use std::sync::{Arc, RwLock};

use futures::future::join_all;
use tokio::sync::mpsc;

use tastebridge_core::model::{ContentKind, PlayableItem, Track, TrackMatch};
use tastebridge_core::{Clock, MatchStore};

use crate::error::{ResolveError, ResolveResult};
use crate::settings::ResolverSettings;

use normalize::{normalize_artist, normalize_title};
use similarity::{dice_coefficient, duration_closeness};

/// A scored catalog-B candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub item: CatalogBItem,
    pub title_similarity: f64,
    pub artist_similarity: f64,
    pub duration_closeness: f64,
    pub score: f64,
}

/// Score one catalog-B item against a catalog-A track.
pub fn score_candidate(
    track: &Track,
    item: &CatalogBItem,
    settings: &ResolverSettings,
) -> MatchCandidate {
    let title_similarity =
        dice_coefficient(&normalize_title(&track.title), &normalize_title(&item.title));

    let artist_similarity = track
        .artists
        .iter()
        .flat_map(|a| {
            let source = normalize_artist(&a.name);
            item.artists
                .iter()
                .map(move |b| dice_coefficient(&source, &normalize_artist(b)))
        })
        .fold(0.0_f64, f64::max);

    let duration = duration_closeness(track.duration_secs, item.duration_secs);

    let mut score = settings.title_weight * title_similarity
        + settings.artist_weight * artist_similarity
        + settings.duration_weight * duration;
    if item.content_kind == ContentKind::OfficialStudio {
        score += settings.studio_bonus;
    }

    MatchCandidate {
        item: item.clone(),
        title_similarity,
        artist_similarity,
        duration_closeness: duration,
        score,
    }
}

/// Resolves catalog-A tracks to playable catalog-B items.
#[derive(Debug)]
pub struct TrackResolver {
    catalog: Arc<dyn CatalogB>,
    matches: Arc<dyn MatchStore>,
    clock: Arc<dyn Clock>,
    settings: ResolverSettings,
    preferences: RwLock<ContentPreferences>,
}

impl TrackResolver {
    pub fn new(
        catalog: Arc<dyn CatalogB>,
        matches: Arc<dyn MatchStore>,
        clock: Arc<dyn Clock>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            catalog,
            matches,
            clock,
            settings,
            preferences: RwLock::new(ContentPreferences::default()),
        }
    }

    pub fn preferences(&self) -> ContentPreferences {
        *self
            .preferences
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_preferences(&self, preferences: ContentPreferences) {
        *self
            .preferences
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = preferences;
    }

    /// Resolve a track, or `None` when no acceptable match exists or the
    /// lookup failed. Failures are logged; callers skip the track.
    pub async fn resolve(&self, track: &Track) -> Option<PlayableItem> {
        match self.try_resolve(track).await {
            Ok(item) => item,
            Err(e) => {
                log::warn!("could not resolve {} ({}): {e}", track.title, track.id);
                None
            }
        }
    }

    /// Resolve a track, surfacing search and storage failures.
    pub async fn try_resolve(&self, track: &Track) -> ResolveResult<Option<PlayableItem>> {
        let preferences = self.preferences();

        if let Some(cached) = self.matches.get_match(&track.id)? {
            if cached.is_manual_override || !preferences.hides(cached.content_kind) {
                return Ok(Some(PlayableItem::from(&cached)));
            }
            log::debug!(
                "cached match for {} is a hidden {} item; searching again",
                track.id,
                cached.content_kind.as_str()
            );
            self.matches.delete_automatic_match(&track.id)?;
        }

        let query = search_query(track);
        let search = self.catalog.search(&query);
        let results = tokio::time::timeout(self.settings.search_timeout(), search)
            .await
            .map_err(|_| ResolveError::Timeout)??;

        let best = results
            .iter()
            .filter(|item| item.result_type == ResultType::Track)
            .filter(|item| !preferences.hides(item.content_kind))
            .map(|item| score_candidate(track, item, &self.settings))
            .fold(None::<MatchCandidate>, |best, candidate| match best {
                Some(b) if b.score >= candidate.score => Some(b),
                _ => Some(candidate),
            });

        let Some(best) = best.filter(|c| c.score >= self.settings.threshold) else {
            log::debug!("no catalog B match for {:?} above threshold", query);
            return Ok(None);
        };

        let entry = TrackMatch::automatic(
            track.id.clone(),
            best.item.id.clone(),
            best.item.title.clone(),
            best.item.artist_names(),
            best.score,
            best.item.content_kind,
            self.clock.now(),
        );

        if self.matches.save_automatic_match(&entry)? {
            let mut item = PlayableItem::from(&entry);
            item.from_cache = false;
            Ok(Some(item))
        } else {
            // A manual override landed while we were searching; it wins.
            Ok(self
                .matches
                .get_match(&track.id)?
                .map(|m| PlayableItem::from(&m)))
        }
    }

    /// Record the listener's own choice for `source_id`.
    pub fn override_match(
        &self,
        source_id: &str,
        target_id: &str,
        title: &str,
        artist: &str,
    ) -> ResolveResult<TrackMatch> {
        if source_id.is_empty() || target_id.is_empty() {
            return Err(ResolveError::Invalid(
                "override needs both a source and a target id".to_string(),
            ));
        }
        let entry = TrackMatch::manual(source_id, target_id, title, artist, self.clock.now());
        self.matches.save_override(&entry)?;
        log::info!("manual match {source_id} -> {target_id} saved");
        Ok(entry)
    }

    /// Every cached match pointing at a catalog-B item.
    pub fn matches_for_target(&self, target_id: &str) -> ResolveResult<Vec<TrackMatch>> {
        Ok(self.matches.matches_for_target(target_id)?)
    }

    /// Resolve in fixed-size batches: concurrent within a batch, batches in
    /// order. Unresolvable tracks are skipped.
    pub async fn resolve_all(&self, tracks: &[Track]) -> Vec<PlayableItem> {
        let mut resolved = Vec::with_capacity(tracks.len());
        for batch in tracks.chunks(self.settings.batch_size.max(1)) {
            let results = join_all(batch.iter().map(|t| self.resolve(t))).await;
            resolved.extend(results.into_iter().flatten());
        }
        resolved
    }

    /// Like [`resolve_all`](Self::resolve_all), but each item is sent as soon
    /// as its batch completes. The channel closes after the last batch, or
    /// early if the receiver is dropped.
    pub fn resolve_progressively(
        self: Arc<Self>,
        tracks: Vec<Track>,
    ) -> mpsc::Receiver<PlayableItem> {
        let batch_size = self.settings.batch_size.max(1);
        let (tx, rx) = mpsc::channel(batch_size);
        tokio::spawn(async move {
            for batch in tracks.chunks(batch_size) {
                let results = join_all(batch.iter().map(|t| self.resolve(t))).await;
                for item in results.into_iter().flatten() {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            }
        });
        rx
    }
}

/// Catalog-B search text: primary artist then title.
fn search_query(track: &Track) -> String {
    match track.primary_artist() {
        Some(artist) if !artist.name.is_empty() => format!("{} {}", artist.name, track.title),
        _ => track.title.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Track {
        Track::new("a1", "Song A (Remastered 2011)")
            .with_artist("x", "Artist X")
            .with_duration(200)
    }

    #[test]
    fn test_exact_match_scores_full_weight() {
        let settings = ResolverSettings::default();
        let item = CatalogBItem::track("b1", "Song A", "Artist X").with_duration(201);
        let scored = score_candidate(&seed(), &item, &settings);
        assert!((scored.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_studio_bonus_breaks_ties() {
        let settings = ResolverSettings::default();
        let live = CatalogBItem::track("b1", "Song A", "Artist X")
            .with_duration(200)
            .with_kind(ContentKind::Live);
        let studio = CatalogBItem::track("b2", "Song A", "Artist X")
            .with_duration(200)
            .with_kind(ContentKind::OfficialStudio);
        let live_score = score_candidate(&seed(), &live, &settings).score;
        let studio_score = score_candidate(&seed(), &studio, &settings).score;
        assert!((studio_score - live_score - settings.studio_bonus).abs() < 1e-9);
    }

    #[test]
    fn test_artist_similarity_takes_best_pair() {
        let settings = ResolverSettings::default();
        let mut item = CatalogBItem::track("b1", "Song A", "Somebody Else");
        item.artists.push("artist x".to_string());
        let scored = score_candidate(&seed(), &item, &settings);
        assert!((scored.artist_similarity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_duration_contributes_nothing() {
        let settings = ResolverSettings::default();
        let item = CatalogBItem::track("b1", "Song A", "Artist X");
        let scored = score_candidate(&seed(), &item, &settings);
        assert_eq!(scored.duration_closeness, 0.0);
        assert!((scored.score - 0.80).abs() < 1e-9);
    }

    #[test]
    fn test_search_query_uses_primary_artist() {
        assert_eq!(search_query(&seed()), "Artist X Song A (Remastered 2011)");
        assert_eq!(search_query(&Track::new("t", "Lonely")), "Lonely");
    }
}
