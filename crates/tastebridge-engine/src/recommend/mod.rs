//! Recommendation engine.
//!
//! Builds a [`TasteProfile`] from the profile cache, gathers candidates from
//! four sources around a seed track, scores them against the profile and
//! diversifies the final ranking.

mod diversify;
pub mod profile;
pub mod scoring;

pub use diversify::diversify;
pub use profile::{TasteProfile, WeightedTrack, WindowSnapshot};
pub use scoring::{ScoreComponents, ScoredCandidate, SourceBucket};

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, RwLock};

use futures::future::join_all;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use tastebridge_core::model::{TimeWindow, Track};
use tastebridge_core::Clock;
use tastebridge_sync::{CatalogApi, CatalogError, ProfileCache, SyncResult};

use crate::error::{EngineError, EngineResult};
use crate::settings::EngineSettings;

/// Turns the cached taste profile and a seed track into a ranked queue.
#[derive(Debug)]
pub struct RecommendationEngine {
    cache: Arc<ProfileCache>,
    api: Arc<dyn CatalogApi>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
    profile: RwLock<Option<Arc<TasteProfile>>>,
    build_lock: Mutex<()>,
}

impl RecommendationEngine {
    pub fn new(
        cache: Arc<ProfileCache>,
        api: Arc<dyn CatalogApi>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            cache,
            api,
            clock,
            settings,
            profile: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The current profile, fresh or not.
    pub fn profile(&self) -> Option<Arc<TasteProfile>> {
        self.profile
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn fresh_profile(&self) -> Option<Arc<TasteProfile>> {
        let now = self.clock.now();
        self.profile()
            .filter(|p| now - p.built_at < self.settings.profile_ttl())
    }

    /// Make sure a fresh taste profile exists, building it if needed.
    ///
    /// Returns `false` when no source produced any data; callers should fall
    /// back to [`fallback_queue`](Self::fallback_queue).
    pub async fn ensure_profile_loaded(&self) -> bool {
        if self.fresh_profile().is_some() {
            return true;
        }

        let _guard = self.build_lock.lock().await;
        if self.fresh_profile().is_some() {
            return true;
        }

        let windows = self.read_windows().await;
        let Some(profile) = TasteProfile::build(&windows, &self.settings, self.clock.now()) else {
            log::warn!("taste profile build found no data in any window");
            return false;
        };

        log::info!(
            "taste profile built: {} artists, {} pool tracks",
            profile.affinity.len(),
            profile.track_pool.len()
        );
        *self
            .profile
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Arc::new(profile));
        true
    }

    /// Six concurrent reads: every window, tracks and artists.
    async fn read_windows(&self) -> Vec<WindowSnapshot> {
        let limit = self.settings.items_per_window;
        join_all(TimeWindow::ALL.iter().map(|&window| async move {
            let (tracks, artists) = futures::join!(
                self.cache.window_top_tracks(window, limit),
                self.cache.window_top_artists(window, limit),
            );
            WindowSnapshot {
                window,
                tracks,
                artists,
            }
        }))
        .await
    }

    /// Drop the taste profile; the next request rebuilds it.
    pub fn invalidate_profile(&self) {
        *self
            .profile
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }

    /// Ranked, diversified tracks for `seed`.
    pub async fn get_recommendations(
        &self,
        seed: &Track,
        limit: usize,
    ) -> EngineResult<Vec<Track>> {
        Ok(self
            .recommend_scored(seed, limit)
            .await?
            .into_iter()
            .map(|c| c.track)
            .collect())
    }

    /// Like [`get_recommendations`](Self::get_recommendations) but keeps the
    /// bucket and score breakdown of every pick.
    pub async fn recommend_scored(
        &self,
        seed: &Track,
        limit: usize,
    ) -> EngineResult<Vec<ScoredCandidate>> {
        if !self.ensure_profile_loaded().await {
            return Err(EngineError::ProfileUnavailable);
        }
        let profile = self.profile().ok_or(EngineError::ProfileUnavailable)?;

        let seed_artists: Vec<String> = seed
            .artists
            .iter()
            .take(self.settings.seed_artist_limit)
            .map(|a| a.id.clone())
            .collect();

        let (seed_top, album, neighbors) = futures::join!(
            self.seed_artist_tracks(&seed_artists),
            self.same_album_tracks(seed),
            self.genre_neighbor_tracks(seed, &seed_artists, &profile),
        );
        let seed_genres = neighbors.seed_genres;

        let mut first_error = None;
        let mut sources: Vec<(SourceBucket, Vec<Track>)> = Vec::with_capacity(4);
        for (bucket, result) in [
            (SourceBucket::SeedArtist, seed_top),
            (SourceBucket::SameAlbum, album),
            (SourceBucket::GenreNeighbor, neighbors.tracks),
        ] {
            match result {
                Ok(tracks) => sources.push((bucket, tracks)),
                Err(e) => {
                    log::warn!("{} candidates unavailable: {e}", bucket.as_str());
                    first_error.get_or_insert(e);
                }
            }
        }
        sources.push((
            SourceBucket::UserPool,
            profile.track_pool.iter().map(|w| w.track.clone()).collect(),
        ));

        let mut seen: HashSet<String> = HashSet::from([seed.id.clone()]);
        let mut candidates = Vec::new();
        for (bucket, tracks) in sources {
            for track in tracks {
                if seen.insert(track.id.clone()) {
                    candidates.push(scoring::score(
                        track,
                        bucket,
                        seed,
                        &seed_genres,
                        &profile,
                        &self.settings,
                    ));
                }
            }
        }

        if candidates.is_empty() {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }

        log::debug!("{} candidates for seed {}", candidates.len(), seed.id);
        Ok(diversify(
            candidates,
            limit,
            self.settings.artist_cap,
            self.settings.bucket_run_limit,
        ))
    }

    /// Top tracks of each seed artist, concatenated. Fails only when every
    /// artist failed.
    async fn seed_artist_tracks(&self, artist_ids: &[String]) -> SyncResult<Vec<Track>> {
        collect_partial(join_all(artist_ids.iter().map(|id| self.api.artist_top_tracks(id))).await)
    }

    async fn same_album_tracks(&self, seed: &Track) -> SyncResult<Vec<Track>> {
        match &seed.album {
            Some(album) if !album.id.is_empty() => self.api.album_tracks(&album.id).await,
            _ => Ok(Vec::new()),
        }
    }

    /// Seed genres from the profile, or from catalog lookups of the seed
    /// artists when the profile knows none.
    async fn seed_genres(
        &self,
        seed: &Track,
        seed_artists: &[String],
        profile: &TasteProfile,
    ) -> BTreeSet<String> {
        let known = scoring::track_genres(seed, profile);
        if !known.is_empty() {
            return known;
        }
        join_all(seed_artists.iter().map(|id| self.api.artist(id)))
            .await
            .into_iter()
            .filter_map(|r| match r {
                Ok(artist) => Some(artist.genres),
                Err(e) => {
                    log::debug!("seed artist lookup failed: {e}");
                    None
                }
            })
            .flatten()
            .map(|g| g.to_lowercase())
            .collect()
    }

    async fn genre_neighbor_tracks(
        &self,
        seed: &Track,
        seed_artists: &[String],
        profile: &TasteProfile,
    ) -> NeighborTracks {
        let seed_genres = self.seed_genres(seed, seed_artists, profile).await;
        let neighbors = rank_neighbors(profile, &seed_genres, seed, &self.settings);
        if neighbors.is_empty() {
            return NeighborTracks {
                seed_genres,
                tracks: Ok(Vec::new()),
            };
        }
        log::debug!("genre neighbors for {}: {:?}", seed.id, neighbors);
        let lookups = join_all(neighbors.iter().map(|id| self.api.artist_top_tracks(id))).await;
        let tracks = collect_partial(lookups);
        NeighborTracks { seed_genres, tracks }
    }

    /// Basic queue used when the engine cannot produce recommendations:
    /// seed-artist top tracks and same-album tracks, shuffled.
    pub async fn fallback_queue(&self, seed: &Track, limit: usize) -> EngineResult<Vec<Track>> {
        let seed_artists: Vec<String> = seed
            .artists
            .iter()
            .take(self.settings.seed_artist_limit)
            .map(|a| a.id.clone())
            .collect();

        let (top, album) = futures::join!(
            self.seed_artist_tracks(&seed_artists),
            self.same_album_tracks(seed),
        );

        let attempted = !seed_artists.is_empty() || seed.album.is_some();
        let mut first_error = None;
        let mut seen: HashSet<String> = HashSet::from([seed.id.clone()]);
        let mut tracks = Vec::new();
        let mut succeeded = false;
        for result in [top, album] {
            match result {
                Ok(list) => {
                    succeeded = true;
                    tracks.extend(list.into_iter().filter(|t| seen.insert(t.id.clone())));
                }
                Err(e) => {
                    log::warn!("fallback source failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        if attempted && !succeeded {
            if let Some(e) = first_error {
                return Err(e.into());
            }
        }

        tracks.shuffle(&mut rand::rng());
        tracks.truncate(limit);
        Ok(tracks)
    }
}

struct NeighborTracks {
    seed_genres: BTreeSet<String>,
    tracks: SyncResult<Vec<Track>>,
}

/// Profile artists most similar to the seed, excluding the seed's own.
///
/// With seed genres, artists are ranked by blended genre overlap and
/// affinity and must reach the floor. Without, the highest-affinity
/// artists are taken.
fn rank_neighbors(
    profile: &TasteProfile,
    seed_genres: &BTreeSet<String>,
    seed: &Track,
    settings: &EngineSettings,
) -> Vec<String> {
    let excluded: HashSet<&str> = seed.artists.iter().map(|a| a.id.as_str()).collect();
    let empty = BTreeSet::new();

    let mut ranked: Vec<(&String, f64)> = profile
        .affinity
        .iter()
        .filter(|(id, _)| !excluded.contains(id.as_str()))
        .map(|(id, &affinity)| {
            if seed_genres.is_empty() {
                (id, affinity)
            } else {
                let genres = profile.genres_of(id).unwrap_or(&empty);
                let overlap = scoring::genre_jaccard(seed_genres, genres);
                let similarity = settings.neighbor_genre_weight * overlap
                    + settings.neighbor_affinity_weight * affinity;
                (id, similarity)
            }
        })
        .filter(|&(_, s)| s > 0.0 && (seed_genres.is_empty() || s >= settings.neighbor_floor))
        .collect();

    // Ties broken by id so the order does not depend on map iteration.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(settings.neighbor_limit)
        .map(|(id, _)| id.clone())
        .collect()
}

/// Flatten per-item results, failing only when there were items and none
/// succeeded.
fn collect_partial(results: Vec<SyncResult<Vec<Track>>>) -> SyncResult<Vec<Track>> {
    let mut tracks = Vec::new();
    let mut first_error: Option<CatalogError> = None;
    let mut any_ok = results.is_empty();
    for result in results {
        match result {
            Ok(list) => {
                any_ok = true;
                tracks.extend(list);
            }
            Err(e) => {
                log::debug!("candidate fetch failed: {e}");
                first_error.get_or_insert(e);
            }
        }
    }
    match first_error {
        Some(e) if !any_ok => Err(e),
        _ => Ok(tracks),
    }
}
