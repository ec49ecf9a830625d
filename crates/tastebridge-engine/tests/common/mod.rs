//! Shared fakes for the engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tastebridge_core::model::{Artist, TimeWindow, Track};
use tastebridge_core::{Clock, KeyValueStore, ManualClock, MemoryStore, NoHistory, StatusBoard};
use tastebridge_engine::{
    CatalogB, CatalogBItem, EngineSettings, RecommendationEngine, ResolveError, ResolveResult,
};
use tastebridge_sync::{CacheSettings, CatalogApi, CatalogError, ProfileCache, SyncResult};

/// Catalog A with fixed short-window favourites and per-artist top tracks.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    pub short_artists: Vec<Artist>,
    pub short_tracks: Vec<Track>,
    pub top_by_artist: HashMap<String, Vec<Track>>,
    pub album_tracks: HashMap<String, Vec<Track>>,
    /// Top-items endpoints fail when set.
    pub profile_down: AtomicBool,
    /// Artist and album lookups fail when set.
    pub lookups_down: AtomicBool,
    pub top_item_calls: AtomicUsize,
    pub artist_top_calls: AtomicUsize,
}

impl FakeCatalog {
    fn down() -> CatalogError {
        CatalogError::Unreachable {
            message: "catalog down".into(),
        }
    }

    fn profile_gate(&self) -> SyncResult<()> {
        self.top_item_calls.fetch_add(1, Ordering::SeqCst);
        if self.profile_down.load(Ordering::SeqCst) {
            Err(Self::down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn saved_tracks(&self, _limit: usize) -> SyncResult<Vec<Track>> {
        if self.profile_down.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(Vec::new())
    }

    async fn top_tracks(&self, window: TimeWindow, _limit: usize) -> SyncResult<Vec<Track>> {
        self.profile_gate()?;
        Ok(if window == TimeWindow::Short {
            self.short_tracks.clone()
        } else {
            Vec::new()
        })
    }

    async fn top_artists(&self, window: TimeWindow, _limit: usize) -> SyncResult<Vec<Artist>> {
        self.profile_gate()?;
        Ok(if window == TimeWindow::Short {
            self.short_artists.clone()
        } else {
            Vec::new()
        })
    }

    async fn followed_artists(&self, _limit: usize) -> SyncResult<Vec<Artist>> {
        Ok(Vec::new())
    }

    async fn related_artist_names(&self, _artist_id: &str) -> SyncResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn artist(&self, artist_id: &str) -> SyncResult<Artist> {
        self.short_artists
            .iter()
            .find(|a| a.id == artist_id)
            .cloned()
            .ok_or(CatalogError::Http {
                status: 404,
                endpoint: "artist".into(),
            })
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> SyncResult<Vec<Track>> {
        self.artist_top_calls.fetch_add(1, Ordering::SeqCst);
        if self.lookups_down.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(self.top_by_artist.get(artist_id).cloned().unwrap_or_default())
    }

    async fn album_tracks(&self, album_id: &str) -> SyncResult<Vec<Track>> {
        if self.lookups_down.load(Ordering::SeqCst) {
            return Err(Self::down());
        }
        Ok(self.album_tracks.get(album_id).cloned().unwrap_or_default())
    }

    async fn track(&self, track_id: &str) -> SyncResult<Track> {
        Ok(Track::new(track_id, track_id))
    }
}

/// Catalog B answering from a fixed query table.
#[derive(Debug, Default)]
pub struct FakeCatalogB {
    pub results: Mutex<HashMap<String, Vec<CatalogBItem>>>,
    pub searches: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeCatalogB {
    pub fn with(self, query: &str, items: Vec<CatalogBItem>) -> Self {
        self.results.lock().unwrap().insert(query.to_string(), items);
        self
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogB for FakeCatalogB {
    async fn search(&self, query: &str) -> ResolveResult<Vec<CatalogBItem>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ResolveError::Search("catalog B unavailable".into()));
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct EngineHarness {
    pub api: Arc<FakeCatalog>,
    pub cache: Arc<ProfileCache>,
    pub engine: Arc<RecommendationEngine>,
    pub clock: Arc<ManualClock>,
    pub status: Arc<StatusBoard>,
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn engine_harness(api: FakeCatalog, settings: EngineSettings) -> EngineHarness {
    let api = Arc::new(api);
    let clock = Arc::new(ManualClock::new(now()));
    let status = Arc::new(StatusBoard::new());
    let cache = Arc::new(ProfileCache::new(
        Arc::clone(&api) as Arc<dyn CatalogApi>,
        Arc::new(NoHistory),
        Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&status),
        CacheSettings::default(),
    ));
    let engine = Arc::new(RecommendationEngine::new(
        Arc::clone(&cache),
        Arc::clone(&api) as Arc<dyn CatalogApi>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        settings,
    ));
    EngineHarness {
        api,
        cache,
        engine,
        clock,
        status,
    }
}

/// Listener who mostly plays Artist X, sometimes Artist Y, both rock.
pub fn rock_listener() -> FakeCatalog {
    let x = Artist::new("x", "Artist X").with_genres(["rock"]).with_popularity(70);
    let y = Artist::new("y", "Artist Y").with_genres(["Rock"]).with_popularity(50);

    let mut top_by_artist = HashMap::new();
    top_by_artist.insert(
        "x".to_string(),
        (0..6)
            .map(|i| {
                Track::new(format!("x-{i}"), format!("X Song {i}"))
                    .with_artist("x", "Artist X")
                    .with_popularity(60)
            })
            .collect(),
    );
    top_by_artist.insert(
        "y".to_string(),
        vec![Track::new("y-0", "Y Song").with_artist("y", "Artist Y").with_popularity(60)],
    );

    FakeCatalog {
        short_artists: vec![x, y],
        short_tracks: vec![Track::new("pool-1", "Pool Song")
            .with_artist("z", "Artist Z")
            .with_popularity(30)],
        top_by_artist,
        ..FakeCatalog::default()
    }
}

pub fn seed() -> Track {
    Track::new("seed", "Song A")
        .with_artist("x", "Artist X")
        .with_duration(200)
        .with_popularity(60)
}
