//! Integration tests for token renewal on the request path.
//!
//! The fake catalog accepts only tokens it issued through a credential
//! exchange, so a stored token that has not expired on paper but was revoked
//! upstream answers 401 until the session manager exchanges the credential.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use tastebridge_core::model::{AccessToken, Artist, SessionCredential, TimeWindow, Track};
use tastebridge_core::store::save_json;
use tastebridge_core::{Clock, KeyValueStore, ManualClock, MemoryStore, NoHistory, StatusBoard};
use tastebridge_sync::session::TOKEN_KEY;
use tastebridge_sync::{
    AuthenticatedApi, Authenticator, CacheQuality, CacheSettings, CatalogApi, CatalogError,
    CredentialExchanger, ProfileCache, SessionManager, SyncResult, TokenSink,
};

#[derive(Debug)]
struct RevokingCatalog {
    clock: Arc<ManualClock>,
    installed: Mutex<Option<String>>,
    exchanges: AtomicUsize,
    rejections: AtomicUsize,
    credential_dead: bool,
}

impl RevokingCatalog {
    fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            installed: Mutex::new(None),
            exchanges: AtomicUsize::new(0),
            rejections: AtomicUsize::new(0),
            credential_dead: false,
        }
    }

    fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn rejections(&self) -> usize {
        self.rejections.load(Ordering::SeqCst)
    }

    fn check_token(&self) -> SyncResult<()> {
        let installed = self.installed.lock().unwrap().clone();
        match installed {
            Some(token) if token.starts_with("issued-") => Ok(()),
            _ => {
                self.rejections.fetch_add(1, Ordering::SeqCst);
                Err(CatalogError::Unauthenticated {
                    message: "HTTP 401".into(),
                })
            }
        }
    }
}

#[async_trait]
impl CredentialExchanger for RevokingCatalog {
    async fn exchange(&self, _credential: &SessionCredential) -> SyncResult<AccessToken> {
        if self.credential_dead {
            return Err(CatalogError::Unauthenticated {
                message: "credential expired".into(),
            });
        }
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken::new(
            format!("issued-{n}"),
            self.clock.now() + Duration::hours(1),
        ))
    }
}

impl TokenSink for RevokingCatalog {
    fn install(&self, token: &AccessToken) {
        *self.installed.lock().unwrap() = Some(token.value.clone());
    }

    fn clear(&self) {
        *self.installed.lock().unwrap() = None;
    }
}

#[async_trait]
impl CatalogApi for RevokingCatalog {
    async fn saved_tracks(&self, _limit: usize) -> SyncResult<Vec<Track>> {
        self.check_token()?;
        Ok(vec![
            Track::new("a", "A").with_artist("y", "Artist Y"),
            Track::new("b", "B").with_artist("z", "Artist Z"),
        ])
    }

    async fn top_tracks(&self, _window: TimeWindow, _limit: usize) -> SyncResult<Vec<Track>> {
        self.check_token()?;
        Ok(vec![Track::new("t", "Top").with_artist("x", "Artist X")])
    }

    async fn top_artists(&self, _window: TimeWindow, _limit: usize) -> SyncResult<Vec<Artist>> {
        self.check_token()?;
        Ok(vec![Artist::new("x", "Artist X")])
    }

    async fn followed_artists(&self, _limit: usize) -> SyncResult<Vec<Artist>> {
        self.check_token()?;
        Ok(Vec::new())
    }

    async fn related_artist_names(&self, _artist_id: &str) -> SyncResult<Vec<String>> {
        self.check_token()?;
        Ok(Vec::new())
    }

    async fn artist(&self, artist_id: &str) -> SyncResult<Artist> {
        self.check_token()?;
        Ok(Artist::new(artist_id, artist_id))
    }

    async fn artist_top_tracks(&self, _artist_id: &str) -> SyncResult<Vec<Track>> {
        self.check_token()?;
        Ok(Vec::new())
    }

    async fn album_tracks(&self, _album_id: &str) -> SyncResult<Vec<Track>> {
        self.check_token()?;
        Ok(Vec::new())
    }

    async fn track(&self, track_id: &str) -> SyncResult<Track> {
        self.check_token()?;
        Ok(Track::new(track_id, track_id))
    }
}

struct Harness {
    catalog: Arc<RevokingCatalog>,
    session: Arc<SessionManager>,
    api: Arc<dyn CatalogApi>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    status: Arc<StatusBoard>,
}

fn harness_with(catalog: RevokingCatalog, clock: Arc<ManualClock>) -> Harness {
    let catalog = Arc::new(catalog);
    let store = Arc::new(MemoryStore::new());
    let status = Arc::new(StatusBoard::new());
    let session = Arc::new(SessionManager::new(
        Arc::clone(&catalog) as Arc<dyn CredentialExchanger>,
        Arc::clone(&catalog) as Arc<dyn TokenSink>,
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::clone(&status),
    ));
    session
        .login(&SessionCredential::new("primary", "secondary"))
        .unwrap();
    let api: Arc<dyn CatalogApi> = Arc::new(AuthenticatedApi::new(
        Arc::clone(&catalog) as Arc<dyn CatalogApi>,
        Arc::clone(&session) as Arc<dyn Authenticator>,
    ));
    Harness {
        catalog,
        session,
        api,
        store,
        clock,
        status,
    }
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    harness_with(RevokingCatalog::new(Arc::clone(&clock)), clock)
}

/// A token the catalog no longer accepts, though its expiry is still ahead.
fn store_revoked_token(h: &Harness) {
    let token = AccessToken::new("revoked", h.clock.now() + Duration::minutes(40));
    save_json(h.store.as_ref(), TOKEN_KEY, &token).unwrap();
}

#[tokio::test]
async fn test_rejected_call_renews_token_and_retries() {
    let h = harness();
    store_revoked_token(&h);

    let track = h.api.track("t1").await.unwrap();

    assert_eq!(track.id, "t1");
    assert_eq!(h.catalog.rejections(), 1);
    assert_eq!(h.catalog.exchanges(), 1);
    assert_eq!(h.session.stored_token().unwrap().value, "issued-1");
}

#[tokio::test]
async fn test_expired_token_refreshed_before_the_call() {
    let h = harness();
    let token = AccessToken::new("issued-0", h.clock.now() + Duration::minutes(5));
    save_json(h.store.as_ref(), TOKEN_KEY, &token).unwrap();
    h.clock.advance(Duration::minutes(10));

    h.api.artist("x").await.unwrap();

    assert_eq!(h.catalog.rejections(), 0);
    assert_eq!(h.catalog.exchanges(), 1);
}

#[tokio::test]
async fn test_profile_cache_recovers_from_revoked_token() {
    let h = harness();
    store_revoked_token(&h);
    let cache = ProfileCache::new(
        Arc::clone(&h.api),
        Arc::new(NoHistory),
        Arc::clone(&h.store) as Arc<dyn KeyValueStore>,
        Arc::clone(&h.clock) as Arc<dyn Clock>,
        Arc::clone(&h.status),
        CacheSettings::default(),
    );

    let tracks = cache.top_tracks(10).await;

    assert!(!tracks.is_empty());
    assert_eq!(cache.top_quality(), CacheQuality::Full);
    assert_eq!(h.catalog.exchanges(), 1);
    assert!(!h.status.fallback().active);
}

#[tokio::test]
async fn test_dead_credential_surfaces_unauthenticated() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let catalog = RevokingCatalog {
        credential_dead: true,
        ..RevokingCatalog::new(Arc::clone(&clock))
    };
    let h = harness_with(catalog, clock);
    store_revoked_token(&h);

    let err = h.api.saved_tracks(10).await.unwrap_err();

    assert!(matches!(err, CatalogError::Unauthenticated { .. }));
    assert_eq!(h.catalog.rejections(), 1);
    assert!(h.session.needs_relogin());
    assert!(!h.session.has_credential());
}
