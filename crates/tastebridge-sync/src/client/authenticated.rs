//! A [`CatalogApi`] that keeps its token fresh.
//!
//! Every call first makes sure a valid token is installed. A call rejected
//! with [`CatalogError::Unauthenticated`] renews the token and is retried
//! once; a second rejection is returned to the caller.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use tastebridge_core::model::{Artist, TimeWindow, Track};

use crate::error::{CatalogError, SyncResult};

use super::api::{Authenticator, CatalogApi};

#[derive(Debug)]
pub struct AuthenticatedApi {
    inner: Arc<dyn CatalogApi>,
    auth: Arc<dyn Authenticator>,
}

impl AuthenticatedApi {
    pub fn new(inner: Arc<dyn CatalogApi>, auth: Arc<dyn Authenticator>) -> Self {
        Self { inner, auth }
    }

    async fn call<T, F, Fut>(&self, endpoint: &str, op: F) -> SyncResult<T>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = SyncResult<T>> + Send,
    {
        self.auth.authenticate().await?;

        match op().await {
            Err(CatalogError::Unauthenticated { message }) => {
                log::info!("{endpoint}: access token rejected ({message}), renewing");
                self.auth.renew_rejected().await?;
                op().await
            }
            other => other,
        }
    }
}

#[async_trait]
impl CatalogApi for AuthenticatedApi {
    async fn saved_tracks(&self, limit: usize) -> SyncResult<Vec<Track>> {
        self.call("saved_tracks", || self.inner.saved_tracks(limit)).await
    }

    async fn top_tracks(&self, window: TimeWindow, limit: usize) -> SyncResult<Vec<Track>> {
        self.call("top_tracks", || self.inner.top_tracks(window, limit)).await
    }

    async fn top_artists(&self, window: TimeWindow, limit: usize) -> SyncResult<Vec<Artist>> {
        self.call("top_artists", || self.inner.top_artists(window, limit)).await
    }

    async fn followed_artists(&self, limit: usize) -> SyncResult<Vec<Artist>> {
        self.call("followed_artists", || self.inner.followed_artists(limit)).await
    }

    async fn related_artist_names(&self, artist_id: &str) -> SyncResult<Vec<String>> {
        self.call("related_artists", || self.inner.related_artist_names(artist_id)).await
    }

    async fn artist(&self, artist_id: &str) -> SyncResult<Artist> {
        self.call("artist", || self.inner.artist(artist_id)).await
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> SyncResult<Vec<Track>> {
        self.call("artist_top_tracks", || self.inner.artist_top_tracks(artist_id)).await
    }

    async fn album_tracks(&self, album_id: &str) -> SyncResult<Vec<Track>> {
        self.call("album_tracks", || self.inner.album_tracks(album_id)).await
    }

    async fn track(&self, track_id: &str) -> SyncResult<Track> {
        self.call("track", || self.inner.track(track_id)).await
    }
}
