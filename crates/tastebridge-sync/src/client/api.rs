//! Seams between the catalog-A client and the components that use it.
//!
//! The profile cache, session manager and recommendation engine only see
//! these traits, so tests drive them with in-process fakes.

use std::fmt;

use async_trait::async_trait;

use tastebridge_core::model::{AccessToken, Artist, SessionCredential, TimeWindow, Track};

use crate::error::SyncResult;

/// Read access to the listener's catalog-A library and the public catalog.
#[async_trait]
pub trait CatalogApi: Send + Sync + fmt::Debug {
    /// Saved (liked) tracks, newest first, up to `limit`.
    async fn saved_tracks(&self, limit: usize) -> SyncResult<Vec<Track>>;

    /// Personal top tracks for one time window. Never retried: callers run
    /// this under a cooldown.
    async fn top_tracks(&self, window: TimeWindow, limit: usize) -> SyncResult<Vec<Track>>;

    /// Personal top artists for one time window. Never retried.
    async fn top_artists(&self, window: TimeWindow, limit: usize) -> SyncResult<Vec<Artist>>;

    /// Followed artists, up to `limit`.
    async fn followed_artists(&self, limit: usize) -> SyncResult<Vec<Artist>>;

    /// Display names of artists catalog A considers related to `artist_id`.
    async fn related_artist_names(&self, artist_id: &str) -> SyncResult<Vec<String>>;

    async fn artist(&self, artist_id: &str) -> SyncResult<Artist>;

    async fn artist_top_tracks(&self, artist_id: &str) -> SyncResult<Vec<Track>>;

    async fn album_tracks(&self, album_id: &str) -> SyncResult<Vec<Track>>;

    async fn track(&self, track_id: &str) -> SyncResult<Track>;
}

/// Exchanges the long-lived session credential for a short-lived token.
#[async_trait]
pub trait CredentialExchanger: Send + Sync + fmt::Debug {
    /// A rejected credential surfaces as
    /// [`CatalogError::Unauthenticated`](crate::error::CatalogError::Unauthenticated);
    /// anything else is a transport problem.
    async fn exchange(&self, credential: &SessionCredential) -> SyncResult<AccessToken>;
}

/// Receives the current access token so outbound requests can carry it.
pub trait TokenSink: Send + Sync + fmt::Debug {
    fn install(&self, token: &AccessToken);
    fn clear(&self);
}

/// Keeps an access token installed for outbound requests.
#[async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Install a valid token, exchanging the credential if the stored one
    /// has expired.
    async fn authenticate(&self) -> SyncResult<AccessToken>;

    /// The installed token was rejected by catalog A. Replace it, joining
    /// an exchange that finished while this caller waited.
    async fn renew_rejected(&self) -> SyncResult<AccessToken>;
}
