//! Catalog-A HTTP client.
//!
//! Two request styles share one client: REST-style `GET`s against
//! `api_base`, and GraphQL-style `POST`s against `graphql_url` (paced by a
//! [`RateLimiter`]). Every request carries the current bearer token, and
//! every failure is classified into a [`CatalogError`]. Transient failures
//! are retried with exponential backoff, except for the top-items calls,
//! which are attempted exactly once.

mod api;
mod authenticated;
mod responses;

pub use api::{Authenticator, CatalogApi, CredentialExchanger, TokenSink};
pub use authenticated::AuthenticatedApi;

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::header::{HeaderMap, COOKIE, RETRY_AFTER};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use tastebridge_core::model::{AccessToken, Artist, SessionCredential, TimeWindow, Track};

use crate::error::{CatalogError, SyncResult};
use crate::resilience::RateLimiter;
use crate::settings::ClientSettings;

use responses::{
    AlbumResponse, ArtistTopTracksResponse, FollowedArtistsResponse, GqlEnvelope,
    LibraryTracksData, Paging, RawArtist, RawTrack, RelatedArtistsData, TokenResponse,
};

/// Largest page catalog A serves for list endpoints.
const PAGE_SIZE: usize = 50;

const LIBRARY_TRACKS_OPERATION: &str = "fetchLibraryTracks";
const RELATED_ARTISTS_OPERATION: &str = "queryArtistRelated";

/// Cookie names under which the token endpoint expects the credential pair.
const PRIMARY_COOKIE: &str = "sp_dc";
const SECONDARY_COOKIE: &str = "sp_key";

/// Whether a request may be retried on transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryPolicy {
    Backoff,
    Once,
}

/// A fully described request, rebuilt on every attempt.
#[derive(Debug)]
struct ApiRequest {
    method: Method,
    url: String,
    /// Short label used in errors and logs.
    endpoint: String,
    query: Vec<(&'static str, String)>,
    body: Option<Value>,
    paced: bool,
}

impl ApiRequest {
    fn get(url: String, endpoint: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            paced: false,
        }
    }

    fn graphql(url: &str, operation: &'static str, variables: Value) -> Self {
        Self {
            method: Method::POST,
            url: url.to_string(),
            endpoint: operation.to_string(),
            query: Vec::new(),
            body: Some(json!({
                "operationName": operation,
                "variables": variables,
            })),
            paced: true,
        }
    }

    fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

/// Catalog-A API client.
#[derive(Debug)]
pub struct CatalogAClient {
    http: Client,
    settings: ClientSettings,
    token: RwLock<Option<String>>,
    graphql_pacer: RateLimiter,
}

impl CatalogAClient {
    /// Build a client with no token installed.
    pub fn new(settings: ClientSettings) -> reqwest::Result<Self> {
        let http = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self {
            http,
            graphql_pacer: RateLimiter::new(settings.graphql_requests_per_second),
            settings,
            token: RwLock::new(None),
        })
    }

    pub fn set_access_token(&self, value: &str) {
        let mut slot = self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = Some(value.to_string());
    }

    pub fn clear_access_token(&self) {
        let mut slot = self
            .token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *slot = None;
    }

    #[must_use]
    pub fn has_access_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    fn bearer(&self) -> SyncResult<String> {
        self.token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| CatalogError::Unauthenticated {
                message: "no access token installed".to_string(),
            })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.api_base.trim_end_matches('/'))
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.settings.retry_min_delay_ms))
            .with_max_delay(Duration::from_millis(self.settings.retry_max_delay_ms))
            .with_max_times(self.settings.max_retries)
            .with_jitter()
    }

    /// Send a built request and decode a successful body.
    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        endpoint: &str,
    ) -> SyncResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| classify_transport(&e, endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(
                status,
                response.headers(),
                endpoint,
                self.settings.default_retry_after(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport(&e, endpoint))?;
        serde_json::from_slice(&bytes).map_err(|e| CatalogError::malformed(endpoint, e.to_string()))
    }

    async fn attempt<T: DeserializeOwned>(&self, request: &ApiRequest) -> SyncResult<T> {
        if request.paced {
            self.graphql_pacer.acquire().await;
        }
        let token = self.bearer()?;
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .bearer_auth(token);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        log::debug!("catalog A: {} {}", request.method, request.endpoint);
        self.send(builder, &request.endpoint).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        policy: RetryPolicy,
    ) -> SyncResult<T> {
        match policy {
            RetryPolicy::Once => self.attempt(&request).await,
            RetryPolicy::Backoff => {
                (|| self.attempt::<T>(&request))
                    .retry(self.backoff())
                    .when(CatalogError::is_transient)
                    .notify(|err: &CatalogError, delay: Duration| {
                        log::warn!(
                            "catalog A {} failed ({err}), retrying in {}ms",
                            request.endpoint,
                            delay.as_millis()
                        );
                    })
                    .await
            }
        }
    }

    /// Run a GraphQL operation and unwrap its `data` member.
    async fn graphql<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        variables: Value,
    ) -> SyncResult<T> {
        let request = ApiRequest::graphql(&self.settings.graphql_url, operation, variables);
        let envelope: GqlEnvelope<T> = self.call(request, RetryPolicy::Backoff).await?;
        match envelope.data {
            Some(data) => Ok(data),
            None => {
                let message = envelope
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .next()
                    .unwrap_or_else(|| "response carried no data".to_string());
                Err(CatalogError::malformed(operation, message))
            }
        }
    }
}

#[async_trait]
impl CatalogApi for CatalogAClient {
    async fn saved_tracks(&self, limit: usize) -> SyncResult<Vec<Track>> {
        let mut tracks = Vec::new();
        let mut offset = 0;
        while tracks.len() < limit {
            let page_size = PAGE_SIZE.min(limit - tracks.len());
            let data: LibraryTracksData = self
                .graphql(
                    LIBRARY_TRACKS_OPERATION,
                    json!({ "offset": offset, "limit": page_size }),
                )
                .await?;
            let page = responses::map_library_tracks(data);
            let fetched = page.len();
            tracks.extend(page);
            if fetched < page_size {
                break;
            }
            offset += fetched;
        }
        tracks.truncate(limit);
        log::debug!("fetched {} saved tracks", tracks.len());
        Ok(tracks)
    }

    async fn top_tracks(&self, window: TimeWindow, limit: usize) -> SyncResult<Vec<Track>> {
        let request = ApiRequest::get(self.api_url("/me/top/tracks"), "/me/top/tracks")
            .param("time_range", window.as_query())
            .param("limit", limit.clamp(1, PAGE_SIZE));
        let page: Paging<RawTrack> = self.call(request, RetryPolicy::Once).await?;
        Ok(responses::map_tracks(page.items, None))
    }

    async fn top_artists(&self, window: TimeWindow, limit: usize) -> SyncResult<Vec<Artist>> {
        let request = ApiRequest::get(self.api_url("/me/top/artists"), "/me/top/artists")
            .param("time_range", window.as_query())
            .param("limit", limit.clamp(1, PAGE_SIZE));
        let page: Paging<RawArtist> = self.call(request, RetryPolicy::Once).await?;
        Ok(responses::map_artists(page.items))
    }

    async fn followed_artists(&self, limit: usize) -> SyncResult<Vec<Artist>> {
        let mut artists = Vec::new();
        let mut after: Option<String> = None;
        while artists.len() < limit {
            let mut request = ApiRequest::get(self.api_url("/me/following"), "/me/following")
                .param("type", "artist")
                .param("limit", PAGE_SIZE.min(limit - artists.len()));
            if let Some(cursor) = after.take() {
                request = request.param("after", cursor);
            }
            let response: FollowedArtistsResponse = self.call(request, RetryPolicy::Backoff).await?;
            let page = responses::map_artists(response.artists.items);
            if page.is_empty() {
                break;
            }
            artists.extend(page);
            after = response.artists.cursors.and_then(|c| c.after);
            if after.is_none() {
                break;
            }
        }
        artists.truncate(limit);
        Ok(artists)
    }

    async fn related_artist_names(&self, artist_id: &str) -> SyncResult<Vec<String>> {
        let data: RelatedArtistsData = self
            .graphql(
                RELATED_ARTISTS_OPERATION,
                json!({ "uri": format!("spotify:artist:{artist_id}") }),
            )
            .await?;
        Ok(responses::map_related_names(data))
    }

    async fn artist(&self, artist_id: &str) -> SyncResult<Artist> {
        let request = ApiRequest::get(self.api_url(&format!("/artists/{artist_id}")), "/artists");
        let raw: RawArtist = self.call(request, RetryPolicy::Backoff).await?;
        responses::map_artist(raw)
            .ok_or_else(|| CatalogError::malformed("/artists", "artist without id"))
    }

    async fn artist_top_tracks(&self, artist_id: &str) -> SyncResult<Vec<Track>> {
        let request = ApiRequest::get(
            self.api_url(&format!("/artists/{artist_id}/top-tracks")),
            "/artists/top-tracks",
        )
        .param("market", "from_token");
        let response: ArtistTopTracksResponse = self.call(request, RetryPolicy::Backoff).await?;
        Ok(responses::map_tracks(response.tracks, None))
    }

    async fn album_tracks(&self, album_id: &str) -> SyncResult<Vec<Track>> {
        let request = ApiRequest::get(self.api_url(&format!("/albums/{album_id}")), "/albums");
        let album: AlbumResponse = self.call(request, RetryPolicy::Backoff).await?;
        Ok(album.into_tracks(album_id))
    }

    async fn track(&self, track_id: &str) -> SyncResult<Track> {
        let request = ApiRequest::get(self.api_url(&format!("/tracks/{track_id}")), "/tracks");
        let raw: RawTrack = self.call(request, RetryPolicy::Backoff).await?;
        responses::map_track(raw, None)
            .ok_or_else(|| CatalogError::malformed("/tracks", "track without id"))
    }
}

#[async_trait]
impl CredentialExchanger for CatalogAClient {
    async fn exchange(&self, credential: &SessionCredential) -> SyncResult<AccessToken> {
        if credential.is_empty() {
            return Err(CatalogError::Unauthenticated {
                message: "no session credential".to_string(),
            });
        }
        let endpoint = "token";
        let cookie = format!(
            "{PRIMARY_COOKIE}={}; {SECONDARY_COOKIE}={}",
            credential.primary, credential.secondary
        );

        let raw: TokenResponse = (|| async {
            let builder = self
                .http
                .get(&self.settings.token_url)
                .query(&[("reason", "transport"), ("productType", "web_player")])
                .header(COOKIE, cookie.as_str());
            self.send(builder, endpoint).await
        })
        .retry(self.backoff())
        .when(CatalogError::is_transient)
        .notify(|err: &CatalogError, delay: Duration| {
            log::warn!("token exchange failed ({err}), retrying in {}ms", delay.as_millis());
        })
        .await?;

        responses::map_token(raw, endpoint)
    }
}

impl TokenSink for CatalogAClient {
    fn install(&self, token: &AccessToken) {
        self.set_access_token(&token.value);
    }

    fn clear(&self) {
        self.clear_access_token();
    }
}

/// Classify a transport-level failure.
fn classify_transport(err: &reqwest::Error, endpoint: &str) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout
    } else if err.is_decode() {
        CatalogError::malformed(endpoint, err.to_string())
    } else {
        CatalogError::Unreachable {
            message: err.to_string(),
        }
    }
}

/// Classify a non-success HTTP status.
fn classify_status(
    status: StatusCode,
    headers: &HeaderMap,
    endpoint: &str,
    default_retry_after: Duration,
) -> CatalogError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CatalogError::Unauthenticated {
            message: format!("{endpoint} answered {status}"),
        },
        StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited {
            retry_after: parse_retry_after(headers, default_retry_after),
        },
        _ => CatalogError::Http {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        },
    }
}

/// Read a `Retry-After` header given in whole seconds.
fn parse_retry_after(headers: &HeaderMap, default: Duration) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}
