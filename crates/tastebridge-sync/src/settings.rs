//! Tunable parameters for the catalog-A client and the profile cache.
//!
//! The defaults were tuned against catalog A's undocumented rate-limit
//! behavior; they are starting points, not guarantees.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Catalog-A client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL for REST-style calls.
    pub api_base: String,
    /// Endpoint for GraphQL-style calls.
    pub graphql_url: String,
    /// Endpoint that exchanges the session credential for an access token.
    pub token_url: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: usize,
    pub retry_min_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Used when a 429 carries no usable `Retry-After` header.
    pub default_retry_after_secs: u64,
    /// Pacing for the GraphQL path.
    pub graphql_requests_per_second: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.spotify.com/v1".to_string(),
            graphql_url: "https://api-partner.spotify.com/pathfinder/v1/query".to_string(),
            token_url: "https://open.spotify.com/get_access_token".to_string(),
            user_agent: concat!("tastebridge/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 15,
            max_retries: 2,
            retry_min_delay_ms: 500,
            retry_max_delay_ms: 4_000,
            default_retry_after_secs: 30,
            graphql_requests_per_second: 5,
        }
    }
}

impl ClientSettings {
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }
}

/// Profile cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL of the top-items entry when the top-items source contributed.
    pub full_ttl_secs: i64,
    /// TTL of the top-items entry when it was built without that source.
    pub degraded_ttl_secs: i64,
    pub followed_ttl_secs: i64,
    pub related_ttl_secs: i64,
    /// Hard deadline for each top-items sub-request.
    pub tier2_timeout_secs: u64,
    /// First cooldown after a rate limit or timeout.
    pub cooldown_base_secs: i64,
    /// Upper bound for the doubling cooldown.
    pub cooldown_max_secs: i64,
    /// How far back local play history is consulted.
    pub history_lookback_days: i64,
    pub history_limit: usize,
    pub saved_tracks_limit: usize,
    pub top_items_limit: usize,
    pub followed_limit: usize,
    /// Followed artists queried for related content.
    pub related_seed_limit: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            full_ttl_secs: 6 * 60 * 60,
            degraded_ttl_secs: 30 * 60,
            followed_ttl_secs: 24 * 60 * 60,
            related_ttl_secs: 7 * 24 * 60 * 60,
            tier2_timeout_secs: 8,
            cooldown_base_secs: 5 * 60,
            cooldown_max_secs: 60 * 60,
            history_lookback_days: 90,
            history_limit: 100,
            saved_tracks_limit: 200,
            top_items_limit: 50,
            followed_limit: 200,
            related_seed_limit: 10,
        }
    }
}

impl CacheSettings {
    #[must_use]
    pub fn full_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.full_ttl_secs)
    }

    #[must_use]
    pub fn degraded_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.degraded_ttl_secs)
    }

    #[must_use]
    pub fn followed_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.followed_ttl_secs)
    }

    #[must_use]
    pub fn related_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.related_ttl_secs)
    }

    #[must_use]
    pub const fn tier2_timeout(&self) -> Duration {
        Duration::from_secs(self.tier2_timeout_secs)
    }
}
