//! Catalog-A error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by catalog-A requests and the components built on them.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No token, an expired token, or a dead session credential.
    #[error("unauthenticated: {message}")]
    Unauthenticated { message: String },

    /// Catalog A asked us to back off.
    #[error("rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// The response did not have the expected shape.
    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },

    /// The request never reached catalog A.
    #[error("catalog unreachable: {message}")]
    Unreachable { message: String },

    /// The request or its enclosing deadline timed out.
    #[error("request timed out")]
    Timeout,

    /// Any other non-success status.
    #[error("HTTP {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    /// Durable storage failed underneath a catalog operation.
    #[error("storage error: {0}")]
    Storage(#[from] tastebridge_core::Error),
}

impl CatalogError {
    /// Returns `true` when an immediate, bounded retry may succeed.
    ///
    /// Rate limits and authentication failures are never transient in this
    /// sense: the former needs a cooldown, the latter a new token.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` when the error should start or extend a cooldown.
    pub fn starts_cooldown(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Timeout | Self::Unreachable { .. }
        )
    }

    /// Returns `true` when the stored session credential itself is rejected,
    /// as opposed to a network failure during the exchange.
    pub fn is_credential_dead(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// The server-requested backoff, if this is a rate-limit error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    pub(crate) fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience alias for catalog-A results.
pub type SyncResult<T> = std::result::Result<T, CatalogError>;
