use thiserror::Error;

use tastebridge_sync::CatalogError;

/// Errors from building recommendations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No taste data could be obtained from any source.
    #[error("taste profile unavailable")]
    ProfileUnavailable,

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("recommendation timed out")]
    Timeout,
}

/// Errors from resolving tracks against catalog B.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("catalog B search failed: {0}")]
    Search(String),

    #[error("catalog B search timed out")]
    Timeout,

    #[error("match storage error: {0}")]
    Storage(#[from] tastebridge_core::Error),

    #[error("invalid match: {0}")]
    Invalid(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
