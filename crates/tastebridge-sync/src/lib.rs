//! Catalog-A synchronization for tastebridge.
//!
//! Provides the catalog-A HTTP client, the session manager that keeps its
//! access token valid, and the tiered profile cache that turns several
//! unreliable catalog-A sources into one always-available taste source.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod client;
pub mod error;
pub mod profile;
pub mod resilience;
pub mod session;
pub mod settings;

pub use client::{
    AuthenticatedApi, Authenticator, CatalogAClient, CatalogApi, CredentialExchanger, TokenSink,
};
pub use error::{CatalogError, SyncResult};
pub use profile::{CacheEntry, CacheQuality, ProfileCache, TopItems};
pub use session::SessionManager;
pub use settings::{CacheSettings, ClientSettings};
