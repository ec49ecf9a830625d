//! Recommendation and cross-catalog resolution for tastebridge.
//!
//! Turns the profile cache into a taste profile, ranks candidate tracks
//! around a seed, resolves the picks to playable catalog-B items and
//! assembles queues with a basic fallback when the engine cannot answer.
//! Also owns the layered configuration for the whole workspace.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod queue;
pub mod recommend;
pub mod resolve;
pub mod settings;

pub use config::Config;
pub use error::{EngineError, EngineResult, ResolveError, ResolveResult};
pub use queue::{Queue, QueueBuilder, QueuePlan};
pub use recommend::{RecommendationEngine, ScoredCandidate, SourceBucket, TasteProfile};
pub use resolve::{
    CatalogB, CatalogBItem, ContentPreferences, MatchCandidate, ResultType, TrackResolver,
};
pub use settings::{EngineSettings, ResolverSettings};
