//! Core domain model for tastebridge.
//!
//! This crate defines the catalog-neutral data model (tracks, artists,
//! session tokens, cross-catalog matches), the durable storage seams used
//! for tokens, profile caches and the match cache, the SQLite schema that
//! backs them, and the status signals surfaced to the UI layer.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod clock;
pub mod error;
pub mod history;
pub mod model;
pub mod schema;
pub mod status;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use history::{NoHistory, PlayHistory, PlayedTrack};
pub use schema::Database;
pub use status::{FallbackNotice, StatusBoard};
pub use store::{KeyValueStore, MatchStore, MemoryStore};
