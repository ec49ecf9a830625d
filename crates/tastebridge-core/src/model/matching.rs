use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of recording a catalog-B item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// The official studio recording.
    OfficialStudio,
    Live,
    Video,
    UserGenerated,
    #[default]
    Unknown,
}

impl ContentKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OfficialStudio => "official_studio",
            Self::Live => "live",
            Self::Video => "video",
            Self::UserGenerated => "user_generated",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the stored representation; unrecognised values map to `Unknown`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "official_studio" => Self::OfficialStudio,
            "live" => Self::Live,
            "video" => Self::Video,
            "user_generated" => Self::UserGenerated,
            _ => Self::Unknown,
        }
    }
}

/// A persisted catalog-A → catalog-B match.
///
/// Once `is_manual_override` is set, only an explicit user action may
/// replace the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMatch {
    /// Catalog-A track id.
    pub source_id: String,
    /// Catalog-B item id.
    pub target_id: String,
    /// Cached catalog-B display title.
    pub title: String,
    /// Cached catalog-B display artist.
    pub artist: String,
    /// Match confidence, 0.0-1.0 plus any studio bonus.
    pub score: f64,
    pub content_kind: ContentKind,
    pub cached_at: DateTime<Utc>,
    pub is_manual_override: bool,
}

impl TrackMatch {
    /// An entry produced by automatic resolution.
    #[must_use]
    pub fn automatic(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        score: f64,
        content_kind: ContentKind,
        cached_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            title: title.into(),
            artist: artist.into(),
            score,
            content_kind,
            cached_at,
            is_manual_override: false,
        }
    }

    /// An entry chosen explicitly by the user. Always scored 1.0.
    #[must_use]
    pub fn manual(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        cached_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            title: title.into(),
            artist: artist.into(),
            score: 1.0,
            content_kind: ContentKind::Unknown,
            cached_at,
            is_manual_override: true,
        }
    }
}

/// A catalog-B item ready to hand to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayableItem {
    pub source_id: String,
    pub target_id: String,
    pub title: String,
    pub artist: String,
    pub content_kind: ContentKind,
    pub match_score: f64,
    /// Served from the match cache rather than a fresh search.
    pub from_cache: bool,
    pub is_manual_override: bool,
}

impl From<&TrackMatch> for PlayableItem {
    fn from(m: &TrackMatch) -> Self {
        Self {
            source_id: m.source_id.clone(),
            target_id: m.target_id.clone(),
            title: m.title.clone(),
            artist: m.artist.clone(),
            content_kind: m.content_kind,
            match_score: m.score,
            from_cache: true,
            is_manual_override: m.is_manual_override,
        }
    }
}
