use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tastebridge_core::model::ContentKind;

use crate::error::ResolveResult;

/// Kind of a catalog-B search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Track,
    Album,
    Artist,
    Playlist,
}

/// One catalog-B search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogBItem {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub duration_secs: Option<u32>,
    pub result_type: ResultType,
    pub content_kind: ContentKind,
}

impl CatalogBItem {
    /// A track result with no duration and unknown content kind.
    pub fn track(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: vec![artist.into()],
            duration_secs: None,
            result_type: ResultType::Track,
            content_kind: ContentKind::Unknown,
        }
    }

    #[must_use]
    pub const fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: ContentKind) -> Self {
        self.content_kind = kind;
        self
    }

    #[must_use]
    pub const fn with_result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = result_type;
        self
    }

    pub fn artist_names(&self) -> String {
        self.artists.join(", ")
    }
}

/// Catalog B's search endpoint.
#[async_trait]
pub trait CatalogB: Send + Sync + fmt::Debug {
    async fn search(&self, query: &str) -> ResolveResult<Vec<CatalogBItem>>;
}

/// Content kinds the listener does not want to see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentPreferences {
    pub hide_video: bool,
    pub hide_user_generated: bool,
    pub hide_live: bool,
}

impl ContentPreferences {
    pub const fn hides(&self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Video => self.hide_video,
            ContentKind::UserGenerated => self.hide_user_generated,
            ContentKind::Live => self.hide_live,
            ContentKind::OfficialStudio | ContentKind::Unknown => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preferences_hide_nothing() {
        let prefs = ContentPreferences::default();
        assert!(!prefs.hides(ContentKind::Video));
        assert!(!prefs.hides(ContentKind::Live));
    }

    #[test]
    fn test_studio_and_unknown_never_hidden() {
        let prefs = ContentPreferences {
            hide_video: true,
            hide_user_generated: true,
            hide_live: true,
        };
        assert!(prefs.hides(ContentKind::UserGenerated));
        assert!(!prefs.hides(ContentKind::OfficialStudio));
        assert!(!prefs.hides(ContentKind::Unknown));
    }
}
