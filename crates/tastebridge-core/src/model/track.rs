use serde::{Deserialize, Serialize};

/// A lightweight artist reference as embedded in a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: String,
    pub name: String,
}

impl ArtistRef {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A lightweight album reference as embedded in a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
    pub name: String,
}

/// A catalog-A track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,

    /// Credited artists, primary artist first.
    pub artists: Vec<ArtistRef>,

    #[serde(default)]
    pub album: Option<AlbumRef>,

    #[serde(default)]
    pub duration_secs: Option<u32>,

    /// Catalog popularity, 0-100.
    #[serde(default)]
    pub popularity: u8,
}

impl Track {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: Vec::new(),
            album: None,
            duration_secs: None,
            popularity: 0,
        }
    }

    #[must_use]
    pub fn with_artist(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.artists.push(ArtistRef::new(id, name));
        self
    }

    #[must_use]
    pub fn with_album(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.album = Some(AlbumRef {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    #[must_use]
    pub const fn with_popularity(mut self, popularity: u8) -> Self {
        self.popularity = popularity;
        self
    }

    /// The first credited artist, if any.
    #[must_use]
    pub fn primary_artist(&self) -> Option<&ArtistRef> {
        self.artists.first()
    }

    /// Artist names joined for display ("A, B").
    #[must_use]
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A catalog-A top-items time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// Roughly the last four weeks.
    Short,
    /// Roughly the last six months.
    Medium,
    /// Several years of history.
    Long,
}

impl TimeWindow {
    pub const ALL: [Self; 3] = [Self::Short, Self::Medium, Self::Long];

    /// The query value catalog A expects for this window.
    #[must_use]
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::Short => "short_term",
            Self::Medium => "medium_term",
            Self::Long => "long_term",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_artist_is_first_credit() {
        let track = Track::new("t1", "Song")
            .with_artist("a1", "First")
            .with_artist("a2", "Second");
        assert_eq!(track.primary_artist().map(|a| a.id.as_str()), Some("a1"));
        assert_eq!(track.artist_names(), "First, Second");
    }

    #[test]
    fn test_primary_artist_missing() {
        let track = Track::new("t1", "Song");
        assert!(track.primary_artist().is_none());
        assert_eq!(track.artist_names(), "");
    }

    #[test]
    fn test_track_deserialize_defaults() {
        let json = r#"{"id": "t1", "title": "Song", "artists": []}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert!(track.album.is_none());
        assert!(track.duration_secs.is_none());
        assert_eq!(track.popularity, 0);
    }

    #[test]
    fn test_time_window_query_values() {
        assert_eq!(TimeWindow::Short.as_query(), "short_term");
        assert_eq!(TimeWindow::Medium.as_query(), "medium_term");
        assert_eq!(TimeWindow::Long.as_query(), "long_term");
    }
}
