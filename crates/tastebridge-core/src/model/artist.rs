use serde::{Deserialize, Serialize};

use crate::model::track::ArtistRef;

/// A catalog-A artist with the metadata the taste profile needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,

    /// Genre labels as reported by catalog A. May be empty.
    #[serde(default)]
    pub genres: Vec<String>,

    /// Catalog popularity, 0-100.
    #[serde(default)]
    pub popularity: u8,
}

impl Artist {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            genres: Vec::new(),
            popularity: 0,
        }
    }

    #[must_use]
    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_popularity(mut self, popularity: u8) -> Self {
        self.popularity = popularity;
        self
    }
}

impl From<&ArtistRef> for Artist {
    fn from(r: &ArtistRef) -> Self {
        Self::new(r.id.clone(), r.name.clone())
    }
}
