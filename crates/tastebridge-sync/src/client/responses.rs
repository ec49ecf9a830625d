//! Typed response shapes for catalog A and their mapping into the model.
//!
//! Every field that catalog A sometimes omits is optional here; the mapping
//! functions substitute defaults for missing metadata and drop only those
//! elements that lack an id.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use tastebridge_core::model::{AccessToken, AlbumRef, Artist, ArtistRef, Track};

use crate::error::{CatalogError, SyncResult};

// ---------------------------------------------------------------------------
// REST shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawAlbumRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<RawArtistRef>,
    #[serde(default)]
    pub album: Option<RawAlbumRef>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawArtist {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: Option<u32>,
}

/// Offset-paged list (`{"items": [...], "next": ...}`).
#[derive(Debug, Deserialize)]
pub(crate) struct Paging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
}

/// Cursor-paged list used by the follows endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct CursorPaging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default)]
    pub cursors: Option<Cursors>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FollowedArtistsResponse {
    pub artists: CursorPaging<RawArtist>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlbumResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub tracks: Paging<RawTrack>,
}

impl AlbumResponse {
    /// Album tracks come back without their album; attach this one.
    pub(crate) fn into_tracks(self, requested_id: &str) -> Vec<Track> {
        let album = AlbumRef {
            id: non_empty(self.id).unwrap_or_else(|| requested_id.to_string()),
            name: self.name.unwrap_or_default(),
        };
        map_tracks(self.tracks.items, Some(&album))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtistTopTracksResponse {
    #[serde(default)]
    pub tracks: Vec<Option<RawTrack>>,
}

// ---------------------------------------------------------------------------
// GraphQL shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct GqlEnvelope<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GqlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GqlError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GqlItems<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<Option<T>>,
    #[serde(default, rename = "totalCount")]
    pub total_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GqlProfile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GqlArtist {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub profile: Option<GqlProfile>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GqlAlbum {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GqlDuration {
    #[serde(default)]
    pub total_milliseconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GqlTrack {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duration: Option<GqlDuration>,
    #[serde(default)]
    pub artists: Option<GqlItems<GqlArtist>>,
    #[serde(default)]
    pub album_of_track: Option<GqlAlbum>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LibraryTrackItem {
    #[serde(default)]
    pub track: Option<GqlTrack>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LibraryTracksData {
    #[serde(default)]
    pub me: Option<LibraryMe>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LibraryMe {
    #[serde(default)]
    pub library: Option<Library>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Library {
    #[serde(default)]
    pub tracks: Option<GqlItems<LibraryTrackItem>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RelatedArtistsData {
    #[serde(default)]
    pub artist_union: Option<ArtistUnion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ArtistUnion {
    #[serde(default)]
    pub related_content: Option<RelatedContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RelatedContent {
    #[serde(default)]
    pub related_artists: Option<GqlItems<GqlArtist>>,
}

// ---------------------------------------------------------------------------
// Token endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_expiration_timestamp_ms: Option<i64>,
    #[serde(default)]
    pub is_anonymous: Option<bool>,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Last `:`-separated segment of a catalog URI (`scheme:kind:id` → `id`).
pub(crate) fn id_from_uri(uri: &str) -> Option<String> {
    uri.rsplit(':')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn clamp_popularity(value: Option<u32>) -> u8 {
    value.map_or(0, |p| u8::try_from(p.min(100)).unwrap_or(100))
}

fn ms_to_secs(ms: u64) -> u32 {
    u32::try_from((ms + 500) / 1000).unwrap_or(u32::MAX)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub(crate) fn map_artist_ref(raw: RawArtistRef) -> Option<ArtistRef> {
    let id = non_empty(raw.id)?;
    Some(ArtistRef {
        id,
        name: raw.name.unwrap_or_default(),
    })
}

/// Map a REST track. `fallback_album` fills in the album for endpoints that
/// return simplified tracks without one.
pub(crate) fn map_track(raw: RawTrack, fallback_album: Option<&AlbumRef>) -> Option<Track> {
    let id = non_empty(raw.id)?;
    let album = raw
        .album
        .and_then(|album| {
            non_empty(album.id).map(|id| AlbumRef {
                id,
                name: album.name.unwrap_or_default(),
            })
        })
        .or_else(|| fallback_album.cloned());

    Some(Track {
        id,
        title: raw.name.unwrap_or_default(),
        artists: raw.artists.into_iter().filter_map(map_artist_ref).collect(),
        album,
        duration_secs: raw.duration_ms.map(ms_to_secs),
        popularity: clamp_popularity(raw.popularity),
    })
}

pub(crate) fn map_tracks(
    raw: Vec<Option<RawTrack>>,
    fallback_album: Option<&AlbumRef>,
) -> Vec<Track> {
    raw.into_iter()
        .flatten()
        .filter_map(|t| map_track(t, fallback_album))
        .collect()
}

pub(crate) fn map_artist(raw: RawArtist) -> Option<Artist> {
    let id = non_empty(raw.id)?;
    Some(Artist {
        id,
        name: raw.name.unwrap_or_default(),
        genres: raw.genres,
        popularity: clamp_popularity(raw.popularity),
    })
}

pub(crate) fn map_artists(raw: Vec<Option<RawArtist>>) -> Vec<Artist> {
    raw.into_iter().flatten().filter_map(map_artist).collect()
}

pub(crate) fn map_gql_track(raw: GqlTrack) -> Option<Track> {
    let id = raw.uri.as_deref().and_then(id_from_uri)?;
    let artists = raw
        .artists
        .map(|items| {
            items
                .items
                .into_iter()
                .flatten()
                .filter_map(|artist| {
                    let id = artist.uri.as_deref().and_then(id_from_uri)?;
                    let name = artist.profile.and_then(|p| p.name).unwrap_or_default();
                    Some(ArtistRef { id, name })
                })
                .collect()
        })
        .unwrap_or_default();
    let album = raw.album_of_track.and_then(|album| {
        let id = album.uri.as_deref().and_then(id_from_uri)?;
        Some(AlbumRef {
            id,
            name: album.name.unwrap_or_default(),
        })
    });

    Some(Track {
        id,
        title: raw.name.unwrap_or_default(),
        artists,
        album,
        duration_secs: raw
            .duration
            .and_then(|d| d.total_milliseconds)
            .map(ms_to_secs),
        // The library query carries no popularity.
        popularity: 0,
    })
}

pub(crate) fn map_library_tracks(data: LibraryTracksData) -> Vec<Track> {
    data.me
        .and_then(|me| me.library)
        .and_then(|library| library.tracks)
        .map(|tracks| {
            tracks
                .items
                .into_iter()
                .flatten()
                .filter_map(|item| item.track)
                .filter_map(map_gql_track)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn map_related_names(data: RelatedArtistsData) -> Vec<String> {
    data.artist_union
        .and_then(|u| u.related_content)
        .and_then(|c| c.related_artists)
        .map(|artists| {
            artists
                .items
                .into_iter()
                .flatten()
                .filter_map(|a| a.profile.and_then(|p| p.name))
                .filter(|name| !name.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Map the token endpoint response. An anonymous or empty token means the
/// session credential was not accepted.
pub(crate) fn map_token(raw: TokenResponse, endpoint: &str) -> SyncResult<AccessToken> {
    if raw.is_anonymous.unwrap_or(false) {
        return Err(CatalogError::Unauthenticated {
            message: "session credential rejected (anonymous token issued)".to_string(),
        });
    }
    let value = non_empty(raw.access_token).ok_or_else(|| CatalogError::Unauthenticated {
        message: "token endpoint returned no access token".to_string(),
    })?;
    let expires_at = raw
        .access_token_expiration_timestamp_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| CatalogError::malformed(endpoint, "missing token expiry"))?;
    Ok(AccessToken { value, expires_at })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_uri() {
        assert_eq!(id_from_uri("cat:track:abc123"), Some("abc123".to_string()));
        assert_eq!(id_from_uri("plain"), Some("plain".to_string()));
        assert_eq!(id_from_uri("cat:track:"), None);
    }

    #[test]
    fn test_rest_track_maps_all_fields() {
        let json = r#"{
            "id": "t1",
            "name": "Song A",
            "duration_ms": 200400,
            "popularity": 60,
            "album": {"id": "al1", "name": "Album"},
            "artists": [{"id": "x", "name": "Artist X"}, {"name": "no id"}]
        }"#;
        let raw: RawTrack = serde_json::from_str(json).unwrap();
        let track = map_track(raw, None).unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.duration_secs, Some(200));
        assert_eq!(track.popularity, 60);
        assert_eq!(track.album.unwrap().id, "al1");
        // Artist entries without an id are dropped.
        assert_eq!(track.artists.len(), 1);
    }

    #[test]
    fn test_rest_track_without_id_is_dropped() {
        let raw: RawTrack = serde_json::from_str(r#"{"name": "ghost"}"#).unwrap();
        assert!(map_track(raw, None).is_none());
    }

    #[test]
    fn test_rest_track_missing_fields_default() {
        let raw: RawTrack = serde_json::from_str(r#"{"id": "t1"}"#).unwrap();
        let track = map_track(raw, None).unwrap();
        assert_eq!(track.title, "");
        assert!(track.artists.is_empty());
        assert_eq!(track.popularity, 0);
        assert!(track.duration_secs.is_none());
    }

    #[test]
    fn test_fallback_album_applies_only_when_missing() {
        let album = AlbumRef {
            id: "ctx".to_string(),
            name: "Context".to_string(),
        };
        let raw: RawTrack = serde_json::from_str(r#"{"id": "t1"}"#).unwrap();
        assert_eq!(map_track(raw, Some(&album)).unwrap().album.unwrap().id, "ctx");

        let raw: RawTrack =
            serde_json::from_str(r#"{"id": "t2", "album": {"id": "own"}}"#).unwrap();
        assert_eq!(map_track(raw, Some(&album)).unwrap().album.unwrap().id, "own");
    }

    #[test]
    fn test_album_tracks_carry_album() {
        let json = r#"{
            "id": "al9",
            "name": "Record",
            "tracks": {"items": [{"id": "t1"}, {"id": "t2"}]}
        }"#;
        let album: AlbumResponse = serde_json::from_str(json).unwrap();
        let tracks = album.into_tracks("al9");
        assert_eq!(tracks.len(), 2);
        assert!(tracks
            .iter()
            .all(|t| t.album.as_ref().is_some_and(|a| a.name == "Record")));
    }

    #[test]
    fn test_popularity_is_clamped() {
        let raw: RawArtist = serde_json::from_str(r#"{"id": "a", "popularity": 250}"#).unwrap();
        assert_eq!(map_artist(raw).unwrap().popularity, 100);
    }

    #[test]
    fn test_paging_tolerates_null_items() {
        let json = r#"{"items": [null, {"id": "a1", "name": "A", "genres": ["rock"]}]}"#;
        let page: Paging<RawArtist> = serde_json::from_str(json).unwrap();
        let artists = map_artists(page.items);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].genres, vec!["rock".to_string()]);
    }

    #[test]
    fn test_followed_response_shape() {
        let json = r#"{
            "artists": {"items": [{"id": "a1", "name": "A"}], "cursors": {"after": "a1"}}
        }"#;
        let resp: FollowedArtistsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.artists.cursors.unwrap().after.as_deref(), Some("a1"));
    }

    #[test]
    fn test_library_tracks_mapping() {
        let json = r#"{
            "data": {"me": {"library": {"tracks": {"items": [
                {"track": {
                    "uri": "cat:track:t1",
                    "name": "Song",
                    "duration": {"totalMilliseconds": 181000},
                    "artists": {"items": [{"uri": "cat:artist:a1", "profile": {"name": "A"}}]},
                    "albumOfTrack": {"uri": "cat:album:al1", "name": "Album"}
                }},
                {"track": null},
                {"track": {"name": "no uri"}}
            ], "totalCount": 3}}}}
        }"#;
        let envelope: GqlEnvelope<LibraryTracksData> = serde_json::from_str(json).unwrap();
        let tracks = map_library_tracks(envelope.data.unwrap());
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, "t1");
        assert_eq!(tracks[0].artists[0].id, "a1");
        assert_eq!(tracks[0].album.as_ref().unwrap().id, "al1");
        assert_eq!(tracks[0].duration_secs, Some(181));
    }

    #[test]
    fn test_library_missing_branches_is_empty() {
        let envelope: GqlEnvelope<LibraryTracksData> =
            serde_json::from_str(r#"{"data": {"me": null}}"#).unwrap();
        assert!(map_library_tracks(envelope.data.unwrap()).is_empty());
    }

    #[test]
    fn test_related_names_mapping() {
        let json = r#"{"artistUnion": {"relatedContent": {"relatedArtists": {"items": [
            {"profile": {"name": "Band One"}},
            {"profile": {"name": "  "}},
            {"profile": null}
        ]}}}}"#;
        let data: RelatedArtistsData = serde_json::from_str(json).unwrap();
        assert_eq!(map_related_names(data), vec!["Band One".to_string()]);
    }

    #[test]
    fn test_token_mapping() {
        let raw = TokenResponse {
            access_token: Some("tok".to_string()),
            access_token_expiration_timestamp_ms: Some(1_700_000_000_000),
            is_anonymous: Some(false),
        };
        let token = map_token(raw, "/token").unwrap();
        assert_eq!(token.value, "tok");
        assert_eq!(token.expires_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_anonymous_token_means_dead_credential() {
        let raw = TokenResponse {
            access_token: Some("anon".to_string()),
            access_token_expiration_timestamp_ms: Some(1_700_000_000_000),
            is_anonymous: Some(true),
        };
        let err = map_token(raw, "/token").unwrap_err();
        assert!(err.is_credential_dead());
    }

    #[test]
    fn test_token_without_expiry_is_malformed() {
        let raw = TokenResponse {
            access_token: Some("tok".to_string()),
            access_token_expiration_timestamp_ms: None,
            is_anonymous: None,
        };
        assert!(matches!(
            map_token(raw, "/token"),
            Err(CatalogError::Malformed { .. })
        ));
    }
}
