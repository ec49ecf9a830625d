pub mod artist;
pub mod matching;
pub mod session;
pub mod track;

pub use artist::Artist;
pub use matching::{ContentKind, PlayableItem, TrackMatch};
pub use session::{AccessToken, SessionCredential};
pub use track::{AlbumRef, ArtistRef, TimeWindow, Track};
