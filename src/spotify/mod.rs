pub mod client;
pub mod models;

pub use client::CatalogClient;
pub use models::{Album, Artist, ExternalUrls, Image, NewPlaylist, Playlist, Track, UserProfile};
