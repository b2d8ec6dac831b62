use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::auth::AccessToken;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::spotify::models::{
    AddTracksRequest, NewPlaylist, Playlist, SearchResponse, Track, UserProfile,
};

/// Thin bearer-authenticated wrapper over the Spotify Web API.
#[derive(Clone)]
pub struct CatalogClient {
    http_client: Client,
    api_base: String,
}

impl CatalogClient {
    pub fn new(config: &Config) -> Self {
        Self::with_base_url(&config.api_base)
    }

    pub fn with_base_url(api_base: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, token: &AccessToken) -> Result<T> {
        self.get_with_query(path, token, &[]).await
    }

    async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .http_client
            .get(format!("{}{}", self.api_base, path))
            .bearer_auth(token.as_str())
            .query(query)
            .send()
            .await?;

        Self::decode(response).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
        body: &B,
    ) -> Result<T> {
        let response = self
            .http_client
            .post(format!("{}{}", self.api_base, path))
            .bearer_auth(token.as_str())
            .json(body)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::RemoteApi { status, message });
        }

        Ok(response.json().await?)
    }

    pub async fn fetch_current_user(&self, token: &AccessToken) -> Result<UserProfile> {
        let user: UserProfile = self.get("/me", token).await?;
        info!("Authenticated as Spotify user: {}", user.name());
        Ok(user)
    }

    /// Best catalog hit for a title/artist pair. HTTP errors are returned, not swallowed.
    pub async fn search_track(
        &self,
        title: &str,
        artist: &str,
        token: &AccessToken,
    ) -> Result<Option<Track>> {
        let query = search_query(title, artist);

        let response: SearchResponse = self
            .get_with_query(
                "/search",
                token,
                &[("q", query.as_str()), ("type", "track"), ("limit", "1")],
            )
            .await?;

        let track = response
            .tracks
            .and_then(|page| page.items.into_iter().next());

        debug!(
            "Search {:?}: {}",
            query,
            track.as_ref().map(|t| t.uri.as_str()).unwrap_or("no hit")
        );

        Ok(track)
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        token: &AccessToken,
        playlist: &NewPlaylist,
    ) -> Result<Playlist> {
        let path = format!("/users/{}/playlists", urlencoding::encode(user_id));
        let created: Playlist = self.post(&path, token, playlist).await?;

        info!("Created playlist: {} ({})", playlist.name, created.id);

        Ok(created)
    }

    pub async fn add_tracks(
        &self,
        playlist_id: &str,
        token: &AccessToken,
        uris: &[String],
    ) -> Result<()> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        let _: serde_json::Value = self
            .post(&path, token, &AddTracksRequest { uris })
            .await?;

        info!("Added {} tracks to playlist {}", uris.len(), playlist_id);

        Ok(())
    }
}

/// Field-filtered search query, `track:<title> artist:<artist>`.
///
/// Unlike the documented form, the `artist:` filter is left out when the
/// artist is unknown; an empty filter would match nothing.
pub fn search_query(title: &str, artist: &str) -> String {
    if artist.is_empty() {
        format!("track:{}", title)
    } else {
        format!("track:{} artist:{}", title, artist)
    }
}
