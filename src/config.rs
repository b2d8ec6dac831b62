use std::time::Duration;

use crate::error::{AppError, Result};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";
pub const DEFAULT_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
pub const SCOPES: &str = "playlist-modify-public playlist-modify-private";

const DEFAULT_SEARCH_DELAY_MS: u64 = 100;
const DEFAULT_DEMO_DELAY_MS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    /// Empty when no Spotify app is configured; the app then only runs in demo mode.
    pub spotify_client_id: String,
    pub spotify_redirect_uri: String,
    pub api_base: String,
    pub accounts_base: String,
    pub search_delay: Duration,
    pub demo_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spotify_client_id: String::new(),
            spotify_redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            accounts_base: DEFAULT_ACCOUNTS_BASE.to_string(),
            search_delay: Duration::from_millis(DEFAULT_SEARCH_DELAY_MS),
            demo_delay: Duration::from_millis(DEFAULT_DEMO_DELAY_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let spotify_client_id = std::env::var("SPOTIFY_CLIENT_ID").unwrap_or_default();

        let spotify_redirect_uri =
            std::env::var("SPOTIFY_REDIRECT_URI").unwrap_or(defaults.spotify_redirect_uri);

        let api_base = std::env::var("SPOTIFY_API_BASE").unwrap_or(defaults.api_base);

        let accounts_base =
            std::env::var("SPOTIFY_ACCOUNTS_BASE").unwrap_or(defaults.accounts_base);

        let search_delay = millis_from_env("PLAYLIST_SEARCH_DELAY_MS", defaults.search_delay)?;
        let demo_delay = millis_from_env("PLAYLIST_DEMO_DELAY_MS", defaults.demo_delay)?;

        Ok(Self {
            spotify_client_id,
            spotify_redirect_uri,
            api_base: api_base.trim_end_matches('/').to_string(),
            accounts_base: accounts_base.trim_end_matches('/').to_string(),
            search_delay,
            demo_delay,
        })
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.spotify_client_id = client_id.into();
        self
    }

    pub fn get_missing_config(&self) -> Vec<String> {
        let mut missing = Vec::new();

        if self.spotify_client_id.is_empty() {
            missing.push("SPOTIFY_CLIENT_ID".to_string());
        }

        missing
    }

    /// True when there is no client id to authorize with.
    pub fn is_demo(&self) -> bool {
        self.spotify_client_id.is_empty()
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/authorize", self.accounts_base)
    }

    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_base)
    }
}

fn millis_from_env(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| AppError::Config(format!("{} must be a number of milliseconds", key))),
        Err(_) => Ok(default),
    }
}
