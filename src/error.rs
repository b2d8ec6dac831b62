use reqwest::StatusCode;
use thiserror::Error;

use crate::session::Phase;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No code verifier stored; start the authorization again")]
    MissingVerifier,

    #[error("Token exchange failed ({status}): {message}")]
    TokenExchangeFailed { status: StatusCode, message: String },

    #[error("Spotify API error ({status}): {message}")]
    RemoteApi { status: StatusCode, message: String },

    #[error("None of the songs were found on Spotify")]
    NoTracksFound,

    #[error("Invalid callback URL: {0}")]
    InvalidCallback(String),

    #[error("Cannot do that while {actual}; expected {expected}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("The song list is empty")]
    EmptySongList,

    #[error("Song index {0} is out of range")]
    SongIndex(usize),

    #[error("Cannot log in or out while a playlist is being created")]
    AuthorizationBlocked,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl AppError {
    /// HTTP status carried by remote failures, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AppError::TokenExchangeFailed { status, .. } | AppError::RemoteApi { status, .. } => {
                Some(*status)
            }
            AppError::Http(e) => e.status(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
