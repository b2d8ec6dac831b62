pub mod auth;
pub mod config;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod session;
pub mod spotify;

pub use auth::{AccessToken, CredentialManager, MemoryStore, SessionStore};
pub use config::Config;
pub use error::{AppError, Result};
pub use parser::{ParsedPlaylist, Song, parse};
pub use pipeline::{DemoPipeline, PipelineOutcome, ProgressUpdate, ResolutionPipeline, SearchResult};
pub use session::{AuthContext, Phase, Pipelines, Session};
pub use spotify::{CatalogClient, Track, UserProfile};
