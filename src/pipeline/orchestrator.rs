use std::time::Duration;

use tracing::{debug, info, warn};

use crate::auth::AccessToken;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::parser::Song;
use crate::pipeline::report::{
    ADDING_PERCENT, CREATING_PERCENT, FINISHED_PERCENT, PipelineOutcome, ProgressReporter,
    ProgressUpdate, SearchResult, search_percent,
};
use crate::spotify::{CatalogClient, NewPlaylist, UserProfile};

pub const DEFAULT_PLAYLIST_NAME: &str = "My Playlist";
pub const PLAYLIST_DESCRIPTION: &str = "Created with playlist-paste";

/// Resolves songs one at a time, then creates the playlist and attaches the hits.
pub struct ResolutionPipeline {
    catalog: CatalogClient,
    search_delay: Duration,
}

impl ResolutionPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            catalog: CatalogClient::new(config),
            search_delay: config.search_delay,
        }
    }

    pub fn with_client(catalog: CatalogClient, search_delay: Duration) -> Self {
        Self {
            catalog,
            search_delay,
        }
    }

    pub async fn run(
        &self,
        title: &str,
        songs: &[Song],
        token: &AccessToken,
        user: &UserProfile,
        reporter: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome> {
        let name = if title.trim().is_empty() {
            DEFAULT_PLAYLIST_NAME
        } else {
            title.trim()
        };

        info!("Resolving {} songs for playlist: {}", songs.len(), name);

        let results = self.resolve_songs(songs, token, reporter).await;

        reporter.report(ProgressUpdate::CreatingPlaylist {
            percent: CREATING_PERCENT,
        });

        let uris: Vec<String> = results
            .iter()
            .filter_map(|r| r.remote_track.as_ref().map(|t| t.uri.clone()))
            .collect();

        if uris.is_empty() {
            warn!("No songs were found, not creating playlist {}", name);
            return Err(AppError::NoTracksFound);
        }

        let playlist = self
            .catalog
            .create_playlist(
                &user.id,
                token,
                &NewPlaylist {
                    name: name.to_string(),
                    description: PLAYLIST_DESCRIPTION.to_string(),
                    public: false,
                },
            )
            .await?;

        reporter.report(ProgressUpdate::AddingTracks {
            percent: ADDING_PERCENT,
        });

        self.catalog.add_tracks(&playlist.id, token, &uris).await?;

        reporter.report(ProgressUpdate::Finished {
            percent: FINISHED_PERCENT,
        });

        info!(
            "Playlist {} created - {}/{} songs found",
            name,
            uris.len(),
            songs.len()
        );

        Ok(PipelineOutcome {
            results,
            playlist_url: Some(playlist.url()),
        })
    }

    async fn resolve_songs(
        &self,
        songs: &[Song],
        token: &AccessToken,
        reporter: &dyn ProgressReporter,
    ) -> Vec<SearchResult> {
        let mut results = Vec::with_capacity(songs.len());

        for (index, song) in songs.iter().enumerate() {
            reporter.report(ProgressUpdate::Searching {
                index,
                song: song.clone(),
                percent: search_percent(index, songs.len()),
            });

            let result = match self
                .catalog
                .search_track(&song.title, &song.artist, token)
                .await
            {
                Ok(Some(track)) => SearchResult::found(song.clone(), track),
                Ok(None) => {
                    debug!("No match found for: {}", song.title);
                    SearchResult::missing(song.clone())
                }
                Err(e) => {
                    warn!("Search failed for {}: {}", song.title, e);
                    SearchResult::missing(song.clone())
                }
            };

            results.push(result);
            reporter.report(ProgressUpdate::Resolved {
                results: results.clone(),
            });

            if !self.search_delay.is_zero() {
                tokio::time::sleep(self.search_delay).await;
            }
        }

        results
    }
}
