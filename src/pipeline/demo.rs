use std::time::Duration;

use tracing::info;

use crate::parser::Song;
use crate::pipeline::report::{
    ADDING_PERCENT, CREATING_PERCENT, FINISHED_PERCENT, PipelineOutcome, ProgressReporter,
    ProgressUpdate, SearchResult, search_percent,
};
use crate::spotify::{Album, Artist, ExternalUrls, Track};

/// Offline stand-in for [`ResolutionPipeline`](super::ResolutionPipeline).
///
/// Emits the same progress sequence with the same cadence, marks every song
/// as found and never produces a playlist URL. It cannot fail.
pub struct DemoPipeline {
    delay: Duration,
}

impl DemoPipeline {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub async fn run(&self, songs: &[Song], reporter: &dyn ProgressReporter) -> PipelineOutcome {
        info!("Demo run for {} songs, nothing is sent to Spotify", songs.len());

        let mut results = Vec::with_capacity(songs.len());

        for (index, song) in songs.iter().enumerate() {
            reporter.report(ProgressUpdate::Searching {
                index,
                song: song.clone(),
                percent: search_percent(index, songs.len()),
            });

            self.pause().await;

            results.push(SearchResult::found(song.clone(), placeholder_track(index, song)));
            reporter.report(ProgressUpdate::Resolved {
                results: results.clone(),
            });
        }

        reporter.report(ProgressUpdate::CreatingPlaylist {
            percent: CREATING_PERCENT,
        });
        self.pause().await;

        reporter.report(ProgressUpdate::AddingTracks {
            percent: ADDING_PERCENT,
        });
        self.pause().await;

        reporter.report(ProgressUpdate::Finished {
            percent: FINISHED_PERCENT,
        });

        PipelineOutcome {
            results,
            playlist_url: None,
        }
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Fake track whose link is a Spotify web search for the song.
pub fn placeholder_track(index: usize, song: &Song) -> Track {
    let query = format!("{} {}", song.title, song.artist);
    let artists = if song.artist.is_empty() {
        Vec::new()
    } else {
        vec![Artist {
            name: song.artist.clone(),
        }]
    };

    Track {
        uri: format!("demo:track:{}", index),
        name: song.title.clone(),
        artists,
        album: Album::default(),
        external_urls: ExternalUrls {
            spotify: Some(format!(
                "https://open.spotify.com/search/{}",
                urlencoding::encode(query.trim())
            )),
        },
    }
}
