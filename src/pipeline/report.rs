use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::parser::Song;
use crate::spotify::Track;

pub const CREATING_PERCENT: f64 = 90.0;
pub const ADDING_PERCENT: f64 = 95.0;
pub const FINISHED_PERCENT: f64 = 100.0;

/// Resolution of one input song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub song: Song,
    pub remote_track: Option<Track>,
    pub found: bool,
}

impl SearchResult {
    pub fn found(song: Song, track: Track) -> Self {
        Self {
            song,
            remote_track: Some(track),
            found: true,
        }
    }

    pub fn missing(song: Song) -> Self {
        Self {
            song,
            remote_track: None,
            found: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub results: Vec<SearchResult>,
    /// `None` for demo runs.
    pub playlist_url: Option<String>,
}

impl PipelineOutcome {
    pub fn found_count(&self) -> usize {
        self.results.iter().filter(|r| r.found).count()
    }

    pub fn missing(&self) -> impl Iterator<Item = &Song> {
        self.results.iter().filter(|r| !r.found).map(|r| &r.song)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    Searching {
        index: usize,
        song: Song,
        percent: f64,
    },
    /// Results so far, in input order.
    Resolved { results: Vec<SearchResult> },
    CreatingPlaylist { percent: f64 },
    AddingTracks { percent: f64 },
    Finished { percent: f64 },
}

impl ProgressUpdate {
    pub fn percent(&self) -> Option<f64> {
        match self {
            ProgressUpdate::Searching { percent, .. }
            | ProgressUpdate::CreatingPlaylist { percent }
            | ProgressUpdate::AddingTracks { percent }
            | ProgressUpdate::Finished { percent } => Some(*percent),
            ProgressUpdate::Resolved { .. } => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ProgressUpdate::Searching { song, .. } if song.artist.is_empty() => {
                format!("Searching: {}", song.title)
            }
            ProgressUpdate::Searching { song, .. } => {
                format!("Searching: {} / {}", song.title, song.artist)
            }
            ProgressUpdate::Resolved { results } => {
                format!("Resolved {} songs", results.len())
            }
            ProgressUpdate::CreatingPlaylist { .. } => "Creating playlist".to_string(),
            ProgressUpdate::AddingTracks { .. } => "Adding tracks".to_string(),
            ProgressUpdate::Finished { .. } => "Done".to_string(),
        }
    }
}

/// Percentage reported while searching song `index` of `total`.
///
/// `(index + 0.5) / (total + 1)` of the band below the "creating" step, so
/// the whole progress sequence stays strictly increasing.
pub fn search_percent(index: usize, total: usize) -> f64 {
    CREATING_PERCENT * (index as f64 + 0.5) / (total as f64 + 1.0)
}

/// Receives pipeline progress in emission order.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards all progress.
impl ProgressReporter for () {
    fn report(&self, _update: ProgressUpdate) {}
}

impl ProgressReporter for UnboundedSender<ProgressUpdate> {
    fn report(&self, update: ProgressUpdate) {
        // A closed receiver means the run was abandoned.
        let _ = self.send(update);
    }
}

/// Keeps every update; handy for summaries and tests.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }

    pub fn percents(&self) -> Vec<f64> {
        self.updates().iter().filter_map(|u| u.percent()).collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, update: ProgressUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}
