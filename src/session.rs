use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::AccessToken;
use crate::error::{AppError, Result};
use crate::parser::{self, ParsedPlaylist, Song};
use crate::pipeline::{
    DemoPipeline, PipelineOutcome, ProgressReporter, ProgressUpdate, ResolutionPipeline,
    SearchResult,
};
use crate::spotify::UserProfile;

/// Quiet period after a successful parse before the preview opens on its own.
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(900);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Paste,
    Preview,
    Creating,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Paste => write!(f, "pasting"),
            Phase::Preview => write!(f, "previewing"),
            Phase::Creating => write!(f, "creating"),
            Phase::Done => write!(f, "done"),
        }
    }
}

/// Who the playlist will be created for.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthContext {
    #[default]
    LoggedOut,
    /// Redirected to the provider; waiting for the callback code.
    AwaitingCallback,
    LoggedIn {
        token: AccessToken,
        user: UserProfile,
    },
}

impl AuthContext {
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            AuthContext::LoggedIn { user, .. } => Some(user),
            _ => None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthContext::LoggedIn { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum RunMode {
    Live {
        token: AccessToken,
        user: UserProfile,
    },
    Demo,
}

/// Everything a pipeline run needs, detached from the session.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub id: RunId,
    pub title: String,
    pub songs: Vec<Song>,
    pub mode: RunMode,
}

/// The live and demo pipelines; the session picks one per run.
pub struct Pipelines {
    pub live: ResolutionPipeline,
    pub demo: DemoPipeline,
}

impl Pipelines {
    pub async fn execute(
        &self,
        request: &RunRequest,
        reporter: &dyn ProgressReporter,
    ) -> Result<PipelineOutcome> {
        match &request.mode {
            RunMode::Live { token, user } => {
                self.live
                    .run(&request.title, &request.songs, token, user, reporter)
                    .await
            }
            RunMode::Demo => Ok(self.demo.run(&request.songs, reporter).await),
        }
    }
}

/// Phase machine for one paste: paste, preview, creating, done.
///
/// A failed run goes back to preview; `reset` returns to paste from any phase.
/// Runs are tagged with a [`RunId`] and anything from a run other than the
/// current one is ignored.
#[derive(Debug, Default)]
pub struct Session {
    phase: Phase,
    input: String,
    recognized: Option<ParsedPlaylist>,
    recognized_at: Option<Instant>,
    parse_failed: bool,
    title: String,
    songs: Vec<Song>,
    results: Vec<SearchResult>,
    progress: f64,
    progress_message: String,
    playlist_url: Option<String>,
    error: Option<String>,
    copied: bool,
    auth: AuthContext,
    next_run: u64,
    current_run: Option<RunId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Live parse result of the current input.
    pub fn recognized(&self) -> Option<&ParsedPlaylist> {
        self.recognized.as_ref()
    }

    /// Set when a manual advance found nothing to parse.
    pub fn parse_failed(&self) -> bool {
        self.parse_failed
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn progress_message(&self) -> &str {
        &self.progress_message
    }

    pub fn playlist_url(&self) -> Option<&str> {
        self.playlist_url.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn copied(&self) -> bool {
        self.copied
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(AppError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    // paste

    /// Replace the pasted text and re-run detection. Each successful parse
    /// restarts the auto-advance timer.
    pub fn set_input(&mut self, text: impl Into<String>, now: Instant) -> Result<()> {
        self.expect_phase(Phase::Paste)?;

        self.input = text.into();
        self.parse_failed = false;
        self.recognized = parser::parse(&self.input);
        self.recognized_at = self.recognized.as_ref().map(|_| now);

        Ok(())
    }

    /// Advance to preview once the input has been recognised for
    /// [`AUTO_ADVANCE_DELAY`]. Returns whether the phase changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.phase != Phase::Paste {
            return false;
        }

        match self.recognized_at {
            Some(at) if now.saturating_duration_since(at) >= AUTO_ADVANCE_DELAY => {
                self.enter_preview()
            }
            _ => false,
        }
    }

    /// Manual advance. `Ok(false)` means the input was not recognised.
    pub fn advance(&mut self) -> Result<bool> {
        self.expect_phase(Phase::Paste)?;

        if self.recognized.is_none() {
            self.recognized = parser::parse(&self.input);
        }

        let advanced = self.enter_preview();
        self.parse_failed = !advanced;
        Ok(advanced)
    }

    fn enter_preview(&mut self) -> bool {
        let Some(parsed) = self.recognized.clone() else {
            return false;
        };

        debug!(
            "Recognised playlist {} with {} songs",
            parsed.title,
            parsed.songs.len()
        );

        self.title = parsed.title;
        self.songs = parsed.songs;
        self.recognized_at = None;
        self.phase = Phase::Preview;
        true
    }

    // preview

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<()> {
        self.expect_phase(Phase::Preview)?;
        self.title = title.into();
        Ok(())
    }

    pub fn edit_title(&mut self, index: usize, title: impl Into<String>) -> Result<()> {
        self.song_mut(index)?.title = title.into();
        Ok(())
    }

    pub fn edit_artist(&mut self, index: usize, artist: impl Into<String>) -> Result<()> {
        self.song_mut(index)?.artist = artist.into();
        Ok(())
    }

    pub fn remove_song(&mut self, index: usize) -> Result<Song> {
        self.expect_phase(Phase::Preview)?;
        if index >= self.songs.len() {
            return Err(AppError::SongIndex(index));
        }
        Ok(self.songs.remove(index))
    }

    fn song_mut(&mut self, index: usize) -> Result<&mut Song> {
        self.expect_phase(Phase::Preview)?;
        self.songs.get_mut(index).ok_or(AppError::SongIndex(index))
    }

    /// Freeze the song list and hand out a run for the pipeline. The run is
    /// live when logged in and demo otherwise.
    pub fn start_creation(&mut self) -> Result<RunRequest> {
        self.expect_phase(Phase::Preview)?;

        if self.songs.is_empty() {
            return Err(AppError::EmptySongList);
        }

        self.next_run += 1;
        let id = RunId(self.next_run);
        self.current_run = Some(id);

        self.phase = Phase::Creating;
        self.error = None;
        self.results.clear();
        self.progress = 0.0;
        self.progress_message.clear();
        self.playlist_url = None;

        let mode = match &self.auth {
            AuthContext::LoggedIn { token, user } => RunMode::Live {
                token: token.clone(),
                user: user.clone(),
            },
            _ => RunMode::Demo,
        };

        info!(
            "Starting {} run for {} songs",
            if mode == RunMode::Demo { "demo" } else { "live" },
            self.songs.len()
        );

        Ok(RunRequest {
            id,
            title: self.title.clone(),
            songs: self.songs.clone(),
            mode,
        })
    }

    // creating

    fn is_current(&self, id: RunId) -> bool {
        self.phase == Phase::Creating && self.current_run == Some(id)
    }

    /// Apply a progress update. Returns `false` when it belongs to a stale run.
    pub fn apply_progress(&mut self, id: RunId, update: ProgressUpdate) -> bool {
        if !self.is_current(id) {
            debug!("Dropping progress from stale run {:?}", id);
            return false;
        }

        if let Some(percent) = update.percent() {
            self.progress = percent;
        }

        match update {
            ProgressUpdate::Resolved { results } => self.results = results,
            other => self.progress_message = other.message(),
        }

        true
    }

    /// Settle a run: success moves to done, failure returns to the editable
    /// preview with the songs intact.
    pub fn finish_run(&mut self, id: RunId, outcome: Result<PipelineOutcome>) -> bool {
        if !self.is_current(id) {
            debug!("Dropping result from stale run {:?}", id);
            return false;
        }

        self.current_run = None;

        match outcome {
            Ok(outcome) => {
                self.results = outcome.results;
                self.playlist_url = outcome.playlist_url;
                self.progress = 100.0;
                self.phase = Phase::Done;
            }
            Err(e) => {
                warn!("Playlist creation failed: {}", e);
                self.error = Some(failure_message(&e));
                self.results.clear();
                self.progress = 0.0;
                self.progress_message.clear();
                self.phase = Phase::Preview;
            }
        }

        true
    }

    /// Run the pipeline for the current preview, feeding its progress into
    /// the session and on to `observer`.
    pub async fn create_playlist(
        &mut self,
        pipelines: &Pipelines,
        observer: &dyn ProgressReporter,
    ) -> Result<()> {
        let request = self.start_creation()?;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let run = async move {
            let tx = tx;
            pipelines.execute(&request, &tx).await
        };
        tokio::pin!(run);

        let id = self.current_run.ok_or(AppError::InvalidPhase {
            expected: Phase::Creating,
            actual: self.phase,
        })?;

        let outcome = loop {
            tokio::select! {
                biased;
                Some(update) = rx.recv() => {
                    observer.report(update.clone());
                    self.apply_progress(id, update);
                }
                outcome = &mut run => break outcome,
            }
        };

        while let Ok(update) = rx.try_recv() {
            observer.report(update.clone());
            self.apply_progress(id, update);
        }

        self.finish_run(id, outcome);
        Ok(())
    }

    // done

    /// Numbered text listing of the playlist; marks it as copied.
    pub fn copy_listing(&mut self) -> Result<String> {
        self.expect_phase(Phase::Done)?;
        self.copied = true;
        Ok(parser::to_listing(&self.title, &self.songs))
    }

    /// Back to an empty paste phase. Authorization is kept; a run still in
    /// flight is abandoned and its late results are ignored.
    pub fn reset(&mut self) {
        let auth = std::mem::take(&mut self.auth);
        let next_run = self.next_run;
        *self = Self {
            auth,
            next_run,
            ..Self::default()
        };
    }

    // authorization

    pub fn login_started(&mut self) -> Result<()> {
        self.ensure_not_creating()?;
        self.auth = AuthContext::AwaitingCallback;
        Ok(())
    }

    pub fn login_completed(&mut self, token: AccessToken, user: UserProfile) -> Result<()> {
        self.ensure_not_creating()?;
        info!("Logged in as {}", user.name());
        self.auth = AuthContext::LoggedIn { token, user };
        Ok(())
    }

    /// Authorization errors are not surfaced; the session is simply logged out.
    pub fn login_failed(&mut self, error: &AppError) {
        warn!("Authorization failed: {}", error);
        self.auth = AuthContext::LoggedOut;
    }

    pub fn logout(&mut self) -> Result<()> {
        self.ensure_not_creating()?;
        self.auth = AuthContext::LoggedOut;
        Ok(())
    }

    fn ensure_not_creating(&self) -> Result<()> {
        if self.phase == Phase::Creating {
            Err(AppError::AuthorizationBlocked)
        } else {
            Ok(())
        }
    }
}

fn failure_message(error: &AppError) -> String {
    match error {
        AppError::NoTracksFound => {
            "None of the songs were found on Spotify. Check the titles and artists.".to_string()
        }
        other => format!("Failed to create playlist: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RecordingReporter;
    use crate::spotify::CatalogClient;
    use reqwest::StatusCode;

    const TEXT: &str = "Late Night\n1. Bachelorette / Björk\n2. Windowlicker / Aphex Twin";

    fn preview_session() -> Session {
        let mut session = Session::new();
        session.set_input(TEXT, Instant::now()).unwrap();
        assert!(session.advance().unwrap());
        session
    }

    fn demo_pipelines() -> Pipelines {
        Pipelines {
            live: ResolutionPipeline::with_client(
                CatalogClient::with_base_url("http://127.0.0.1:9"),
                Duration::ZERO,
            ),
            demo: DemoPipeline::new(Duration::ZERO),
        }
    }

    fn user() -> UserProfile {
        UserProfile {
            id: "wizzler".to_string(),
            display_name: Some("Wizzler".to_string()),
        }
    }

    #[test]
    fn test_initial_state() {
        let session = Session::new();
        assert_eq!(session.phase(), Phase::Paste);
        assert!(session.songs().is_empty());
        assert_eq!(session.auth(), &AuthContext::LoggedOut);
    }

    #[test]
    fn test_auto_advance_waits_for_delay() {
        let mut session = Session::new();
        let start = Instant::now();
        session.set_input(TEXT, start).unwrap();
        assert!(session.recognized().is_some());

        assert!(!session.tick(start + Duration::from_millis(500)));
        assert_eq!(session.phase(), Phase::Paste);

        assert!(session.tick(start + AUTO_ADVANCE_DELAY));
        assert_eq!(session.phase(), Phase::Preview);
        assert_eq!(session.title(), "Late Night");
        assert_eq!(session.songs().len(), 2);
    }

    #[test]
    fn test_typing_restarts_timer() {
        let mut session = Session::new();
        let start = Instant::now();
        session.set_input(TEXT, start).unwrap();
        let later = start + Duration::from_millis(600);
        session.set_input(format!("{}\n3. Xtal", TEXT), later).unwrap();

        assert!(!session.tick(start + AUTO_ADVANCE_DELAY));
        assert!(session.tick(later + AUTO_ADVANCE_DELAY));
        assert_eq!(session.songs().len(), 3);
    }

    #[test]
    fn test_unrecognised_input_never_advances() {
        let mut session = Session::new();
        let start = Instant::now();
        session.set_input("just one line", start).unwrap();
        assert!(!session.tick(start + Duration::from_secs(10)));
        assert!(!session.advance().unwrap());
        assert!(session.parse_failed());
        assert_eq!(session.phase(), Phase::Paste);
    }

    #[test]
    fn test_preview_edits() {
        let mut session = preview_session();
        session.edit_title(0, "Hyperballad").unwrap();
        session.edit_artist(1, "AFX").unwrap();
        session.set_title("Renamed").unwrap();

        assert_eq!(session.songs()[0], Song::new("Hyperballad", "Björk"));
        assert_eq!(session.songs()[1], Song::new("Windowlicker", "AFX"));
        assert_eq!(session.title(), "Renamed");

        let removed = session.remove_song(0).unwrap();
        assert_eq!(removed.title, "Hyperballad");
        assert_eq!(session.songs().len(), 1);

        assert!(matches!(session.edit_title(5, "x"), Err(AppError::SongIndex(5))));
        assert!(matches!(session.remove_song(1), Err(AppError::SongIndex(1))));
    }

    #[test]
    fn test_cannot_create_empty_list() {
        let mut session = preview_session();
        session.remove_song(0).unwrap();
        session.remove_song(0).unwrap();
        assert!(matches!(session.start_creation(), Err(AppError::EmptySongList)));
        assert_eq!(session.phase(), Phase::Preview);
    }

    #[test]
    fn test_songs_frozen_while_creating() {
        let mut session = preview_session();
        session.start_creation().unwrap();

        assert!(matches!(
            session.edit_title(0, "x"),
            Err(AppError::InvalidPhase {
                expected: Phase::Preview,
                actual: Phase::Creating
            })
        ));
        assert!(session.start_creation().is_err());
        assert!(matches!(session.logout(), Err(AppError::AuthorizationBlocked)));
    }

    #[test]
    fn test_reset_abandons_run_in_flight() {
        let mut session = preview_session();
        let request = session.start_creation().unwrap();

        session.reset();
        assert_eq!(session.phase(), Phase::Paste);

        assert!(!session.apply_progress(
            request.id,
            ProgressUpdate::AddingTracks { percent: 95.0 }
        ));
        assert!(!session.finish_run(
            request.id,
            Ok(PipelineOutcome {
                results: vec![],
                playlist_url: Some("https://open.spotify.com/playlist/late".to_string()),
            })
        ));
        assert_eq!(session.phase(), Phase::Paste);
        assert_eq!(session.playlist_url(), None);
    }

    #[test]
    fn test_run_mode_follows_auth() {
        let mut session = preview_session();
        assert_eq!(session.start_creation().unwrap().mode, RunMode::Demo);

        let mut session = preview_session();
        session.login_started().unwrap();
        assert_eq!(session.start_creation().unwrap().mode, RunMode::Demo);

        let mut session = preview_session();
        session
            .login_completed(AccessToken::new("tok"), user())
            .unwrap();
        let request = session.start_creation().unwrap();
        assert!(matches!(request.mode, RunMode::Live { .. }));
        assert_eq!(request.title, "Late Night");
        assert_eq!(request.songs.len(), 2);
    }

    #[test]
    fn test_failure_returns_to_preview() {
        let mut session = preview_session();
        let request = session.start_creation().unwrap();

        assert!(session.finish_run(
            request.id,
            Err(AppError::RemoteApi {
                status: StatusCode::FORBIDDEN,
                message: "Insufficient client scope".to_string(),
            })
        ));

        assert_eq!(session.phase(), Phase::Preview);
        assert_eq!(session.songs().len(), 2);
        assert!(session.error().unwrap().starts_with("Failed to create playlist"));

        // retry clears the error
        session.start_creation().unwrap();
        assert_eq!(session.error(), None);
    }

    #[test]
    fn test_failure_drops_partial_results() {
        let mut session = preview_session();
        let request = session.start_creation().unwrap();

        session.apply_progress(
            request.id,
            ProgressUpdate::Resolved {
                results: vec![SearchResult::found(
                    Song::new("Hyperballad", "Björk"),
                    crate::spotify::Track::mock("Hyperballad", "Björk"),
                )],
            },
        );
        assert_eq!(session.results().len(), 1);

        session.finish_run(request.id, Err(AppError::NoTracksFound));
        assert_eq!(session.phase(), Phase::Preview);
        assert!(session.results().is_empty());
    }

    #[test]
    fn test_no_tracks_found_message() {
        let mut session = preview_session();
        let request = session.start_creation().unwrap();
        session.finish_run(request.id, Err(AppError::NoTracksFound));
        assert_eq!(session.phase(), Phase::Preview);
        assert!(session.error().unwrap().contains("None of the songs"));
    }

    #[test]
    fn test_stale_run_is_ignored() {
        let mut session = preview_session();
        let first = session.start_creation().unwrap();
        session.finish_run(first.id, Err(AppError::NoTracksFound));

        let second = session.start_creation().unwrap();
        assert_ne!(first.id, second.id);

        assert!(!session.apply_progress(
            first.id,
            ProgressUpdate::CreatingPlaylist { percent: 90.0 }
        ));
        assert!(!session.finish_run(
            first.id,
            Ok(PipelineOutcome {
                results: vec![],
                playlist_url: Some("https://example.com".to_string()),
            })
        ));
        assert_eq!(session.phase(), Phase::Creating);
        assert_eq!(session.progress(), 0.0);

        assert!(session.apply_progress(
            second.id,
            ProgressUpdate::CreatingPlaylist { percent: 90.0 }
        ));
        assert_eq!(session.progress(), 90.0);
        assert_eq!(session.progress_message(), "Creating playlist");
    }

    #[tokio::test]
    async fn test_demo_end_to_end() {
        let mut session = preview_session();
        let observer = RecordingReporter::new();

        session
            .create_playlist(&demo_pipelines(), &observer)
            .await
            .unwrap();

        assert_eq!(session.phase(), Phase::Done);
        assert_eq!(session.results().len(), 2);
        assert!(session.results().iter().all(|r| r.found));
        assert_eq!(session.playlist_url(), None);
        assert_eq!(session.progress(), 100.0);
        assert_eq!(observer.percents().last(), Some(&100.0));

        let listing = session.copy_listing().unwrap();
        assert_eq!(listing, TEXT);
        assert!(session.copied());
    }

    #[tokio::test]
    async fn test_reset_clears_everything_but_auth() {
        let mut session = preview_session();
        session.login_started().unwrap();
        session
            .create_playlist(&demo_pipelines(), &())
            .await
            .unwrap();
        session.copy_listing().unwrap();

        session.reset();

        assert_eq!(session.phase(), Phase::Paste);
        assert_eq!(session.input(), "");
        assert!(session.songs().is_empty());
        assert!(session.results().is_empty());
        assert_eq!(session.progress(), 0.0);
        assert!(!session.copied());
        assert!(session.error().is_none());
        assert_eq!(session.auth(), &AuthContext::AwaitingCallback);
    }

    #[test]
    fn test_login_failure_logs_out() {
        let mut session = Session::new();
        session.login_started().unwrap();
        session.login_failed(&AppError::MissingVerifier);
        assert_eq!(session.auth(), &AuthContext::LoggedOut);

        session
            .login_completed(AccessToken::new("tok"), user())
            .unwrap();
        assert_eq!(session.auth().user().map(|u| u.id.as_str()), Some("wizzler"));
        session.logout().unwrap();
        assert!(!session.auth().is_logged_in());
    }
}
