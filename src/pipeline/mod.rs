pub mod demo;
pub mod orchestrator;
pub mod report;

pub use demo::DemoPipeline;
pub use orchestrator::{DEFAULT_PLAYLIST_NAME, PLAYLIST_DESCRIPTION, ResolutionPipeline};
pub use report::{
    PipelineOutcome, ProgressReporter, ProgressUpdate, RecordingReporter, SearchResult,
};
