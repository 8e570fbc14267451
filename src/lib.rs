//! Daily Lexicon - a batch pipeline that acquires one broadcast episode per day
//!
//! This library resolves the target episode for a date/time slot, extracts its
//! transcript and audio through a cascade of increasingly degraded strategies,
//! persists the artifacts idempotently, and derives a ranked vocabulary dataset
//! from the transcript.

pub mod acquire;
pub mod cli;
pub mod config;
pub mod episodes;
pub mod extractors;
pub mod http;
pub mod ledger;
pub mod pipeline;
pub mod report;
pub mod utils;
pub mod vocabulary;
pub mod window;

pub use cli::{Cli, Commands, LogFormat, Step};
pub use config::Config;
pub use episodes::{AcquiredBundle, BundleStatus, EnrichedEpisode, EpisodeCandidate};
pub use extractors::{ExtractionTier, TierOutcome};
pub use pipeline::DailyPipeline;
pub use vocabulary::{VocabularyDataset, VocabularyItem};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Terminal and precondition failures that callers must be able to tell apart
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("No episode found for target date {0}")]
    EpisodeNotFound(String),

    #[error("No transcript obtainable for {0}")]
    NoTranscript(String),

    #[error("No media URL obtainable for {0}")]
    NoMediaUrl(String),

    #[error("Request failed after {attempts} attempts: {url}")]
    Network { url: String, attempts: u32 },

    #[error("Browser automation unavailable: {0}")]
    AutomationUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Artifact error: {0}")]
    Artifact(String),
}

impl PipelineError {
    /// Process exit status for a run that ended with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::EpisodeNotFound(_) => 2,
            PipelineError::NoTranscript(_) | PipelineError::NoMediaUrl(_) => 3,
            _ => 1,
        }
    }
}

/// Exit status for an arbitrary pipeline failure
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PipelineError>()
        .map(PipelineError::exit_code)
        .unwrap_or(1)
}
