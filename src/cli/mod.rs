use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "daily-lexicon",
    about = "Daily Lexicon - acquire yesterday's news broadcast and build a vocabulary study set",
    version,
    long_about = "A batch pipeline that locates one broadcast episode per day, saves its transcript and audio, \
ranks the hard vocabulary in the transcript with dictionary enrichment, and renders a static HTML learner report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml, then the user config dir)
    #[arg(short, long, global = true, value_name = "FILE", env = "DAILY_LEXICON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors to the terminal
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Terminal log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline for one target date
    Run {
        /// Target date as YYYYMMDD (defaults to yesterday in the configured timezone)
        #[arg(short, long, value_name = "YYYYMMDD")]
        date: Option<String>,

        /// Run a single step; analyze and report reload earlier outputs from disk
        #[arg(short, long, value_enum)]
        step: Option<Step>,

        /// Analyze and report a built-in sample script without crawling
        #[arg(long, conflicts_with = "step")]
        demo: bool,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List the configured source and extraction tiers
    Sources,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Acquire transcript, audio and metadata
    Crawl,
    /// Build the vocabulary dataset from a crawled transcript
    Analyze,
    /// Render the HTML report from saved metadata and vocabulary
    Report,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Crawl => write!(f, "crawl"),
            Step::Analyze => write!(f, "analyze"),
            Step::Report => write!(f, "report"),
        }
    }
}
