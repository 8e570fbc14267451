use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub mod lister;
pub mod selector;

pub use lister::EpisodeLister;
pub use selector::{select_episode, FallbackPolicy, Selection, SelectionRule};

/// Placeholder written when no tier could produce a transcript
pub const TRANSCRIPT_UNAVAILABLE: &str = "Script not available from source page.";

/// One listed episode, before extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeCandidate {
    pub title: String,

    /// Page the episode is extracted from
    pub detail_url: String,

    /// YYYYMMDD
    pub date_key: String,

    /// HH:MM, may be empty when unknown
    pub airtime: String,

    pub source_id: String,

    /// Media URL already resolved while listing (static fallback only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetched_media_url: Option<String>,
}

/// A candidate after the extraction tiers ran
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedEpisode {
    #[serde(flatten)]
    pub candidate: EpisodeCandidate,

    /// May be empty; extraction failure is representable here
    pub transcript_text: String,

    pub media_url: String,

    /// One line per tier attempt, for diagnosis
    pub extraction_trace: Vec<String>,
}

impl EnrichedEpisode {
    pub fn has_real_transcript(&self) -> bool {
        is_real_transcript(&self.transcript_text)
    }
}

/// Whether a bundle's artifacts were written in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleStatus {
    /// All three artifacts written and the transcript is real content
    Success,
    /// A prior success was verified intact; nothing was downloaded
    Skipped,
    /// Artifacts written but the transcript is the unavailable placeholder
    Partial,
}

impl BundleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleStatus::Success => "success",
            BundleStatus::Skipped => "skipped",
            BundleStatus::Partial => "partial",
        }
    }
}

/// An enriched episode plus its on-disk artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredBundle {
    pub episode: EnrichedEpisode,
    pub paths: ArtifactPaths,
    pub status: BundleStatus,
    pub metadata: EpisodeMetadata,
}

/// Metadata document written next to the transcript and audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    /// YYYY-MM-DD
    pub date: String,
    pub airtime: String,
    pub title: String,
    pub transcript_filename: String,
    pub audio_filename: String,
    pub source_url: String,
    pub media_url: String,
    /// ISO-8601 in the source timezone
    pub downloaded_at: String,
}

/// Transcript, audio and metadata paths derived from one stem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub stem: String,
    pub transcript_path: PathBuf,
    pub audio_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl ArtifactPaths {
    /// Paths for `{date}_{HHMM}_{tag}` under `base_dir`
    pub fn new(base_dir: &Path, date_key: &str, slot_hhmm: &str, source_tag: &str) -> Self {
        let stem = build_stem(date_key, slot_hhmm, source_tag);
        Self {
            transcript_path: base_dir.join(format!("{}.txt", stem)),
            audio_path: base_dir.join(format!("{}.mp3", stem)),
            metadata_path: base_dir.join(format!("{}_meta.json", stem)),
            stem,
        }
    }

    /// Check that the stem is well formed and every file name derives from it
    pub fn is_consistent(&self) -> bool {
        if !validate_stem(&self.stem) {
            return false;
        }
        let name = |p: &Path| p.file_name().map(|n| n.to_string_lossy().into_owned());
        name(&self.transcript_path) == Some(format!("{}.txt", self.stem))
            && name(&self.audio_path) == Some(format!("{}.mp3", self.stem))
            && name(&self.metadata_path) == Some(format!("{}_meta.json", self.stem))
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.transcript_path, &self.audio_path, &self.metadata_path]
    }
}

pub fn build_stem(date_key: &str, slot_hhmm: &str, source_tag: &str) -> String {
    format!("{}_{}_{}", date_key, slot_hhmm, source_tag)
}

fn stem_regex() -> &'static Regex {
    static STEM: OnceLock<Regex> = OnceLock::new();
    STEM.get_or_init(|| Regex::new(r"^\d{8}_\d{4}_[a-z0-9_-]+$").expect("stem pattern"))
}

pub fn validate_stem(stem: &str) -> bool {
    stem_regex().is_match(stem)
}

pub fn is_valid_source_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// True when the text is non-empty and not the unavailable placeholder
pub fn is_real_transcript(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && !trimmed.starts_with(TRANSCRIPT_UNAVAILABLE)
}

/// Vocabulary outputs keyed by date
pub fn vocabulary_paths(logs_dir: &Path, date_key: &str) -> (PathBuf, PathBuf) {
    (
        logs_dir.join(format!("vocabulary_{}.json", date_key)),
        logs_dir.join(format!("vocabulary_{}.csv", date_key)),
    )
}

/// Report location expected by the renderer
pub fn report_path(reports_dir: &Path, date_key: &str, slot_hhmm: &str) -> PathBuf {
    reports_dir.join(format!("report_{}_{}.html", date_key, slot_hhmm))
}
