//! Acquisition ledger and artifact persistence.
//!
//! The ledger is one JSON document mapping `{date}_{HHMM}` to the outcome of
//! the acquisition for that key. It is always rewritten as a whole through a
//! temporary file, never appended to.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::episodes::{
    is_real_transcript, AcquiredBundle, ArtifactPaths, BundleStatus, EnrichedEpisode, EpisodeCandidate,
    EpisodeMetadata,
};
use crate::http::HttpClient;
use crate::window::{now_iso, TargetWindow};
use crate::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    Success,
    /// Media written but the transcript is the unavailable placeholder
    Partial,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub status: LedgerStatus,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(alias = "txt_path")]
    pub transcript_path: PathBuf,
    #[serde(alias = "mp3_path")]
    pub audio_path: PathBuf,
    #[serde(alias = "meta_path")]
    pub metadata_path: PathBuf,
    #[serde(default)]
    pub updated_at: String,
}

impl LedgerEntry {
    pub fn paths(&self, stem: &str) -> ArtifactPaths {
        ArtifactPaths {
            stem: stem.to_string(),
            transcript_path: self.transcript_path.clone(),
            audio_path: self.audio_path.clone(),
            metadata_path: self.metadata_path.clone(),
        }
    }
}

/// Why a recorded success can not be honored
pub fn integrity_problem(entry: &LedgerEntry) -> Option<String> {
    if entry.status != LedgerStatus::Success {
        return Some(format!("status is {:?}", entry.status));
    }
    for path in [&entry.transcript_path, &entry.audio_path, &entry.metadata_path] {
        match fs_err::metadata(path) {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => return Some(format!("{} is empty", path.display())),
            Err(_) => return Some(format!("{} is missing", path.display())),
        }
    }
    match fs_err::read_to_string(&entry.transcript_path) {
        Ok(text) if is_real_transcript(&text) => None,
        Ok(_) => Some("transcript is the unavailable placeholder".to_string()),
        Err(e) => Some(format!("transcript unreadable: {}", e)),
    }
}

/// In-memory copy of the ledger document
#[derive(Debug, Default)]
pub struct Ledger {
    path: PathBuf,
    entries: BTreeMap<String, LedgerEntry>,
    /// Entries that do not parse; written back untouched
    unparsed: BTreeMap<String, Value>,
}

impl Ledger {
    /// Read the ledger. A missing file is empty and a corrupt document is logged and
    /// treated as empty; a single malformed entry is skipped but kept for write-back.
    pub fn load(path: &Path) -> Result<Self> {
        let mut ledger = Self {
            path: path.to_path_buf(),
            ..Self::default()
        };
        if !path.exists() {
            return Ok(ledger);
        }

        let content = fs_err::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(ledger);
        }
        let document: BTreeMap<String, Value> = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Ledger {} is unreadable, starting empty: {}", path.display(), e);
                return Ok(ledger);
            }
        };
        for (key, raw) in document {
            match serde_json::from_value::<LedgerEntry>(raw.clone()) {
                Ok(entry) => {
                    ledger.entries.insert(key, entry);
                }
                Err(e) => {
                    tracing::warn!("Ledger entry {} is malformed, ignoring it: {}", key, e);
                    ledger.unparsed.insert(key, raw);
                }
            }
        }
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for `key` if it is a success whose artifacts are still intact
    pub fn intact_success(&self, key: &str) -> Option<&LedgerEntry> {
        let entry = self.entries.get(key)?;
        if entry.status != LedgerStatus::Success {
            return None;
        }
        match integrity_problem(entry) {
            None => Some(entry),
            Some(problem) => {
                tracing::warn!("Ledger success for {} failed verification ({}); re-acquiring", key, problem);
                None
            }
        }
    }

    /// Re-read the document from disk, set one entry, write it back atomically
    pub fn record(&mut self, key: &str, entry: LedgerEntry) -> Result<()> {
        let mut fresh = Self::load(&self.path)?;
        fresh.unparsed.remove(key);
        fresh.entries.insert(key.to_string(), entry);
        fresh.save()?;
        self.entries = fresh.entries;
        self.unparsed = fresh.unparsed;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs_err::create_dir_all(&parent)?;

        let mut document = self.unparsed.clone();
        for (key, entry) in &self.entries {
            document.insert(key.clone(), serde_json::to_value(entry).context("Failed to serialize ledger entry")?);
        }
        let content = serde_json::to_string_pretty(&document).context("Failed to serialize ledger")?;
        let mut temp = tempfile::NamedTempFile::new_in(&parent).context("Failed to create ledger temp file")?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|e| PipelineError::Artifact(format!("ledger write to {} failed: {}", self.path.display(), e)))?;
        Ok(())
    }
}

/// Writes acquisition artifacts and keeps the ledger in step with them
pub struct ArtifactStore {
    download_dir: PathBuf,
    ledger_path: PathBuf,
    source_tag: String,
    source_id: String,
    utc_offset_hours: i32,
    http: HttpClient,
}

impl ArtifactStore {
    pub fn new(
        download_dir: &Path,
        ledger_path: &Path,
        source_tag: &str,
        source_id: &str,
        utc_offset_hours: i32,
        http: HttpClient,
    ) -> Self {
        Self {
            download_dir: download_dir.to_path_buf(),
            ledger_path: ledger_path.to_path_buf(),
            source_tag: source_tag.to_string(),
            source_id: source_id.to_string(),
            utc_offset_hours,
            http,
        }
    }

    pub fn from_config(config: &Config, http: HttpClient) -> Self {
        Self::new(
            &config.crawl.download_path,
            &config.ledger_path(),
            &config.crawl.source_tag,
            &config.crawl.source_id,
            config.schedule.utc_offset_hours,
            http,
        )
    }

    /// Artifact paths for a date key in the window's slot
    pub fn paths_for(&self, date_key: &str, window: &TargetWindow) -> Result<ArtifactPaths> {
        let paths = ArtifactPaths::new(&self.download_dir, date_key, &window.slot_hhmm(), &self.source_tag);
        if !paths.is_consistent() {
            return Err(PipelineError::Artifact(format!("invalid artifact stem {:?}", paths.stem)).into());
        }
        Ok(paths)
    }

    pub fn ledger_key(date_key: &str, window: &TargetWindow) -> String {
        format!("{}_{}", date_key, window.slot_hhmm())
    }

    /// A skipped bundle when the ledger holds an intact success for the date
    pub fn check_existing(&self, date_key: &str, window: &TargetWindow) -> Result<Option<AcquiredBundle>> {
        let key = Self::ledger_key(date_key, window);
        let ledger = Ledger::load(&self.ledger_path)?;
        let Some(entry) = ledger.intact_success(&key) else {
            return Ok(None);
        };

        let stem = self.paths_for(date_key, window)?.stem;
        tracing::info!("Skip download: already success for key={}", key);
        self.skipped_bundle(entry, &stem).map(Some)
    }

    fn skipped_bundle(&self, entry: &LedgerEntry, stem: &str) -> Result<AcquiredBundle> {
        let paths = entry.paths(stem);
        let metadata = load_metadata(&paths.metadata_path)?;
        let transcript_text = fs_err::read_to_string(&paths.transcript_path)?;

        let episode = EnrichedEpisode {
            candidate: EpisodeCandidate {
                title: metadata.title.clone(),
                detail_url: metadata.source_url.clone(),
                date_key: metadata.date.replace('-', ""),
                airtime: metadata.airtime.clone(),
                source_id: self.source_id.clone(),
                prefetched_media_url: None,
            },
            transcript_text,
            media_url: metadata.media_url.clone(),
            extraction_trace: vec!["ledger: skipped".to_string()],
        };

        Ok(AcquiredBundle {
            episode,
            paths,
            status: BundleStatus::Skipped,
            metadata,
        })
    }

    /// Write transcript, audio and metadata for an extracted episode, then record it.
    ///
    /// An intact prior success short-circuits to a skipped bundle.
    pub async fn persist(&self, episode: &EnrichedEpisode, window: &TargetWindow) -> Result<AcquiredBundle> {
        let date_key = persist_date_key(&episode.candidate.date_key, window);
        let paths = self.paths_for(&date_key, window)?;
        let key = Self::ledger_key(&date_key, window);

        let mut ledger = Ledger::load(&self.ledger_path)?;
        if let Some(entry) = ledger.intact_success(&key) {
            tracing::info!("Skip download: already success for key={}", key);
            return self.skipped_bundle(entry, &paths.stem);
        }

        if episode.transcript_text.trim().is_empty() {
            return Err(PipelineError::Precondition("episode transcript is empty".to_string()).into());
        }
        if episode.media_url.trim().is_empty() {
            return Err(PipelineError::Precondition("episode media url is empty".to_string()).into());
        }

        fs_err::create_dir_all(&self.download_dir)?;
        fs_err::write(&paths.transcript_path, &episode.transcript_text)
            .context("Failed to write transcript")?;

        tracing::info!("Downloading media from {}", episode.media_url);
        self.http.download_to_file(&episode.media_url, &paths.audio_path).await?;

        let display_date = format!("{}-{}-{}", &date_key[..4], &date_key[4..6], &date_key[6..8]);
        let metadata = EpisodeMetadata {
            date: display_date,
            airtime: window.slot.clone(),
            title: episode.candidate.title.clone(),
            transcript_filename: file_name(&paths.transcript_path),
            audio_filename: file_name(&paths.audio_path),
            source_url: episode.candidate.detail_url.clone(),
            media_url: episode.media_url.clone(),
            downloaded_at: now_iso(self.utc_offset_hours),
        };
        let metadata_json = serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?;
        fs_err::write(&paths.metadata_path, metadata_json).context("Failed to write metadata")?;

        let (status, ledger_status) = if episode.has_real_transcript() {
            (BundleStatus::Success, LedgerStatus::Success)
        } else {
            tracing::warn!("Transcript unavailable for {}; recording partial acquisition", key);
            (BundleStatus::Partial, LedgerStatus::Partial)
        };

        ledger.record(
            &key,
            LedgerEntry {
                status: ledger_status,
                title: episode.candidate.title.clone(),
                source_url: episode.candidate.detail_url.clone(),
                transcript_path: paths.transcript_path.clone(),
                audio_path: paths.audio_path.clone(),
                metadata_path: paths.metadata_path.clone(),
                updated_at: now_iso(self.utc_offset_hours),
            },
        )?;
        tracing::info!("Ledger updated: {} -> {}", key, status.as_str());

        Ok(AcquiredBundle {
            episode: episode.clone(),
            paths,
            status,
            metadata,
        })
    }
}

/// The episode's own date when well formed, else the window date
fn persist_date_key(candidate_date: &str, window: &TargetWindow) -> String {
    if candidate_date.len() == 8 && candidate_date.bytes().all(|b| b.is_ascii_digit()) {
        candidate_date.to_string()
    } else {
        window.compact_date.clone()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read a metadata document written by a previous acquisition
pub fn load_metadata(path: &Path) -> Result<EpisodeMetadata> {
    let content = fs_err::read_to_string(path)
        .map_err(|e| PipelineError::Artifact(format!("metadata not readable: {}", e)))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid metadata document {}", path.display()))
}
