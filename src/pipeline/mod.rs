//! Step orchestration: crawl, analyze, report, and the crawl-free demo run.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::acquire::Acquirer;
use crate::cli::Step;
use crate::config::Config;
use crate::episodes::{
    is_real_transcript, vocabulary_paths, AcquiredBundle, ArtifactPaths, BundleStatus, EpisodeMetadata,
};
use crate::extractors::session::default_launcher;
use crate::extractors::SessionLauncher;
use crate::ledger::load_metadata;
use crate::report::{HtmlReportRenderer, ReportInput, ReportRenderer};
use crate::utils::date_key;
use crate::vocabulary::{load_dataset, save_dataset, VocabularyAnalyzer, VocabularyDataset};
use crate::window::{now_iso, TargetWindow};
use crate::PipelineError;

/// Built-in news script analyzed in demo mode
pub const DEMO_SCRIPT: &str = "Global markets opened with mixed sentiment as investors weighed inflation data, \
new fiscal guidance, and geopolitical risks in several regions. Analysts said the \
latest parliamentary debate on subsidy reform and trade tariffs could reshape \
industrial competitiveness across Asia. Meanwhile, humanitarian agencies warned that \
continued disruptions in logistics and energy infrastructure may intensify regional \
volatility. In a separate briefing, regulators highlighted compliance failures linked \
to cross-border procurement contracts and called for stronger oversight mechanisms. \
Diplomatic channels remain active, but negotiators acknowledged that consensus is \
unlikely before next month. Economists added that liquidity conditions remain tight, \
which may delay investment in decarbonization projects despite public commitments. \
At the same time, technology firms accelerated cybersecurity spending after reports of \
coordinated disinformation campaigns targeting election systems. Observers noted that \
the current environment requires balanced policy, transparent communication, and \
credible long-term planning to prevent a prolonged stalemate.";

/// Vocabulary files written by the analyze step
#[derive(Debug, Clone)]
pub struct VocabularyOutputs {
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub count: usize,
}

/// What one invocation produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: TargetWindow,
    pub bundle_status: Option<BundleStatus>,
    pub vocabulary: Option<VocabularyOutputs>,
    pub report_path: Option<PathBuf>,
}

impl RunSummary {
    fn new(window: &TargetWindow) -> Self {
        Self {
            window: window.clone(),
            bundle_status: None,
            vocabulary: None,
            report_path: None,
        }
    }
}

/// Episode metadata plus its transcript, as handed from crawl to analyze and report
#[derive(Debug, Clone)]
pub struct LoadedEpisode {
    pub metadata: EpisodeMetadata,
    /// Empty when the transcript is missing or the unavailable placeholder
    pub transcript: String,
}

impl LoadedEpisode {
    fn from_bundle(bundle: &AcquiredBundle) -> Result<Self> {
        let mut transcript = bundle.episode.transcript_text.clone();
        if transcript.trim().is_empty() && bundle.paths.transcript_path.exists() {
            transcript = fs_err::read_to_string(&bundle.paths.transcript_path)?;
        }
        Ok(Self {
            metadata: bundle.metadata.clone(),
            transcript: real_or_empty(transcript),
        })
    }

    /// Date key used to name the vocabulary outputs
    pub fn date_key(&self) -> String {
        date_key(&self.metadata.date)
    }
}

fn real_or_empty(transcript: String) -> String {
    if is_real_transcript(&transcript) {
        transcript
    } else {
        String::new()
    }
}

pub struct DailyPipeline {
    config: Config,
    launcher: Arc<dyn SessionLauncher>,
}

impl DailyPipeline {
    pub fn new(config: Config, launcher: Arc<dyn SessionLauncher>) -> Self {
        Self { config, launcher }
    }

    /// Pipeline with the browser launcher matching the compiled features
    pub fn from_config(config: Config) -> Self {
        let launcher = default_launcher(&config.browser);
        Self::new(config, launcher)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Explicit YYYYMMDD date, or yesterday in the configured timezone
    pub fn window_for(&self, date: Option<&str>) -> Result<TargetWindow> {
        match date.filter(|d| !d.trim().is_empty()) {
            Some(date) => TargetWindow::for_date(date.trim(), &self.config.crawl.slot),
            None => TargetWindow::yesterday(self.config.schedule.utc_offset_hours, &self.config.crawl.slot),
        }
    }

    /// Run every step, or only `step`; analyze and report alone reload from disk
    pub async fn run(&self, window: &TargetWindow, step: Option<Step>) -> Result<RunSummary> {
        tracing::info!("Pipeline start date={} slot={} step={:?}", window.compact_date, window.slot, step);
        let mut summary = RunSummary::new(window);

        match step {
            Some(Step::Crawl) => {
                summary.bundle_status = Some(self.crawl(window).await?.status);
            }
            Some(Step::Analyze) => {
                let episode = self.load_episode(window)?;
                summary.vocabulary = Some(self.analyze(&episode).await?.1);
            }
            Some(Step::Report) => {
                let episode = self.load_episode(window)?;
                let (json_path, _) = vocabulary_paths(&self.config.paths.logs_dir, &window.compact_date);
                if !json_path.exists() {
                    return Err(PipelineError::Precondition(format!(
                        "vocabulary JSON not found: {}",
                        json_path.display()
                    ))
                    .into());
                }
                let dataset = load_dataset(&json_path)?;
                summary.report_path = Some(self.report(&episode, &dataset)?);
            }
            None => {
                let bundle = self.crawl(window).await?;
                summary.bundle_status = Some(bundle.status);
                let episode = LoadedEpisode::from_bundle(&bundle)?;
                let (dataset, outputs) = self.analyze(&episode).await?;
                summary.vocabulary = Some(outputs);
                summary.report_path = Some(self.report(&episode, &dataset)?);
            }
        }

        Ok(summary)
    }

    pub async fn crawl(&self, window: &TargetWindow) -> Result<AcquiredBundle> {
        tracing::info!("[STEP] crawl start");
        let acquirer = Acquirer::from_config(&self.config, self.launcher.clone())?;
        let bundle = acquirer.acquire(window).await?;
        tracing::info!(
            "[STEP] crawl {} transcript={} audio={}",
            bundle.status.as_str(),
            bundle.paths.transcript_path.display(),
            bundle.paths.audio_path.display()
        );
        Ok(bundle)
    }

    pub async fn analyze(&self, episode: &LoadedEpisode) -> Result<(VocabularyDataset, VocabularyOutputs)> {
        tracing::info!("[STEP] analyze start");
        let analyzer = VocabularyAnalyzer::from_config(&self.config)?;
        let items = analyzer.analyze(&episode.transcript).await;
        let dataset = VocabularyDataset::new(items, now_iso(self.config.schedule.utc_offset_hours));

        let date_key = episode.date_key();
        let (json_path, csv_path) = save_dataset(&dataset, &self.config.paths.logs_dir, &date_key)?;
        tracing::info!("[STEP] analyze success count={}", dataset.count);

        let outputs = VocabularyOutputs {
            json_path,
            csv_path,
            count: dataset.count,
        };
        Ok((dataset, outputs))
    }

    pub fn report(&self, episode: &LoadedEpisode, dataset: &VocabularyDataset) -> Result<PathBuf> {
        tracing::info!("[STEP] report start");
        let input = ReportInput::new(
            &episode.metadata,
            &episode.transcript,
            dataset,
            &self.config.crawl.program_name,
        );
        HtmlReportRenderer::new(&self.config.paths.reports_dir).render(&input)
    }

    /// Reload a previously crawled episode from its metadata document
    pub fn load_episode(&self, window: &TargetWindow) -> Result<LoadedEpisode> {
        let paths = ArtifactPaths::new(
            &self.config.crawl.download_path,
            &window.compact_date,
            &window.slot_hhmm(),
            &self.config.crawl.source_tag,
        );
        if !paths.metadata_path.exists() {
            return Err(PipelineError::Precondition(format!(
                "metadata not found: {}",
                paths.metadata_path.display()
            ))
            .into());
        }
        let metadata = load_metadata(&paths.metadata_path)?;

        let transcript = if paths.transcript_path.exists() {
            fs_err::read_to_string(&paths.transcript_path)?
        } else {
            tracing::warn!("Transcript file missing: {}", paths.transcript_path.display());
            String::new()
        };

        Ok(LoadedEpisode {
            metadata,
            transcript: real_or_empty(transcript),
        })
    }

    /// Analyze and report over the built-in script, without crawling
    pub async fn demo(&self) -> Result<RunSummary> {
        let window = self.window_for(None)?;
        tracing::info!("[DEMO] date={}", window.compact_date);

        let episode = LoadedEpisode {
            metadata: EpisodeMetadata {
                date: window.display_date.clone(),
                airtime: window.slot.clone(),
                title: format!("Demo {} Episode", self.config.crawl.program_name),
                transcript_filename: String::new(),
                audio_filename: String::new(),
                source_url: String::new(),
                media_url: String::new(),
                downloaded_at: now_iso(self.config.schedule.utc_offset_hours),
            },
            transcript: DEMO_SCRIPT.to_string(),
        };

        let mut summary = RunSummary::new(&window);
        let (dataset, outputs) = self.analyze(&episode).await?;
        summary.vocabulary = Some(outputs);
        summary.report_path = Some(self.report(&episode, &dataset)?);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::session::testing::{audio_response, Script, ScriptedLauncher};
    use crate::extractors::session::UnavailableLauncher;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.crawl.download_path = dir.path().join("downloads");
        config.crawl.retry_count = 1;
        config.crawl.retry_delay_secs = 0.0;
        config.paths.logs_dir = dir.path().join("logs");
        config.paths.reports_dir = dir.path().join("reports");
        config.vocabulary.remote_enabled = false;
        config
    }

    fn offline(config: Config) -> DailyPipeline {
        DailyPipeline::new(config, Arc::new(UnavailableLauncher::new("tests")))
    }

    #[tokio::test]
    async fn test_demo_writes_vocabulary_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = offline(config(&dir));
        let summary = pipeline.demo().await.unwrap();

        let vocabulary = summary.vocabulary.unwrap();
        assert!(vocabulary.count > 0);
        assert!(vocabulary.count <= 30);
        let dataset = load_dataset(&vocabulary.json_path).unwrap();
        assert_eq!(dataset.count, vocabulary.count);
        assert!(vocabulary.csv_path.exists());

        let report = summary.report_path.unwrap();
        assert_eq!(
            report.file_name().unwrap().to_string_lossy(),
            format!("report_{}_2155.html", summary.window.compact_date)
        );
        assert!(std::fs::read_to_string(report).unwrap().contains("Demo Arirang News Episode"));
    }

    #[tokio::test]
    async fn test_analyze_step_reloads_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let downloads = dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        std::fs::write(
            downloads.join("20240101_2155_arirang.txt"),
            "Welcome to Arirang News. Negotiators discussed sanctions.",
        )
        .unwrap();
        std::fs::write(
            downloads.join("20240101_2155_arirang_meta.json"),
            r#"{"date":"2024-01-01","airtime":"21:55","title":"21:55 Arirang News",
                "transcript_filename":"20240101_2155_arirang.txt","audio_filename":"20240101_2155_arirang.mp3",
                "source_url":"https://www.example.com","media_url":"https://cdn.example.com/a.mp3",
                "downloaded_at":"2024-01-02T07:30:00+09:00"}"#,
        )
        .unwrap();

        let pipeline = offline(config);
        let window = TargetWindow::for_date("20240101", "21:55").unwrap();
        let summary = pipeline.run(&window, Some(Step::Analyze)).await.unwrap();

        let vocabulary = summary.vocabulary.unwrap();
        assert!(vocabulary.json_path.ends_with("vocabulary_20240101.json"));
        let dataset = load_dataset(&vocabulary.json_path).unwrap();
        assert!(dataset.items.iter().any(|i| i.lemma == "negotiators"));

        let summary = pipeline.run(&window, Some(Step::Report)).await.unwrap();
        assert!(summary.report_path.unwrap().ends_with("report_20240101_2155.html"));
    }

    #[tokio::test]
    async fn test_report_step_requires_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = offline(config(&dir));
        let window = TargetWindow::for_date("20240101", "21:55").unwrap();

        let err = pipeline.run(&window, Some(Step::Report)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::Precondition(_))));
    }

    #[tokio::test]
    async fn test_full_run_chains_steps() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/ep.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio".to_vec()))
            .mount(&server)
            .await;

        let mut config = config(&dir);
        config.crawl.target_url = format!("{}/radio/132/podcast/668", server.uri());
        config.crawl.fallback_url = format!("{}/player", server.uri());

        let mut script = Script::default();
        script.texts.insert(
            "[class*='content']".to_string(),
            vec!["Welcome to Arirang News. Lawmakers debated the moratorium on tariffs.".to_string()],
        );
        script.navigation_responses = vec![audio_response(&format!("{}/media/ep.mp3", server.uri()))];

        let pipeline = DailyPipeline::new(config, Arc::new(ScriptedLauncher::new(script)));
        let window = TargetWindow::for_date("20240101", "21:55").unwrap();
        let summary = pipeline.run(&window, None).await.unwrap();

        assert_eq!(summary.bundle_status, Some(BundleStatus::Success));
        let dataset = load_dataset(&summary.vocabulary.unwrap().json_path).unwrap();
        assert!(dataset.items.iter().any(|i| i.lemma == "moratorium" && i.is_curated_hard_word));
        assert!(summary.report_path.unwrap().exists());

        // Second run is served from the ledger
        let again = pipeline.run(&window, Some(Step::Crawl)).await.unwrap();
        assert_eq!(again.bundle_status, Some(BundleStatus::Skipped));
    }
}
