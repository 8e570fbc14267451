//! Acquisition orchestration: ledger pre-check, listing, selection,
//! extraction and persistence for one target window.

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::episodes::{select_episode, AcquiredBundle, EpisodeLister, FallbackPolicy};
use crate::extractors::static_page::StaticPageTier;
use crate::extractors::{MultiTierExtractor, SessionLauncher};
use crate::http::HttpClient;
use crate::ledger::ArtifactStore;
use crate::window::TargetWindow;
use crate::PipelineError;

pub struct Acquirer {
    lister: EpisodeLister,
    extractor: MultiTierExtractor,
    store: ArtifactStore,
}

impl Acquirer {
    pub fn new(lister: EpisodeLister, extractor: MultiTierExtractor, store: ArtifactStore) -> Self {
        Self {
            lister,
            extractor,
            store,
        }
    }

    pub fn from_config(config: &Config, launcher: Arc<dyn SessionLauncher>) -> Result<Self> {
        let http = HttpClient::from_config(config)?;
        let lister = EpisodeLister::new(
            config.crawl.clone(),
            StaticPageTier::new(http.clone(), &config.crawl.fallback_url),
            launcher.clone(),
        );
        let extractor = MultiTierExtractor::from_config(config, http.clone(), launcher);
        let store = ArtifactStore::from_config(config, http);
        Ok(Self::new(lister, extractor, store))
    }

    pub fn extractor(&self) -> &MultiTierExtractor {
        &self.extractor
    }

    /// Acquire the episode for `window`, or return the verified earlier acquisition
    pub async fn acquire(&self, window: &TargetWindow) -> Result<AcquiredBundle> {
        if let Some(bundle) = self.store.check_existing(&window.compact_date, window)? {
            return Ok(bundle);
        }

        let (candidates, _) = self.lister.list_and_pick(window).await?;
        let selection = select_episode(&candidates, &window.compact_date, &window.slot, FallbackPolicy::NoMatch)
            .ok_or_else(|| PipelineError::EpisodeNotFound(window.compact_date.clone()))?;
        tracing::info!("Selected episode: {} ({})", selection.episode.title, selection.rule);

        let enriched = self.extractor.extract(&selection.episode, window).await;
        for line in &enriched.extraction_trace {
            tracing::debug!("trace {}", line);
        }

        if enriched.media_url.trim().is_empty() {
            return Err(PipelineError::NoMediaUrl(window.ledger_key()).into());
        }
        if enriched.transcript_text.trim().is_empty() {
            return Err(PipelineError::NoTranscript(window.ledger_key()).into());
        }

        self.store.persist(&enriched, window).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::episodes::BundleStatus;
    use crate::extractors::session::testing::{audio_response, Script, ScriptedLauncher};
    use crate::extractors::session::UnavailableLauncher;
    use crate::ledger::{Ledger, LedgerEntry, LedgerStatus};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(dir: &TempDir, server: &MockServer) -> Config {
        let mut config = Config::default();
        config.crawl.target_url = format!("{}/radio/132/podcast/668", server.uri());
        config.crawl.fallback_url = format!("{}/player", server.uri());
        config.crawl.download_path = dir.path().join("downloads");
        config.crawl.retry_count = 1;
        config.crawl.retry_delay_secs = 0.0;
        config.paths.logs_dir = dir.path().join("logs");
        config
    }

    fn window() -> TargetWindow {
        TargetWindow::for_date("20240101", "21:55").unwrap()
    }

    #[tokio::test]
    async fn test_intact_success_is_skipped_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let config = config(&dir, &server);

        let downloads = dir.path().join("downloads");
        std::fs::create_dir_all(&downloads).unwrap();
        let transcript = downloads.join("20240101_2155_arirang.txt");
        let audio = downloads.join("20240101_2155_arirang.mp3");
        let meta = downloads.join("20240101_2155_arirang_meta.json");
        std::fs::write(&transcript, "Welcome to Arirang News.").unwrap();
        std::fs::write(&audio, b"audio").unwrap();
        std::fs::write(
            &meta,
            r#"{"date":"2024-01-01","airtime":"21:55","title":"21:55 Arirang News",
                "transcript_filename":"20240101_2155_arirang.txt","audio_filename":"20240101_2155_arirang.mp3",
                "source_url":"https://www.example.com","media_url":"https://cdn.example.com/a.mp3",
                "downloaded_at":"2024-01-02T07:30:00+09:00"}"#,
        )
        .unwrap();

        let mut ledger = Ledger::load(&config.ledger_path()).unwrap();
        ledger
            .record(
                "20240101_2155",
                LedgerEntry {
                    status: LedgerStatus::Success,
                    title: "21:55 Arirang News".to_string(),
                    source_url: "https://www.example.com".to_string(),
                    transcript_path: transcript,
                    audio_path: audio,
                    metadata_path: meta,
                    updated_at: "2024-01-02T07:30:00+09:00".to_string(),
                },
            )
            .unwrap();

        let acquirer = Acquirer::from_config(&config, Arc::new(UnavailableLauncher::new("none"))).unwrap();
        let bundle = acquirer.acquire(&window()).await.unwrap();

        assert_eq!(bundle.status, BundleStatus::Skipped);
        assert_eq!(bundle.metadata.title, "21:55 Arirang News");
        assert_eq!(bundle.episode.transcript_text, "Welcome to Arirang News.");
    }

    #[tokio::test]
    async fn test_driven_session_acquisition_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/ep.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        let config = config(&dir, &server);

        let mut script = Script::default();
        script.texts.insert(
            "[class*='content']".to_string(),
            vec!["Welcome to Arirang News. Inflation concerns grew.".to_string()],
        );
        script.navigation_responses = vec![audio_response(&format!("{}/media/ep.mp3", server.uri()))];

        let acquirer = Acquirer::from_config(&config, Arc::new(ScriptedLauncher::new(script))).unwrap();
        let bundle = acquirer.acquire(&window()).await.unwrap();

        assert_eq!(bundle.status, BundleStatus::Success);
        assert_eq!(std::fs::read(&bundle.paths.audio_path).unwrap(), b"audio-bytes");
        assert_eq!(bundle.metadata.date, "2024-01-01");
        assert_eq!(bundle.metadata.audio_filename, "20240101_2155_arirang.mp3");
    }

    #[tokio::test]
    async fn test_static_date_mismatch_is_episode_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/player"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"media_url":"https://cdn.example.com/arirang/20231231/a.mp3"}"#,
            ))
            .mount(&server)
            .await;
        let config = config(&dir, &server);

        let acquirer = Acquirer::from_config(&config, Arc::new(UnavailableLauncher::new("none"))).unwrap();
        let err = acquirer.acquire(&window()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::EpisodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transcript_without_media_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/player"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>no player</html>"))
            .mount(&server)
            .await;
        let config = config(&dir, &server);

        let mut script = Script::default();
        script
            .texts
            .insert("[class*='script']".to_string(), vec!["Some transcript".to_string()]);

        let acquirer = Acquirer::from_config(&config, Arc::new(ScriptedLauncher::new(script))).unwrap();
        let err = acquirer.acquire(&window()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<PipelineError>(), Some(PipelineError::NoMediaUrl(_))));
        assert_eq!(crate::exit_code_for(&err), 3);
    }
}
