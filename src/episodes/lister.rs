//! Candidate listing for the target window.

use anyhow::Result;
use std::sync::Arc;

use super::selector::{select_episode, FallbackPolicy, Selection};
use super::EpisodeCandidate;
use crate::config::CrawlConfig;
use crate::extractors::static_page::StaticPageTier;
use crate::extractors::SessionLauncher;
use crate::window::TargetWindow;

/// Produces episode candidates for one source page
pub struct EpisodeLister {
    crawl: CrawlConfig,
    static_page: StaticPageTier,
    launcher: Arc<dyn SessionLauncher>,
}

impl EpisodeLister {
    pub fn new(crawl: CrawlConfig, static_page: StaticPageTier, launcher: Arc<dyn SessionLauncher>) -> Self {
        Self {
            crawl,
            static_page,
            launcher,
        }
    }

    fn seed_candidate(&self, window: &TargetWindow) -> EpisodeCandidate {
        EpisodeCandidate {
            title: format!("{} {}", window.slot, self.crawl.program_name),
            detail_url: self.crawl.target_url.clone(),
            date_key: window.compact_date.clone(),
            airtime: window.slot.clone(),
            source_id: self.crawl.source_id.clone(),
            prefetched_media_url: None,
        }
    }

    /// Candidates for the window; the static page stands in when automation is unavailable
    pub async fn list(&self, window: &TargetWindow) -> Result<Vec<EpisodeCandidate>> {
        let mut candidate = self.seed_candidate(window);

        if self.launcher.is_available() {
            return Ok(vec![candidate]);
        }

        tracing::warn!(
            "Browser automation unavailable; listing from static page {}",
            self.static_page.fallback_url()
        );
        match self.static_page.resolve().await {
            Ok(resolution) => {
                if let Some(inferred) = resolution.inferred_date {
                    if inferred != candidate.date_key {
                        tracing::warn!("Static page date {} differs from target {}", inferred, candidate.date_key);
                    }
                    candidate.date_key = inferred;
                }
                candidate.prefetched_media_url = resolution.media_url;
            }
            Err(e) => tracing::warn!("Static page listing failed, keeping seed candidate: {:#}", e),
        }
        Ok(vec![candidate])
    }

    /// List, then pick with the list-stage policy (first available on no date match)
    pub async fn list_and_pick(&self, window: &TargetWindow) -> Result<(Vec<EpisodeCandidate>, Option<Selection>)> {
        let candidates = self.list(window).await?;
        let selection = select_episode(&candidates, &window.compact_date, &window.slot, FallbackPolicy::FirstAvailable);
        match &selection {
            Some(s) => tracing::info!(
                "Listed {} candidate(s); list stage picked {} ({})",
                candidates.len(),
                s.episode.detail_url,
                s.rule
            ),
            None => tracing::warn!("Listed no candidates for {}", window.compact_date),
        }
        Ok((candidates, selection))
    }
}
