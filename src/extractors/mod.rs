use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use url::Url;

pub mod api;
pub mod browser;
#[cfg(feature = "js-rendering")]
pub mod chromium;
pub mod json_cache;
pub mod session;
pub mod slicing;
pub mod static_page;

use crate::config::Config;
use crate::episodes::{EnrichedEpisode, EpisodeCandidate, TRANSCRIPT_UNAVAILABLE};
use crate::http::HttpClient;
use crate::window::TargetWindow;

pub use session::{BrowserSession, ResponseEvent, SessionLauncher};
pub use slicing::slice_episode;

/// What the tiers are looking for
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionTarget {
    /// YYYYMMDD
    pub date_key: String,
    /// YYYY-MM-DD
    pub display_date: String,
    /// HH:MM
    pub slot: String,
    pub program_name: String,
    pub source_id: String,
    pub page_url: String,
}

impl ExtractionTarget {
    pub fn new(candidate: &EpisodeCandidate, window: &TargetWindow, program_name: &str) -> Self {
        let date_key = if candidate.date_key.len() == 8 && candidate.date_key.bytes().all(|b| b.is_ascii_digit()) {
            candidate.date_key.clone()
        } else {
            window.compact_date.clone()
        };
        Self {
            display_date: format!("{}-{}-{}", &date_key[..4], &date_key[4..6], &date_key[6..8]),
            date_key,
            slot: window.slot.clone(),
            program_name: program_name.to_string(),
            source_id: candidate.source_id.clone(),
            page_url: candidate.detail_url.clone(),
        }
    }
}

/// State accumulated across tiers during one extraction
#[derive(Debug)]
pub struct ExtractionContext {
    pub target: ExtractionTarget,

    /// First media URL any tier supplied
    pub media_url: Option<String>,

    /// JSON payloads intercepted during the driven session, in arrival order
    pub json_payloads: Vec<Value>,

    /// Player iframe source seen on the page
    pub iframe_src: Option<String>,

    /// Date inferred from an upload path by the static tier
    pub inferred_date: Option<String>,

    pub trace: Vec<String>,
}

impl ExtractionContext {
    pub fn new(target: ExtractionTarget) -> Self {
        Self {
            target,
            media_url: None,
            json_payloads: Vec::new(),
            iframe_src: None,
            inferred_date: None,
            trace: Vec::new(),
        }
    }

    /// Keep the first non-empty media URL; later offers are ignored
    pub fn offer_media(&mut self, url: &str, source: &str) -> bool {
        let url = url.trim();
        if url.is_empty() || self.media_url.is_some() {
            return false;
        }
        tracing::debug!("Media URL from {}: {}", source, url);
        self.media_url = Some(url.to_string());
        self.trace(source, format!("media url {}", url));
        true
    }

    pub fn trace(&mut self, tier: &str, message: impl Into<String>) {
        self.trace.push(format!("{}: {}", tier, message.into()));
    }
}

/// Result of one extraction tier
#[derive(Debug)]
pub enum TierOutcome {
    /// The tier produced transcript text
    Transcript(String),
    /// The tier ran but found no transcript (it may still have supplied media)
    Empty,
    /// The tier could not run or broke part-way
    Failed(anyhow::Error),
}

/// One strategy in the extraction cascade
#[async_trait]
pub trait ExtractionTier: Send + Sync {
    /// Short name used in logs and traces
    fn name(&self) -> &'static str;

    /// Try to produce a transcript, merging any side findings into `ctx`
    async fn extract(&self, ctx: &mut ExtractionContext) -> TierOutcome;
}

/// Ordered tiers; the first one producing a transcript wins
pub struct TierChain {
    tiers: Vec<Box<dyn ExtractionTier>>,
}

impl TierChain {
    pub fn new() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn register(&mut self, tier: Box<dyn ExtractionTier>) {
        self.tiers.push(tier);
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|tier| tier.name()).collect()
    }

    /// Run tiers in order, returning the winning tier and its transcript
    pub async fn run(&self, ctx: &mut ExtractionContext) -> Option<(&'static str, String)> {
        for tier in &self.tiers {
            let name = tier.name();
            tracing::info!("Extraction tier start: {}", name);
            match tier.extract(ctx).await {
                TierOutcome::Transcript(text) if !text.trim().is_empty() => {
                    ctx.trace(name, format!("transcript {} chars", text.chars().count()));
                    tracing::info!("Extraction tier {} produced a transcript", name);
                    return Some((name, text));
                }
                TierOutcome::Transcript(_) | TierOutcome::Empty => {
                    ctx.trace(name, "no transcript");
                    tracing::info!("Extraction tier {} produced no transcript", name);
                }
                TierOutcome::Failed(e) => {
                    ctx.trace(name, format!("failed: {:#}", e));
                    tracing::warn!("Extraction tier {} failed, degrading: {:#}", name, e);
                }
            }
        }
        None
    }
}

impl Default for TierChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the tier cascade for one candidate and post-processes its result
pub struct MultiTierExtractor {
    chain: TierChain,
    static_page: static_page::StaticPageTier,
    program_name: String,
}

impl MultiTierExtractor {
    pub fn new(chain: TierChain, static_page: static_page::StaticPageTier, program_name: &str) -> Self {
        Self {
            chain,
            static_page,
            program_name: program_name.to_string(),
        }
    }

    /// Default cascade: driven session (with in-page API), JSON cache, static page
    pub fn from_config(config: &Config, http: HttpClient, launcher: Arc<dyn SessionLauncher>) -> Self {
        let static_page = static_page::StaticPageTier::new(http, &config.crawl.fallback_url);

        let mut chain = TierChain::new();
        chain.register(Box::new(browser::DrivenSessionTier::new(
            launcher,
            config.browser.clone(),
            config.crawl.api.clone(),
        )));
        chain.register(Box::new(json_cache::JsonCacheTier));
        chain.register(Box::new(static_page.clone()));

        Self::new(chain, static_page, &config.crawl.program_name)
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.chain.tier_names()
    }

    /// Produce an enriched episode; never fails, emptiness is representable
    pub async fn extract(&self, candidate: &EpisodeCandidate, window: &TargetWindow) -> EnrichedEpisode {
        let target = ExtractionTarget::new(candidate, window, &self.program_name);
        let mut ctx = ExtractionContext::new(target);
        if let Some(prefetched) = &candidate.prefetched_media_url {
            ctx.offer_media(prefetched, "listing");
        }

        let winner = self.chain.run(&mut ctx).await;

        if ctx.media_url.is_none() {
            if let Some(src) = ctx.iframe_src.clone() {
                match self.static_page.resolve_iframe(&src).await {
                    Ok(Some(media)) => {
                        ctx.offer_media(&media, "iframe");
                    }
                    Ok(None) => ctx.trace("iframe", "no media url in player page"),
                    Err(e) => {
                        tracing::warn!("Failed to resolve media url from iframe src: {:#}", e);
                        ctx.trace("iframe", format!("failed: {:#}", e));
                    }
                }
            }
        }

        // The static tier only runs when earlier tiers found no transcript
        if ctx.media_url.is_none() && winner.is_some() {
            if let Err(e) = self.static_page.supply_media(&mut ctx).await {
                tracing::warn!("Static media resolution failed: {:#}", e);
                ctx.trace(self.static_page.name(), format!("failed: {:#}", e));
            }
        }

        let mut episode_candidate = candidate.clone();
        let transcript_text = match winner {
            Some((_, text)) => slice_episode(&text, &ctx.target.display_date, &ctx.target.slot, &self.program_name),
            None => {
                if let Some(inferred) = ctx.inferred_date.clone() {
                    if inferred != episode_candidate.date_key {
                        tracing::warn!(
                            "Static page infers date {} (candidate had {})",
                            inferred,
                            episode_candidate.date_key
                        );
                    }
                    episode_candidate.date_key = inferred;
                }
                if ctx.media_url.is_some() {
                    tracing::warn!("No transcript from any tier; media only (partial acquisition)");
                    TRANSCRIPT_UNAVAILABLE.to_string()
                } else {
                    tracing::warn!("No transcript and no media url from any tier");
                    String::new()
                }
            }
        };

        EnrichedEpisode {
            candidate: episode_candidate,
            transcript_text,
            media_url: ctx.media_url.clone().unwrap_or_default(),
            extraction_trace: ctx.trace,
        }
    }
}

/// Collapse runs of whitespace to single spaces
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Longest text after whitespace normalization; ties keep the earliest
pub fn pick_longest_text<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut best = String::new();
    for item in items {
        let cleaned = normalize_ws(item.as_ref());
        if cleaned.len() > best.len() {
            best = cleaned;
        }
    }
    best
}

/// Whether a response looks like an audio resource
pub fn is_audio_response(url: &str, content_type: &str) -> bool {
    let url_lower = url.to_lowercase();
    let path = url_lower.split(['?', '#']).next().unwrap_or("");
    [".mp3", ".m4a", ".aac"].iter().any(|ext| path.ends_with(ext))
        || content_type.to_lowercase().contains("audio")
}

fn date_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"\b(20\d{2})[-./](\d{2})[-./](\d{2})\b").expect("date pattern"),
            Regex::new(r"\b(20\d{2})(\d{2})(\d{2})\b").expect("compact date pattern"),
        ]
    })
}

/// First YYYYMMDD date found in free text
pub fn extract_date_key(text: &str) -> Option<String> {
    date_patterns().iter().find_map(|pattern| {
        pattern
            .captures(text)
            .map(|caps| format!("{}{}{}", &caps[1], &caps[2], &caps[3]))
    })
}

/// Resolve an endpoint path against the page origin
pub fn same_origin_url(page_url: &str, path: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    base.join(path).ok().map(|u| u.to_string())
}
