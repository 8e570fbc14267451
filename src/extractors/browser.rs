//! Tier 1: driven browser session, with the in-page API calls of tier 1a.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::api::InPageApi;
use super::session::{BrowserSession, SessionLauncher};
use super::{is_audio_response, pick_longest_text, ExtractionContext, ExtractionTarget, ExtractionTier, TierOutcome};
use crate::config::{ApiConfig, BrowserConfig};
use crate::episodes::selector::slot_token_patterns;
use crate::PipelineError;

/// Containers that may hold one row of the episode list
const ROW_SELECTORS: &[&str] = &[
    "li",
    "article",
    ".item",
    ".list-item",
    ".podcast-item",
    "[class*='podcast']",
    "[class*='episode']",
];

/// Panels opened by selecting a row; their text takes precedence
const DETAIL_PANEL_SELECTORS: &[&str] = &[
    "[class*='detail'] [class*='script']",
    "[class*='Detail'] [class*='Script']",
    "[class*='detail'] [class*='content']",
];

const CONTENT_SELECTORS: &[&str] = &[
    "[class*='script']",
    "[class*='Script']",
    "[class*='content']",
    "[class*='transcript']",
    "article p",
];

const PLAY_SELECTORS: &[&str] = &[
    "button[class*='play']",
    ".play-btn",
    "button[aria-label*='play']",
    "[class*='PlayButton']",
];

const IFRAME_SELECTOR: &str = "iframe#aodChild, iframe.aodContent, iframe[src*='kollus']";

/// URL fragments marking a JSON response as worth keeping for tier 2
const JSON_URL_KEYWORDS: &[&str] = &["api", "podcast", "episode"];

/// Drives the podcast page in a browser session
pub struct DrivenSessionTier {
    launcher: Arc<dyn SessionLauncher>,
    browser: BrowserConfig,
    api: ApiConfig,
}

impl DrivenSessionTier {
    pub fn new(launcher: Arc<dyn SessionLauncher>, browser: BrowserConfig, api: ApiConfig) -> Self {
        Self { launcher, browser, api }
    }

    async fn drive(&self, session: &mut dyn BrowserSession, ctx: &mut ExtractionContext) -> TierOutcome {
        let page_url = ctx.target.page_url.clone();
        if let Err(e) = session.navigate(&page_url).await {
            return TierOutcome::Failed(e.context(format!("Failed to open {}", page_url)));
        }
        absorb_responses(session, ctx);

        if let Some((selector, index)) = find_target_row(session, &ctx.target).await {
            match session.click(&selector, index).await {
                Ok(true) => {
                    ctx.trace(self.name(), format!("selected row {}[{}]", selector, index));
                    session.wait(Duration::from_millis(self.browser.settle_ms)).await;
                }
                Ok(false) => tracing::debug!("Row {}[{}] vanished before click", selector, index),
                Err(e) => tracing::debug!("Row click failed on {}[{}]: {:#}", selector, index, e),
            }
        } else {
            tracing::warn!(
                "No list row matched {} {}; reading the page as loaded",
                ctx.target.display_date,
                ctx.target.slot
            );
        }

        let detail_text = longest_across(session, DETAIL_PANEL_SELECTORS).await;

        match session.attribute(IFRAME_SELECTOR, "src").await {
            Ok(Some(src)) if !src.trim().is_empty() => {
                tracing::debug!("Player iframe src: {}", src);
                ctx.iframe_src = Some(src.trim().to_string());
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Iframe lookup failed: {:#}", e),
        }

        self.trigger_playback(session).await;
        absorb_responses(session, ctx);

        let mut text = if detail_text.is_empty() {
            longest_across(session, CONTENT_SELECTORS).await
        } else {
            tracing::info!("Using detail panel text ({} chars)", detail_text.chars().count());
            detail_text
        };

        if text.is_empty() || ctx.media_url.is_none() {
            match InPageApi::new(&self.api).fetch_best_item(session, &ctx.target).await {
                Ok(Some((score, item))) => {
                    tracing::info!("In-page API item selected (score {}): {}", score, item.title);
                    ctx.trace("api", format!("item {:?} score {}", item.title, score));
                    if text.is_empty() {
                        text = item.content;
                    }
                    ctx.offer_media(&item.media_url, "api");
                }
                Ok(None) => ctx.trace("api", "no item above threshold"),
                Err(e) => {
                    tracing::warn!("In-page API calls failed: {:#}", e);
                    ctx.trace("api", format!("failed: {:#}", e));
                }
            }
            absorb_responses(session, ctx);
        }

        if text.is_empty() {
            TierOutcome::Empty
        } else {
            TierOutcome::Transcript(text)
        }
    }

    /// Best-effort: click the first play control that exists
    async fn trigger_playback(&self, session: &mut dyn BrowserSession) {
        for selector in PLAY_SELECTORS {
            match session.click(selector, 0).await {
                Ok(true) => {
                    tracing::debug!("Triggered playback via {}", selector);
                    session.wait(Duration::from_millis(self.browser.playback_wait_ms)).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => tracing::debug!("Play control {} failed: {:#}", selector, e),
            }
        }
    }
}

#[async_trait]
impl ExtractionTier for DrivenSessionTier {
    fn name(&self) -> &'static str {
        "driven-session"
    }

    async fn extract(&self, ctx: &mut ExtractionContext) -> TierOutcome {
        if !self.launcher.is_available() {
            return TierOutcome::Failed(
                PipelineError::AutomationUnavailable("no browser session support".to_string()).into(),
            );
        }

        let mut session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => return TierOutcome::Failed(e),
        };

        let outcome = self.drive(session.as_mut(), ctx).await;

        if let Err(e) = session.close().await {
            tracing::debug!("Browser session close failed: {:#}", e);
        }
        outcome
    }
}

/// Date spellings a list row may use for the target day
fn date_tokens(target: &ExtractionTarget) -> Vec<String> {
    let d = &target.date_key;
    let (Some(year), Some(month), Some(day)) = (d.get(..4), d.get(4..6), d.get(6..8)) else {
        return Vec::new();
    };
    let mut tokens = vec![
        format!("{}-{}-{}", year, month, day),
        format!("{}.{}.{}", year, month, day),
        format!("{}/{}/{}", month, day, year),
        format!("{}/{}/{}", day, month, year),
    ];
    tokens.dedup();
    tokens
}

/// Time spellings: the slot tokens plus the exact 12-hour form ("9:55 PM")
fn time_patterns(slot: &str) -> Vec<Regex> {
    let mut patterns = slot_token_patterns(slot);
    if let Some(hhmm) = crate::window::slot_hhmm(slot) {
        let (h, m) = hhmm.split_at(2);
        let hour: u32 = h.parse().unwrap_or(0);
        let (twelve, meridiem) = match hour {
            0 => (12, "AM"),
            1..=11 => (hour, "AM"),
            12 => (12, "PM"),
            _ => (hour - 12, "PM"),
        };
        if let Ok(re) = Regex::new(&format!(r"(?i)\b{}:{}\s*{}\b", twelve, m, meridiem)) {
            patterns.push(re);
        }
    }
    patterns
}

/// Row to click: first date+time match, else the longest date-only match
async fn find_target_row(session: &mut dyn BrowserSession, target: &ExtractionTarget) -> Option<(String, usize)> {
    let dates = date_tokens(target);
    let times = time_patterns(&target.slot);
    let mut date_only: Option<(String, usize, usize)> = None;

    for selector in ROW_SELECTORS {
        let texts = match session.query_texts(selector).await {
            Ok(texts) => texts,
            Err(e) => {
                tracing::debug!("Row query failed for {}: {:#}", selector, e);
                continue;
            }
        };

        for (index, text) in texts.iter().enumerate() {
            if !dates.iter().any(|token| text.contains(token.as_str())) {
                continue;
            }
            if times.iter().any(|re| re.is_match(text)) {
                tracing::info!("List row matched date and time: {}[{}]", selector, index);
                return Some((selector.to_string(), index));
            }
            let len = text.trim().len();
            if date_only.as_ref().map(|(_, _, best)| len > *best).unwrap_or(true) {
                date_only = Some((selector.to_string(), index, len));
            }
        }
    }

    date_only.map(|(selector, index, _)| {
        tracing::warn!("List row matched date only: {}[{}]", selector, index);
        (selector, index)
    })
}

/// Longest normalized text across selectors; broken selectors are skipped
async fn longest_across(session: &mut dyn BrowserSession, selectors: &[&str]) -> String {
    let mut per_selector = Vec::with_capacity(selectors.len());
    for selector in selectors {
        match session.query_texts(selector).await {
            Ok(texts) => per_selector.push(pick_longest_text(texts)),
            Err(e) => tracing::debug!("Content query failed for {}: {:#}", selector, e),
        }
    }
    pick_longest_text(per_selector)
}

/// Move buffered network events into the context
fn absorb_responses(session: &mut dyn BrowserSession, ctx: &mut ExtractionContext) {
    for event in session.drain_responses() {
        if is_audio_response(&event.url, &event.content_type) {
            ctx.offer_media(&event.url, "network");
            continue;
        }
        let Some(json) = event.json else {
            continue;
        };

        let url = event.url.to_lowercase();
        let relevant = JSON_URL_KEYWORDS.iter().any(|k| url.contains(k))
            || (!ctx.target.source_id.is_empty() && url.contains(&ctx.target.source_id));
        if !relevant {
            continue;
        }

        if let Value::Object(map) = &json {
            for value in map.values().filter_map(Value::as_str) {
                let candidate = value.replace("\\/", "/");
                if candidate.to_lowercase().contains(".mp3") && candidate.starts_with("http") {
                    ctx.offer_media(&candidate, "network-json");
                }
            }
        }
        ctx.json_payloads.push(json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::session::testing::{audio_response, json_response, Script, ScriptedLauncher};
    use crate::extractors::session::UnavailableLauncher;
    use serde_json::json;

    const PAGE: &str = "https://www.example.com/radio/132/podcast/668?lang=en";

    fn target() -> ExtractionTarget {
        ExtractionTarget {
            date_key: "20240101".to_string(),
            display_date: "2024-01-01".to_string(),
            slot: "21:55".to_string(),
            program_name: "Arirang News".to_string(),
            source_id: "668".to_string(),
            page_url: PAGE.to_string(),
        }
    }

    fn texts(pairs: &[(&str, &[&str])]) -> std::collections::HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn tier(launcher: Arc<dyn SessionLauncher>) -> DrivenSessionTier {
        DrivenSessionTier::new(launcher, BrowserConfig::default(), ApiConfig::default())
    }

    #[tokio::test]
    async fn test_selects_row_and_reads_script() {
        let script = Script {
            texts: texts(&[("li", &["2024-01-01 07:00 Morning", "2024-01-01 21:55 Arirang News"])]),
            texts_after_click: texts(&[(
                "[class*='script']",
                &["short", "Welcome to   Arirang News. Inflation concerns grew."],
            )]),
            navigation_responses: vec![audio_response("https://cdn.example.com/arirang/20240101/ep.mp3")],
            ..Default::default()
        };
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let journal = launcher.journal.clone();

        let mut ctx = ExtractionContext::new(target());
        let outcome = tier(launcher).extract(&mut ctx).await;

        match outcome {
            TierOutcome::Transcript(text) => {
                assert_eq!(text, "Welcome to Arirang News. Inflation concerns grew.")
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(ctx.media_url.as_deref(), Some("https://cdn.example.com/arirang/20240101/ep.mp3"));

        let journal = journal.lock().unwrap();
        assert_eq!(journal.clicks[0], ("li".to_string(), 1));
        assert!(journal.closed);
        // Media already known and text found: no API calls
        assert!(journal.fetches.is_empty());
    }

    #[tokio::test]
    async fn test_date_only_row_is_weaker_fallback() {
        let script = Script {
            texts: texts(&[
                ("li", &["2024-01-01 Morning", "2024-01-01 Evening edition with news"]),
                ("article", &["2023-12-31 21:55 Arirang News"]),
            ]),
            ..Default::default()
        };
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let journal = launcher.journal.clone();

        let mut ctx = ExtractionContext::new(target());
        let outcome = tier(launcher).extract(&mut ctx).await;
        assert!(matches!(outcome, TierOutcome::Empty));
        assert_eq!(journal.lock().unwrap().clicks[0], ("li".to_string(), 1));
    }

    #[tokio::test]
    async fn test_in_page_api_supplies_transcript_and_media() {
        let list_url = "https://www.example.com/api/v1/radio/podcast/132/list?date=20240101";
        let mut api = std::collections::HashMap::new();
        api.insert(
            "https://www.example.com/api/v1/radio/podcast/668".to_string(),
            json!({"data": {"program_id": 132}}),
        );
        api.insert(
            list_url.to_string(),
            json!({"data": {"list": [
                {"id": 1, "title": "07:00 Morning", "date": "2024-01-01", "script": "morning text"},
                {"id": 2, "title": "21:55 Arirang News", "date": "2024-01-01",
                 "script": "Evening script.", "mp3_url": "https://cdn.example.com/b.mp3"}
            ]}}),
        );
        let script = Script {
            api,
            ..Default::default()
        };
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let journal = launcher.journal.clone();

        let mut ctx = ExtractionContext::new(target());
        let outcome = tier(launcher).extract(&mut ctx).await;

        match outcome {
            TierOutcome::Transcript(text) => assert_eq!(text, "Evening script."),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(ctx.media_url.as_deref(), Some("https://cdn.example.com/b.mp3"));
        assert_eq!(journal.lock().unwrap().fetches.len(), 2);
        // The intercepted API responses are kept for the JSON cache tier
        assert_eq!(ctx.json_payloads.len(), 2);
    }

    #[tokio::test]
    async fn test_broken_selectors_and_iframe() {
        let mut attributes = std::collections::HashMap::new();
        attributes.insert(
            (IFRAME_SELECTOR.to_string(), "src".to_string()),
            "https://v.kr.kollus.com/abc".to_string(),
        );
        let script = Script {
            texts: texts(&[("[class*='content']", &["Body text from the page."])]),
            attributes,
            broken_selectors: vec!["li".to_string(), "[class*='script']".to_string()],
            navigation_responses: vec![json_response(
                "https://www.example.com/api/v1/radio/podcast/668",
                json!({"mp3": "https:\\/\\/cdn.example.com\\/c.mp3"}),
            )],
            ..Default::default()
        };
        let launcher = Arc::new(ScriptedLauncher::new(script));

        let mut ctx = ExtractionContext::new(target());
        let outcome = tier(launcher).extract(&mut ctx).await;
        assert!(matches!(outcome, TierOutcome::Transcript(ref t) if t == "Body text from the page."));
        assert_eq!(ctx.iframe_src.as_deref(), Some("https://v.kr.kollus.com/abc"));
        assert_eq!(ctx.media_url.as_deref(), Some("https://cdn.example.com/c.mp3"));
    }

    #[tokio::test]
    async fn test_navigation_failure_closes_session() {
        let script = Script {
            fail_navigation: true,
            ..Default::default()
        };
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let journal = launcher.journal.clone();

        let mut ctx = ExtractionContext::new(target());
        let outcome = tier(launcher).extract(&mut ctx).await;
        assert!(matches!(outcome, TierOutcome::Failed(_)));
        assert!(journal.lock().unwrap().closed);
    }

    #[tokio::test]
    async fn test_unavailable_automation_fails_tier() {
        let mut ctx = ExtractionContext::new(target());
        let outcome = tier(Arc::new(UnavailableLauncher::new("none"))).extract(&mut ctx).await;
        match outcome {
            TierOutcome::Failed(e) => assert!(matches!(
                e.downcast_ref::<PipelineError>(),
                Some(PipelineError::AutomationUnavailable(_))
            )),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_time_patterns_cover_listing_styles() {
        let patterns = time_patterns("21:55");
        for text in ["21:55", "2155", "10 PM", "10PM", "9:55 PM", "21.55"] {
            assert!(patterns.iter().any(|p| p.is_match(text)), "{}", text);
        }
        assert!(!patterns.iter().any(|p| p.is_match("07:00")));
    }
}
