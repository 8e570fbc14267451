//! Tier 3: resolve media from a static player page over plain HTTP.
//!
//! This tier never yields a transcript. It supplies a media URL and, when the
//! page embeds an upload path, the broadcast date inferred from it.

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::{ExtractionContext, ExtractionTier, TierOutcome};
use crate::http::HttpClient;

/// What the static page revealed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StaticResolution {
    pub page_url: String,
    pub media_url: Option<String>,
    /// YYYYMMDD from the upload key or media path
    pub inferred_date: Option<String>,
}

struct Patterns {
    media: [Regex; 3],
    upload_key: Regex,
    key_date: Regex,
    path_date: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        media: [
            Regex::new(r#"(?i)"media_url"\s*:\s*"([^"]+)""#).expect("media_url pattern"),
            Regex::new(r#"(?i)'media_url'\s*:\s*'([^']+)'"#).expect("media_url pattern"),
            Regex::new(r#"(?i)https?://[^"'\s]+\.(?:mp3|mp4)(?:\?[^"'\s]*)?"#).expect("media file pattern"),
        ],
        upload_key: Regex::new(r#"(?i)"upload_file_key"\s*:\s*"([^"]+)""#).expect("upload key pattern"),
        key_date: Regex::new(r"(20\d{6})").expect("key date pattern"),
        path_date: Regex::new(r"/(20\d{6})/").expect("path date pattern"),
    })
}

/// First media URL in a player page, JSON-like keys before bare file URLs
pub fn extract_media_url(raw_html: &str) -> Option<String> {
    let text = html_escape::decode_html_entities(raw_html);
    patterns().media.iter().find_map(|pattern| {
        pattern.captures(&text).map(|caps| {
            let found = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str()).unwrap_or("");
            found.replace("\\/", "/")
        })
    })
}

/// Broadcast date from the upload key, else from a `/YYYYMMDD/` media path segment
pub fn infer_upload_date(raw_html: &str, media_url: Option<&str>) -> Option<String> {
    let p = patterns();
    let text = html_escape::decode_html_entities(raw_html);
    p.upload_key
        .captures(&text)
        .and_then(|caps| p.key_date.captures(&caps[1]).map(|d| d[1].to_string()))
        .or_else(|| {
            media_url
                .and_then(|url| p.path_date.captures(url))
                .map(|d| d[1].to_string())
        })
}

/// Fetches the configured fallback page and pattern-searches it
#[derive(Debug, Clone)]
pub struct StaticPageTier {
    http: HttpClient,
    fallback_url: String,
}

impl StaticPageTier {
    pub fn new(http: HttpClient, fallback_url: &str) -> Self {
        Self {
            http,
            fallback_url: fallback_url.to_string(),
        }
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    pub async fn resolve(&self) -> Result<StaticResolution> {
        let raw = self.http.get_text(&self.fallback_url).await?;
        let media_url = extract_media_url(&raw);
        let inferred_date = infer_upload_date(&raw, media_url.as_deref());

        tracing::info!(
            "Static page resolution: media={} date={}",
            media_url.as_deref().unwrap_or("-"),
            inferred_date.as_deref().unwrap_or("-")
        );

        Ok(StaticResolution {
            page_url: self.fallback_url.clone(),
            media_url,
            inferred_date,
        })
    }

    /// Media URL from a player iframe page
    pub async fn resolve_iframe(&self, src: &str) -> Result<Option<String>> {
        let raw = self.http.get_text(src).await?;
        Ok(extract_media_url(&raw))
    }

    /// Fill in media and inferred date without touching the transcript
    pub async fn supply_media(&self, ctx: &mut ExtractionContext) -> Result<()> {
        let resolution = self.resolve().await?;
        if let Some(media) = &resolution.media_url {
            ctx.offer_media(media, self.name());
        }
        if ctx.inferred_date.is_none() {
            ctx.inferred_date = resolution.inferred_date;
        }
        Ok(())
    }
}

#[async_trait]
impl ExtractionTier for StaticPageTier {
    fn name(&self) -> &'static str {
        "static-page"
    }

    async fn extract(&self, ctx: &mut ExtractionContext) -> TierOutcome {
        if ctx.media_url.is_some() {
            ctx.trace(self.name(), "media already known");
            return TierOutcome::Empty;
        }
        match self.supply_media(ctx).await {
            Ok(()) => TierOutcome::Empty,
            Err(e) => TierOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::ExtractionTarget;
    use crate::http::RetryPolicy;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAYER_PAGE: &str = r#"<html><script>
        var data = {&quot;upload_file_key&quot;:&quot;arirang/20240101_2155_news.mp4&quot;,
        &quot;media_url&quot;:&quot;https:\/\/cdn.example.com\/arirang\/20240101\/news.mp3?token=1&quot;};
        </script></html>"#;

    fn tier(url: &str) -> StaticPageTier {
        let http = HttpClient::new(Duration::from_secs(5), RetryPolicy::once()).unwrap();
        StaticPageTier::new(http, url)
    }

    fn ctx() -> ExtractionContext {
        ExtractionContext::new(ExtractionTarget {
            date_key: "20240102".to_string(),
            display_date: "2024-01-02".to_string(),
            slot: "21:55".to_string(),
            program_name: "Arirang News".to_string(),
            source_id: "668".to_string(),
            page_url: "https://www.example.com/radio".to_string(),
        })
    }

    #[test]
    fn test_media_url_patterns() {
        assert_eq!(
            extract_media_url(PLAYER_PAGE).as_deref(),
            Some("https://cdn.example.com/arirang/20240101/news.mp3?token=1")
        );
        assert_eq!(
            extract_media_url("<a href='https://cdn.example.com/x/ep.mp3'>play</a>").as_deref(),
            Some("https://cdn.example.com/x/ep.mp3")
        );
        assert_eq!(extract_media_url("<html>nothing</html>"), None);
    }

    #[test]
    fn test_upload_date_inference() {
        assert_eq!(infer_upload_date(PLAYER_PAGE, None).as_deref(), Some("20240101"));
        assert_eq!(
            infer_upload_date("", Some("https://cdn.example.com/arirang/20231230/a.mp3")).as_deref(),
            Some("20231230")
        );
        assert_eq!(infer_upload_date("", None), None);
    }

    #[tokio::test]
    async fn test_tier_supplies_media_and_date_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/player"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PLAYER_PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctx = ctx();
        let outcome = tier(&format!("{}/player", server.uri())).extract(&mut ctx).await;

        assert!(matches!(outcome, TierOutcome::Empty));
        assert_eq!(
            ctx.media_url.as_deref(),
            Some("https://cdn.example.com/arirang/20240101/news.mp3?token=1")
        );
        assert_eq!(ctx.inferred_date.as_deref(), Some("20240101"));
    }

    #[tokio::test]
    async fn test_tier_skips_fetch_when_media_known() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut ctx = ctx();
        ctx.offer_media("https://cdn.example.com/known.mp3", "network");
        let outcome = tier(&format!("{}/player", server.uri())).extract(&mut ctx).await;
        assert!(matches!(outcome, TierOutcome::Empty));
    }

    #[tokio::test]
    async fn test_unreachable_page_fails_tier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut ctx = ctx();
        let outcome = tier(&format!("{}/player", server.uri())).extract(&mut ctx).await;
        assert!(matches!(outcome, TierOutcome::Failed(_)));
        assert!(ctx.media_url.is_none());
    }
}
