//! Tier 2: rescan the JSON payloads intercepted during the driven session.

use async_trait::async_trait;

use super::api::{best_item, collect_items, CONTENT_WEIGHT};
use super::{ExtractionContext, ExtractionTier, TierOutcome};

/// Picks the best-scoring item among intercepted JSON payloads
pub struct JsonCacheTier;

#[async_trait]
impl ExtractionTier for JsonCacheTier {
    fn name(&self) -> &'static str {
        "json-cache"
    }

    async fn extract(&self, ctx: &mut ExtractionContext) -> TierOutcome {
        if ctx.json_payloads.is_empty() {
            return TierOutcome::Empty;
        }

        let items: Vec<_> = ctx.json_payloads.iter().flat_map(collect_items).collect();
        tracing::debug!(
            "Scanning {} items from {} cached payloads",
            items.len(),
            ctx.json_payloads.len()
        );

        // Content alone is not enough; the item must carry the date or slot
        let Some((score, item)) = best_item(&items, &ctx.target, CONTENT_WEIGHT) else {
            return TierOutcome::Empty;
        };

        tracing::info!("Cached JSON item selected (score {}): {}", score, item.title);
        ctx.offer_media(&item.media_url, self.name());
        if item.content.is_empty() {
            TierOutcome::Empty
        } else {
            TierOutcome::Transcript(item.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::ExtractionTarget;
    use serde_json::json;

    fn ctx_with(payloads: Vec<serde_json::Value>) -> ExtractionContext {
        let mut ctx = ExtractionContext::new(ExtractionTarget {
            date_key: "20240101".to_string(),
            display_date: "2024-01-01".to_string(),
            slot: "21:55".to_string(),
            program_name: "Arirang News".to_string(),
            source_id: "668".to_string(),
            page_url: "https://www.example.com/radio/132/podcast/668".to_string(),
        });
        ctx.json_payloads = payloads;
        ctx
    }

    #[tokio::test]
    async fn test_highest_score_wins_across_payloads() {
        let mut ctx = ctx_with(vec![
            json!({"items": [{"title": "07:00 Morning", "date": "2024-01-01", "script": "morning"}]}),
            json!({"data": [
                {"title": "21:55 Arirang News", "date": "2024-01-01", "script": "evening",
                 "audio_url": "https://cdn.example.com/e.mp3"}
            ]}),
        ]);

        let outcome = JsonCacheTier.extract(&mut ctx).await;
        assert!(matches!(outcome, TierOutcome::Transcript(ref t) if t == "evening"));
        assert_eq!(ctx.media_url.as_deref(), Some("https://cdn.example.com/e.mp3"));
    }

    #[tokio::test]
    async fn test_content_without_date_or_slot_is_ignored() {
        let mut ctx = ctx_with(vec![json!({"list": [{"title": "Other show", "script": "text"}]})]);
        assert!(matches!(JsonCacheTier.extract(&mut ctx).await, TierOutcome::Empty));
    }

    #[tokio::test]
    async fn test_no_payloads_is_empty() {
        let mut ctx = ctx_with(Vec::new());
        assert!(matches!(JsonCacheTier.extract(&mut ctx).await, TierOutcome::Empty));
    }
}
