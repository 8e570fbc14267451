//! Same-origin JSON API calls and the weighted scoring of returned items.

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::session::BrowserSession;
use super::{extract_date_key, normalize_ws, same_origin_url, ExtractionTarget};
use crate::config::ApiConfig;
use crate::episodes::selector::slot_token_patterns;

pub const DATE_MATCH_WEIGHT: u32 = 3;
pub const SLOT_TOKEN_WEIGHT: u32 = 2;
pub const CONTENT_WEIGHT: u32 = 1;

const TITLE_KEYS: &[&str] = &["title", "name", "subject", "program_title"];
const DATE_KEYS: &[&str] = &["date", "broadcast_date", "air_date", "reg_date", "pub_date", "created_at"];
const CONTENT_KEYS: &[&str] = &["script", "transcript", "content", "text", "body"];
const MEDIA_KEYS: &[&str] = &["media_url", "mp3_url", "audio_url", "file_url", "mp3", "audio"];
const ID_KEYS: &[&str] = &["id", "item_id", "itemId", "seq", "idx"];
const PROGRAM_ID_KEYS: &[&str] = &["program_id", "programId", "podcast_id", "podcastId", "id"];
const LIST_KEYS: &[&str] = &["items", "list", "data", "result", "results", "episodes"];

/// The fields of an API item the tiers care about
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiItem {
    pub id: Option<String>,
    pub title: String,
    pub date_key: Option<String>,
    pub content: String,
    pub media_url: String,
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(scalar_string))
}

fn looks_like_media(url: &str) -> bool {
    let lower = url.to_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//"))
        && (lower.contains(".mp3") || lower.contains(".m4a") || lower.contains(".mp4"))
}

/// Script text from a `content` array of per-language entries
fn english_content_entry(value: &Value) -> Option<String> {
    value.as_array()?.iter().find_map(|entry| {
        let lang = entry.get("lan_code").and_then(Value::as_str).unwrap_or("");
        if !lang.eq_ignore_ascii_case("en") {
            return None;
        }
        entry.get("text").and_then(Value::as_str).map(normalize_ws).filter(|t| !t.is_empty())
    })
}

impl ApiItem {
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;

        let content = map
            .get("content")
            .and_then(english_content_entry)
            .or_else(|| {
                CONTENT_KEYS.iter().find_map(|key| {
                    map.get(*key)
                        .and_then(Value::as_str)
                        .map(normalize_ws)
                        .filter(|t| !t.is_empty())
                })
            })
            .unwrap_or_default();

        let media_url = MEDIA_KEYS
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .chain(map.values().filter_map(Value::as_str))
            .map(|s| s.replace("\\/", "/"))
            .find(|s| looks_like_media(s))
            .unwrap_or_default();

        let title = first_string(map, TITLE_KEYS).unwrap_or_default();
        let date_key = first_string(map, DATE_KEYS)
            .and_then(|d| extract_date_key(&d))
            .or_else(|| extract_date_key(&title));

        Some(Self {
            id: first_string(map, ID_KEYS),
            title,
            date_key,
            content,
            media_url,
        })
    }

    pub fn date_matches(&self, target: &ExtractionTarget) -> bool {
        self.date_key.as_deref() == Some(target.date_key.as_str())
    }

    pub fn has_slot_token(&self, target: &ExtractionTarget) -> bool {
        slot_token_patterns(&target.slot)
            .iter()
            .any(|pattern| pattern.is_match(&self.title))
    }

    /// Weighted score: exact date, slot token in title, non-empty content
    pub fn score(&self, target: &ExtractionTarget) -> u32 {
        let mut score = 0;
        if self.date_matches(target) {
            score += DATE_MATCH_WEIGHT;
        }
        if self.has_slot_token(target) {
            score += SLOT_TOKEN_WEIGHT;
        }
        if !self.content.is_empty() {
            score += CONTENT_WEIGHT;
        }
        score
    }
}

/// Every object that looks like a list item, found anywhere in the payload
pub fn collect_items(payload: &Value) -> Vec<ApiItem> {
    let mut items = Vec::new();
    collect_into(payload, &mut items, 0);
    items
}

fn collect_into(value: &Value, items: &mut Vec<ApiItem>, depth: usize) {
    if depth > 6 {
        return;
    }
    match value {
        Value::Array(elements) => {
            for element in elements {
                collect_into(element, items, depth + 1);
            }
        }
        Value::Object(map) => {
            if let Some(item) = ApiItem::from_value(value) {
                if !item.title.is_empty() || !item.content.is_empty() || !item.media_url.is_empty() {
                    items.push(item);
                }
            }
            for key in LIST_KEYS {
                if let Some(nested) = map.get(*key) {
                    if nested.is_array() || nested.is_object() {
                        collect_into(nested, items, depth + 1);
                    }
                }
            }
        }
        _ => {}
    }
}

/// Highest-scoring item with score above `min_score`; ties keep the earliest
pub fn best_item<'a, I>(items: I, target: &ExtractionTarget, min_score: u32) -> Option<(u32, ApiItem)>
where
    I: IntoIterator<Item = &'a ApiItem>,
{
    let mut best: Option<(u32, &ApiItem)> = None;
    for item in items {
        let score = item.score(target);
        if score <= min_score {
            continue;
        }
        if best.map(|(s, _)| score > s).unwrap_or(true) {
            best = Some((score, item));
        }
    }
    best.map(|(score, item)| (score, item.clone()))
}

/// List + detail calls issued from inside the driven session
pub struct InPageApi<'a> {
    config: &'a ApiConfig,
}

impl<'a> InPageApi<'a> {
    pub fn new(config: &'a ApiConfig) -> Self {
        Self { config }
    }

    fn endpoint(&self, target: &ExtractionTarget, template: &str, replacements: &[(&str, &str)]) -> Result<String> {
        let mut path = template.to_string();
        for (key, value) in replacements {
            path = path.replace(key, &urlencoding::encode(value));
        }
        same_origin_url(&target.page_url, &path)
            .with_context(|| format!("Cannot resolve {} against {}", path, target.page_url))
    }

    /// Program id discovered from the metadata call, else the source id
    async fn discover_program_id(&self, session: &mut dyn BrowserSession, target: &ExtractionTarget) -> String {
        let url = match self.endpoint(target, &self.config.metadata_path, &[("{source_id}", target.source_id.as_str())]) {
            Ok(url) => url,
            Err(_) => return target.source_id.clone(),
        };
        match session.fetch_json(&url).await {
            Ok(meta) => {
                let found = meta
                    .as_object()
                    .and_then(|map| first_string(map, PROGRAM_ID_KEYS))
                    .or_else(|| {
                        meta.get("data")
                            .and_then(Value::as_object)
                            .and_then(|map| first_string(map, PROGRAM_ID_KEYS))
                    });
                found.unwrap_or_else(|| target.source_id.clone())
            }
            Err(e) => {
                tracing::debug!("Metadata call failed ({}), using source id: {:#}", url, e);
                target.source_id.clone()
            }
        }
    }

    /// Best item for the target, enriched from the detail endpoint when needed
    pub async fn fetch_best_item(
        &self,
        session: &mut dyn BrowserSession,
        target: &ExtractionTarget,
    ) -> Result<Option<(u32, ApiItem)>> {
        let program_id = self.discover_program_id(session, target).await;

        let list_url = self.endpoint(
            target,
            &self.config.list_path,
            &[("{program_id}", program_id.as_str()), ("{date}", target.date_key.as_str())],
        )?;
        let list = session.fetch_json(&list_url).await?;
        let items = collect_items(&list);
        tracing::debug!("In-page API list returned {} items", items.len());

        let Some((score, mut item)) = best_item(&items, target, 0) else {
            return Ok(None);
        };

        if item.content.is_empty() || item.media_url.is_empty() {
            if let Some(id) = item.id.clone() {
                let detail_url = self.endpoint(target, &self.config.detail_path, &[("{item_id}", id.as_str())])?;
                match session.fetch_json(&detail_url).await {
                    Ok(detail) => {
                        let detail_value = detail.get("data").filter(|d| d.is_object()).unwrap_or(&detail);
                        if let Some(detail_item) = ApiItem::from_value(detail_value) {
                            if item.content.is_empty() {
                                item.content = detail_item.content;
                            }
                            if item.media_url.is_empty() {
                                item.media_url = detail_item.media_url;
                            }
                        }
                    }
                    Err(e) => tracing::debug!("Detail call failed ({}): {:#}", detail_url, e),
                }
            }
        }

        Ok(Some((score, item)))
    }
}
