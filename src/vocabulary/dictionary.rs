//! Definition, example, phonetic and translation lookup across offline and
//! networked sources.
//!
//! Sources are consulted per lookup candidate in a fixed order (lexicon,
//! glossary, remote dictionary). A field is filled by the first source that
//! supplies it and never overwritten. Source failures are logged and treated
//! as "no value".

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::lexicon::{LexicalDatabase, WordClass};
use crate::http::{HttpClient, RetryPolicy};

/// Secondary offline definition source
#[cfg_attr(test, mockall::automock)]
pub trait DefinitionSource: Send + Sync {
    fn definition(&self, word: &str) -> Result<Option<String>>;
}

/// `word<TAB>definition` glossary file
#[derive(Debug, Clone, Default)]
pub struct GlossaryFile {
    definitions: HashMap<String, String>,
}

impl GlossaryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs_err::read_to_string(path)?;
        let glossary = Self::parse(&raw);
        tracing::debug!("Loaded {} glossary entries from {}", glossary.definitions.len(), path.display());
        Ok(glossary)
    }

    pub fn parse(raw: &str) -> Self {
        let definitions = raw
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .filter_map(|line| line.split_once('\t'))
            .map(|(w, d)| (w.trim().to_lowercase(), d.trim().to_string()))
            .filter(|(w, d)| !w.is_empty() && !d.is_empty())
            .collect();
        Self { definitions }
    }
}

impl DefinitionSource for GlossaryFile {
    fn definition(&self, word: &str) -> Result<Option<String>> {
        Ok(self.definitions.get(&word.to_lowercase()).cloned())
    }
}

/// What the networked dictionary returns for one word
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteEntry {
    pub phonetic: String,
    pub definition: String,
    pub example: String,
}

impl RemoteEntry {
    /// Parse the free dictionary API's array-of-entries response
    pub fn from_value(value: &Value) -> Option<Self> {
        let first = value.as_array()?.first()?;

        let phonetic = first
            .get("phonetics")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .map(str::trim)
            .find(|t| !t.is_empty())
            .or_else(|| first.get("phonetic").and_then(Value::as_str).map(str::trim))
            .unwrap_or_default()
            .to_string();

        let sense = first.pointer("/meanings/0/definitions/0");
        let field = |name: &str| {
            sense
                .and_then(|s| s.get(name))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        Some(Self {
            phonetic,
            definition: field("definition"),
            example: field("example"),
        })
    }
}

/// Client for the public free dictionary API
#[derive(Debug, Clone)]
pub struct FreeDictionaryClient {
    http: HttpClient,
    base_url: String,
    delay: Duration,
}

impl FreeDictionaryClient {
    /// Single attempt per word with a short timeout; `delay` is slept after every call
    pub fn new(base_url: &str, timeout: Duration, delay: Duration) -> Result<Self> {
        let http = HttpClient::new(timeout, RetryPolicy::once())?;
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { http, base_url, delay })
    }

    pub async fn lookup(&self, word: &str) -> Result<Option<RemoteEntry>> {
        let url = format!("{}{}", self.base_url, urlencoding::encode(word));
        let result = self.http.get_json(&url).await;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let value = result.with_context(|| format!("Dictionary lookup failed for {:?}", word))?;
        Ok(RemoteEntry::from_value(&value))
    }
}

/// Per-run lookup state: remote cache and call counter
#[derive(Debug, Default)]
pub struct LookupContext {
    cache: HashMap<String, Option<RemoteEntry>>,
    network_calls: usize,
}

impl LookupContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Merged result of the cascade for one lemma
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedEntry {
    pub phonetic: String,
    pub definition: String,
    pub example: String,
    pub translation: String,
    pub derived_forms: BTreeSet<String>,
}

fn fill(slot: &mut String, value: &str) {
    if slot.is_empty() && !value.trim().is_empty() {
        *slot = value.trim().to_string();
    }
}

impl ResolvedEntry {
    /// A definition plus at least one supporting field
    pub fn is_complete(&self) -> bool {
        !self.definition.is_empty()
            && (!self.example.is_empty() || !self.phonetic.is_empty() || !self.translation.is_empty())
    }

    fn wants_remote(&self) -> bool {
        self.phonetic.is_empty() || self.definition.is_empty() || self.example.is_empty()
    }
}

/// Ordered lookup forms: lemma and surface form, lexicon base forms, then suffix stripping
pub fn lookup_candidates(word: &str, lemma: &str, lexicon: Option<&dyn LexicalDatabase>) -> Vec<String> {
    let bases: Vec<String> = [lemma, word]
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut forms = bases.clone();

    if let Some(lexicon) = lexicon {
        for base in &bases {
            for class in WordClass::ALL {
                if let Some(normalized) = lexicon.normalize(base, class) {
                    forms.push(normalized);
                }
            }
        }
    }

    for base in &bases {
        forms.extend(suffix_variants(base));
    }

    let mut seen = std::collections::HashSet::new();
    forms.retain(|f| !f.is_empty() && seen.insert(f.clone()));
    forms
}

fn suffix_variants(w: &str) -> Vec<String> {
    let len = w.chars().count();
    let mut variants = Vec::new();
    if len > 4 {
        if let Some(stem) = w.strip_suffix("ies") {
            variants.push(format!("{}y", stem));
        }
    }
    if len > 3 {
        if let Some(stem) = w.strip_suffix("es") {
            variants.push(stem.to_string());
        }
        if let Some(stem) = w.strip_suffix('s') {
            variants.push(stem.to_string());
        }
    }
    if len > 5 {
        if let Some(stem) = w.strip_suffix("ing") {
            variants.push(stem.to_string());
            variants.push(format!("{}e", stem));
        }
    }
    if len > 4 {
        if let Some(stem) = w.strip_suffix("ed") {
            variants.push(stem.to_string());
            variants.push(format!("{}e", stem));
        }
    }
    variants
}

/// Lexicon, glossary and remote dictionary, consulted in that order
#[derive(Clone, Default)]
pub struct DictionaryCascade {
    lexicon: Option<Arc<dyn LexicalDatabase>>,
    glossary: Option<Arc<dyn DefinitionSource>>,
    remote: Option<FreeDictionaryClient>,
    language: String,
}

impl DictionaryCascade {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Self::default()
        }
    }

    pub fn with_lexicon(mut self, lexicon: Arc<dyn LexicalDatabase>) -> Self {
        self.lexicon = Some(lexicon);
        self
    }

    pub fn with_glossary(mut self, glossary: Arc<dyn DefinitionSource>) -> Self {
        self.glossary = Some(glossary);
        self
    }

    pub fn with_remote(mut self, remote: FreeDictionaryClient) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn lexicon(&self) -> Option<&dyn LexicalDatabase> {
        self.lexicon.as_deref()
    }

    /// Resolve fields for one lemma; never fails
    pub async fn resolve(&self, word: &str, lemma: &str, ctx: &mut LookupContext) -> ResolvedEntry {
        let mut entry = ResolvedEntry::default();

        for candidate in lookup_candidates(word, lemma, self.lexicon()) {
            if let Some(lexicon) = &self.lexicon {
                match lexicon.lookup(&candidate, &self.language) {
                    Ok(Some(info)) => {
                        fill(&mut entry.definition, &info.definition);
                        fill(&mut entry.example, &info.example);
                        fill(&mut entry.translation, &info.translation);
                        if entry.derived_forms.is_empty() {
                            entry.derived_forms = info.derived_forms;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Lexicon lookup failed for {:?}: {:#}", candidate, e),
                }
            }

            if entry.definition.is_empty() {
                if let Some(glossary) = &self.glossary {
                    match glossary.definition(&candidate) {
                        Ok(Some(definition)) => fill(&mut entry.definition, &definition),
                        Ok(None) => {}
                        Err(e) => tracing::debug!("Glossary lookup failed for {:?}: {:#}", candidate, e),
                    }
                }
            }

            if entry.wants_remote() {
                if let Some(remote) = self.remote_entry(&candidate, ctx).await {
                    fill(&mut entry.phonetic, &remote.phonetic);
                    fill(&mut entry.definition, &remote.definition);
                    fill(&mut entry.example, &remote.example);
                }
            }

            if entry.is_complete() {
                break;
            }
        }

        entry
    }

    async fn remote_entry(&self, candidate: &str, ctx: &mut LookupContext) -> Option<RemoteEntry> {
        let remote = self.remote.as_ref()?;
        if let Some(cached) = ctx.cache.get(candidate) {
            return cached.clone();
        }

        ctx.network_calls += 1;
        let entry = match remote.lookup(candidate).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("{:#}", e);
                None
            }
        };
        ctx.cache.insert(candidate.to_string(), entry.clone());
        entry
    }
}
