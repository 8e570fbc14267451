//! Vocabulary resolution: transcript text in, ranked and dictionary-enriched
//! study items out.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, VocabularyConfig};

pub mod assembler;
pub mod curated;
pub mod dictionary;
pub mod lexicon;
pub mod rarity;
pub mod sanitize;
pub mod tokenizer;

pub use assembler::{load_dataset, rank, save_dataset};
pub use dictionary::{DictionaryCascade, FreeDictionaryClient, GlossaryFile, LookupContext};
pub use lexicon::{JsonLexicon, LexicalDatabase};
pub use rarity::{CefrBand, FrequencySource, FrequencyTable};
pub use sanitize::sanitize_transcript;
pub use tokenizer::{Candidate, SyntacticTagger};

/// One study item, keyed by lemma
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyItem {
    /// Surface form of the first occurrence
    pub word: String,
    pub lemma: String,
    #[serde(default)]
    pub part_of_speech: String,
    #[serde(default)]
    pub pos_label: String,
    #[serde(default)]
    pub phonetic: String,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub example_sentence: String,
    #[serde(default)]
    pub context_sentence: String,
    pub difficulty_band: CefrBand,
    pub rarity_score: f64,
    #[serde(default)]
    pub is_curated_hard_word: bool,
    #[serde(default)]
    pub derived_forms: BTreeSet<String>,
}

/// The document persisted per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyDataset {
    pub created_at: String,
    pub count: usize,
    pub items: Vec<VocabularyItem>,
}

impl VocabularyDataset {
    pub fn new(items: Vec<VocabularyItem>, created_at: String) -> Self {
        Self {
            created_at,
            count: items.len(),
            items,
        }
    }
}

/// Localized label for the coarse NOUN/VERB/ADJ/ADV tags
pub fn pos_label(pos: &str, language: &str) -> &'static str {
    match (language, pos) {
        ("ko", "NOUN") => "명사",
        ("ko", "VERB") => "동사",
        ("ko", "ADJ") => "형용사",
        ("ko", "ADV") => "부사",
        ("en", "NOUN") => "noun",
        ("en", "VERB") => "verb",
        ("en", "ADJ") => "adjective",
        ("en", "ADV") => "adverb",
        _ => "",
    }
}

/// Tokenize, score, filter, rank and enrich one transcript
pub struct VocabularyAnalyzer {
    min_word_length: usize,
    top_n_words: usize,
    language: String,
    tagger: Option<Arc<dyn SyntacticTagger>>,
    frequency: Option<Arc<dyn FrequencySource>>,
    dictionary: DictionaryCascade,
}

impl VocabularyAnalyzer {
    pub fn new(settings: &VocabularyConfig) -> Self {
        Self {
            min_word_length: settings.min_word_length,
            top_n_words: settings.top_n_words,
            language: settings.translation_language.clone(),
            tagger: None,
            frequency: None,
            dictionary: DictionaryCascade::new(&settings.translation_language),
        }
    }

    /// Analyzer with every offline source the config points at.
    ///
    /// A source that is not configured or fails to load is logged and left
    /// out; the analyzer then uses the documented fallback for it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = &config.vocabulary;
        let mut analyzer = Self::new(settings);

        tracing::warn!("No syntactic tagger available; using regex tokenization");

        match &settings.frequency_path {
            Some(path) => match FrequencyTable::load(path) {
                Ok(table) => analyzer = analyzer.with_frequency_source(Arc::new(table)),
                Err(e) => tracing::warn!("Frequency table unavailable, using length heuristic: {:#}", e),
            },
            None => tracing::warn!("No frequency table configured; using length heuristic"),
        }

        let mut dictionary = DictionaryCascade::new(&settings.translation_language);
        match &settings.lexicon_path {
            Some(path) => match JsonLexicon::load(path) {
                Ok(lexicon) => dictionary = dictionary.with_lexicon(Arc::new(lexicon)),
                Err(e) => tracing::warn!("Offline lexicon unavailable: {:#}", e),
            },
            None => tracing::warn!("No offline lexicon configured; translations will be empty"),
        }
        if let Some(path) = &settings.glossary_path {
            match GlossaryFile::load(path) {
                Ok(glossary) => dictionary = dictionary.with_glossary(Arc::new(glossary)),
                Err(e) => tracing::warn!("Glossary unavailable: {:#}", e),
            }
        }
        if settings.remote_enabled {
            dictionary = dictionary.with_remote(FreeDictionaryClient::new(
                &settings.remote_dictionary_url,
                Duration::from_secs(settings.remote_timeout_secs),
                Duration::from_millis(settings.remote_delay_ms),
            )?);
        }

        Ok(analyzer.with_dictionary(dictionary))
    }

    pub fn with_tagger(mut self, tagger: Arc<dyn SyntacticTagger>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn with_frequency_source(mut self, source: Arc<dyn FrequencySource>) -> Self {
        self.frequency = Some(source);
        self
    }

    pub fn with_dictionary(mut self, dictionary: DictionaryCascade) -> Self {
        self.dictionary = dictionary;
        self
    }

    pub async fn analyze(&self, transcript: &str) -> Vec<VocabularyItem> {
        let text = sanitize_transcript(transcript);
        if text.is_empty() {
            tracing::warn!("Transcript is empty after sanitization; vocabulary dataset will be empty");
            return Vec::new();
        }

        let candidates = tokenizer::extract_candidates(&text, self.tagger.as_deref(), self.min_word_length);
        let total = candidates.len();

        let scored: Vec<VocabularyItem> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let score = rarity::rarity_score(&candidate.lemma, self.frequency.as_deref());
                rarity::is_rare(score).then(|| self.item_for(candidate, score))
            })
            .collect();
        let retained = scored.len();

        let mut items = rank(scored, self.top_n_words);
        let mut ctx = LookupContext::new();
        for item in &mut items {
            let entry = self.dictionary.resolve(&item.word, &item.lemma, &mut ctx).await;
            item.phonetic = entry.phonetic;
            item.definition = entry.definition;
            item.example_sentence = entry.example;
            item.translation = entry.translation;
            item.derived_forms = entry.derived_forms;
        }

        tracing::info!(
            "Vocabulary: {} unique lemmas, {} rare, {} kept, {} dictionary calls",
            total,
            retained,
            items.len(),
            ctx.network_calls()
        );
        items
    }

    fn item_for(&self, candidate: Candidate, score: f64) -> VocabularyItem {
        VocabularyItem {
            pos_label: pos_label(&candidate.pos, &self.language).to_string(),
            is_curated_hard_word: curated::is_curated_hard_word(&candidate.lemma),
            difficulty_band: CefrBand::from_score(score),
            rarity_score: score,
            word: candidate.word,
            lemma: candidate.lemma,
            part_of_speech: candidate.pos,
            context_sentence: candidate.context_sentence,
            ..VocabularyItem::default()
        }
    }
}
