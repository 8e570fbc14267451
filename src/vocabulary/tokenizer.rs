//! Lemma candidates from transcript text.

use anyhow::Result;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// A token as reported by a syntactic tagger
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedToken {
    pub text: String,
    pub lemma: String,
    /// Coarse universal tag (NOUN, VERB, ADJ, ADV, PROPN, ...)
    pub pos: String,
    pub is_alpha: bool,
    pub is_stop: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaggedSentence {
    pub text: String,
    pub tokens: Vec<TaggedToken>,
}

/// Sentence segmentation, lemmatization and part-of-speech tagging
pub trait SyntacticTagger: Send + Sync {
    fn name(&self) -> &str;

    fn tag(&self, text: &str) -> Result<Vec<TaggedSentence>>;
}

/// One occurrence of a potential vocabulary item
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Surface form as written
    pub word: String,
    pub lemma: String,
    /// Empty when no tagger was used
    pub pos: String,
    pub context_sentence: String,
}

const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've", "you'll",
    "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself", "she", "she's",
    "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them", "their", "theirs",
    "themselves", "what", "which", "who", "whom", "this", "that", "that'll", "these", "those", "am",
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having", "do", "does",
    "did", "doing", "a", "an", "the", "and", "but", "if", "or", "because", "as", "until", "while",
    "of", "at", "by", "for", "with", "about", "against", "between", "into", "through", "during",
    "before", "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren",
    "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn",
    "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't",
    "needn", "needn't", "shan", "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren",
    "weren't", "won", "won't", "wouldn", "wouldn't",
];

pub fn is_stopword(word: &str) -> bool {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| ENGLISH_STOPWORDS.iter().copied().collect())
        .contains(word)
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"\b[a-zA-Z][a-zA-Z'-]+\b").expect("word pattern"))
}

/// Split on whitespace that follows `.`, `!` or `?`
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut prev: Option<char> = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() && matches!(prev, Some('.' | '!' | '?')) {
            let sentence = text[start..i].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            start = i;
        }
        prev = Some(c);
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Candidates from tagger output: alphabetic, not proper nouns, not stopwords, long enough
pub fn tagged_candidates(sentences: &[TaggedSentence], min_word_length: usize) -> Vec<Candidate> {
    let mut rows = Vec::new();
    for sentence in sentences {
        let context = sentence.text.trim();
        for token in &sentence.tokens {
            let lemma = token.lemma.trim().to_lowercase();
            if !token.is_alpha || token.pos == "PROPN" {
                continue;
            }
            if token.is_stop || is_stopword(&lemma) {
                continue;
            }
            if lemma.chars().count() < min_word_length {
                continue;
            }
            rows.push(Candidate {
                word: token.text.clone(),
                lemma,
                pos: token.pos.clone(),
                context_sentence: context.to_string(),
            });
        }
    }
    rows
}

/// Candidates from sentence splitting plus a word regex; part of speech stays blank
pub fn regex_candidates(text: &str, min_word_length: usize) -> Vec<Candidate> {
    let mut rows = Vec::new();
    for sentence in split_sentences(text) {
        for m in word_regex().find_iter(&sentence) {
            let lemma = m.as_str().to_lowercase();
            if lemma.chars().count() < min_word_length {
                continue;
            }
            rows.push(Candidate {
                word: m.as_str().to_string(),
                lemma,
                pos: String::new(),
                context_sentence: sentence.clone(),
            });
        }
    }
    rows
}

/// First occurrence per lemma, in text order
pub fn dedup_by_lemma(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.lemma.clone()))
        .collect()
}

/// Unique candidates, preferring the tagger and falling back to the regex tokenizer
pub fn extract_candidates(
    text: &str,
    tagger: Option<&dyn SyntacticTagger>,
    min_word_length: usize,
) -> Vec<Candidate> {
    let rows = match tagger {
        Some(tagger) => match tagger.tag(text) {
            Ok(sentences) => tagged_candidates(&sentences, min_word_length),
            Err(e) => {
                tracing::warn!("Tagger {} failed ({:#}). Falling back to regex tokenization.", tagger.name(), e);
                regex_candidates(text, min_word_length)
            }
        },
        None => regex_candidates(text, min_word_length),
    };
    dedup_by_lemma(rows)
}
