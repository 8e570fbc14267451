//! Offline lexical database with sense lookup and morphological normalization.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Cap on derivationally related forms kept per word
pub const MAX_DERIVED_FORMS: usize = 15;

/// Major parts of speech the normalizer knows detachment rules for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordClass {
    #[serde(alias = "n")]
    Noun,
    #[serde(alias = "v")]
    Verb,
    #[serde(alias = "a", alias = "adj", alias = "s")]
    Adjective,
    #[serde(alias = "r", alias = "adv")]
    Adverb,
}

impl WordClass {
    pub const ALL: [WordClass; 4] = [WordClass::Noun, WordClass::Verb, WordClass::Adjective, WordClass::Adverb];

    /// Suffix detachment rules, tried in order
    fn detachments(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            WordClass::Noun => &[
                ("s", ""),
                ("ses", "s"),
                ("xes", "x"),
                ("zes", "z"),
                ("ches", "ch"),
                ("shes", "sh"),
                ("men", "man"),
                ("ies", "y"),
            ],
            WordClass::Verb => &[
                ("s", ""),
                ("ies", "y"),
                ("es", "e"),
                ("es", ""),
                ("ed", "e"),
                ("ed", ""),
                ("ing", "e"),
                ("ing", ""),
            ],
            WordClass::Adjective => &[("er", ""), ("est", ""), ("er", "e"), ("est", "e")],
            WordClass::Adverb => &[],
        }
    }
}

/// Fields one lexicon lookup can supply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SenseInfo {
    pub definition: String,
    pub example: String,
    pub derived_forms: BTreeSet<String>,
    pub translation: String,
}

/// Offline sense inventory
pub trait LexicalDatabase: Send + Sync {
    /// First-sense information for `word`, translated into `language` when possible
    fn lookup(&self, word: &str, language: &str) -> Result<Option<SenseInfo>>;

    /// Base form of `word` for `class`, if the database knows one
    fn normalize(&self, word: &str, class: WordClass) -> Option<String>;
}

#[derive(Debug, Clone, Deserialize)]
struct Sense {
    pos: WordClass,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    derived: Vec<String>,
    #[serde(default)]
    translations: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Entry {
    #[serde(default)]
    senses: Vec<Sense>,
}

/// Lexicon loaded from a JSON document keyed by lemma
#[derive(Debug, Clone, Default)]
pub struct JsonLexicon {
    entries: HashMap<String, Entry>,
}

impl JsonLexicon {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs_err::read_to_string(path)?;
        let lexicon = Self::from_json(&raw).with_context(|| format!("Invalid lexicon {}", path.display()))?;
        tracing::debug!("Loaded {} lexicon entries from {}", lexicon.len(), path.display());
        Ok(lexicon)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let entries: HashMap<String, Entry> = serde_json::from_str(raw)?;
        Ok(Self {
            entries: entries.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn has_lemma(&self, word: &str, class: WordClass) -> bool {
        self.entries
            .get(word)
            .map(|e| e.senses.iter().any(|s| s.pos == class))
            .unwrap_or(false)
    }
}

impl LexicalDatabase for JsonLexicon {
    fn lookup(&self, word: &str, language: &str) -> Result<Option<SenseInfo>> {
        let key = word.to_lowercase();
        let Some(entry) = self.entries.get(&key) else {
            return Ok(None);
        };
        let Some(first) = entry.senses.first() else {
            return Ok(None);
        };

        let derived_forms = first
            .derived
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty() && *d != key)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .take(MAX_DERIVED_FORMS)
            .collect();

        let translation = entry
            .senses
            .iter()
            .filter_map(|s| s.translations.get(language))
            .flatten()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
            .to_string();

        Ok(Some(SenseInfo {
            definition: first.definition.trim().to_string(),
            example: first.examples.first().map(|e| e.trim().to_string()).unwrap_or_default(),
            derived_forms,
            translation,
        }))
    }

    fn normalize(&self, word: &str, class: WordClass) -> Option<String> {
        let word = word.to_lowercase();
        if self.has_lemma(&word, class) {
            return Some(word);
        }
        class.detachments().iter().find_map(|(suffix, ending)| {
            let stem = word.strip_suffix(suffix)?;
            if stem.is_empty() {
                return None;
            }
            let base = format!("{}{}", stem, ending);
            self.has_lemma(&base, class).then_some(base)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "tariff": {"senses": [
            {"pos": "noun", "definition": "a government tax on imports or exports",
             "examples": ["a tariff on steel"],
             "derived": ["tariff", "tariffs", "tariffed"],
             "translations": {"ko": ["관세"]}}
        ]},
        "escalate": {"senses": [
            {"pos": "v", "definition": "increase in extent or intensity", "examples": [],
             "derived": ["escalation", "escalator"]}
        ]},
        "box": {"senses": [{"pos": "n", "definition": "a container"}]},
        "fine": {"senses": [{"pos": "a", "definition": "superior to the average"}]}
    }"#;

    fn lexicon() -> JsonLexicon {
        JsonLexicon::from_json(SAMPLE).unwrap()
    }

    #[test]
    fn test_lookup_first_sense() {
        let info = lexicon().lookup("Tariff", "ko").unwrap().unwrap();
        assert_eq!(info.definition, "a government tax on imports or exports");
        assert_eq!(info.example, "a tariff on steel");
        assert_eq!(info.translation, "관세");
        assert_eq!(
            info.derived_forms.into_iter().collect::<Vec<_>>(),
            vec!["tariffed", "tariffs"]
        );
    }

    #[test]
    fn test_lookup_missing_translation_and_word() {
        let lex = lexicon();
        let info = lex.lookup("escalate", "ko").unwrap().unwrap();
        assert!(info.translation.is_empty());
        assert!(info.example.is_empty());
        assert!(lex.lookup("unknown", "ko").unwrap().is_none());
    }

    #[test]
    fn test_normalize_by_class() {
        let lex = lexicon();
        assert_eq!(lex.normalize("tariffs", WordClass::Noun).as_deref(), Some("tariff"));
        assert_eq!(lex.normalize("boxes", WordClass::Noun).as_deref(), Some("box"));
        assert_eq!(lex.normalize("escalated", WordClass::Verb).as_deref(), Some("escalate"));
        assert_eq!(lex.normalize("escalating", WordClass::Verb).as_deref(), Some("escalate"));
        assert_eq!(lex.normalize("finest", WordClass::Adjective).as_deref(), Some("fine"));
        // Known lemma, wrong class
        assert_eq!(lex.normalize("tariffs", WordClass::Verb), None);
        assert_eq!(lex.normalize("quickly", WordClass::Adverb), None);
    }

    #[test]
    fn test_derived_forms_capped() {
        let derived: Vec<String> = (0..20).map(|i| format!("\"form{:02}\"", i)).collect();
        let raw = format!(
            r#"{{"word": {{"senses": [{{"pos": "n", "definition": "d", "derived": [{}]}}]}}}}"#,
            derived.join(",")
        );
        let info = JsonLexicon::from_json(&raw).unwrap().lookup("word", "en").unwrap().unwrap();
        assert_eq!(info.derived_forms.len(), MAX_DERIVED_FORMS);
        assert_eq!(info.derived_forms.iter().next().map(String::as_str), Some("form00"));
    }
}
