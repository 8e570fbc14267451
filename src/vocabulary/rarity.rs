//! Rarity scoring and CEFR banding.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Score given to words the corpus has never seen
pub const MAX_RARITY: f64 = 8.0;

/// Lemmas scoring below this never reach dictionary lookup
pub const RARITY_THRESHOLD: f64 = 5.0;

/// Relative word frequency in a reference corpus
#[cfg_attr(test, mockall::automock)]
pub trait FrequencySource: Send + Sync {
    /// Frequency in (0, 1], `None` when unknown
    fn frequency(&self, word: &str) -> Option<f64>;
}

/// In-memory frequency table, loaded from a `word,frequency` CSV
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    frequencies: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct FrequencyRow {
    word: String,
    frequency: f64,
}

impl FrequencyTable {
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        Self {
            frequencies: pairs
                .into_iter()
                .map(|(w, f)| (w.as_ref().to_lowercase(), f))
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open frequency table {}", path.display()))?;

        let mut frequencies = HashMap::new();
        for row in reader.deserialize::<FrequencyRow>() {
            let row = row.with_context(|| format!("Bad row in {}", path.display()))?;
            frequencies.insert(row.word.to_lowercase(), row.frequency);
        }
        tracing::debug!("Loaded {} word frequencies from {}", frequencies.len(), path.display());
        Ok(Self { frequencies })
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

impl FrequencySource for FrequencyTable {
    fn frequency(&self, word: &str) -> Option<f64> {
        self.frequencies.get(&word.to_lowercase()).copied()
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// `-log10(frequency)` from the corpus, or a length heuristic without one
pub fn rarity_score(lemma: &str, source: Option<&dyn FrequencySource>) -> f64 {
    match source {
        Some(source) => match source.frequency(lemma) {
            Some(f) if f > 0.0 => round4(-f.log10()).max(0.0),
            _ => MAX_RARITY,
        },
        None => {
            let length = lemma.chars().count() as f64;
            round4((length / 1.2).clamp(1.0, MAX_RARITY))
        }
    }
}

pub fn is_rare(score: f64) -> bool {
    score >= RARITY_THRESHOLD
}

/// Proficiency band assigned from a rarity score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CefrBand {
    #[default]
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 7.0 {
            CefrBand::C2
        } else if score >= 6.0 {
            CefrBand::C1
        } else if score >= 5.0 {
            CefrBand::B2
        } else if score >= 4.0 {
            CefrBand::B1
        } else if score >= 3.0 {
            CefrBand::A2
        } else {
            CefrBand::A1
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CefrBand::A1 => "A1",
            CefrBand::A2 => "A2",
            CefrBand::B1 => "B1",
            CefrBand::B2 => "B2",
            CefrBand::C1 => "C1",
            CefrBand::C2 => "C2",
        }
    }
}

impl fmt::Display for CefrBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use std::io::Write;

    #[test]
    fn test_corpus_score() {
        let mut source = MockFrequencySource::new();
        source.expect_frequency().with(eq("inflation")).return_const(Some(2.0e-6));
        source.expect_frequency().with(eq("unseen")).return_const(None);
        source.expect_frequency().with(eq("zero")).return_const(Some(0.0));
        source.expect_frequency().with(eq("common")).return_const(Some(2.5));

        assert_eq!(rarity_score("inflation", Some(&source)), 5.699);
        assert_eq!(rarity_score("unseen", Some(&source)), MAX_RARITY);
        assert_eq!(rarity_score("zero", Some(&source)), MAX_RARITY);
        assert_eq!(rarity_score("common", Some(&source)), 0.0);
    }

    #[test]
    fn test_very_rare_word_outranks_unseen() {
        let table = FrequencyTable::from_pairs([("obscure", 1.0e-9)]);
        let obscure = rarity_score("obscure", Some(&table));
        assert_eq!(obscure, 9.0);
        assert!(obscure > rarity_score("neverseen", Some(&table)));
        assert_eq!(CefrBand::from_score(obscure), CefrBand::C2);
    }

    #[test]
    fn test_length_heuristic() {
        assert_eq!(rarity_score("tax", None), 2.5);
        assert_eq!(rarity_score("a", None), 1.0);
        assert_eq!(rarity_score("disinformation", None), MAX_RARITY);
        assert_eq!(rarity_score("sanction", None), 6.6667);
        assert!(is_rare(rarity_score("tariffs", None)));
        assert!(!is_rare(rarity_score("grew", None)));
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(CefrBand::from_score(8.0), CefrBand::C2);
        assert_eq!(CefrBand::from_score(7.0), CefrBand::C2);
        assert_eq!(CefrBand::from_score(6.9999), CefrBand::C1);
        assert_eq!(CefrBand::from_score(5.0), CefrBand::B2);
        assert_eq!(CefrBand::from_score(4.2), CefrBand::B1);
        assert_eq!(CefrBand::from_score(3.0), CefrBand::A2);
        assert_eq!(CefrBand::from_score(0.3), CefrBand::A1);
        assert_eq!(serde_json::to_string(&CefrBand::C1).unwrap(), "\"C1\"");
    }

    #[test]
    fn test_band_is_stable_across_rescoring() {
        let table = FrequencyTable::from_pairs([("inflation", 3.1e-6), ("market", 1.2e-4), ("rare", 1.0e-7)]);
        let words = ["inflation", "market", "rare", "missing", "concerns"];
        let first: Vec<_> = words
            .iter()
            .map(|w| CefrBand::from_score(rarity_score(w, Some(&table))))
            .collect();
        let second: Vec<_> = words
            .iter()
            .map(|w| CefrBand::from_score(rarity_score(w, Some(&table))))
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_csv_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "word,frequency").unwrap();
        writeln!(file, "Tariff, 0.0000021").unwrap();
        writeln!(file, "the,0.05").unwrap();
        let table = FrequencyTable::load(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.frequency("tariff"), Some(0.0000021));
        assert_eq!(table.frequency("THE"), Some(0.05));
        assert_eq!(table.frequency("absent"), None);
    }
}
