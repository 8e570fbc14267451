//! Ranking and persistence of the vocabulary dataset.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{VocabularyDataset, VocabularyItem};
use crate::episodes::vocabulary_paths;

/// Separator for derived forms in the tabular output
pub const DERIVED_FORMS_DELIMITER: &str = "|";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Sort by descending score, then lemma, and keep the first `limit`
pub fn rank(mut items: Vec<VocabularyItem>, limit: usize) -> Vec<VocabularyItem> {
    items.sort_by(|a, b| {
        b.rarity_score
            .total_cmp(&a.rarity_score)
            .then_with(|| a.lemma.cmp(&b.lemma))
    });
    items.truncate(limit);
    items
}

#[derive(Serialize)]
struct CsvRow<'a> {
    word: &'a str,
    lemma: &'a str,
    part_of_speech: &'a str,
    pos_label: &'a str,
    phonetic: &'a str,
    definition: &'a str,
    translation: &'a str,
    example_sentence: &'a str,
    context_sentence: &'a str,
    difficulty_band: &'a str,
    rarity_score: f64,
    is_curated_hard_word: bool,
    derived_forms: String,
}

impl<'a> From<&'a VocabularyItem> for CsvRow<'a> {
    fn from(item: &'a VocabularyItem) -> Self {
        Self {
            word: &item.word,
            lemma: &item.lemma,
            part_of_speech: &item.part_of_speech,
            pos_label: &item.pos_label,
            phonetic: &item.phonetic,
            definition: &item.definition,
            translation: &item.translation,
            example_sentence: &item.example_sentence,
            context_sentence: &item.context_sentence,
            difficulty_band: item.difficulty_band.as_str(),
            rarity_score: item.rarity_score,
            is_curated_hard_word: item.is_curated_hard_word,
            derived_forms: item
                .derived_forms
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(DERIVED_FORMS_DELIMITER),
        }
    }
}

/// Write `vocabulary_{date}.json` and `vocabulary_{date}.csv` under `logs_dir`
pub fn save_dataset(dataset: &VocabularyDataset, logs_dir: &Path, date_key: &str) -> Result<(PathBuf, PathBuf)> {
    fs_err::create_dir_all(logs_dir)?;
    let (json_path, csv_path) = vocabulary_paths(logs_dir, date_key);

    let json = serde_json::to_string_pretty(dataset)?;
    fs_err::write(&json_path, json)?;

    let mut file = fs_err::File::create(&csv_path)?;
    file.write_all(UTF8_BOM)?;
    let mut writer = csv::Writer::from_writer(file);
    if dataset.items.is_empty() {
        // serde-driven headers only appear with the first row
        writer.write_record([
            "word",
            "lemma",
            "part_of_speech",
            "pos_label",
            "phonetic",
            "definition",
            "translation",
            "example_sentence",
            "context_sentence",
            "difficulty_band",
            "rarity_score",
            "is_curated_hard_word",
            "derived_forms",
        ])?;
    }
    for item in &dataset.items {
        writer.serialize(CsvRow::from(item))?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", csv_path.display()))?;

    tracing::info!(
        "Saved vocabulary json={} csv={} count={}",
        json_path.display(),
        csv_path.display(),
        dataset.count
    );
    Ok((json_path, csv_path))
}

pub fn load_dataset(path: &Path) -> Result<VocabularyDataset> {
    let raw = fs_err::read_to_string(path)?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid vocabulary document {}", path.display()))
}
