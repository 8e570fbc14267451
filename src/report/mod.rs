//! Learner report: episode metadata, readable script and vocabulary in one
//! self-contained HTML file.

use anyhow::Result;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::episodes::{report_path, EpisodeMetadata};
use crate::vocabulary::{VocabularyDataset, VocabularyItem};
use crate::utils::{date_key, dotted_date};
use crate::window::slot_hhmm;

pub mod prettify;

pub use prettify::prettify_script_text;

/// Everything a renderer needs; `script_text` is already prettified and may be empty
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub metadata: &'a EpisodeMetadata,
    pub script_text: String,
    pub dataset: &'a VocabularyDataset,
}

impl<'a> ReportInput<'a> {
    pub fn new(
        metadata: &'a EpisodeMetadata,
        transcript: &str,
        dataset: &'a VocabularyDataset,
        program_name: &str,
    ) -> Self {
        Self {
            metadata,
            script_text: prettify_script_text(transcript, program_name, &metadata.airtime),
            dataset,
        }
    }
}

/// Turns a report input into a file and returns its path
pub trait ReportRenderer {
    fn render(&self, input: &ReportInput<'_>) -> Result<PathBuf>;
}

/// Static HTML report under a reports directory
#[derive(Debug, Clone)]
pub struct HtmlReportRenderer {
    reports_dir: PathBuf,
}

impl HtmlReportRenderer {
    pub fn new(reports_dir: &Path) -> Self {
        Self {
            reports_dir: reports_dir.to_path_buf(),
        }
    }

    pub fn output_path(&self, metadata: &EpisodeMetadata) -> PathBuf {
        let date_key = date_key(&metadata.date);
        let hhmm = slot_hhmm(&metadata.airtime).unwrap_or_else(|| "0000".to_string());
        report_path(&self.reports_dir, &date_key, &hhmm)
    }
}

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, input: &ReportInput<'_>) -> Result<PathBuf> {
        fs_err::create_dir_all(&self.reports_dir)?;
        let path = self.output_path(input.metadata);
        fs_err::write(&path, render_html(input)?)?;
        tracing::info!("Report written to {}", path.display());
        Ok(path)
    }
}

const STYLE: &str = "body{margin:0;background:#f5f7fb;color:#1f2937;font-family:\"Segoe UI\",\"Noto Sans KR\",sans-serif}\
main{max-width:1120px;margin:0 auto;padding:20px;display:grid;gap:16px}\
section{background:#fff;border:1px solid #dbe1ea;border-radius:14px;padding:16px}\
.script p{margin:0 0 .4em;line-height:1.6}\
table{width:100%;border-collapse:collapse}th,td{border-bottom:1px solid #dbe1ea;padding:6px;text-align:left;vertical-align:top}\
.band{font-weight:600}.curated{color:#b45309}.muted{color:#6b7280}";

fn render_html(input: &ReportInput<'_>) -> Result<String> {
    let meta = input.metadata;
    let mut html = String::new();

    writeln!(html, "<!doctype html>\n<html lang=\"en\">\n<head>")?;
    writeln!(html, "<meta charset=\"utf-8\">")?;
    writeln!(html, "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">")?;
    writeln!(html, "<title>{} {}</title>", encode_text(&meta.title), encode_text(&meta.date))?;
    writeln!(html, "<style>{}</style>\n</head>\n<body>\n<main>", STYLE)?;

    writeln!(html, "<section class=\"hero\">")?;
    writeln!(html, "<h1>{}</h1>", encode_text(&meta.title))?;
    writeln!(
        html,
        "<p class=\"muted\">{} {} &middot; {} words</p>",
        encode_text(&dotted_date(&meta.date)),
        encode_text(&meta.airtime),
        input.dataset.count
    )?;
    let audio_src = if meta.audio_filename.is_empty() {
        &meta.media_url
    } else {
        &meta.audio_filename
    };
    if !audio_src.is_empty() {
        writeln!(
            html,
            "<audio controls preload=\"none\" src=\"{}\"></audio>",
            encode_double_quoted_attribute(audio_src)
        )?;
    }
    writeln!(html, "</section>")?;

    writeln!(html, "<section class=\"script\">\n<h2>Script</h2>")?;
    if input.script_text.is_empty() {
        writeln!(html, "<p class=\"muted\">Script not available.</p>")?;
    }
    for line in input.script_text.lines().filter(|l| !l.trim().is_empty()) {
        writeln!(html, "<p>{}</p>", encode_text(line))?;
    }
    writeln!(html, "</section>")?;

    writeln!(html, "<section class=\"vocabulary\">\n<h2>Vocabulary</h2>")?;
    if input.dataset.items.is_empty() {
        writeln!(html, "<p class=\"muted\">No vocabulary items.</p>")?;
    } else {
        writeln!(
            html,
            "<table>\n<thead><tr><th>Word</th><th>Level</th><th>Meaning</th><th>Example</th></tr></thead>\n<tbody>"
        )?;
        for item in &input.dataset.items {
            write_item_row(&mut html, item)?;
        }
        writeln!(html, "</tbody>\n</table>")?;
    }
    writeln!(html, "</section>\n</main>\n</body>\n</html>")?;

    Ok(html)
}

fn write_item_row(html: &mut String, item: &VocabularyItem) -> std::fmt::Result {
    let curated = if item.is_curated_hard_word { " curated" } else { "" };
    write!(html, "<tr><td><strong>{}</strong>", encode_text(&item.lemma))?;
    if !item.phonetic.is_empty() {
        write!(html, " <span class=\"muted\">{}</span>", encode_text(&item.phonetic))?;
    }
    if !item.pos_label.is_empty() {
        write!(html, "<br><span class=\"muted\">{}</span>", encode_text(&item.pos_label))?;
    }
    write!(
        html,
        "</td><td class=\"band{}\">{}</td><td>{}",
        curated,
        item.difficulty_band,
        encode_text(&item.definition)
    )?;
    if !item.translation.is_empty() {
        write!(html, "<br>{}", encode_text(&item.translation))?;
    }
    if !item.derived_forms.is_empty() {
        let derived: Vec<&str> = item.derived_forms.iter().map(String::as_str).collect();
        write!(html, "<br><span class=\"muted\">{}</span>", encode_text(&derived.join(", ")))?;
    }
    let example = if item.example_sentence.is_empty() {
        &item.context_sentence
    } else {
        &item.example_sentence
    };
    writeln!(html, "</td><td>{}</td></tr>", encode_text(example))
}
