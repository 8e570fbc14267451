use regex::Regex;
use std::sync::OnceLock;

use crate::vocabulary::sanitize::strip_markup;

struct Patterns {
    episode_marker: Regex,
    noise_lines: [Regex; 3],
    sentence_break: Regex,
    blanks: Regex,
    blank_lines: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        episode_marker: Regex::new(r"(?i)\b\d{4}\s+\d{4}-\d{2}-\d{2}\s+Podcast\s+Play\b").expect("marker pattern"),
        noise_lines: [
            Regex::new(r"(?i)Podcast\s+List\s+Table").expect("noise pattern"),
            Regex::new(r"(?i)NO\s+Date\(KST\)\s+Title").expect("noise pattern"),
            Regex::new(r"(?i)^\s*\d+\s+\d{4}-\d{2}-\d{2}\s+Podcast(?:\s+Play)?\s*$").expect("noise pattern"),
        ],
        sentence_break: Regex::new(r#"([.!?])\s+([A-Z"'])"#).expect("sentence pattern"),
        blanks: Regex::new(r"[ \t]+").expect("blank pattern"),
        blank_lines: Regex::new(r"\n{3,}").expect("blank line pattern"),
    })
}

/// Whitespace-tolerant, case-insensitive pattern for a literal phrase
fn phrase_pattern(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

/// Readable script for the report: one episode, no page chrome, one sentence per line
pub fn prettify_script_text(text: &str, program_name: &str, slot: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let p = patterns();
    let mut raw = strip_markup(text);

    if let Some(m) = p.episode_marker.find(&raw) {
        raw.truncate(m.start());
    }

    if !program_name.trim().is_empty() {
        let greeting = format!(r"(?i)welcome\s+to\s+{}", phrase_pattern(program_name));
        if let Ok(re) = Regex::new(&greeting) {
            if let Some(m) = re.find(&raw) {
                raw = raw[m.start()..].to_string();
            }
        }

        // List header glued to the first row, all on one line
        let header = format!(
            r"(?i)Podcast\s+List\s+Table\s+NO\s+Date\(KST\)\s+Title\s+\d+\s+\d{{4}}-\d{{2}}-\d{{2}}\s+Podcast\s+Play\s+{}\s+{}",
            regex::escape(slot),
            phrase_pattern(program_name)
        );
        if let Ok(re) = Regex::new(&header) {
            raw = re.replace_all(&raw, "").into_owned();
        }
    }

    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !p.noise_lines.iter().any(|re| re.is_match(line)))
        .collect();
    let text = lines.join("\n");

    let text = p.sentence_break.replace_all(&text, "$1\n$2");
    let text = p.blanks.replace_all(&text, " ");
    let text = p.blank_lines.replace_all(&text, "\n\n");
    text.trim().to_string()
}
