//! Transcript cleanup ahead of tokenization.

use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    leaked_attribute: Regex,
    mark_tag: Regex,
    any_tag: Regex,
    blanks: Regex,
    blank_lines: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        // data-* attributes leaked as plain text, quoted (incl. smart quotes) or bare
        leaked_attribute: Regex::new(
            r#"(?i)\bdata-[a-z-]+\s*=\s*(?:'[^']*'|"[^"]*"|‘[^’]*’|’[^’]*’|“[^”]*”|[^\s>]+)\s*(?:>|&gt;)?"#,
        )
        .expect("attribute pattern"),
        mark_tag: Regex::new(r"(?i)</?mark[^>]*>").expect("mark pattern"),
        any_tag: Regex::new(r"<[^>]+>").expect("tag pattern"),
        blanks: Regex::new(r"[ \t]+").expect("blank pattern"),
        blank_lines: Regex::new(r"\n{3,}").expect("blank line pattern"),
    })
}

/// Unescape entities and drop leaked attributes and tags, keeping line structure
pub fn strip_markup(text: &str) -> String {
    let p = patterns();
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let unescaped = html_escape::decode_html_entities(&normalized);
    let without_attrs = p.leaked_attribute.replace_all(&unescaped, "");
    let without_marks = p.mark_tag.replace_all(&without_attrs, "");
    p.any_tag.replace_all(&without_marks, "").into_owned()
}

fn sanitize_once(text: &str) -> String {
    let p = patterns();
    let stripped = strip_markup(text);
    if stripped.trim().is_empty() {
        return String::new();
    }
    let collapsed = p.blanks.replace_all(&stripped, " ");
    let collapsed = p.blank_lines.replace_all(&collapsed, "\n\n");
    collapsed.trim().to_string()
}

/// Clean a transcript for analysis; applying it twice changes nothing.
///
/// Repeats until a fixpoint. Every pass that changes the text either shortens it
/// or turns a `\r` into `\n`, so the loop terminates.
pub fn sanitize_transcript(text: &str) -> String {
    let mut current = sanitize_once(text);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
