//! Cutting one episode out of a transcript that concatenates several.
//!
//! Listing pages sometimes return every episode's script in one block, each
//! introduced by a marker of the form
//! `"<id> <YYYY-MM-DD> Podcast Play <HH:MM> <program name>"`.

use regex::Regex;

pub const MARKER_PHRASE: &str = "Podcast Play";

fn words_pattern(text: &str) -> String {
    text.split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

fn marker_regex(program_name: &str) -> Option<Regex> {
    let pattern = format!(
        r"(?i)\b\d{{4}}\s+(\d{{4}}-\d{{2}}-\d{{2}})\s+{}\s+(\d{{1,2}}):(\d{{2}})\s+{}",
        words_pattern(MARKER_PHRASE),
        words_pattern(program_name)
    );
    Regex::new(&pattern).ok()
}

/// Return the block for `display_date` + `slot`, or the whole text when no
/// marker for that key is present.
pub fn slice_episode(text: &str, display_date: &str, slot: &str, program_name: &str) -> String {
    let Some(marker) = marker_regex(program_name) else {
        return text.to_string();
    };
    let Some(target_hhmm) = crate::window::slot_hhmm(slot) else {
        return text.to_string();
    };

    let markers: Vec<_> = marker.captures_iter(text).collect();
    for (i, caps) in markers.iter().enumerate() {
        let hour: u32 = caps[2].parse().unwrap_or(99);
        let hhmm = format!("{:02}{}", hour, &caps[3]);
        if &caps[1] != display_date || hhmm != target_hhmm {
            continue;
        }

        let start = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let end = markers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        tracing::info!(
            "Sliced episode block for {} {} ({} of {} markers)",
            display_date,
            slot,
            i + 1,
            markers.len()
        );
        return text[start..end].trim().to_string();
    }

    if !markers.is_empty() {
        tracing::warn!(
            "Found {} episode markers but none for {} {}; keeping full text",
            markers.len(),
            display_date,
            slot
        );
    }
    text.to_string()
}
