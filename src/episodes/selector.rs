//! Deterministic choice of one episode among same-day candidates.

use regex::Regex;
use std::fmt;

use super::EpisodeCandidate;

/// What to do when no candidate carries the target date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// List stage: fall back to the first candidate overall
    FirstAvailable,
    /// Orchestration stage: no match is a terminal failure
    NoMatch,
}

/// Which rule produced the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    /// Target date and a slot token matched
    SlotToken,
    /// Target date matched, no slot token; latest airtime won
    LatestAirtime,
    /// No candidate on the target date; first candidate overall
    FirstAvailable,
}

impl fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionRule::SlotToken => write!(f, "target date + slot token"),
            SelectionRule::LatestAirtime => write!(f, "target date + latest airtime"),
            SelectionRule::FirstAvailable => write!(f, "fallback to first available"),
        }
    }
}

/// A chosen candidate and the rule that chose it
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub episode: EpisodeCandidate,
    pub rule: SelectionRule,
}

/// Case-insensitive patterns identifying the target slot in title/airtime text
pub fn slot_token_patterns(slot: &str) -> Vec<Regex> {
    let mut patterns = Vec::new();
    if let Some(hhmm) = crate::window::slot_hhmm(slot) {
        let (h, m) = hhmm.split_at(2);
        let hour: u32 = h.parse().unwrap_or(0);
        patterns.push(format!(r"(?i)\b{}[:.]{}\b", h, m));
        patterns.push(format!(r"(?i)\b{}\b", hhmm));
        // Broadcast listings round the slot to the next hour in 12h form ("10 PM" for 21:55)
        let rounded = if m == "00" { hour } else { (hour + 1) % 24 };
        let (twelve, meridiem) = match rounded {
            0 => (12, "AM"),
            1..=11 => (rounded, "AM"),
            12 => (12, "PM"),
            _ => (rounded - 12, "PM"),
        };
        patterns.push(format!(r"(?i)\b{}\s*{}\b", twelve, meridiem));
    }
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
}

fn has_slot_token(candidate: &EpisodeCandidate, patterns: &[Regex]) -> bool {
    let haystack = format!("{} {}", candidate.title, candidate.airtime);
    patterns.iter().any(|p| p.is_match(&haystack))
}

/// Normalized HHMM airtime; unparseable airtimes sort as "0000"
fn airtime_key(candidate: &EpisodeCandidate) -> String {
    crate::window::slot_hhmm(&candidate.airtime).unwrap_or_else(|| "0000".to_string())
}

/// Choose exactly one candidate for the target date, or none
pub fn select_episode(
    candidates: &[EpisodeCandidate],
    target_date: &str,
    slot: &str,
    policy: FallbackPolicy,
) -> Option<Selection> {
    let same_day: Vec<&EpisodeCandidate> = candidates
        .iter()
        .filter(|c| c.date_key == target_date)
        .collect();

    if same_day.is_empty() {
        return match policy {
            FallbackPolicy::FirstAvailable => {
                let first = candidates.first()?;
                tracing::warn!(
                    "No episodes found for target date {}. Falling back to first available candidate: {}",
                    target_date,
                    first.detail_url
                );
                Some(Selection {
                    episode: first.clone(),
                    rule: SelectionRule::FirstAvailable,
                })
            }
            FallbackPolicy::NoMatch => {
                tracing::warn!("No episode candidates for target date={}", target_date);
                None
            }
        };
    }

    let patterns = slot_token_patterns(slot);
    if let Some(matched) = same_day.iter().find(|c| has_slot_token(c, &patterns)) {
        tracing::info!(
            "Selection rule: {} ({}). url={}",
            SelectionRule::SlotToken,
            slot,
            matched.detail_url
        );
        return Some(Selection {
            episode: (*matched).clone(),
            rule: SelectionRule::SlotToken,
        });
    }

    // Stable max: the first of equally late airtimes wins
    let mut latest = same_day[0];
    for candidate in &same_day[1..] {
        if airtime_key(candidate) > airtime_key(latest) {
            latest = *candidate;
        }
    }
    tracing::info!(
        "Selection rule: {}; date={} airtime={} url={}",
        SelectionRule::LatestAirtime,
        target_date,
        latest.airtime,
        latest.detail_url
    );
    Some(Selection {
        episode: latest.clone(),
        rule: SelectionRule::LatestAirtime,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, date: &str, airtime: &str, url: &str) -> EpisodeCandidate {
        EpisodeCandidate {
            title: title.to_string(),
            detail_url: url.to_string(),
            date_key: date.to_string(),
            airtime: airtime.to_string(),
            source_id: "668".to_string(),
            prefetched_media_url: None,
        }
    }

    #[test]
    fn test_slot_token_wins_in_original_order() {
        let candidates = vec![
            candidate("Morning News", "20240101", "07:00", "a"),
            candidate("Arirang News 10 PM", "20240101", "", "b"),
            candidate("21:55 Arirang News", "20240101", "21:55", "c"),
        ];
        let selection = select_episode(&candidates, "20240101", "21:55", FallbackPolicy::NoMatch).unwrap();
        assert_eq!(selection.rule, SelectionRule::SlotToken);
        assert_eq!(selection.episode.detail_url, "b");
    }

    #[test]
    fn test_latest_airtime_when_no_token() {
        let candidates = vec![
            candidate("Morning", "20240101", "07:00", "a"),
            candidate("Evening", "20240101", "19:30", "b"),
            candidate("Unknown", "20240101", "late", "c"),
            candidate("Other day", "20240102", "23:00", "d"),
        ];
        let selection = select_episode(&candidates, "20240101", "21:55", FallbackPolicy::NoMatch).unwrap();
        assert_eq!(selection.rule, SelectionRule::LatestAirtime);
        assert_eq!(selection.episode.detail_url, "b");
    }

    #[test]
    fn test_single_digit_hour_airtime_is_normalized() {
        let candidates = vec![
            candidate("Morning", "20240101", "07:00", "a"),
            candidate("Mid-morning", "20240101", "9:30", "b"),
        ];
        assert_eq!(airtime_key(&candidates[1]), "0930");
        let selection = select_episode(&candidates, "20240101", "21:55", FallbackPolicy::NoMatch).unwrap();
        assert_eq!(selection.rule, SelectionRule::LatestAirtime);
        assert_eq!(selection.episode.detail_url, "b");
    }

    #[test]
    fn test_unparseable_airtimes_keep_first() {
        let candidates = vec![
            candidate("One", "20240101", "", "a"),
            candidate("Two", "20240101", "soon", "b"),
        ];
        let selection = select_episode(&candidates, "20240101", "21:55", FallbackPolicy::NoMatch).unwrap();
        assert_eq!(selection.episode.detail_url, "a");
    }

    #[test]
    fn test_fallback_policies_differ() {
        let candidates = vec![candidate("21:55 Arirang News", "20231231", "21:55", "a")];
        assert!(select_episode(&candidates, "20240101", "21:55", FallbackPolicy::NoMatch).is_none());

        let selection =
            select_episode(&candidates, "20240101", "21:55", FallbackPolicy::FirstAvailable).unwrap();
        assert_eq!(selection.rule, SelectionRule::FirstAvailable);
        assert_eq!(selection.episode.detail_url, "a");

        assert!(select_episode(&[], "20240101", "21:55", FallbackPolicy::FirstAvailable).is_none());
    }

    #[test]
    fn test_slot_patterns_are_case_insensitive() {
        let patterns = slot_token_patterns("21:55");
        let c = candidate("arirang news 10pm", "20240101", "", "x");
        assert!(has_slot_token(&c, &patterns));
        let c = candidate("news 2155 edition", "20240101", "", "x");
        assert!(has_slot_token(&c, &patterns));
        let c = candidate("news", "20240101", "21.55", "x");
        assert!(has_slot_token(&c, &patterns));
        let c = candidate("news 9 PM", "20240101", "21:00", "x");
        assert!(!has_slot_token(&c, &patterns));
    }
}
