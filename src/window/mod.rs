//! Target window resolution: which date and slot a run acquires.

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// The calendar date and time slot one run acquires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetWindow {
    /// YYYYMMDD
    pub compact_date: String,

    /// YYYY-MM-DD
    pub display_date: String,

    /// HH:MM
    pub slot: String,
}

impl TargetWindow {
    /// Window for an explicit YYYYMMDD date
    pub fn for_date(compact_date: &str, slot: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(compact_date, "%Y%m%d").map_err(|_| {
            PipelineError::Precondition(format!("target date must be YYYYMMDD, got {:?}", compact_date))
        })?;
        Ok(Self::from_naive(date, slot))
    }

    /// "Yesterday" in the fixed timezone, relative to `now`
    pub fn yesterday_at(now: DateTime<Utc>, offset: FixedOffset, slot: &str) -> Self {
        let local_today = now.with_timezone(&offset).date_naive();
        Self::from_naive(local_today - Duration::days(1), slot)
    }

    /// "Yesterday" in the fixed timezone, relative to the wall clock
    pub fn yesterday(utc_offset_hours: i32, slot: &str) -> Result<Self> {
        let offset = fixed_offset(utc_offset_hours)?;
        Ok(Self::yesterday_at(Utc::now(), offset, slot))
    }

    fn from_naive(date: NaiveDate, slot: &str) -> Self {
        Self {
            compact_date: date.format("%Y%m%d").to_string(),
            display_date: date.format("%Y-%m-%d").to_string(),
            slot: slot.to_string(),
        }
    }

    /// Slot as HHMM
    pub fn slot_hhmm(&self) -> String {
        slot_hhmm(&self.slot).unwrap_or_else(|| "0000".to_string())
    }

    /// Ledger key `{date}_{HHMM}`
    pub fn ledger_key(&self) -> String {
        format!("{}_{}", self.compact_date, self.slot_hhmm())
    }
}

/// Fixed timezone offset for a whole number of hours east of UTC
pub fn fixed_offset(hours: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(hours * 3600)
        .ok_or_else(|| PipelineError::Config(format!("invalid UTC offset: {}", hours)).into())
}

/// Current instant as ISO-8601 in the fixed timezone
pub fn now_iso(utc_offset_hours: i32) -> String {
    match FixedOffset::east_opt(utc_offset_hours * 3600) {
        Some(offset) => Utc::now().with_timezone(&offset).to_rfc3339(),
        None => Utc::now().to_rfc3339(),
    }
}

/// "21:55" or "21.55" -> "2155"
pub fn slot_hhmm(slot: &str) -> Option<String> {
    let (h, m) = slot.trim().split_once([':', '.'])?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 || m.len() != 2 {
        return None;
    }
    Some(format!("{:02}{:02}", hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_yesterday_crosses_utc_midnight() {
        // 2024-01-02 16:30 UTC is already 2024-01-03 01:30 at UTC+9
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 16, 30, 0).unwrap();
        let window = TargetWindow::yesterday_at(now, fixed_offset(9).unwrap(), "21:55");
        assert_eq!(window.compact_date, "20240102");
        assert_eq!(window.display_date, "2024-01-02");
    }

    #[test]
    fn test_yesterday_same_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        let window = TargetWindow::yesterday_at(now, fixed_offset(9).unwrap(), "21:55");
        assert_eq!(window.compact_date, "20240229");
        assert_eq!(window.ledger_key(), "20240229_2155");
    }

    #[test]
    fn test_for_date_validates() {
        assert!(TargetWindow::for_date("2024-01-01", "21:55").is_err());
        let window = TargetWindow::for_date("20240101", "21:55").unwrap();
        assert_eq!(window.display_date, "2024-01-01");
    }

    #[test]
    fn test_slot_hhmm() {
        assert_eq!(slot_hhmm("21:55"), Some("2155".to_string()));
        assert_eq!(slot_hhmm("9.05"), Some("0905".to_string()));
        assert_eq!(slot_hhmm("25:00"), None);
        assert_eq!(slot_hhmm("2155"), None);
    }
}
