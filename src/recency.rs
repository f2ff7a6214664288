// src/recency.rs
//! Recency classifier: decides whether a raw date string (relative or
//! absolute) falls inside a freshness window, and ranks date strings by
//! inferred age for the fallback/dedup comparators.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Phrases that mark an item stale regardless of the window.
static RE_STALE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"last\s+(week|month|year)|weeks?\s+ago|months?\s+ago|years?\s+ago|주\s*전|개월\s*전|년\s*전")
        .expect("stale regex")
});

/// `(amount)(unit)(ago)?` relative forms, English variants.
static RE_REL_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<n>\d+)\s*(?P<unit>seconds?|secs?|minutes?|mins?|hours?|hrs?|days?|weeks?)(\s+ago)?\b")
        .expect("relative regex")
});

/// Same, Korean variants (`N분 전`, `N시간 전`, `N일 전`, `N주 전`).
static RE_REL_KO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?P<n>\d+)\s*(?P<unit>분|시간|일|주)\s*전").expect("korean relative regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Minute,
    Hour,
    Day,
    Week,
}

impl Unit {
    fn from_en(s: &str) -> Self {
        if s.starts_with("sec") || s.starts_with("min") {
            Unit::Minute
        } else if s.starts_with('h') {
            Unit::Hour
        } else if s.starts_with('w') {
            Unit::Week
        } else {
            Unit::Day
        }
    }

    fn from_ko(s: &str) -> Self {
        match s {
            "분" => Unit::Minute,
            "시간" => Unit::Hour,
            "주" => Unit::Week,
            _ => Unit::Day,
        }
    }

    fn to_hours(self, amount: i64) -> i64 {
        match self {
            Unit::Minute => amount / 60,
            Unit::Hour => amount,
            Unit::Day => amount * 24,
            Unit::Week => amount * 168,
        }
    }
}

/// Absolute formats carrying a time of day, tried before date-only forms.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// Date-only formats, midnight-anchored. Ordered; the first successful parse
/// wins, so `%d/%m/%Y` outranks `%m/%d/%Y` for ambiguous slash dates.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
    "%Y년 %m월 %d일",
    "%Y. %m. %d.",
];

/// Inclusive window check. Negative diffs (timestamp in the future) are
/// tolerated down to `-window_hours`: sources publish local-time dates that
/// can run ahead of UTC by up to a day.
fn within_window(diff_hours: f64, window_hours: i64) -> bool {
    diff_hours <= window_hours as f64 && diff_hours >= -(window_hours as f64)
}

/// `true` when `date_str` is inside the freshness window, evaluated at the
/// current wall clock.
pub fn is_recent(date_str: &str, window_hours: i64) -> bool {
    is_recent_at(Utc::now(), date_str, window_hours)
}

/// Clock-as-argument variant of [`is_recent`], used by tests and by callers
/// that evaluate a whole batch against one instant.
pub fn is_recent_at(now: DateTime<Utc>, date_str: &str, window_hours: i64) -> bool {
    let raw = date_str.trim();
    if raw.is_empty() {
        return false;
    }
    let lower = raw.to_lowercase();

    // Explicit "old" phrasing short-circuits before anything else.
    if RE_STALE.is_match(&lower) {
        return false;
    }

    // Relative `(amount)(unit)` forms.
    if let Some((amount, unit)) = parse_relative(&lower) {
        return match unit {
            Unit::Minute => true,
            Unit::Hour => amount <= window_hours,
            Unit::Day | Unit::Week => unit.to_hours(amount) <= window_hours,
        };
    }

    // Bare keywords with an implied amount.
    if let Some(hours) = implied_hours(&lower) {
        return hours <= window_hours;
    }

    // A string containing today's ISO date is fresh by definition.
    if lower.contains(&now.format("%Y-%m-%d").to_string()) {
        return true;
    }

    // Full absolute parse as the last resort.
    if let Some(parsed) = parse_absolute(raw) {
        let diff_hours = now.signed_duration_since(parsed).num_seconds() as f64 / 3600.0;
        return within_window(diff_hours, window_hours);
    }

    // Unparseable dates are discarded, not kept.
    false
}

/// Best-effort inferred age in hours; smaller is more recent. Unparseable
/// input ranks worst (`i64::MAX`).
pub fn recency_rank(date_str: &str) -> i64 {
    recency_rank_at(Utc::now(), date_str)
}

pub fn recency_rank_at(now: DateTime<Utc>, date_str: &str) -> i64 {
    let raw = date_str.trim();
    if raw.is_empty() {
        return i64::MAX;
    }
    let lower = raw.to_lowercase();

    if let Some((amount, unit)) = parse_relative(&lower) {
        return unit.to_hours(amount);
    }
    if let Some(hours) = implied_hours(&lower) {
        return hours;
    }
    if lower.contains(&now.format("%Y-%m-%d").to_string()) {
        return 0;
    }
    if let Some(parsed) = parse_absolute(raw) {
        return now.signed_duration_since(parsed).num_hours().max(0);
    }
    i64::MAX
}

fn parse_relative(lower: &str) -> Option<(i64, Unit)> {
    if let Some(caps) = RE_REL_EN.captures(lower) {
        let n: i64 = caps["n"].parse().ok()?;
        return Some((n, Unit::from_en(&caps["unit"])));
    }
    if let Some(caps) = RE_REL_KO.captures(lower) {
        let n: i64 = caps["n"].parse().ok()?;
        return Some((n, Unit::from_ko(&caps["unit"])));
    }
    None
}

/// Keyword-only forms mapped to an implied age in hours.
fn implied_hours(lower: &str) -> Option<i64> {
    if lower.contains("just now")
        || lower.contains("moments ago")
        || lower.contains("a minute ago")
        || lower.contains("today")
        || lower.contains("오늘")
        || lower.contains("방금")
    {
        return Some(0);
    }
    if lower.contains("an hour ago") {
        return Some(1);
    }
    if lower.contains("yesterday") || lower.contains("a day ago") || lower.contains("어제") {
        return Some(24);
    }
    None
}

fn parse_absolute(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            let midnight = d.and_hms_opt(0, 0, 0)?;
            return Some(midnight.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_and_blank_are_not_recent() {
        for w in [0, 1, 24, 48, 1000] {
            assert!(!is_recent_at(fixed_now(), "", w));
            assert!(!is_recent_at(fixed_now(), "   ", w));
        }
    }

    #[test]
    fn minutes_are_always_recent() {
        let now = fixed_now();
        assert!(is_recent_at(now, "5 minutes ago", 1));
        assert!(is_recent_at(now, "900 min ago", 1));
        assert!(is_recent_at(now, "30 seconds ago", 1));
        assert!(is_recent_at(now, "3분 전", 1));
    }

    #[test]
    fn hours_respect_window_inclusive() {
        let now = fixed_now();
        assert!(is_recent_at(now, "2 hours ago", 48));
        assert!(is_recent_at(now, "48 hours ago", 48));
        assert!(!is_recent_at(now, "49 hours ago", 48));
        assert!(is_recent_at(now, "0 hours ago", 0));
        assert!(is_recent_at(now, "12시간 전", 24));
    }

    #[test]
    fn days_scale_to_hours() {
        let now = fixed_now();
        assert!(is_recent_at(now, "2 days ago", 48));
        assert!(!is_recent_at(now, "3 days ago", 48));
        assert!(!is_recent_at(now, "9 days ago", 48));
        assert!(!is_recent_at(now, "2일 전", 24));
    }

    #[test]
    fn stale_phrases_short_circuit() {
        let now = fixed_now();
        assert!(!is_recent_at(now, "last week", 10_000));
        assert!(!is_recent_at(now, "last month", 10_000));
        assert!(!is_recent_at(now, "2 weeks ago", 10_000));
        assert!(!is_recent_at(now, "3 months ago", 10_000));
        assert!(!is_recent_at(now, "1 year ago", 10_000));
    }

    #[test]
    fn bare_keywords_map_to_implied_amounts() {
        let now = fixed_now();
        assert!(is_recent_at(now, "today", 0));
        assert!(is_recent_at(now, "Posted today", 24));
        assert!(is_recent_at(now, "just now", 1));
        assert!(is_recent_at(now, "yesterday", 24));
        assert!(is_recent_at(now, "a day ago", 24));
        assert!(!is_recent_at(now, "yesterday", 23));
        assert!(is_recent_at(now, "어제", 24));
    }

    #[test]
    fn todays_iso_date_is_recent() {
        let now = fixed_now();
        assert!(is_recent_at(now, "2025-06-15", 1));
        assert!(is_recent_at(now, "published 2025-06-15 07:00 UTC", 1));
    }

    #[test]
    fn absolute_formats_fall_back_to_full_parse() {
        let now = fixed_now();
        assert!(is_recent_at(now, "2025-06-15T08:00:00Z", 24));
        assert!(is_recent_at(now, "2025-06-14 20:00:00", 24));
        assert!(!is_recent_at(now, "2025-06-10 20:00:00", 24));
        assert!(is_recent_at(now, "Jun 14, 2025", 48));
        assert!(is_recent_at(now, "2025년 6월 14일", 48));
        assert!(is_recent_at(now, "2025. 06. 14.", 48));
        assert!(!is_recent_at(now, "May 1, 2020", 48));
    }

    #[test]
    fn future_skew_is_tolerated_up_to_window() {
        let now = fixed_now();
        // A source running ahead of UTC by a few hours.
        assert!(is_recent_at(now, "2025-06-15 20:00:00", 24));
        // But not absurdly far in the future.
        assert!(!is_recent_at(now, "2025-06-20 12:00:00", 24));
    }

    #[test]
    fn unparseable_is_excluded() {
        let now = fixed_now();
        assert!(!is_recent_at(now, "once upon a time", 1_000_000));
        assert!(!is_recent_at(now, "N/A", 48));
    }

    #[test]
    fn rank_orders_by_inferred_age() {
        let now = fixed_now();
        let one_h = recency_rank_at(now, "1 hour ago");
        let five_h = recency_rank_at(now, "5 hours ago");
        let yesterday = recency_rank_at(now, "yesterday");
        let unknown = recency_rank_at(now, "???");
        assert!(one_h < five_h);
        assert!(five_h < yesterday);
        assert_eq!(unknown, i64::MAX);
        assert_eq!(recency_rank_at(now, "10 minutes ago"), 0);
        assert_eq!(recency_rank_at(now, "3 days ago"), 72);
    }
}
