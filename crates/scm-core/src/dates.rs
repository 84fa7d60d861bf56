//! Best-effort date parsing for sheet cells.
//!
//! All instants are local wall-clock (`NaiveDateTime`). Date-only text is
//! taken as local calendar components, so `"2024-03-05"` is always March 5th
//! regardless of the host offset. Offset-bearing instants (`...Z`,
//! `...+02:00`) and Unix timestamps are converted to local wall-clock.
//!
//! Nothing in this module panics or returns an error: unparseable input is
//! `None` and callers decide whether that deserves a message.

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};

use crate::types::{OrderStatus, StageHistoryItem};

/// Values below this are Unix seconds, at or above it Unix milliseconds.
const SECONDS_CUTOFF: f64 = 3_000_000_000.0;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Anything a cell or caller may hand to [`parse_date`].
#[derive(Debug, Clone, Copy)]
pub enum DateInput<'a> {
    Text(&'a str),
    Number(f64),
    Instant(NaiveDateTime),
    Absent,
}

impl<'a> From<&'a str> for DateInput<'a> {
    fn from(s: &'a str) -> Self {
        DateInput::Text(s)
    }
}

impl<'a> From<&'a String> for DateInput<'a> {
    fn from(s: &'a String) -> Self {
        DateInput::Text(s.as_str())
    }
}

impl<'a> From<Option<&'a str>> for DateInput<'a> {
    fn from(s: Option<&'a str>) -> Self {
        s.map_or(DateInput::Absent, DateInput::Text)
    }
}

impl From<f64> for DateInput<'_> {
    fn from(n: f64) -> Self {
        DateInput::Number(n)
    }
}

impl From<i64> for DateInput<'_> {
    fn from(n: i64) -> Self {
        DateInput::Number(n as f64)
    }
}

impl From<NaiveDateTime> for DateInput<'_> {
    fn from(d: NaiveDateTime) -> Self {
        DateInput::Instant(d)
    }
}

impl From<Option<NaiveDateTime>> for DateInput<'_> {
    fn from(d: Option<NaiveDateTime>) -> Self {
        d.map_or(DateInput::Absent, DateInput::Instant)
    }
}

/// Parse a date cell. Forms are tried in order:
///
/// 1. number, or all-digit text: Unix timestamp (seconds below 3e9,
///    milliseconds otherwise);
/// 2. ISO-like text: `YYYY-M-D`, `YYYY/M/D`, `YYYY-MM-DDTHH:MM[:SS[.f]]`
///    with optional `Z` / offset, `YYYY-MM-DD HH:MM[:SS]`, and the display
///    form produced by [`format_date`];
/// 3. `P1/P2/YYYY` or `P1-P2-YYYY`: month/day first, then day/month.
///
/// Ambiguous strings such as `03/05/2024` resolve as month/day (March 5th).
pub fn parse_date<'a>(input: impl Into<DateInput<'a>>) -> Option<NaiveDateTime> {
    match input.into() {
        DateInput::Absent => None,
        DateInput::Instant(d) => Some(d),
        DateInput::Number(n) => from_timestamp(n),
        DateInput::Text(s) => parse_text(s.trim()),
    }
}

fn parse_text(t: &str) -> Option<NaiveDateTime> {
    if t.is_empty() {
        return None;
    }
    if t.bytes().all(|b| b.is_ascii_digit()) {
        return t.parse::<f64>().ok().and_then(from_timestamp);
    }
    parse_iso_like(t).or_else(|| parse_month_day_year(t))
}

fn from_timestamp(n: f64) -> Option<NaiveDateTime> {
    if !n.is_finite() {
        return None;
    }
    let millis = if n < SECONDS_CUTOFF { n * 1000.0 } else { n };
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64)
        .single()
        .map(|d| d.with_timezone(&Local).naive_local())
}

fn parse_iso_like(t: &str) -> Option<NaiveDateTime> {
    if let Some(d) = year_first_calendar(t, '-').or_else(|| year_first_calendar(t, '/')) {
        return Some(d.and_time(NaiveTime::MIN));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    if let Some(dt) = NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(t, f).ok())
    {
        return Some(dt);
    }
    NaiveDate::parse_from_str(t, "%b %d, %Y")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// `YYYY<sep>M<sep>D` with one or two digit month and day.
fn year_first_calendar(t: &str, sep: char) -> Option<NaiveDate> {
    let mut parts = t.split(sep);
    let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || y.len() != 4 || !(1..=2).contains(&m.len()) {
        return None;
    }
    if !(1..=2).contains(&d.len()) {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !(all_digits(y) && all_digits(m) && all_digits(d)) {
        return None;
    }
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// `P1<sep>P2<sep>YYYY`, sep is `/` or `-`.
fn parse_month_day_year(t: &str) -> Option<NaiveDateTime> {
    let sep = if t.contains('/') { '/' } else { '-' };
    let parts: Vec<&str> = t.split(sep).collect();
    if parts.len() != 3 {
        return None;
    }
    let digits_of_len = |s: &str, lens: std::ops::RangeInclusive<usize>| {
        lens.contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
    };
    if !digits_of_len(parts[0], 1..=2)
        || !digits_of_len(parts[1], 1..=2)
        || !digits_of_len(parts[2], 4..=4)
    {
        return None;
    }
    let p1: u32 = parts[0].parse().ok()?;
    let p2: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;

    NaiveDate::from_ymd_opt(year, p1, p2)
        .or_else(|| NaiveDate::from_ymd_opt(year, p2, p1))
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Short display text, e.g. `Mar 5, 2024`.
///
/// `N/A` for absent or blank input, `Invalid Date` for input that does not
/// parse.
pub fn format_date<'a>(input: impl Into<DateInput<'a>>) -> String {
    let input = input.into();
    match input {
        DateInput::Absent => return "N/A".to_string(),
        DateInput::Text(s) if s.trim().is_empty() => return "N/A".to_string(),
        _ => {}
    }
    match parse_date(input) {
        Some(d) => d.format("%b %-d, %Y").to_string(),
        None => "Invalid Date".to_string(),
    }
}

/// Whole calendar days from `a` to `b` (negative when `b` is earlier).
///
/// Both instants are normalized to local midnight first. `None` when either
/// side is absent or unparseable.
pub fn days_between<'a, 'b>(
    a: impl Into<DateInput<'a>>,
    b: impl Into<DateInput<'b>>,
) -> Option<i64> {
    let a = parse_date(a)?;
    let b = parse_date(b)?;
    Some((b.date() - a.date()).num_days())
}

/// Fractional days between two instants, used for turnaround averages.
pub fn fractional_days(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    (end - start).num_seconds() as f64 / 86_400.0
}

/// `d` shifted by `days` calendar days; `d` itself on overflow.
pub fn add_days(d: NaiveDateTime, days: i64) -> NaiveDateTime {
    d.checked_add_signed(Duration::days(days)).unwrap_or(d)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDate {
    Start,
    End,
}

/// Start or end date of the first history entry for `stage`.
pub fn stage_date(
    history: &[StageHistoryItem],
    stage: OrderStatus,
    which: StageDate,
) -> Option<NaiveDateTime> {
    let item = history.iter().find(|h| h.stage == stage)?;
    match which {
        StageDate::Start => Some(item.start_date),
        StageDate::End => item.end_date,
    }
}

/// Current local wall-clock time.
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn year_of(d: NaiveDateTime) -> i32 {
    d.year()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn ymd(d: NaiveDateTime) -> (i32, u32, u32) {
        (d.year(), d.month(), d.day())
    }

    #[test]
    fn iso_date_only_is_local_calendar() {
        let d = parse_date("2024-03-05").unwrap();
        assert_eq!(ymd(d), (2024, 3, 5));
        assert_eq!(d.hour(), 0);
    }

    #[test]
    fn single_digit_iso_components() {
        assert_eq!(ymd(parse_date("2024-3-5").unwrap()), (2024, 3, 5));
        assert_eq!(ymd(parse_date("2024/12/01").unwrap()), (2024, 12, 1));
    }

    #[test]
    fn naive_datetime_forms() {
        let d = parse_date("2024-03-05T14:30:00").unwrap();
        assert_eq!((d.hour(), d.minute()), (14, 30));
        let d = parse_date("2024-03-05 08:15").unwrap();
        assert_eq!(d.hour(), 8);
    }

    #[test]
    fn offset_datetime_converts_to_local() {
        let d = parse_date("2024-03-05T12:00:00Z").unwrap();
        let expected = Utc
            .with_ymd_and_hms(2024, 3, 5, 12, 0, 0)
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(d, expected);
    }

    #[test]
    fn month_day_year_preferred_when_ambiguous() {
        assert_eq!(ymd(parse_date("03/05/2024").unwrap()), (2024, 3, 5));
        assert_eq!(ymd(parse_date("3-5-2024").unwrap()), (2024, 3, 5));
    }

    #[test]
    fn day_month_year_when_month_day_is_impossible() {
        assert_eq!(ymd(parse_date("25/12/2024").unwrap()), (2024, 12, 25));
        assert_eq!(ymd(parse_date("31-01-2024").unwrap()), (2024, 1, 31));
    }

    #[test]
    fn impossible_calendar_dates_are_none() {
        assert!(parse_date("02/30/2024").is_none());
        assert!(parse_date("2024-02-30").is_none());
        assert!(parse_date("13/13/2024").is_none());
    }

    #[test]
    fn timestamps_seconds_and_millis_agree() {
        let secs = parse_date(1_700_000_000_i64).unwrap();
        let millis = parse_date(1_700_000_000_000_i64).unwrap();
        assert_eq!(secs, millis);
        assert_eq!(parse_date("1700000000").unwrap(), secs);
        let expected = Utc
            .timestamp_opt(1_700_000_000, 0)
            .unwrap()
            .with_timezone(&Local)
            .naive_local();
        assert_eq!(secs, expected);
    }

    #[test]
    fn garbage_and_blank_are_none() {
        assert!(parse_date("not a date").is_none());
        assert!(parse_date("").is_none());
        assert!(parse_date("   ").is_none());
        assert!(parse_date(DateInput::Absent).is_none());
        assert!(parse_date(f64::NAN).is_none());
    }

    #[test]
    fn days_between_counts_calendar_days() {
        assert_eq!(days_between("2024-01-01", "2024-01-03"), Some(2));
        assert_eq!(days_between("2024-01-03", "2024-01-01"), Some(-2));
        assert_eq!(
            days_between("2024-01-01T23:59:00", "2024-01-02T00:01:00"),
            Some(1)
        );
        assert_eq!(days_between(DateInput::Absent, "2024-01-01"), None);
        assert_eq!(days_between("2024-01-01", "nope"), None);
    }

    #[test]
    fn format_and_reparse() {
        assert_eq!(format_date("2024-03-05"), "Mar 5, 2024");
        assert_eq!(format_date(DateInput::Absent), "N/A");
        assert_eq!(format_date("  "), "N/A");
        assert_eq!(format_date("junk"), "Invalid Date");
        let d = parse_date("Mar 5, 2024").unwrap();
        assert_eq!(ymd(d), (2024, 3, 5));
    }

    #[test]
    fn add_days_and_fractional_days() {
        let d = parse_date("2024-02-28").unwrap();
        assert_eq!(ymd(add_days(d, 2)), (2024, 3, 1));
        let later = parse_date("2024-02-29T12:00:00").unwrap();
        assert!((fractional_days(d, later) - 1.5).abs() < 1e-9);
    }
}
