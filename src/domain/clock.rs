//! US Eastern calendar dates.
//!
//! Slates are keyed by the Eastern date of first pitch/tip, so "today" is
//! always computed in America/New_York rather than UTC.

use chrono::{
    DateTime, Datelike, FixedOffset, NaiveDate, Offset, TimeZone, Utc, Weekday,
};

const EST_OFFSET_SECS: i32 = -5 * 3600;
const EDT_OFFSET_SECS: i32 = -4 * 3600;

/// Nth occurrence (1-based) of a weekday in a month
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

/// Whether US daylight saving time is in effect at the given instant.
///
/// DST runs from 02:00 EST on the second Sunday of March (07:00 UTC) to
/// 02:00 EDT on the first Sunday of November (06:00 UTC).
pub fn is_eastern_dst(at: DateTime<Utc>) -> bool {
    let year = at.year();
    let (Some(start_day), Some(end_day)) = (
        nth_weekday(year, 3, Weekday::Sun, 2),
        nth_weekday(year, 11, Weekday::Sun, 1),
    ) else {
        return false;
    };

    let start = start_day.and_hms_opt(7, 0, 0).map(|t| t.and_utc());
    let end = end_day.and_hms_opt(6, 0, 0).map(|t| t.and_utc());

    match (start, end) {
        (Some(start), Some(end)) => at >= start && at < end,
        _ => false,
    }
}

/// UTC offset of US Eastern time at the given instant
pub fn eastern_offset(at: DateTime<Utc>) -> FixedOffset {
    let secs = if is_eastern_dst(at) {
        EDT_OFFSET_SECS
    } else {
        EST_OFFSET_SECS
    };
    FixedOffset::east_opt(secs).unwrap_or_else(|| Utc.fix())
}

/// Calendar date in US Eastern time for an instant
pub fn eastern_date(at: DateTime<Utc>) -> NaiveDate {
    eastern_offset(at).from_utc_datetime(&at.naive_utc()).date_naive()
}

/// Today's date in US Eastern time
pub fn eastern_today() -> NaiveDate {
    eastern_date(Utc::now())
}
