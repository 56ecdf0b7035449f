//! Recency window: locate the earliest row worth inspecting.
//!
//! Rows are assumed to be appended in non-decreasing date order. The scan
//! walks backward from the last row and stops at the first dated row older
//! than the cutoff, so out-of-order older rows after that point are not
//! seen. Callers that cannot guarantee ordering should not window the
//! source dataset.

use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::types::Field;

/// Accepted date layouts, tried in order; first match wins.
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y.%m.%d"];

/// Parse a lead date cell. Surrounding whitespace is ignored; blank or
/// unrecognised input yields `None`.
pub fn parse_lead_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// The calendar date of `now` in `tz`.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// `today - lookback_days`, saturating at the earliest representable date.
pub fn cutoff_date(today: NaiveDate, lookback_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(lookback_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Index of the earliest data row dated on or after the cutoff.
///
/// `rows` excludes the header. Returns `0`, meaning "treat everything as recent",
/// for an empty slice or when no row has a usable date. Rows with missing
/// or unparseable dates are skipped without ending the scan.
pub fn find_recent_start_index<R: AsRef<[String]>>(
    rows: &[R],
    lookback_days: u32,
    today: NaiveDate,
) -> usize {
    let cutoff = cutoff_date(today, lookback_days);
    let mut start = 0;

    for (index, row) in rows.iter().enumerate().rev() {
        let Some(date) = row
            .as_ref()
            .get(Field::Date.index())
            .and_then(|cell| parse_lead_date(cell))
        else {
            continue;
        };
        if date >= cutoff {
            start = index;
        } else {
            break;
        }
    }

    start
}
