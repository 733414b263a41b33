//! Date-range normalization and clamping.
//!
//! The backend keeps roughly six months of time series, and a range of a
//! single day renders as an unusable chart, so ranges are clamped before they
//! reach a request key.

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_DAYS: u64 = 90;
pub const MAX_RANGE_MONTHS: u32 = 6;
pub const MIN_RANGE_DAYS: u64 = 6;

/// One end of a date range, as a consumer may hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateBound {
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl DateBound {
    /// Canonical `YYYY-MM-DD`, `Z`-suffixed for UTC timestamps. `None` when
    /// free text cannot be read as a date.
    pub fn normalize(&self) -> Option<String> {
        match self {
            DateBound::Date(d) => Some(format_date(*d)),
            DateBound::Timestamp(ts) => Some(format!("{}Z", format_date(ts.date_naive()))),
            DateBound::Text(raw) => {
                let raw = raw.trim();
                if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
                    return Some(format!("{}Z", format_date(ts.with_timezone(&Utc).date_naive())));
                }
                let (date, zulu) = match raw.strip_suffix('Z') {
                    Some(date) => (date, true),
                    None => (raw, false),
                };
                let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
                Some(if zulu {
                    format!("{}Z", format_date(date))
                } else {
                    format_date(date)
                })
            }
        }
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        match self {
            DateBound::Date(d) => Some(*d),
            DateBound::Timestamp(ts) => Some(ts.date_naive()),
            DateBound::Text(_) => self
                .normalize()
                .and_then(|s| NaiveDate::parse_from_str(s.trim_end_matches('Z'), "%Y-%m-%d").ok()),
        }
    }
}

impl From<NaiveDate> for DateBound {
    fn from(d: NaiveDate) -> Self {
        DateBound::Date(d)
    }
}

impl From<DateTime<Utc>> for DateBound {
    fn from(ts: DateTime<Utc>) -> Self {
        DateBound::Timestamp(ts)
    }
}

impl From<&str> for DateBound {
    fn from(s: &str) -> Self {
        DateBound::Text(s.to_string())
    }
}

impl From<String> for DateBound {
    fn from(s: String) -> Self {
        DateBound::Text(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRangeSpec {
    pub from: Option<DateBound>,
    pub to: Option<DateBound>,
}

impl DateRangeSpec {
    pub fn new(from: impl Into<DateBound>, to: impl Into<DateBound>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    /// Open range; composes to the default trailing window.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// The `f` / `t` query values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeQuery {
    pub f: String,
    pub t: String,
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Trailing [`DEFAULT_WINDOW_DAYS`] window ending `today`.
pub fn default_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let from = today
        .checked_sub_days(Days::new(DEFAULT_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN);
    (from, today)
}

pub fn compose_date_range(range: &DateRangeSpec) -> DateRangeQuery {
    compose_date_range_at(range, today())
}

/// Normalize both bounds; if either is missing or unreadable, use the default
/// window ending `today` for both.
pub fn compose_date_range_at(range: &DateRangeSpec, today: NaiveDate) -> DateRangeQuery {
    let from = range.from.as_ref().and_then(DateBound::normalize);
    let to = range.to.as_ref().and_then(DateBound::normalize);
    match (from, to) {
        (Some(f), Some(t)) => DateRangeQuery { f, t },
        _ => {
            let (from, to) = default_window(today);
            DateRangeQuery {
                f: format_date(from),
                t: format_date(to),
            }
        }
    }
}

pub fn clamp_date_range(from: NaiveDate, to: NaiveDate) -> (NaiveDate, NaiveDate) {
    clamp_date_range_at(from, to, today())
}

/// Enforce range invariants relative to `today`:
/// swap reversed bounds, keep `to` out of the future, keep `from` within
/// [`MAX_RANGE_MONTHS`] of `to`, and widen to at least [`MIN_RANGE_DAYS`].
pub fn clamp_date_range_at(
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> (NaiveDate, NaiveDate) {
    let (mut from, mut to) = if from > to { (to, from) } else { (from, to) };

    if to > today {
        to = today;
    }
    if from > to {
        from = to;
    }

    let earliest = to
        .checked_sub_months(Months::new(MAX_RANGE_MONTHS))
        .unwrap_or(NaiveDate::MIN);
    if from < earliest {
        from = earliest;
    }

    if to.signed_duration_since(from).num_days() < MIN_RANGE_DAYS as i64 {
        from = to
            .checked_sub_days(Days::new(MIN_RANGE_DAYS))
            .unwrap_or(NaiveDate::MIN);
    }

    (from, to)
}

fn format_date(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}
