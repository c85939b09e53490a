//! Month arithmetic, date windows, and period-over-period deltas.
//!
//! All date windows are computed in the project's timezone and rendered as
//! `YYYY-MM-DD`; the scheduler's timezone governs cron firing only.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// A calendar month: the `(year, month)` part of every fact natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthRef {
    pub year: i32,
    pub month: u32,
}

impl MonthRef {
    /// Creates a validated month reference (`month ∈ [1,12]`, `year ≥ 2000`).
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::validation(format!(
                "month must be in 1..=12, got {month}"
            )));
        }
        if year < 2000 {
            return Err(Error::validation(format!(
                "year must be >= 2000, got {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// The month containing `instant`, in the given timezone.
    pub fn containing(instant: DateTime<Utc>, tz: Tz) -> Self {
        let local = instant.with_timezone(&tz);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// The current month in the given timezone.
    pub fn now_in(tz: Tz) -> Self {
        Self::containing(Utc::now(), tz)
    }

    /// The calendar month immediately preceding this one.
    pub fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// This month shifted back by `n` calendar months.
    pub fn minus(self, n: u32) -> Self {
        (0..n).fold(self, |m, _| m.prev())
    }

    /// First day of the month.
    pub fn first_day(self) -> NaiveDate {
        // month is validated on construction paths; fall back defensively
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or_else(|| NaiveDate::from_ymd_opt(self.year, 1, 1).expect("valid date"))
    }

    /// Last day of the month.
    pub fn last_day(self) -> NaiveDate {
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        next.expect("valid date").pred_opt().expect("valid date")
    }

    /// The `(date_from, date_to)` window covering the whole month,
    /// formatted as `YYYY-MM-DD`.
    pub fn date_window(self) -> (String, String) {
        (
            self.first_day().format("%Y-%m-%d").to_string(),
            self.last_day().format("%Y-%m-%d").to_string(),
        )
    }

    /// Period label in `YYYY-MM` form.
    pub fn label(self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Parses a `YYYY-MM` period label.
    pub fn parse_label(label: &str) -> Result<Self> {
        let (y, m) = label
            .split_once('-')
            .ok_or_else(|| Error::validation(format!("invalid period label: {label}")))?;
        let year: i32 = y
            .parse()
            .map_err(|_| Error::validation(format!("invalid period label: {label}")))?;
        let month: u32 = m
            .parse()
            .map_err(|_| Error::validation(format!("invalid period label: {label}")))?;
        Self::new(year, month)
    }
}

/// Resolves a timezone name, falling back to UTC on failure.
///
/// Used for both the scheduler zone and per-project date windows; a bad zone
/// must never stop a sync or the scheduler, it degrades to UTC.
pub fn resolve_timezone(name: &str) -> (Tz, bool) {
    match name.parse::<Tz>() {
        Ok(tz) => (tz, true),
        Err(_) => (chrono_tz::UTC, false),
    }
}

/// Period-over-period percentage change.
///
/// `previous = 0` is a divide-by-zero sentinel: 0 → 0 stays flat (0), while
/// 0 → k is reported as 100.
pub fn delta(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current == 0.0 {
            return 0.0;
        }
        return 100.0;
    }
    ((current - previous) / previous) * 100.0
}
