//! # Period Resolver
//!
//! Turns the optional `Month Year` arguments of the reporting commands into a
//! concrete calendar-month date range. Ranges are inclusive on both ends.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use std::fmt;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Why a `Month Year` pair could not be resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    /// Month name matches none of the twelve calendar months
    UnknownMonth(String),
    /// Year is not a usable number
    InvalidYear(String),
}

impl fmt::Display for PeriodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodError::UnknownMonth(name) => write!(f, "Unknown month: {name}"),
            PeriodError::InvalidYear(year) => write!(f, "Invalid year: {year}"),
        }
    }
}

impl std::error::Error for PeriodError {}

/// An inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// The calendar month `month` (1-12) of `year`
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
        Some(Self { start, end })
    }

    /// The whole calendar year
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    /// The month containing `today`
    pub fn current_month(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        let end = start
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(today);
        Self { start, end }
    }

    /// Resolve a month name (case-insensitive) within `year`.
    ///
    /// ```rust
    /// use journal_bot::period::Period;
    ///
    /// let january = Period::parse("January", 2024).unwrap();
    /// assert_eq!(january.start.to_string(), "2024-01-01");
    /// assert_eq!(january.end.to_string(), "2024-01-31");
    /// ```
    pub fn parse(month_name: &str, year: i32) -> Result<Self, PeriodError> {
        let month = month_number(month_name)
            .ok_or_else(|| PeriodError::UnknownMonth(month_name.to_string()))?;
        Self::month(year, month).ok_or_else(|| PeriodError::InvalidYear(year.to_string()))
    }

    /// Resolve the raw command arguments.
    ///
    /// No month means the current month. A month without a year falls in
    /// the current year.
    pub fn resolve(
        month_name: Option<&str>,
        year: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self, PeriodError> {
        let Some(month_name) = month_name else {
            return Ok(Self::current_month(today));
        };

        let year = match year {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .map_err(|_| PeriodError::InvalidYear(raw.to_string()))?,
            None => today.year(),
        };

        Self::parse(month_name, year)
    }

    /// Half-open UTC instant range `[start 00:00, day after end 00:00)`
    pub fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let day_after = self.end.succ_opt().unwrap_or(self.end);
        (start_of_day(self.start), start_of_day(day_after))
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        let (from, until) = self.bounds();
        *instant >= from && *instant < until
    }

    /// Human label such as "January 2024"
    pub fn label(&self) -> String {
        let month_name = MONTH_NAMES[self.start.month0() as usize];
        if self.start.month() == 1 && self.end.month() == 12 {
            self.start.year().to_string()
        } else {
            format!("{} {}", month_name, self.start.year())
        }
    }
}

/// 1-based month number for an English month name
pub fn month_number(name: &str) -> Option<u32> {
    let name = name.trim();
    MONTH_NAMES
        .iter()
        .position(|candidate| candidate.eq_ignore_ascii_case(name))
        .map(|index| index as u32 + 1)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}
