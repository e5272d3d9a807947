//! Calendar period algebra for recurring schedules.
//!
//! # Responsibility
//! - Map `(date, count, unit)` to a new calendar date.
//! - Keep month/year arithmetic calendar-correct rather than fixed-duration.
//!
//! # Invariants
//! - Month and year steps keep the day-of-month where possible and clamp to
//!   the last day of shorter months (`Jan 31 + 1 month = Feb 28/29`).
//! - Arithmetic saturates at the representable date range instead of failing.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Recurrence unit for next-action and advance-notice intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
    Weekly,
    Monthly,
    Yearly,
}

impl Period {
    /// Stable storage label (`WEEKLY|MONTHLY|YEARLY`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            other => Err(format!(
                "unsupported period `{other}`; expected WEEKLY|MONTHLY|YEARLY"
            )),
        }
    }
}

/// Moves `date` forward by `count` units.
pub fn advance(date: NaiveDate, count: u32, unit: Period) -> NaiveDate {
    let moved = match unit {
        Period::Weekly => date.checked_add_days(Days::new(u64::from(count) * 7)),
        Period::Monthly => date.checked_add_months(Months::new(count)),
        Period::Yearly => count
            .checked_mul(12)
            .and_then(|months| date.checked_add_months(Months::new(months))),
    };
    moved.unwrap_or(NaiveDate::MAX)
}

/// Moves `date` backward by `count` units.
pub fn retreat(date: NaiveDate, count: u32, unit: Period) -> NaiveDate {
    let moved = match unit {
        Period::Weekly => date.checked_sub_days(Days::new(u64::from(count) * 7)),
        Period::Monthly => date.checked_sub_months(Months::new(count)),
        Period::Yearly => count
            .checked_mul(12)
            .and_then(|months| date.checked_sub_months(Months::new(months))),
    };
    moved.unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::{advance, retreat, Period};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_advance_clamps_to_shorter_month() {
        assert_eq!(advance(date(2024, 1, 31), 1, Period::Monthly), date(2024, 2, 29));
        assert_eq!(advance(date(2023, 1, 31), 1, Period::Monthly), date(2023, 2, 28));
    }

    #[test]
    fn leap_day_plus_one_year_lands_on_feb_28() {
        assert_eq!(advance(date(2024, 2, 29), 1, Period::Yearly), date(2025, 2, 28));
    }

    #[test]
    fn retreat_weeks_is_fixed_seven_days() {
        assert_eq!(retreat(date(2025, 3, 3), 2, Period::Weekly), date(2025, 2, 17));
    }

    #[test]
    fn arithmetic_saturates_at_range_limits() {
        assert_eq!(advance(NaiveDate::MAX, 1, Period::Weekly), NaiveDate::MAX);
        assert_eq!(retreat(NaiveDate::MIN, 1, Period::Yearly), NaiveDate::MIN);
    }

    #[test]
    fn period_parses_storage_labels() {
        assert_eq!("monthly".parse::<Period>().unwrap(), Period::Monthly);
        assert!("daily".parse::<Period>().is_err());
        assert_eq!(Period::Yearly.to_string(), "YEARLY");
    }
}
