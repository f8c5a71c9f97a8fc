use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{ComparisonKind, DateRange};

/// Date windows for one run, all anchored on the run date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindows {
    pub current: DateRange,
    pub prior: DateRange,
    pub year_ago: Option<DateRange>,
}

impl ReportWindows {
    /// The current window ends yesterday. The prior window ends the day before
    /// the current one starts. The year-ago window is the current one shifted
    /// back twelve calendar months.
    pub fn compute(
        run_date: NaiveDate,
        report_days: u32,
        comparison_days: u32,
        year_over_year: bool,
    ) -> AppResult<Self> {
        if report_days == 0 || comparison_days == 0 {
            return Err(AppError::Config(
                "lookback windows must be at least one day".to_string(),
            ));
        }

        let current_end = back(run_date, 1)?;
        let current = DateRange::new(back(current_end, report_days - 1)?, current_end);

        let prior_end = back(current.start, 1)?;
        let prior = DateRange::new(back(prior_end, comparison_days - 1)?, prior_end);

        let year_ago = if year_over_year {
            Some(DateRange::new(
                year_back(current.start)?,
                year_back(current.end)?,
            ))
        } else {
            None
        };

        Ok(Self {
            current,
            prior,
            year_ago,
        })
    }

    pub fn comparison(&self, kind: ComparisonKind) -> Option<DateRange> {
        match kind {
            ComparisonKind::PeriodOverPeriod => Some(self.prior),
            ComparisonKind::YearOverYear => self.year_ago,
        }
    }
}

/// ISO week number used in report names and subjects.
pub fn report_week(run_date: NaiveDate) -> u32 {
    run_date.iso_week().week()
}

fn back(date: NaiveDate, days: u32) -> AppResult<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| AppError::Config(format!("date out of range: {date} - {days} days")))
}

fn year_back(date: NaiveDate) -> AppResult<NaiveDate> {
    date.checked_sub_months(Months::new(12))
        .ok_or_else(|| AppError::Config(format!("date out of range: {date} - 12 months")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_thirty_day_windows() {
        let windows = ReportWindows::compute(date(2026, 10, 16), 30, 30, true).unwrap();
        assert_eq!(windows.current, DateRange::new(date(2026, 9, 16), date(2026, 10, 15)));
        assert_eq!(windows.current.days(), 30);
        assert_eq!(windows.prior, DateRange::new(date(2026, 8, 17), date(2026, 9, 15)));
        assert_eq!(windows.prior.days(), 30);
        assert_eq!(
            windows.year_ago,
            Some(DateRange::new(date(2025, 9, 16), date(2025, 10, 15)))
        );
    }

    #[test]
    fn test_year_ago_clamps_leap_day() {
        let windows = ReportWindows::compute(date(2028, 3, 1), 7, 7, true).unwrap();
        assert_eq!(windows.current.end, date(2028, 2, 29));
        assert_eq!(windows.year_ago.unwrap().end, date(2027, 2, 28));
    }

    #[test]
    fn test_year_over_year_disabled() {
        let windows = ReportWindows::compute(date(2026, 10, 16), 30, 30, false).unwrap();
        assert!(windows.year_ago.is_none());
        assert!(windows.comparison(ComparisonKind::YearOverYear).is_none());
        assert_eq!(
            windows.comparison(ComparisonKind::PeriodOverPeriod),
            Some(windows.prior)
        );
    }

    #[test]
    fn test_uneven_lookbacks() {
        let windows = ReportWindows::compute(date(2026, 10, 16), 7, 28, false).unwrap();
        assert_eq!(windows.current.days(), 7);
        assert_eq!(windows.prior.days(), 28);
        assert_eq!(windows.prior.end, date(2026, 10, 8));
    }

    #[test]
    fn test_zero_lookback_rejected() {
        let err = ReportWindows::compute(date(2026, 10, 16), 0, 30, true).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_report_week() {
        assert_eq!(report_week(date(2026, 10, 16)), 42);
        assert_eq!(report_week(date(2027, 1, 1)), 53);
    }
}
