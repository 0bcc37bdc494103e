use crate::value_objects::bar::Bar;
use chrono::NaiveDate;
use serde::Serialize;

/// Calendar days between consecutive bars above which a gap is reported.
/// Covers weekends and most exchange holidays.
pub const DEFAULT_MAX_GAP_DAYS: i64 = 5;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DataQualityReport {
    pub bars: usize,
    pub duplicates: usize,
    pub gaps: usize,
    pub out_of_order: usize,
    pub invalid_close: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub first_gap: Option<NaiveDate>,
    pub first_duplicate: Option<NaiveDate>,
    pub first_out_of_order: Option<NaiveDate>,
    pub first_invalid_close: Option<NaiveDate>,
    pub max_gap_days: Option<i64>,
}

impl DataQualityReport {
    /// Gaps are informational; everything else breaks the one-bar-per-day
    /// ordering the engine relies on.
    pub fn has_violations(&self) -> bool {
        self.duplicates > 0 || self.out_of_order > 0 || self.invalid_close > 0
    }
}

pub fn data_quality_from_bars(bars: &[Bar], max_gap_days: Option<i64>) -> DataQualityReport {
    let mut report = DataQualityReport {
        bars: bars.len(),
        ..DataQualityReport::default()
    };
    if bars.is_empty() {
        return report;
    }

    let max_gap = max_gap_days.unwrap_or(DEFAULT_MAX_GAP_DAYS).max(1);
    report.first_date = Some(bars[0].date);

    let mut last_date: Option<NaiveDate> = None;
    let mut widest: Option<i64> = None;

    for bar in bars {
        let date = bar.date;

        if !bar.close.is_finite() || bar.close <= 0.0 {
            report.invalid_close += 1;
            report.first_invalid_close.get_or_insert(date);
        }

        if let Some(prev) = last_date {
            if date == prev {
                report.duplicates += 1;
                report.first_duplicate.get_or_insert(date);
            } else if date < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(date);
            } else {
                let diff = (date - prev).num_days();
                if diff > max_gap {
                    report.gaps += 1;
                    report.first_gap.get_or_insert(date);
                    widest = Some(widest.map_or(diff, |current| current.max(diff)));
                }
            }
        }

        last_date = Some(date);
        report.last_date = Some(date);
    }

    report.max_gap_days = widest;
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(y: i32, m: u32, d: u32, close: f64) -> Bar {
        Bar {
            symbol: "TEST".to_string(),
            date: NaiveDate::from_ymd_opt(y, m, d).expect("valid date"),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn weekend_is_not_a_gap() {
        // Friday then Monday
        let report = data_quality_from_bars(
            &[bar(2024, 1, 5, 10.0), bar(2024, 1, 8, 11.0)],
            None,
        );
        assert!(!report.has_violations());
        assert_eq!(report.gaps, 0);
        assert_eq!(report.bars, 2);
        assert_eq!(report.last_date, NaiveDate::from_ymd_opt(2024, 1, 8));
    }

    #[test]
    fn detects_duplicates_out_of_order_gaps_and_bad_closes() {
        let report = data_quality_from_bars(
            &[
                bar(2024, 1, 2, 10.0),
                bar(2024, 1, 2, 10.0),
                bar(2024, 1, 1, 10.0),
                bar(2024, 1, 20, f64::NAN),
                bar(2024, 1, 21, 0.0),
            ],
            None,
        );
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.out_of_order, 1);
        assert_eq!(report.gaps, 1);
        assert_eq!(report.max_gap_days, Some(19));
        assert_eq!(report.invalid_close, 2);
        assert!(report.has_violations());
    }

    #[test]
    fn gaps_alone_are_not_violations() {
        let report = data_quality_from_bars(
            &[bar(2024, 1, 2, 10.0), bar(2024, 2, 2, 10.0)],
            Some(3),
        );
        assert_eq!(report.gaps, 1);
        assert!(!report.has_violations());
    }
}
