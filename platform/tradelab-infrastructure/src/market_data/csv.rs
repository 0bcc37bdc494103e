use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tradelab_domain::repositories::market_data::{PriceSeriesProvider, SeriesQuery};
use tradelab_domain::services::ohlcv::{DataQualityReport, DEFAULT_MAX_GAP_DAYS};
use tradelab_domain::value_objects::bar::Bar;

#[derive(Debug, Deserialize)]
pub struct OhlcvRecord {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reads a daily OHLCV CSV (`date,open,high,low,close,volume`).
///
/// Rows with a non-finite or non-positive close are dropped, later duplicates
/// replace earlier ones and the result is sorted by date. The report describes
/// the file as read.
pub fn load_csv(path: &Path, symbol: &str) -> Result<(Vec<Bar>, DataQualityReport), String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open OHLCV CSV {}: {}", path.display(), err))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut bars_by_date: BTreeMap<NaiveDate, Bar> = BTreeMap::new();
    let mut report = DataQualityReport::default();
    let mut last_seen: Option<NaiveDate> = None;
    let mut max_gap: Option<i64> = None;

    for result in reader.deserialize::<OhlcvRecord>() {
        let record = result.map_err(|err| {
            format!("failed to parse CSV row in {}: {}", path.display(), err)
        })?;
        report.bars += 1;
        let date = parse_date(&record.date)?;

        if !record.close.is_finite() || record.close <= 0.0 {
            report.invalid_close += 1;
            report.first_invalid_close.get_or_insert(date);
            continue;
        }

        if let Some(prev) = last_seen {
            if date < prev {
                report.out_of_order += 1;
                report.first_out_of_order.get_or_insert(date);
            }
        }
        last_seen = Some(date);

        let bar = Bar {
            symbol: symbol.to_string(),
            date,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        };
        if bars_by_date.insert(date, bar).is_some() {
            report.duplicates += 1;
            report.first_duplicate.get_or_insert(date);
        }
    }

    let mut bars = Vec::with_capacity(bars_by_date.len());
    let mut last_unique: Option<NaiveDate> = None;
    for (date, bar) in bars_by_date {
        report.first_date.get_or_insert(date);
        report.last_date = Some(date);

        if let Some(prev) = last_unique {
            let diff = (date - prev).num_days();
            if diff > DEFAULT_MAX_GAP_DAYS {
                report.gaps += 1;
                report.first_gap.get_or_insert(date);
                max_gap = Some(max_gap.map_or(diff, |current| current.max(diff)));
            }
        }
        last_unique = Some(date);
        bars.push(bar);
    }

    report.max_gap_days = max_gap;
    Ok((bars, report))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| {
            // Accept timestamps such as `2024-01-02T00:00:00Z` by their date part.
            trimmed
                .get(..10)
                .ok_or(())
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").map_err(|_| ()))
        })
        .map_err(|_| format!("invalid date '{value}' (expected YYYY-MM-DD)"))
}

/// One `<TICKER>.csv` file per symbol in a directory.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Tickers are file stems, so anything that could leave `dir` is refused.
    pub fn path_for(&self, ticker: &str) -> Result<PathBuf, String> {
        let escapes = ticker.is_empty()
            || ticker.contains("..")
            || ticker.chars().any(|c| c == '/' || c == '\\' || c == ':' || c == '\0');
        if escapes {
            return Err(format!("invalid ticker '{ticker}' for a CSV file name"));
        }
        Ok(self.dir.join(format!("{ticker}.csv")))
    }
}

impl PriceSeriesProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn load_series(&self, query: &SeriesQuery) -> Result<Vec<Bar>, String> {
        let (bars, _report) = self.inspect_series(query)?;
        Ok(bars)
    }

    fn inspect_series(
        &self,
        query: &SeriesQuery,
    ) -> Result<(Vec<Bar>, DataQualityReport), String> {
        let path = self.path_for(&query.ticker)?;
        let (bars, report) = load_csv(&path, &query.ticker)?;
        let dropped = report.invalid_close + report.duplicates;
        if dropped > 0 {
            metrics::counter!("tradelab.data.csv_rows_dropped").increment(dropped as u64);
            tracing::debug!(
                ticker = %query.ticker,
                invalid_close = report.invalid_close,
                duplicates = report.duplicates,
                "dropped CSV rows"
            );
        }
        let bars = bars
            .into_iter()
            .filter(|bar| bar.date >= query.start && bar.date <= query.end)
            .collect();
        Ok((bars, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_tmp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("tradelab_{prefix}_{}_{}", std::process::id(), now))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date")
    }

    const MESSY: &str = "date,open,high,low,close,volume
2024-01-03,11,12,10,11.5,1000
2024-01-02,10,11,9,10.5,900
2024-01-03,11,12,10,11.75,1100
2024-01-04,12,13,11,0,1200
2024-01-15T00:00:00Z,13,14,12,13.5,1300
";

    #[test]
    fn load_csv_cleans_and_reports() {
        let dir = unique_tmp_dir("csv_load");
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("AAPL.csv");
        fs::write(&path, MESSY).expect("write");

        let (bars, report) = load_csv(&path, "AAPL").expect("load");
        let dates: Vec<NaiveDate> = bars.iter().map(|bar| bar.date).collect();
        assert_eq!(dates, vec![day(2), day(3), day(15)]);
        assert_eq!(bars[1].close, 11.75);
        assert_eq!(bars[0].symbol, "AAPL");

        assert_eq!(report.bars, 5);
        assert_eq!(report.out_of_order, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.invalid_close, 1);
        assert_eq!(report.gaps, 1);
        assert_eq!(report.max_gap_days, Some(12));
        assert!(report.has_violations());
    }

    #[test]
    fn directory_provider_filters_inclusive_range() {
        let dir = unique_tmp_dir("csv_provider");
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join("AAPL.csv"), MESSY).expect("write");

        let provider = CsvDirectoryProvider::new(&dir);
        let bars = provider
            .load_series(&SeriesQuery::new("AAPL", day(3), day(15)))
            .expect("bars");
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, day(3));
        assert_eq!(bars[1].date, day(15));

        let err = provider
            .load_series(&SeriesQuery::new("MSFT", day(1), day(31)))
            .expect_err("missing file");
        assert!(err.contains("MSFT.csv"));
    }

    #[test]
    fn rejects_bad_dates() {
        let dir = unique_tmp_dir("csv_bad_date");
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("BAD.csv");
        fs::write(&path, "date,open,high,low,close,volume\n01/02/2024,1,1,1,1,1\n").expect("write");
        let err = load_csv(&path, "BAD").expect_err("bad date");
        assert!(err.contains("01/02/2024"));
    }

    #[test]
    fn tickers_cannot_leave_the_data_directory() {
        let dir = unique_tmp_dir("csv_escape");
        let data = dir.join("data");
        fs::create_dir_all(&data).expect("dir");
        fs::write(dir.join("secrets.csv"), MESSY).expect("write");

        let provider = CsvDirectoryProvider::new(&data);
        for ticker in ["../secrets", "..", "nested/AAPL", "C:\\AAPL", ""] {
            let err = provider
                .load_series(&SeriesQuery::new(ticker, day(1), day(31)))
                .expect_err("escaping ticker");
            assert!(err.contains("invalid ticker"), "{ticker}: {err}");
        }
        assert_eq!(
            provider.path_for("BRK.B").expect("dotted ticker"),
            data.join("BRK.B.csv")
        );
    }
}
