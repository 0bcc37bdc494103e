use crate::services::ohlcv::{data_quality_from_bars, DataQualityReport};
use crate::value_objects::bar::Bar;
use chrono::NaiveDate;

/// Daily series request for one ticker, `start..=end` unless the provider
/// documents otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuery {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SeriesQuery {
    pub fn new(ticker: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            start,
            end,
        }
    }
}

pub trait PriceSeriesProvider {
    fn name(&self) -> &str;

    /// Bars in ascending date order, one per trading day.
    fn load_series(&self, query: &SeriesQuery) -> Result<Vec<Bar>, String>;

    /// Series plus a quality report. Providers that clean their source should
    /// report on the rows as read, before cleaning.
    fn inspect_series(
        &self,
        query: &SeriesQuery,
    ) -> Result<(Vec<Bar>, DataQualityReport), String> {
        let bars = self.load_series(query)?;
        let report = data_quality_from_bars(&bars, None);
        Ok((bars, report))
    }
}
