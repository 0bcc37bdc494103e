use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of OHLCV data for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
