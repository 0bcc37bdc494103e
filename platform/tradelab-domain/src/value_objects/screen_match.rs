use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenMatch {
    pub ticker: String,
    pub price: f64,
    pub volume: f64,
    pub change_percent: f64,
    pub date: NaiveDate,
}
