use crate::error::EngineError;
use crate::repositories::market_data::{PriceSeriesProvider, SeriesQuery};
use crate::services::engine::backtest::{validate_tickers, SymbolFailure};
use crate::services::features::trailing_sma;
use crate::services::strategy::integer_param;
use crate::value_objects::bar::Bar;
use crate::value_objects::screen_match::ScreenMatch;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 100;

const SUMMARY_LIMIT: usize = 3;

/// Filters applied to a symbol's latest bar. Every supplied criterion must
/// hold; absent ones are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenCriteria {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_volume: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_window"
    )]
    pub ma_length: Option<usize>,
    /// Only read together with `ma_length`. `true` asks for the average
    /// strictly above the close, `false` strictly below.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ma_above_price: Option<bool>,
}

impl ScreenCriteria {
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, EngineError> {
        let criteria: ScreenCriteria = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|err| EngineError::InvalidRequest(format!("invalid screen criteria: {err}")))?;
        criteria.validate()?;
        Ok(criteria)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for (name, value) in [
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("min_volume", self.min_volume),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(EngineError::invalid_parameter(name, "must be finite"));
            }
        }
        if self.ma_length == Some(0) {
            return Err(EngineError::invalid_parameter("ma_length", "must be >= 1"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn matches(&self, bars: &[Bar]) -> bool {
        let Some(last) = bars.last() else {
            return false;
        };
        if self.min_price.is_some_and(|min| last.close < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| last.close > max) {
            return false;
        }
        if self.min_volume.is_some_and(|min| last.volume < min) {
            return false;
        }
        if let (Some(window), Some(above)) = (self.ma_length, self.ma_above_price) {
            let closes: Vec<f64> = bars.iter().map(|bar| bar.close).collect();
            if let Some(ma) = trailing_sma(&closes, window) {
                let holds = if above { ma > last.close } else { ma < last.close };
                if !holds {
                    return false;
                }
            }
        }
        true
    }

    fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        if let Some(v) = self.min_price {
            entries.push(("min_price", v.to_string()));
        }
        if let Some(v) = self.max_price {
            entries.push(("max_price", v.to_string()));
        }
        if let Some(v) = self.min_volume {
            entries.push(("min_volume", v.to_string()));
        }
        if let Some(v) = self.ma_length {
            entries.push(("ma_length", v.to_string()));
        }
        if let Some(v) = self.ma_above_price {
            entries.push(("ma_above_price", v.to_string()));
        }
        entries
    }
}

/// Short human-readable rendering, e.g. `min_price: 10, ma_length: 50`.
pub fn summarize_criteria(criteria: &ScreenCriteria) -> String {
    let entries = criteria.entries();
    if entries.is_empty() {
        return "no filter criteria".to_string();
    }
    let mut parts: Vec<String> = entries
        .iter()
        .take(SUMMARY_LIMIT)
        .map(|(key, value)| format!("{key}: {value}"))
        .collect();
    if entries.len() > SUMMARY_LIMIT {
        parts.push("...".to_string());
    }
    parts.join(", ")
}

fn optional_window<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => integer_param("ma_length", &value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Evaluates one symbol's series, returning the match record when it passes.
pub fn evaluate(
    ticker: &str,
    bars: &[Bar],
    criteria: &ScreenCriteria,
    as_of_date: NaiveDate,
) -> Option<ScreenMatch> {
    if !criteria.matches(bars) {
        return None;
    }
    let last = bars.last()?;
    let change_percent = match bars.len().checked_sub(2).map(|idx| &bars[idx]) {
        Some(prev) if prev.close != 0.0 => (last.close / prev.close - 1.0) * 100.0,
        _ => 0.0,
    };
    Some(ScreenMatch {
        ticker: ticker.to_string(),
        price: last.close,
        volume: last.volume,
        change_percent,
        date: as_of_date,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenRequest {
    pub criteria: ScreenCriteria,
    pub tickers: Vec<String>,
    pub as_of_date: NaiveDate,
    pub lookback_days: u32,
}

impl ScreenRequest {
    pub fn new(criteria: ScreenCriteria, tickers: Vec<String>, as_of_date: NaiveDate) -> Self {
        Self {
            criteria,
            tickers,
            as_of_date,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_tickers(&self.tickers)?;
        if self.lookback_days == 0 {
            return Err(EngineError::invalid_parameter(
                "lookback_days",
                "must be >= 1",
            ));
        }
        self.window_start()?;
        self.criteria.validate()
    }

    /// First day of the lookback window, `as_of_date - lookback_days`.
    pub fn window_start(&self) -> Result<NaiveDate, EngineError> {
        self.as_of_date
            .checked_sub_signed(Duration::days(i64::from(self.lookback_days)))
            .ok_or_else(|| {
                EngineError::invalid_parameter(
                    "lookback_days",
                    format!(
                        "{} days before {} is out of the supported date range",
                        self.lookback_days, self.as_of_date
                    ),
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreenResults {
    pub as_of_date: NaiveDate,
    /// In input ticker order.
    pub matches: Vec<ScreenMatch>,
    pub failures: Vec<SymbolFailure>,
    pub evaluated: usize,
}

pub fn run_screen<P>(request: &ScreenRequest, provider: &P) -> Result<ScreenResults, EngineError>
where
    P: PriceSeriesProvider + ?Sized,
{
    request.validate()?;

    let start = request.window_start()?;
    let mut matches = Vec::new();
    let mut failures = Vec::new();
    let mut evaluated = 0usize;

    for ticker in &request.tickers {
        let ticker = ticker.trim();
        let query = SeriesQuery::new(ticker, start, request.as_of_date);
        let bars = match provider.load_series(&query) {
            Ok(bars) if bars.is_empty() => {
                failures.push(SymbolFailure {
                    ticker: ticker.to_string(),
                    reason: "no bars in lookback window".to_string(),
                });
                continue;
            }
            Ok(bars) => bars,
            Err(reason) => {
                failures.push(SymbolFailure {
                    ticker: ticker.to_string(),
                    reason,
                });
                continue;
            }
        };
        evaluated += 1;
        if let Some(found) = evaluate(ticker, &bars, &request.criteria, request.as_of_date) {
            matches.push(found);
        }
    }

    Ok(ScreenResults {
        as_of_date: request.as_of_date,
        matches,
        failures,
        evaluated,
    })
}
