use crate::error::EngineError;
use crate::services::features::RollingSma;
use crate::value_objects::action::Action;
use crate::value_objects::bar::Bar;
use crate::value_objects::position::Position;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_MA_LENGTH: usize = 20;
pub const DEFAULT_POSITION_SIZE: f64 = 100.0;

/// A long-only signal rule evaluated bar by bar over one symbol's series.
///
/// Implementations keep their own indicator state, so a fresh instance is
/// required per symbol. `position` is the leg currently open for the symbol.
pub trait Strategy {
    fn on_bar(&mut self, _bar: &Bar, _position: Option<&Position>) -> Action {
        Action::hold()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionSizing {
    Fixed { units: f64 },
}

impl PositionSizing {
    pub fn size_for(&self, _bar: &Bar) -> f64 {
        match self {
            PositionSizing::Fixed { units } => *units,
        }
    }
}

/// Close crossing its own simple moving average.
///
/// Entry needs the previous close at or below its average and the current
/// close strictly above; exit is the mirror image. A close that only touches
/// the average never signals.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    sma: RollingSma,
    sizing: PositionSizing,
    prev: Option<(f64, f64)>,
}

impl MaCrossover {
    pub fn new(ma_length: usize, sizing: PositionSizing) -> Self {
        Self {
            sma: RollingSma::new(ma_length),
            sizing,
            prev: None,
        }
    }
}

impl Strategy for MaCrossover {
    fn on_bar(&mut self, bar: &Bar, position: Option<&Position>) -> Action {
        let Some(ma) = self.sma.update(bar.close) else {
            return Action::hold();
        };
        let Some((prev_close, prev_ma)) = self.prev.replace((bar.close, ma)) else {
            return Action::hold();
        };

        match position {
            None if prev_close <= prev_ma && bar.close > ma => Action::buy(self.sizing.size_for(bar)),
            Some(open) if prev_close >= prev_ma && bar.close < ma => Action::sell(open.size),
            _ => Action::hold(),
        }
    }
}

pub enum StrategyKind {
    MaCrossover(MaCrossover),
}

impl Strategy for StrategyKind {
    fn on_bar(&mut self, bar: &Bar, position: Option<&Position>) -> Action {
        match self {
            StrategyKind::MaCrossover(strategy) => strategy.on_bar(bar, position),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaCrossoverParams {
    pub ma_length: usize,
    pub position_size: f64,
}

impl Default for MaCrossoverParams {
    fn default() -> Self {
        Self {
            ma_length: DEFAULT_MA_LENGTH,
            position_size: DEFAULT_POSITION_SIZE,
        }
    }
}

impl MaCrossoverParams {
    fn from_map(map: &Map<String, Value>) -> Result<Self, EngineError> {
        let mut params = Self::default();
        if let Some(value) = map.get("ma_length") {
            params.ma_length = integer_param("ma_length", value)?;
        }
        if let Some(value) = map.get("position_size") {
            params.position_size = value.as_f64().ok_or_else(|| {
                EngineError::invalid_parameter(
                    "position_size",
                    format!("expected a number, got {value}"),
                )
            })?;
        }
        Ok(params)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.ma_length == 0 {
            return Err(EngineError::invalid_parameter("ma_length", "must be >= 1"));
        }
        if !self.position_size.is_finite() || self.position_size <= 0.0 {
            return Err(EngineError::invalid_parameter(
                "position_size",
                "must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// Strategy configuration, one variant per rule type.
///
/// Built from an open key/value map: a missing `rule` selects
/// `ma_crossover`, missing keys take their defaults and keys the rule does not
/// know are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "rule",
    rename_all = "snake_case",
    try_from = "serde_json::Map<String, serde_json::Value>"
)]
pub enum StrategyParams {
    MaCrossover(MaCrossoverParams),
}

impl Default for StrategyParams {
    fn default() -> Self {
        StrategyParams::MaCrossover(MaCrossoverParams::default())
    }
}

impl StrategyParams {
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, EngineError> {
        let rule = match map.get("rule") {
            None => "ma_crossover",
            Some(Value::String(rule)) => rule.trim(),
            Some(other) => {
                return Err(EngineError::invalid_parameter(
                    "rule",
                    format!("expected a string, got {other}"),
                ))
            }
        };

        let params = match rule {
            "ma_crossover" => StrategyParams::MaCrossover(MaCrossoverParams::from_map(map)?),
            other => {
                return Err(EngineError::invalid_parameter(
                    "rule",
                    format!("unknown rule `{other}` (expected: ma_crossover)"),
                ))
            }
        };
        params.validate()?;
        Ok(params)
    }

    pub fn rule(&self) -> &'static str {
        match self {
            StrategyParams::MaCrossover(_) => "ma_crossover",
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            StrategyParams::MaCrossover(params) => params.validate(),
        }
    }

    /// Fresh strategy state for one symbol.
    pub fn build(&self) -> Result<StrategyKind, EngineError> {
        self.validate()?;
        match self {
            StrategyParams::MaCrossover(params) => Ok(StrategyKind::MaCrossover(MaCrossover::new(
                params.ma_length,
                PositionSizing::Fixed {
                    units: params.position_size,
                },
            ))),
        }
    }
}

impl TryFrom<Map<String, Value>> for StrategyParams {
    type Error = EngineError;

    fn try_from(map: Map<String, Value>) -> Result<Self, Self::Error> {
        Self::from_map(&map)
    }
}

pub(crate) fn integer_param(name: &str, value: &Value) -> Result<usize, EngineError> {
    let parsed = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    });
    parsed.map(|v| v as usize).ok_or_else(|| {
        EngineError::invalid_parameter(
            name,
            format!("expected a non-negative integer, got {value}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn bar(day: u32, close: f64) -> Bar {
        Bar {
            symbol: "TEST".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).expect("valid date"),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn empty_map_uses_defaults() {
        let params = StrategyParams::from_map(&Map::new()).expect("defaults");
        assert_eq!(params, StrategyParams::default());
        assert_eq!(params.rule(), "ma_crossover");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let params = StrategyParams::from_map(&map(json!({
            "ma_length": 5,
            "rsi_period": 14,
            "comment": "ignored",
        })))
        .expect("params");
        assert_eq!(
            params,
            StrategyParams::MaCrossover(MaCrossoverParams {
                ma_length: 5,
                position_size: DEFAULT_POSITION_SIZE,
            })
        );
    }

    #[test]
    fn integral_float_length_is_accepted() {
        let params = StrategyParams::from_map(&map(json!({ "ma_length": 10.0 }))).expect("params");
        let StrategyParams::MaCrossover(inner) = params;
        assert_eq!(inner.ma_length, 10);
    }

    #[test]
    fn rejects_unknown_rule_and_bad_values() {
        let err = StrategyParams::from_map(&map(json!({ "rule": "rsi_reversal" })))
            .expect_err("unknown rule");
        assert!(err.to_string().contains("unknown rule"));

        let err = StrategyParams::from_map(&map(json!({ "ma_length": 0 }))).expect_err("zero");
        assert!(err.to_string().contains("ma_length"));

        let err = StrategyParams::from_map(&map(json!({ "ma_length": 2.5 }))).expect_err("fraction");
        assert!(err.is_input_error());

        let err = StrategyParams::from_map(&map(json!({ "position_size": -1 }))).expect_err("size");
        assert!(err.to_string().contains("position_size"));
    }

    #[test]
    fn deserializes_through_map() {
        let params: StrategyParams =
            serde_json::from_value(json!({ "rule": "ma_crossover", "ma_length": 7, "extra": true }))
                .expect("deserialize");
        assert_eq!(
            params,
            StrategyParams::MaCrossover(MaCrossoverParams {
                ma_length: 7,
                position_size: DEFAULT_POSITION_SIZE,
            })
        );
    }

    #[test]
    fn serializes_with_rule_tag() {
        let value = serde_json::to_value(StrategyParams::default()).expect("serialize");
        assert_eq!(value["rule"], "ma_crossover");
        assert_eq!(value["ma_length"], 20);
    }

    #[test]
    fn crossover_enters_on_genuine_cross_only() {
        let mut strategy = MaCrossover::new(2, PositionSizing::Fixed { units: 10.0 });
        assert_eq!(strategy.on_bar(&bar(1, 10.0), None), Action::hold());
        // ma = 10, close == ma: touch, no signal yet.
        assert_eq!(strategy.on_bar(&bar(2, 10.0), None), Action::hold());
        // ma = 11, close 12 > 11 and previous close 10 <= 10.
        assert_eq!(strategy.on_bar(&bar(3, 12.0), None), Action::buy(10.0));
    }

    #[test]
    fn crossover_exit_uses_open_size() {
        let mut strategy = MaCrossover::new(2, PositionSizing::Fixed { units: 10.0 });
        let open = Position {
            entry_price: 12.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 3).expect("valid date"),
            size: 7.0,
        };
        strategy.on_bar(&bar(1, 12.0), Some(&open));
        strategy.on_bar(&bar(2, 12.0), Some(&open));
        assert_eq!(strategy.on_bar(&bar(3, 10.0), Some(&open)), Action::sell(7.0));
    }
}
