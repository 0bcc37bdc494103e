use crate::value_objects::position::Position;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A closed round trip. Built only through [`Trade::close`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub position_size: f64,
    pub profit_loss: f64,
    pub profit_loss_percent: f64,
}

impl Trade {
    pub fn close(ticker: &str, position: &Position, exit_date: NaiveDate, exit_price: f64) -> Self {
        let diff = exit_price - position.entry_price;
        let profit_loss_percent = if position.entry_price != 0.0 {
            diff / position.entry_price * 100.0
        } else {
            0.0
        };
        Self {
            ticker: ticker.to_string(),
            entry_date: position.entry_date,
            exit_date,
            entry_price: position.entry_price,
            exit_price,
            position_size: position.size,
            profit_loss: diff * position.size,
            profit_loss_percent,
        }
    }

    pub fn is_win(&self) -> bool {
        self.profit_loss > 0.0
    }
}
