use chrono::NaiveDate;

/// An open long leg waiting for an exit signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub size: f64,
}
