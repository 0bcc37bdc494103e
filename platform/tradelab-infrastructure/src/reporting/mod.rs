use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tradelab_domain::entities::metrics::BacktestSummary;
use tradelab_domain::value_objects::equity_point::EquityPoint;
use tradelab_domain::value_objects::screen_match::ScreenMatch;
use tradelab_domain::value_objects::trade::Trade;

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create trades csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "ticker",
        "entry_date",
        "exit_date",
        "entry_price",
        "exit_price",
        "position_size",
        "profit_loss",
        "profit_loss_percent",
    ])
    .map_err(|err| format!("failed to write trades csv header: {}", err))?;

    for trade in trades {
        wtr.write_record([
            trade.ticker.clone(),
            trade.entry_date.to_string(),
            trade.exit_date.to_string(),
            trade.entry_price.to_string(),
            trade.exit_price.to_string(),
            trade.position_size.to_string(),
            trade.profit_loss.to_string(),
            trade.profit_loss_percent.to_string(),
        ])
        .map_err(|err| format!("failed to write trades row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush trades csv: {}", err))
}

pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create equity csv {}: {}", path.display(), err))?;
    wtr.write_record(["date", "equity"])
        .map_err(|err| format!("failed to write equity csv header: {}", err))?;

    for point in points {
        wtr.write_record([point.date.to_string(), point.equity.to_string()])
            .map_err(|err| format!("failed to write equity row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush equity csv: {}", err))
}

/// `summary` is written as an empty object when no trade closed; an infinite
/// profit factor becomes `null`.
pub fn write_summary_json(
    path: &Path,
    summary: Option<&BacktestSummary>,
    meta: Option<&serde_json::Value>,
    config_snapshot: Option<&serde_json::Value>,
) -> Result<(), String> {
    let summary_json = match summary {
        Some(summary) => serde_json::to_value(summary)
            .map_err(|err| format!("failed to serialize summary: {}", err))?,
        None => serde_json::json!({}),
    };
    let json = serde_json::json!({
        "meta": meta,
        "config_snapshot": config_snapshot,
        "summary": summary_json,
    });
    write_pretty_json(path, &json, "summary")
}

pub fn write_screen_json(
    path: &Path,
    matches: &[ScreenMatch],
    meta: Option<&serde_json::Value>,
) -> Result<(), String> {
    let json = serde_json::json!({
        "meta": meta,
        "matches": matches,
    });
    write_pretty_json(path, &json, "screen results")
}

fn write_pretty_json(path: &Path, json: &serde_json::Value, what: &str) -> Result<(), String> {
    let text = serde_json::to_string_pretty(json)
        .map_err(|err| format!("failed to serialize {}: {}", what, err))?;
    let mut file = fs::File::create(path)
        .map_err(|err| format!("failed to create {} {}: {}", what, path.display(), err))?;
    file.write_all(text.as_bytes())
        .map_err(|err| format!("failed to write {}: {}", what, err))
}

#[derive(Debug, Clone, Deserialize)]
struct TradeRecord {
    ticker: String,
    entry_date: NaiveDate,
    exit_date: NaiveDate,
    entry_price: f64,
    exit_price: f64,
    position_size: f64,
    profit_loss: f64,
    profit_loss_percent: f64,
}

pub fn read_trades_csv(path: &Path) -> Result<Vec<Trade>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open trades csv {}: {}", path.display(), err))?;
    let mut trades = Vec::new();
    for result in rdr.deserialize::<TradeRecord>() {
        let record = result.map_err(|err| format!("failed to parse trade record: {}", err))?;
        trades.push(Trade {
            ticker: record.ticker,
            entry_date: record.entry_date,
            exit_date: record.exit_date,
            entry_price: record.entry_price,
            exit_price: record.exit_price,
            position_size: record.position_size,
            profit_loss: record.profit_loss,
            profit_loss_percent: record.profit_loss_percent,
        });
    }
    Ok(trades)
}

#[derive(Debug, Clone, Deserialize)]
struct EquityRecord {
    date: NaiveDate,
    equity: f64,
}

pub fn read_equity_csv(path: &Path) -> Result<Vec<EquityPoint>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open equity csv {}: {}", path.display(), err))?;
    let mut points = Vec::new();
    for result in rdr.deserialize::<EquityRecord>() {
        let record = result.map_err(|err| format!("failed to parse equity record: {}", err))?;
        points.push(EquityPoint {
            date: record.date,
            equity: record.equity,
        });
    }
    Ok(points)
}
