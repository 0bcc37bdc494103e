use crate::entities::metrics::BacktestSummary;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::screen_match::ScreenMatch;
use crate::value_objects::trade::Trade;
use std::path::Path;

pub trait ArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;
    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), String>;
    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String>;
    fn write_summary_json(
        &self,
        path: &Path,
        summary: Option<&BacktestSummary>,
        meta: Option<&serde_json::Value>,
        config_snapshot: Option<&serde_json::Value>,
    ) -> Result<(), String>;
    fn write_screen_json(
        &self,
        path: &Path,
        matches: &[ScreenMatch],
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String>;
    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String>;
}
