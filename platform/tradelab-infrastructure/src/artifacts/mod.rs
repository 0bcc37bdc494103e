use crate::reporting;
use std::fs;
use std::path::Path;
use tradelab_domain::entities::metrics::BacktestSummary;
use tradelab_domain::repositories::artifacts::ArtifactWriter;
use tradelab_domain::value_objects::equity_point::EquityPoint;
use tradelab_domain::value_objects::screen_match::ScreenMatch;
use tradelab_domain::value_objects::trade::Trade;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
    }

    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), String> {
        reporting::write_trades_csv(path, trades)
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        reporting::write_equity_csv(path, points)
    }

    fn write_summary_json(
        &self,
        path: &Path,
        summary: Option<&BacktestSummary>,
        meta: Option<&serde_json::Value>,
        config_snapshot: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        reporting::write_summary_json(path, summary, meta, config_snapshot)
    }

    fn write_screen_json(
        &self,
        path: &Path,
        matches: &[ScreenMatch],
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        reporting::write_screen_json(path, matches, meta)
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        fs::write(path, contents).map_err(|err| {
            format!(
                "failed to write config snapshot {}: {}",
                path.display(),
                err
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FilesystemArtifactWriter;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tradelab_domain::repositories::artifacts::ArtifactWriter;

    #[test]
    fn creates_nested_dirs_and_snapshot() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir()
            .join(format!("tradelab_artifacts_{}_{}", std::process::id(), now))
            .join("run_1");
        let writer = FilesystemArtifactWriter::new();
        writer.ensure_dir(&dir).expect("ensure dir");
        writer
            .write_config_snapshot_toml(&dir.join("config_snapshot.toml"), "[run]\nrun_id = \"x\"\n")
            .expect("snapshot");
        let text = fs::read_to_string(dir.join("config_snapshot.toml")).expect("read");
        assert!(text.contains("run_id"));
    }
}
