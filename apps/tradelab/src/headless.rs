use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tradelab_application::config::{Config, DataSource};
use tradelab_domain::repositories::artifacts::ArtifactWriter;
use tradelab_domain::repositories::market_data::PriceSeriesProvider;
use tradelab_infrastructure::artifacts::FilesystemArtifactWriter;
use tradelab_infrastructure::market_data::synthetic::DEFAULT_SEED;
use tradelab_infrastructure::market_data::{CsvDirectoryProvider, SyntheticProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadlessMode {
    Backtest,
    Screen,
    Validate,
}

impl HeadlessMode {
    fn label(self) -> &'static str {
        match self {
            HeadlessMode::Backtest => "backtest",
            HeadlessMode::Screen => "screen",
            HeadlessMode::Validate => "validate",
        }
    }
}

pub struct HeadlessArgs {
    pub mode: HeadlessMode,
    pub config_path: PathBuf,
    pub out: Option<PathBuf>,
    pub no_save: bool,
    pub as_of: Option<NaiveDate>,
    pub strict: bool,
}

/// Result document printed on stdout. `status` is `"failed"` only when a
/// strict validation found violations.
pub fn run_headless(args: HeadlessArgs) -> Result<serde_json::Value, String> {
    let (config, config_toml) =
        tradelab_application::config::load_config_with_source(&args.config_path)?;
    let provider = build_provider(&config)?;
    let writer = FilesystemArtifactWriter::new();
    let artifacts: Option<&dyn ArtifactWriter> = if args.no_save {
        None
    } else {
        Some(&writer)
    };

    let result = match args.mode {
        HeadlessMode::Backtest => {
            let outcome = tradelab_application::backtesting::run_backtest(
                &config,
                &config_toml,
                args.out,
                provider.as_ref(),
                artifacts,
            )?;
            let mut json = outcome.to_json();
            if let Some(run_dir) = &outcome.run_dir {
                json["artifacts"] = artifacts_for_run(run_dir);
            }
            json
        }
        HeadlessMode::Screen => tradelab_application::screening::run_screen(
            &config,
            args.as_of,
            args.out,
            provider.as_ref(),
            artifacts,
        )?
        .to_json(),
        HeadlessMode::Validate => {
            let outcome =
                tradelab_application::validation::validate(&config, args.strict, provider.as_ref())?;
            let failed = args.strict && outcome.has_violations;
            return Ok(envelope(
                args.mode,
                if failed { "failed" } else { "ok" },
                outcome.report,
            ));
        }
    };

    Ok(envelope(args.mode, "ok", result))
}

fn envelope(mode: HeadlessMode, status: &str, result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "status": status,
        "mode": mode.label(),
        "result": result,
    })
}

fn build_provider(config: &Config) -> Result<Box<dyn PriceSeriesProvider>, String> {
    match config.data.source {
        DataSource::Synthetic => Ok(Box::new(SyntheticProvider::new(
            config.data.seed.unwrap_or(DEFAULT_SEED),
        ))),
        DataSource::Csv => {
            let dir = config
                .data
                .csv_dir
                .as_deref()
                .filter(|dir| !dir.trim().is_empty())
                .ok_or_else(|| "data.csv_dir is required when data.source = \"csv\"".to_string())?;
            if !Path::new(dir).is_dir() {
                return Err(format!("data.csv_dir {dir} is not a directory"));
            }
            Ok(Box::new(CsvDirectoryProvider::new(dir)))
        }
    }
}

fn artifacts_for_run(run_dir: &Path) -> serde_json::Value {
    serde_json::json!({
        "run_dir": run_dir.display().to_string(),
        "trades_csv": run_dir.join("trades.csv").display().to_string(),
        "equity_csv": run_dir.join("equity.csv").display().to_string(),
        "summary_json": run_dir.join("summary.json").display().to_string(),
        "config_snapshot_toml": run_dir.join("config_snapshot.toml").display().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{build_provider, run_headless, HeadlessArgs, HeadlessMode};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tradelab_application::config::parse_config;

    fn unique_tmp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("tradelab_{prefix}_{}_{}", std::process::id(), now))
    }

    fn write_config(dir: &PathBuf, extra: &str) -> PathBuf {
        fs::create_dir_all(dir).expect("dir");
        let path = dir.join("config.toml");
        let contents = format!(
            r#"
[run]
run_id = "cli_run"
tickers = ["AAPL", "MSFT"]
start_date = "2023-01-02"
end_date = "2023-12-29"

[paths]
out_dir = "{}"
{extra}
"#,
            dir.join("runs").display()
        );
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn backtest_writes_artifacts_under_run_dir() {
        let dir = unique_tmp_dir("headless_backtest");
        let config_path = write_config(&dir, "");
        let json = run_headless(HeadlessArgs {
            mode: HeadlessMode::Backtest,
            config_path,
            out: None,
            no_save: false,
            as_of: None,
            strict: false,
        })
        .expect("backtest");

        assert_eq!(json["status"], "ok");
        assert_eq!(json["mode"], "backtest");
        let run_dir = dir.join("runs").join("cli_run");
        assert!(run_dir.join("trades.csv").exists());
        assert!(run_dir.join("equity.csv").exists());
        assert!(run_dir.join("summary.json").exists());
        assert!(run_dir.join("config_snapshot.toml").exists());
    }

    #[test]
    fn screen_with_no_save_leaves_no_files() {
        let dir = unique_tmp_dir("headless_screen");
        let config_path = write_config(&dir, "\n[screen]\nas_of_date = \"2024-01-05\"\n");
        let json = run_headless(HeadlessArgs {
            mode: HeadlessMode::Screen,
            config_path,
            out: None,
            no_save: true,
            as_of: None,
            strict: false,
        })
        .expect("screen");

        assert_eq!(json["result"]["matches"].as_array().map(|m| m.len()), Some(2));
        assert!(!dir.join("runs").exists());
    }

    #[test]
    fn csv_source_requires_existing_dir() {
        let config = parse_config(
            r#"
[run]
run_id = "x"
tickers = ["AAPL"]

[data]
source = "csv"

[paths]
out_dir = "runs"
"#,
        )
        .expect("config");
        let err = build_provider(&config).err().expect("missing csv_dir");
        assert!(err.contains("csv_dir"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = run_headless(HeadlessArgs {
            mode: HeadlessMode::Validate,
            config_path: unique_tmp_dir("missing").join("nope.toml"),
            out: None,
            no_save: true,
            as_of: None,
            strict: true,
        })
        .expect_err("missing config");
        assert!(err.contains("failed to read config"));
    }
}
