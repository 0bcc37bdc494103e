use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tradelab::headless::{HeadlessArgs, HeadlessMode};

#[derive(Parser, Debug)]
#[command(name = "tradelab")]
#[command(about = "Strategy backtests, screens and data validation over daily bars.", version)]
struct Cli {
    /// Log output format. The filter comes from env TRADELAB_LOG (default: info).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the configured strategy over every ticker and aggregate the trades.
    Backtest {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Filter the ticker universe against the configured criteria.
    Screen {
        #[command(flatten)]
        common: CommonArgs,

        /// Evaluation date (YYYY-MM-DD). Overrides screen.as_of_date; defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Report data quality for every configured ticker.
    Validate {
        /// Config file path (TOML).
        #[arg(long, env = "TRADELAB_CONFIG")]
        config: PathBuf,

        /// Exit with code 2 when any ticker has duplicates, out-of-order rows or invalid closes.
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Config file path (TOML).
    #[arg(long, env = "TRADELAB_CONFIG")]
    config: PathBuf,

    /// Output base directory. Overrides paths.out_dir.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the result without writing artifacts.
    #[arg(long)]
    no_save: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_tracing(cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = init_metrics() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let args = match cli.command {
        Command::Backtest { common } => HeadlessArgs {
            mode: HeadlessMode::Backtest,
            config_path: common.config,
            out: common.out,
            no_save: common.no_save,
            as_of: None,
            strict: false,
        },
        Command::Screen { common, as_of } => HeadlessArgs {
            mode: HeadlessMode::Screen,
            config_path: common.config,
            out: common.out,
            no_save: common.no_save,
            as_of,
            strict: false,
        },
        Command::Validate { config, strict } => HeadlessArgs {
            mode: HeadlessMode::Validate,
            config_path: config,
            out: None,
            no_save: true,
            as_of: None,
            strict,
        },
    };

    match tradelab::headless::run_headless(args) {
        Ok(json) => {
            println!(
                "{}",
                serde_json::to_string(&json)
                    .unwrap_or_else(|_| "{\"status\":\"error\",\"error\":\"json\"}".to_string())
            );
            let code = if json["status"] == "failed" { 2 } else { 0 };
            std::process::exit(code);
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(format: LogFormat) -> Result<(), String> {
    let filter = std::env::var("TRADELAB_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

#[cfg(feature = "prometheus")]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(raw) = std::env::var("TRADELAB_METRICS_ADDR").ok() else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let addr: SocketAddr = raw
        .parse()
        .map_err(|err| format!("invalid TRADELAB_METRICS_ADDR (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
fn init_metrics() -> Result<Option<SocketAddr>, String> {
    Ok(None)
}
