//! Candle pipeline - main entry point
//!
//! This binary provides three subcommands:
//! - download: Download a date range of futures klines from Binance to CSV
//! - resample: Resample a CSV file to a coarser timeframe with gap filling
//! - preprocess: Download (or reuse), resample and add indicators per a JSON config

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "candle-pipeline")]
#[command(about = "Download, resample and gap-fill OHLCV candles for backtesting", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download historical futures klines from Binance
    Download {
        /// Trading pair, e.g. "BTCUSDT"
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,

        /// Source interval, e.g. "1h"
        #[arg(short, long, default_value = "1h")]
        interval: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: String,

        /// Output directory
        #[arg(short, long, default_value = "data")]
        output: String,
    },

    /// Resample a candle CSV file to a coarser timeframe
    Resample {
        /// Input CSV (datetime,open,high,low,close,volume)
        #[arg(short, long)]
        input: PathBuf,

        /// Target timeframe, e.g. "4h", "1d", "15min"
        #[arg(short, long)]
        timeframe: String,

        /// Output CSV (defaults to the input name with the timeframe swapped in)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail instead of filling a gap longer than this many buckets
        #[arg(long)]
        max_fill: Option<usize>,

        /// Bucket origin (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS), defaults to the Unix epoch
        #[arg(long)]
        origin: Option<String>,
    },

    /// Run the full download + resample + indicators pipeline from a config file
    Preprocess {
        /// Path to configuration file
        #[arg(short, long, default_value = "configs/pipeline.json")]
        config: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Download { .. } => "download",
        Commands::Resample { .. } => "resample",
        Commands::Preprocess { .. } => "preprocess",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Download {
            symbol,
            interval,
            start,
            end,
            output,
        } => commands::download::run(symbol, interval, start, end, output),

        Commands::Resample {
            input,
            timeframe,
            output,
            max_fill,
            origin,
        } => commands::resample::run(input, timeframe, output, max_fill, origin),

        Commands::Preprocess { config } => commands::preprocess::run(config),
    }
}
