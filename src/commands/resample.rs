//! Resample command - turn a candle CSV into a gap-free coarser series

use anyhow::{Context, Result};
use candle_pipeline::data::{load_series, parse_date, save_csv};
use candle_pipeline::{resample_with, ResampleConfig, Timeframe};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn run(
    input: PathBuf,
    timeframe: String,
    output: Option<PathBuf>,
    max_fill: Option<usize>,
    origin: Option<String>,
) -> Result<()> {
    let timeframe: Timeframe = timeframe.parse()?;

    let mut config = ResampleConfig {
        max_fill_buckets: max_fill,
        ..ResampleConfig::default()
    };
    if let Some(origin) = origin {
        config.origin = parse_date(&origin)?;
    }

    info!("Loading {}", input.display());
    let series = load_series(&input)?;
    let (first, last) = series
        .date_range()
        .with_context(|| format!("No valid candles in {}", input.display()))?;

    let resampled = resample_with(&series, timeframe.duration(), &config)
        .with_context(|| format!("Failed to resample {} to {}", input.display(), timeframe))?;

    let output = output.unwrap_or_else(|| default_output(&input, &timeframe));
    save_csv(&output, resampled.as_slice())?;

    println!("\n{}", "=".repeat(60));
    println!("RESAMPLE COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Input:      {} ({} candles)", input.display(), series.len());
    println!("  Range:      {} to {}", first, last);
    println!("  Timeframe:  {}", timeframe);
    println!("  Output:     {} ({} candles)", output.display(), resampled.len());
    println!("{}\n", "=".repeat(60));

    Ok(())
}

/// `data/BTCUSDT_1h.csv` -> `data/BTCUSDT_4h.csv`; other names get a `_4h` suffix
fn default_output(input: &Path, timeframe: &Timeframe) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = match stem.rsplit_once('_') {
        Some((symbol, suffix)) if suffix.parse::<Timeframe>().is_ok() => symbol.to_string(),
        _ => stem,
    };
    input.with_file_name(format!("{}_{}.csv", base, timeframe))
}
