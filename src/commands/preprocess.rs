//! Preprocess command - download or reuse raw candles, resample, add indicators

use anyhow::{Context, Result};
use candle_pipeline::binance::BinanceClient;
use candle_pipeline::data::{
    data_file_name, load_cached_range, parse_date, save_csv, save_frame_csv, BinanceDataFetcher,
    SymbolData,
};
use candle_pipeline::{preprocess_data, Config};
use std::path::Path;
use tracing::info;

pub fn run(config_path: String) -> Result<()> {
    let config = Config::from_file(&config_path)?;
    let symbol = config.symbol();
    let interval = config.download.interval.as_str();
    let timeframe = config.resample.timeframe;

    info!(
        "Preprocessing {} {} -> {} ({} to {})",
        symbol, interval, timeframe, config.download.start_date, config.download.end_date
    );

    let start = parse_date(&config.download.start_date)?;
    let end = parse_date(&config.download.end_date)?;

    let raw_path = Path::new(&config.data.dir).join(data_file_name(&symbol, interval));
    let cached = if config.data.use_cache {
        load_cached_range(&raw_path, start, end)?
    } else {
        None
    };

    let raw = match cached {
        Some(series) => {
            info!("Using cached data from {}", raw_path.display());
            series
        }
        None => {
            let rt = tokio::runtime::Runtime::new()?;
            let client = BinanceClient::with_base_url(&config.binance.base_url)?;
            let fetcher = BinanceDataFetcher::with_client(client, &config.data.dir);

            let series = rt.block_on(fetcher.fetch_range(&symbol, interval, start, end))?;
            if series.is_empty() {
                anyhow::bail!("No data fetched for {}", symbol);
            }
            save_csv(&raw_path, series.as_slice())?;
            series
        }
    };

    let resampled = preprocess_data(&raw, timeframe, &config.resample.options)
        .with_context(|| format!("Failed to preprocess {}", raw_path.display()))?;

    let data = SymbolData::from_series(symbol.clone(), timeframe.to_string(), resampled);
    let frame = data.with_indicators(&config.indicators)?;

    let out_path =
        Path::new(&config.data.output_dir).join(data_file_name(&symbol, &timeframe.to_string()));
    save_frame_csv(&out_path, &frame)?;

    println!("\n{}", "=".repeat(60));
    println!("PREPROCESSING COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Symbol:      {}", symbol);
    println!("  Raw:         {} {} candles", raw.len(), interval);
    println!("  Resampled:   {} {} candles", frame.series.len(), timeframe);
    if let Some(latest) = data.latest_candle() {
        println!("  Last close:  {} @ {}", latest.close, latest.datetime);
    }
    if !frame.columns.is_empty() {
        println!("  Indicators:  {}", frame.column_names().join(", "));
    }
    println!("  Output:      {}", out_path.display());
    println!("{}\n", "=".repeat(60));

    Ok(())
}
