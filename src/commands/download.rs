//! Download command - fetch a date range of futures klines from Binance

use anyhow::Result;
use candle_pipeline::data::BinanceDataFetcher;
use candle_pipeline::Symbol;
use tracing::info;

pub fn run(
    symbol: String,
    interval: String,
    start: String,
    end: String,
    output: String,
) -> Result<()> {
    let symbol = Symbol::new(symbol);
    info!("Starting data download for {} {}", symbol, interval);

    let rt = tokio::runtime::Runtime::new()?;
    let fetcher = BinanceDataFetcher::new(&output)?;

    println!("\n{}", "=".repeat(60));
    println!("DOWNLOADING HISTORICAL DATA FROM BINANCE FUTURES");
    println!("{}", "=".repeat(60));
    println!("  Symbol:   {}", symbol);
    println!("  Interval: {}", interval);
    println!("  Range:    {} to {}", start, end);
    println!("  Output:   {}", output);
    println!("{}\n", "=".repeat(60));

    let (filepath, series) =
        rt.block_on(fetcher.download_pair(&symbol, &interval, &start, &end))?;

    if let Some((first, last)) = series.date_range() {
        println!("  Received: {} to {}", first, last);
    }
    println!("  ✓ {} candles saved to {}", series.len(), filepath.display());
    Ok(())
}
