//! Candle Pipeline
//!
//! Downloads OHLCV candles, resamples them to a coarser timeframe with gap filling,
//! and writes the gap-free series consumed by backtest engines.
//!
//! # Resampling Example
//! ```
//! use candle_pipeline::{resample, Candle, CandleSeries};
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let candles = (0..5)
//!     .map(|i| {
//!         let p = 100.0 + i as f64;
//!         Candle::new_unchecked(start + Duration::minutes(i), p, p + 2.0, p - 1.0, p + 1.0, 1.0)
//!     })
//!     .collect();
//!
//! let series = CandleSeries::new(candles).unwrap();
//! let five_min = resample(&series, Duration::minutes(5)).unwrap();
//! assert_eq!(five_min.len(), 1);
//! assert_eq!(five_min.as_slice()[0].volume, 5.0);
//! ```
//!
//! ## Binance Example (Market Data)
//! ```no_run
//! use candle_pipeline::data::{create_data_feed, BinanceDataFetcher};
//! use candle_pipeline::{ResampleConfig, Symbol};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fetcher = BinanceDataFetcher::new("data")?;
//!     let feed = create_data_feed(
//!         &fetcher,
//!         &Symbol::new("BTCUSDT"),
//!         "1h",
//!         "2024-01-01",
//!         "2024-02-01",
//!         "4h".parse()?,
//!         &ResampleConfig::default(),
//!     )
//!     .await?;
//!     println!("{} candles ready", feed.len());
//!     Ok(())
//! }
//! ```

pub mod binance;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod resample;
pub mod series;
pub mod timeframe;
pub mod types;

pub use config::Config;
pub use error::{InvalidInput, ResampleError, SeriesError};
pub use resample::{
    preprocess_data, resample, resample_multi_symbol, resample_with, Aggregation,
    AggregationRules, ResampleConfig,
};
pub use series::CandleSeries;
pub use timeframe::{Timeframe, TimeframeError};
pub use types::*;

pub use binance::BinanceClient;
