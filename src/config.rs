//! Configuration management
//!
//! Handles loading and parsing of the JSON pipeline configuration, with environment
//! variable overrides for the data directory and the exchange endpoint.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::binance::BINANCE_FAPI_BASE;
use crate::indicators::IndicatorSpec;
use crate::resample::ResampleConfig;
use crate::{Symbol, Timeframe};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub download: DownloadConfig,
    pub resample: ResampleSection,
    pub indicators: Vec<IndicatorSpec>,
    pub binance: BinanceConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env();
        Ok(config)
    }

    /// Environment overrides take precedence over the file
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("CANDLE_DATA_DIR") {
            self.data.dir = dir;
        }
        if let Ok(base_url) = std::env::var("BINANCE_FAPI_BASE") {
            self.binance.base_url = base_url;
        }
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.download.symbol)
    }
}

/// Where raw and preprocessed CSV files live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub dir: String,
    pub output_dir: String,
    /// Reuse `{dir}/{SYMBOL}_{interval}.csv` instead of downloading when it exists
    pub use_cache: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            dir: "data".to_string(),
            output_dir: "data/processed".to_string(),
            use_cache: true,
        }
    }
}

/// Raw candle request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub symbol: String,
    /// Source sampling interval, e.g. "1h"
    pub interval: String,
    /// YYYY-MM-DD
    pub start_date: String,
    /// YYYY-MM-DD
    pub end_date: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        DownloadConfig {
            symbol: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            start_date: "2024-01-01".to_string(),
            end_date: "2024-02-01".to_string(),
        }
    }
}

/// Target timeframe plus resampling options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleSection {
    pub timeframe: Timeframe,
    #[serde(flatten)]
    pub options: ResampleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BinanceConfig {
    pub base_url: String,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        BinanceConfig {
            base_url: BINANCE_FAPI_BASE.to_string(),
        }
    }
}
