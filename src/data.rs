//! Data loading and management
//!
//! Loads OHLCV data from CSV files named `{SYMBOL}_{timeframe}.csv`, downloads date
//! ranges from the Binance futures API, and builds the resampled series handed to a
//! backtest engine.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::binance::{self, BinanceClient};
use crate::indicators::{self, IndicatorFrame, IndicatorSpec};
use crate::resample::{self, ResampleConfig};
use crate::{Candle, CandleSeries, CandleValidationError, Symbol, Timeframe};

/// CSV header shared by every candle file
pub const CSV_HEADER: [&str; 6] = ["datetime", "open", "high", "low", "close", "volume"];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Candle Conversion
// =============================================================================

/// Convert from Binance kline to internal Candle type with validation
impl TryFrom<binance::BinanceKline> for Candle {
    type Error = CandleValidationError;

    fn try_from(k: binance::BinanceKline) -> Result<Self, Self::Error> {
        let datetime = DateTime::from_timestamp_millis(k.open_time)
            .ok_or(CandleValidationError::InvalidTimestamp(k.open_time))?;
        Candle::new(datetime, k.open, k.high, k.low, k.close, k.volume)
    }
}

/// Convert klines, skipping rows that fail validation
fn klines_to_candles(klines: Vec<binance::BinanceKline>, symbol: &str) -> Vec<Candle> {
    let total = klines.len();
    let mut candles = Vec::with_capacity(total);

    for kline in klines {
        match Candle::try_from(kline) {
            Ok(candle) => candles.push(candle),
            Err(e) => warn!("Skipping invalid candle for {}: {}", symbol, e),
        }
    }

    if candles.len() < total {
        warn!(
            "Skipped {} invalid candles out of {} for {}",
            total - candles.len(),
            total,
            symbol
        );
    }

    candles
}

// =============================================================================
// CSV Data Loading
// =============================================================================

/// File name for a symbol/timeframe pair, e.g. `BTCUSDT_1h.csv`
pub fn data_file_name(symbol: &Symbol, timeframe: &str) -> String {
    format!("{}_{}.csv", symbol.as_str(), timeframe)
}

/// Parse a CSV datetime cell: RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC)
fn parse_datetime_cell(s: &str) -> Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map(|ndt| DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc))
        })
        .with_context(|| format!("Failed to parse datetime: {}", s))
}

/// Load OHLCV data from CSV file with validation
///
/// Rows that fail candle validation are skipped with a warning; malformed rows abort.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();
    let mut invalid_count = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {} column", name))?
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse {} at row {}", name, row_idx + 1))
        };

        let dt_str = record.get(0).context("Missing datetime column")?.trim();
        let datetime = parse_datetime_cell(dt_str)?;
        let open = field(1, "open")?;
        let high = field(2, "high")?;
        let low = field(3, "low")?;
        let close = field(4, "close")?;
        let volume = field(5, "volume")?;

        match Candle::new(datetime, open, high, low, close, volume) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                invalid_count += 1;
                warn!(
                    "Skipping invalid candle at row {} in {:?}: {}",
                    row_idx + 2, // +2 for 1-indexed and header row
                    path.file_name().unwrap_or_default(),
                    e
                );
            }
        }
    }

    if invalid_count > 0 {
        warn!(
            "Skipped {} invalid candles out of {} in {:?}",
            invalid_count,
            invalid_count + candles.len(),
            path.file_name().unwrap_or_default()
        );
    }

    Ok(candles)
}

/// Load a CSV file as a series, sorting and deduplicating if the file is out of order
pub fn load_series(path: impl AsRef<Path>) -> Result<CandleSeries> {
    let path = path.as_ref();
    let candles = load_csv(path)?;
    match CandleSeries::new(candles.clone()) {
        Ok(series) => Ok(series),
        Err(e) => {
            warn!("{} in {}, sorting by timestamp", e, path.display());
            Ok(CandleSeries::from_unsorted(candles))
        }
    }
}

/// Load a cached CSV restricted to `[start, end]`
///
/// Returns `None` when the file is missing or its rows do not reach both ends of the
/// range, so the caller can download instead.
pub fn load_cached_range(
    path: impl AsRef<Path>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Option<CandleSeries>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }

    let series = load_series(path)?;
    let Some((first, last)) = series.date_range() else {
        return Ok(None);
    };

    // the last cached candle covers up to one interval past its open time
    let step = series.native_interval().unwrap_or_else(Duration::zero);
    let covered_until = last
        .checked_add_signed(step)
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    if first > start || covered_until < end {
        info!(
            "Cache {} holds {} to {}, requested {} to {}",
            path.display(),
            first,
            last,
            start,
            end
        );
        return Ok(None);
    }

    Ok(Some(series.filter_by_date(Some(start), Some(end))))
}

/// Save candles to CSV file, creating parent directories as needed
pub fn save_csv(path: impl AsRef<Path>, candles: &[Candle]) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut writer = create_writer(path)?;
    writer.write_record(CSV_HEADER)?;

    for candle in candles {
        writer.write_record(candle_record(candle))?;
    }

    writer.flush()?;
    info!("Saved {} rows to {}", candles.len(), path.display());
    Ok(path.to_path_buf())
}

/// Save candles with indicator columns appended; warmup rows are left empty
pub fn save_frame_csv(path: impl AsRef<Path>, frame: &IndicatorFrame) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut writer = create_writer(path)?;

    let header: Vec<String> = CSV_HEADER
        .iter()
        .map(|s| s.to_string())
        .chain(frame.columns.iter().map(|(name, _)| name.clone()))
        .collect();
    writer.write_record(&header)?;

    for (row, candle) in frame.series.iter().enumerate() {
        let mut record = candle_record(candle).to_vec();
        for (_, values) in &frame.columns {
            record.push(
                values
                    .get(row)
                    .copied()
                    .flatten()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    info!(
        "Saved {} rows with {} indicator columns to {}",
        frame.series.len(),
        frame.columns.len(),
        path.display()
    );
    Ok(path.to_path_buf())
}

fn create_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file {}", path.display()))
}

fn candle_record(candle: &Candle) -> [String; 6] {
    [
        candle.datetime.format(DATETIME_FORMAT).to_string(),
        candle.open.to_string(),
        candle.high.to_string(),
        candle.low.to_string(),
        candle.close.to_string(),
        candle.volume.to_string(),
    ]
}

/// Parse a date string (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS) to DateTime<Utc>
pub fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = date_str.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }

    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(date_str, DATETIME_FORMAT) {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    if let Some(ndt) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .ok()
        .and_then(|nd| nd.and_hms_opt(0, 0, 0))
    {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc));
    }

    anyhow::bail!(
        "Failed to parse date: {}. Use YYYY-MM-DD or YYYY-MM-DD HH:MM:SS format",
        date_str
    )
}

/// Load data for multiple symbols from CSV files
///
/// Missing files are skipped with a warning; fails only when nothing loads.
pub fn load_multi_symbol(
    data_dir: impl AsRef<Path>,
    symbols: &[Symbol],
    timeframe: &str,
) -> Result<HashMap<Symbol, CandleSeries>> {
    let mut data = HashMap::new();

    for symbol in symbols {
        let path = data_dir.as_ref().join(data_file_name(symbol, timeframe));

        if !path.exists() {
            warn!("Data file not found: {}", path.display());
            continue;
        }

        let series =
            load_series(&path).with_context(|| format!("Failed to load data for {}", symbol))?;
        info!("Loaded {} candles for {}", series.len(), symbol);

        if !series.is_empty() {
            data.insert(symbol.clone(), series);
        }
    }

    if data.is_empty() {
        anyhow::bail!("No data loaded for any symbol");
    }

    Ok(data)
}

// =============================================================================
// Per-symbol data handle
// =============================================================================

/// Candle history for one symbol at one timeframe, loaded from the data directory
#[derive(Debug, Clone)]
pub struct SymbolData {
    pub symbol: Symbol,
    pub timeframe: String,
    series: CandleSeries,
}

impl SymbolData {
    /// Load `{data_dir}/{SYMBOL}_{timeframe}.csv`
    pub fn load(data_dir: impl AsRef<Path>, symbol: &Symbol, timeframe: &str) -> Result<Self> {
        let path = data_dir.as_ref().join(data_file_name(symbol, timeframe));
        let series = load_series(&path)?;
        Ok(Self::from_series(symbol.clone(), timeframe, series))
    }

    pub fn from_series(symbol: Symbol, timeframe: impl Into<String>, series: CandleSeries) -> Self {
        SymbolData {
            symbol,
            timeframe: timeframe.into(),
            series,
        }
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    /// Most recent candle
    pub fn latest_candle(&self) -> Option<&Candle> {
        self.series.last()
    }

    /// Most recent `n` candles
    pub fn last_candles(&self, n: usize) -> &[Candle] {
        self.series.tail(n)
    }

    /// Attach indicator columns to a copy of the history
    pub fn with_indicators(&self, specs: &[IndicatorSpec]) -> Result<IndicatorFrame> {
        indicators::add_indicators(self.series.clone(), specs).with_context(|| {
            format!(
                "Failed to add indicators for {} {}",
                self.symbol, self.timeframe
            )
        })
    }
}

// =============================================================================
// Binance Data Fetcher
// =============================================================================

/// Fetch historical OHLCV data from the Binance futures API
///
/// This fetcher uses the public API which doesn't require authentication.
pub struct BinanceDataFetcher {
    client: BinanceClient,
    pub data_dir: PathBuf,
}

impl BinanceDataFetcher {
    /// Create a new Binance data fetcher
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_client(BinanceClient::new()?, data_dir))
    }

    /// Create with a custom client configuration
    pub fn with_client(client: BinanceClient, data_dir: impl AsRef<Path>) -> Self {
        BinanceDataFetcher {
            client,
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Fetch every candle opening inside `[start, end]`
    pub async fn fetch_range(
        &self,
        symbol: &Symbol,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<CandleSeries> {
        if !binance::is_valid_interval(interval) {
            anyhow::bail!("Unsupported Binance interval: {}", interval);
        }

        let klines = self
            .client
            .fetch_range(symbol.as_str(), interval, start, end)
            .await?;
        let candles = klines_to_candles(klines, symbol.as_str());

        Ok(CandleSeries::from_unsorted(candles))
    }

    /// Download `[start_date, end_date]` given as `YYYY-MM-DD` strings
    pub async fn download_data(
        &self,
        symbol: &Symbol,
        interval: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<CandleSeries> {
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;
        self.fetch_range(symbol, interval, start, end).await
    }

    /// Download a date range and save it as `{SYMBOL}_{interval}.csv`
    pub async fn download_pair(
        &self,
        symbol: &Symbol,
        interval: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<(PathBuf, CandleSeries)> {
        let series = self
            .download_data(symbol, interval, start_date, end_date)
            .await?;

        if series.is_empty() {
            anyhow::bail!("No data fetched for {}", symbol);
        }

        let path = self.data_dir.join(data_file_name(symbol, interval));
        let path = save_csv(path, series.as_slice())?;
        Ok((path, series))
    }
}

/// Download raw candles and preprocess them into the series fed to a backtest
pub async fn create_data_feed(
    fetcher: &BinanceDataFetcher,
    symbol: &Symbol,
    interval: &str,
    start_date: &str,
    end_date: &str,
    timeframe: Timeframe,
    config: &ResampleConfig,
) -> Result<CandleSeries> {
    let raw = fetcher
        .download_data(symbol, interval, start_date, end_date)
        .await?;

    resample::preprocess_data(&raw, timeframe, config)
        .with_context(|| format!("Failed to preprocess {} {} data", symbol, interval))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::env::temp_dir;

    fn sample_series() -> CandleSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        CandleSeries::new(
            (0..4)
                .map(|i| {
                    let p = 100.0 + i as f64;
                    Candle::new(start + Duration::hours(i), p, p + 2.0, p - 1.0, p + 1.0, 10.0)
                        .unwrap()
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2024-01-02").unwrap(), midnight);
        assert_eq!(parse_date("2024-01-02 00:00:00").unwrap(), midnight);
        assert_eq!(parse_date("2024-01-02T00:00:00Z").unwrap(), midnight);
        assert!(parse_date("02/01/2024").is_err());
    }

    #[test]
    fn test_kline_conversion() {
        let kline = binance::BinanceKline {
            open_time: 1_704_067_200_000,
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 102.0,
            volume: 3.0,
        };
        let candle = Candle::try_from(kline.clone()).unwrap();
        assert_eq!(
            candle.datetime,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );

        let broken = binance::BinanceKline {
            high: 90.0,
            ..kline
        };
        assert_eq!(klines_to_candles(vec![broken], "BTCUSDT").len(), 0);
    }

    #[test]
    fn test_csv_roundtrip_and_symbol_data() {
        let dir = temp_dir().join("candle_pipeline_data_test");
        let symbol = Symbol::new("BTCUSDT");
        let series = sample_series();

        let path = save_csv(dir.join(data_file_name(&symbol, "1h")), series.as_slice()).unwrap();
        let loaded = SymbolData::load(&dir, &symbol, "1h").unwrap();

        assert_eq!(loaded.series(), &series);
        assert_eq!(loaded.latest_candle().unwrap().close, 104.0);
        assert_eq!(loaded.last_candles(2).len(), 2);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_skips_invalid_and_sorts() {
        let dir = temp_dir().join("candle_pipeline_unsorted_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ETHUSDT_1h.csv");
        std::fs::write(
            &path,
            "datetime,open,high,low,close,volume\n\
             2024-01-01 02:00:00,10,12,9,11,1\n\
             2024-01-01 00:00:00,10,12,9,11,1\n\
             2024-01-01 01:00:00,10,8,9,11,1\n",
        )
        .unwrap();

        let series = load_series(&path).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.as_slice()[0].datetime < series.as_slice()[1].datetime);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_save_frame_with_warmup_blanks() {
        let dir = temp_dir().join("candle_pipeline_frame_test");
        let frame = indicators::add_indicators(
            sample_series(),
            &[IndicatorSpec::with_period("sma", 2)],
        )
        .unwrap();

        let path = save_frame_csv(dir.join("frame.csv"), &frame).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();

        assert_eq!(lines.next(), Some("datetime,open,high,low,close,volume,sma_2"));
        assert!(lines.next().unwrap().ends_with(','));
        assert!(lines.next().unwrap().ends_with(",101.5"));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_cached_range_is_trimmed_or_rejected() {
        let dir = temp_dir().join("candle_pipeline_cache_test");
        let path = save_csv(dir.join("BTCUSDT_1h.csv"), sample_series().as_slice()).unwrap();
        let hour = |h: u32| Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap();

        let trimmed = load_cached_range(&path, hour(1), hour(2)).unwrap().unwrap();
        assert_eq!(trimmed.date_range(), Some((hour(1), hour(2))));

        // 03:00 candle covers the hour up to 04:00
        let full = load_cached_range(&path, hour(0), hour(4)).unwrap().unwrap();
        assert_eq!(full.len(), 4);

        assert!(load_cached_range(&path, hour(0), hour(6)).unwrap().is_none());
        let before = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
        assert!(load_cached_range(&path, before, hour(2)).unwrap().is_none());
        assert!(load_cached_range(dir.join("missing.csv"), hour(0), hour(1))
            .unwrap()
            .is_none());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_multi_symbol_requires_some_data() {
        let dir = temp_dir().join("candle_pipeline_multi_missing");
        assert!(load_multi_symbol(&dir, &[Symbol::new("NOPE")], "1h").is_err());
    }
}
