//! Integration tests for the candle pipeline
//!
//! These tests exercise loading, resampling, gap filling and indicators together.

use std::collections::HashMap;
use std::env::temp_dir;

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};

use candle_pipeline::data::{self, SymbolData};
use candle_pipeline::indicators::{add_indicators, IndicatorSpec};
use candle_pipeline::resample::bucket_start;
use candle_pipeline::{
    preprocess_data, resample, resample_multi_symbol, resample_with, Candle, CandleSeries,
    InvalidInput, ResampleConfig, ResampleError, Symbol, Timeframe,
};

// =============================================================================
// Test Utilities
// =============================================================================

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Generate 1-minute candles following a deterministic walk, skipping every
/// minute for which `skip` returns true
fn generate_minute_candles(count: usize, skip: impl Fn(usize) -> bool) -> CandleSeries {
    let mut candles = Vec::with_capacity(count);
    let mut price: f64 = 100.0;

    for i in 0..count {
        let change = match i % 3 {
            0 => 0.8,
            1 => -0.4,
            _ => 0.3,
        };
        let open = price;
        price += change;
        let close = price;
        let high = open.max(close) + 0.25;
        let low = open.min(close) - 0.25;

        if !skip(i) {
            candles.push(
                Candle::new(
                    start_time() + Duration::minutes(i as i64),
                    open,
                    high,
                    low,
                    close,
                    1.0 + (i % 5) as f64,
                )
                .unwrap(),
            );
        }
    }

    CandleSeries::new(candles).unwrap()
}

fn assert_candles_close(a: &Candle, b: &Candle) {
    assert_eq!(a.datetime, b.datetime);
    assert_relative_eq!(a.open, b.open, epsilon = 1e-9);
    assert_relative_eq!(a.high, b.high, epsilon = 1e-9);
    assert_relative_eq!(a.low, b.low, epsilon = 1e-9);
    assert_relative_eq!(a.close, b.close, epsilon = 1e-9);
    assert_relative_eq!(a.volume, b.volume, epsilon = 1e-9);
}

// =============================================================================
// Resampling Properties
// =============================================================================

#[test]
fn test_bucket_coverage_with_gaps() {
    // three hours of minutes with a 75-minute hole in the middle
    let series = generate_minute_candles(180, |i| (50..125).contains(&i));
    let period = Duration::minutes(15);

    let out = resample(&series, period).unwrap();

    let origin = DateTime::<Utc>::UNIX_EPOCH;
    let first = bucket_start(series.first().unwrap().datetime, period, origin).unwrap();
    let last = bucket_start(series.last().unwrap().datetime, period, origin).unwrap();
    let expected = ((last - first).num_minutes() / 15 + 1) as usize;

    assert_eq!(out.len(), expected);
    assert_eq!(out.first().unwrap().datetime, first);
    assert_eq!(out.last().unwrap().datetime, last);
}

#[test]
fn test_output_spacing_is_constant() {
    let series = generate_minute_candles(600, |i| i % 97 < 40);
    let period = Duration::hours(1);

    let out = resample(&series, period).unwrap();

    assert!(out.len() > 1);
    for pair in out.as_slice().windows(2) {
        assert_eq!(pair[1].datetime - pair[0].datetime, period);
    }
}

#[test]
fn test_aggregates_five_minute_bucket() {
    let candles = (0..5)
        .map(|i| {
            let f = i as f64;
            Candle::new(
                start_time() + Duration::minutes(i),
                100.0 + f,
                102.0 + f,
                99.0 + f,
                101.0 + f,
                1.0 + f,
            )
            .unwrap()
        })
        .collect();
    let series = CandleSeries::new(candles).unwrap();

    let out = resample(&series, Duration::minutes(5)).unwrap();

    assert_eq!(out.len(), 1);
    let bar = &out.as_slice()[0];
    assert_eq!(bar.datetime, start_time());
    assert_eq!(bar.open, 100.0);
    assert_eq!(bar.close, 105.0);
    assert_eq!(bar.high, 106.0);
    assert_eq!(bar.low, 99.0);
    assert_eq!(bar.volume, 15.0);
}

#[test]
fn test_forward_fills_hourly_gap() {
    let series = CandleSeries::new(vec![
        Candle::new(start_time(), 49.0, 51.0, 48.0, 50.0, 10.0).unwrap(),
        Candle::new(start_time() + Duration::hours(3), 55.0, 61.0, 54.0, 60.0, 12.0).unwrap(),
    ])
    .unwrap();

    let out = resample(&series, Duration::hours(1)).unwrap();
    let rows = out.as_slice();

    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].close, 50.0);
    for (k, filled) in rows[1..3].iter().enumerate() {
        assert_eq!(filled.datetime, start_time() + Duration::hours(k as i64 + 1));
        assert_eq!(filled.open, 50.0);
        assert_eq!(filled.high, 50.0);
        assert_eq!(filled.low, 50.0);
        assert_eq!(filled.close, 50.0);
        assert_eq!(filled.volume, 0.0);
    }
    assert_eq!(rows[3].datetime, start_time() + Duration::hours(3));
    assert_eq!(rows[3].close, 60.0);
}

#[test]
fn test_resampling_is_idempotent() {
    let series = generate_minute_candles(24 * 60, |i| (300..500).contains(&i));
    let period = Duration::hours(1);

    let once = resample(&series, period).unwrap();
    let twice = resample(&once, period).unwrap();

    assert_eq!(once.len(), twice.len());
    for (a, b) in once.iter().zip(twice.iter()) {
        assert_candles_close(a, b);
    }
}

#[test]
fn test_rejects_upsampling_and_empty_input() {
    let series = generate_minute_candles(120, |i| i % 5 != 0);

    let err = resample(&series, Duration::minutes(1)).unwrap_err();
    assert!(err.is_invalid_input());
    assert!(matches!(
        err,
        ResampleError::InvalidInput(InvalidInput::Upsampling { .. })
    ));

    let err = resample(&CandleSeries::default(), Duration::hours(1)).unwrap_err();
    assert_eq!(err, ResampleError::InvalidInput(InvalidInput::EmptySeries));
}

#[test]
fn test_gap_limit_applies_only_above_limit() {
    // 00:00 and 04:00 hourly buckets leave three empty buckets between them
    let series = CandleSeries::new(vec![
        Candle::new(start_time(), 10.0, 11.0, 9.0, 10.5, 1.0).unwrap(),
        Candle::new(start_time() + Duration::hours(4), 10.5, 12.0, 10.0, 11.0, 1.0).unwrap(),
    ])
    .unwrap();

    let at_limit = ResampleConfig {
        max_fill_buckets: Some(3),
        ..ResampleConfig::default()
    };
    assert_eq!(
        resample_with(&series, Duration::hours(1), &at_limit)
            .unwrap()
            .len(),
        5
    );

    let below = ResampleConfig {
        max_fill_buckets: Some(2),
        ..ResampleConfig::default()
    };
    match resample_with(&series, Duration::hours(1), &below) {
        Err(ResampleError::GapTooLarge { missing, limit, .. }) => {
            assert_eq!(missing, 3);
            assert_eq!(limit, 2);
        }
        other => panic!("expected GapTooLarge, got {:?}", other),
    }
}

#[test]
fn test_weekly_buckets_follow_origin() {
    // 2024-01-01 is a Monday
    let series = generate_minute_candles(10, |_| false);
    let week = Duration::weeks(1);

    let epoch_aligned = resample(&series, week).unwrap();
    let thursday = Utc.with_ymd_and_hms(2023, 12, 28, 0, 0, 0).unwrap();
    assert_eq!(epoch_aligned.first().unwrap().datetime, thursday);

    let monday_config = ResampleConfig {
        origin: Utc.with_ymd_and_hms(1970, 1, 5, 0, 0, 0).unwrap(),
        ..ResampleConfig::default()
    };
    let monday_aligned = resample_with(&series, week, &monday_config).unwrap();
    assert_eq!(monday_aligned.first().unwrap().datetime, start_time());
}

// =============================================================================
// Pipeline
// =============================================================================

#[test]
fn test_csv_roundtrip_then_preprocess() {
    let dir = temp_dir().join("candle_pipeline_integration");
    let symbol = Symbol::new("btcusdt");
    let raw = generate_minute_candles(240, |i| (100..130).contains(&i));

    let path = data::save_csv(dir.join(data::data_file_name(&symbol, "1m")), raw.as_slice())
        .unwrap();
    let loaded = SymbolData::load(&dir, &symbol, "1m").unwrap();
    assert_eq!(loaded.series().len(), raw.len());
    for (a, b) in loaded.series().iter().zip(raw.iter()) {
        assert_candles_close(a, b);
    }

    let timeframe: Timeframe = "1h".parse().unwrap();
    let hourly = preprocess_data(loaded.series(), timeframe, &ResampleConfig::default()).unwrap();
    assert_eq!(hourly.len(), 4);
    assert_relative_eq!(
        hourly.iter().map(|c| c.volume).sum::<f64>(),
        raw.iter().map(|c| c.volume).sum::<f64>(),
        epsilon = 1e-9
    );

    std::fs::remove_file(path).ok();
}

#[test]
fn test_indicators_on_resampled_series() {
    let raw = generate_minute_candles(30 * 60, |_| false);
    let hourly = resample(&raw, Duration::hours(1)).unwrap();

    let frame = add_indicators(
        hourly.clone(),
        &[IndicatorSpec::new("SMA"), "rsi:7".parse().unwrap()],
    )
    .unwrap();

    assert_eq!(frame.column_names(), vec!["sma", "rsi_7"]);
    let sma = frame.column("sma").unwrap();
    assert_eq!(sma.len(), hourly.len());
    assert!(sma[18].is_none());

    let expected = hourly.as_slice()[..20].iter().map(|c| c.close).sum::<f64>() / 20.0;
    assert_relative_eq!(sma[19].unwrap(), expected, epsilon = 1e-9);

    assert!(add_indicators(hourly, &[IndicatorSpec::new("MACD")]).is_err());
}

#[test]
fn test_multi_symbol_matches_sequential() {
    let mut data = HashMap::new();
    data.insert(
        Symbol::new("BTCUSDT"),
        generate_minute_candles(500, |i| i % 50 < 10),
    );
    data.insert(
        Symbol::new("ETHUSDT"),
        generate_minute_candles(300, |i| i > 100 && i < 220),
    );
    data.insert(Symbol::new("EMPTY"), CandleSeries::default());

    let period = Duration::minutes(30);
    let config = ResampleConfig::default();
    let results = resample_multi_symbol(&data, period, &config);

    assert_eq!(results.len(), 3);
    for (symbol, series) in &data {
        assert_eq!(results[symbol], resample_with(series, period, &config));
    }
    assert!(results[&Symbol::new("EMPTY")].is_err());
}

#[tokio::test]
#[ignore] // requires network access to Binance
async fn test_create_data_feed_from_binance() {
    let fetcher = data::BinanceDataFetcher::new(temp_dir()).unwrap();
    let feed = data::create_data_feed(
        &fetcher,
        &Symbol::new("BTCUSDT"),
        "1h",
        "2024-01-01",
        "2024-01-03",
        "4h".parse().unwrap(),
        &ResampleConfig::default(),
    )
    .await
    .unwrap();

    assert!(!feed.is_empty());
    for pair in feed.as_slice().windows(2) {
        assert_eq!(pair[1].datetime - pair[0].datetime, Duration::hours(4));
    }
}

#[tokio::test]
#[ignore] // requires network access to Binance
async fn test_download_pair_returns_saved_series() {
    let dir = temp_dir().join("candle_pipeline_download_pair");
    let fetcher = data::BinanceDataFetcher::new(&dir).unwrap();

    let (path, series) = fetcher
        .download_pair(&Symbol::new("BTCUSDT"), "1h", "2024-01-01", "2024-01-02")
        .await
        .unwrap();

    assert!(!series.is_empty());
    assert_eq!(data::load_series(&path).unwrap(), series);

    std::fs::remove_file(path).ok();
}
