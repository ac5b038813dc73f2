//! OHLCV resampling and gap filling
//!
//! Aggregates a fine-interval candle series into fixed-width buckets and fills interior
//! gaps by carrying the previous close forward. The pipeline is split the same way the
//! data feed uses it:
//!
//! 1. [`resample_ohlcv`] folds every non-empty bucket into one candle
//! 2. [`fill_missing_values`] synthesizes flat, zero-volume candles for empty buckets
//!    between the first and last non-empty bucket
//! 3. [`preprocess_data`] / [`resample_with`] run both and return a gap-free series
//!
//! # Bucket alignment
//!
//! Buckets are left-closed and labelled by their start. Boundaries fall on
//! `origin + k * period`, with `origin` defaulting to the Unix epoch, so hourly and daily
//! buckets land on UTC hour and midnight boundaries. Weekly buckets from the epoch start
//! on Thursday; pass an origin of `1970-01-05T00:00:00Z` for Monday-aligned weeks.
//! Periods are handled at nanosecond resolution; a period or origin that pushes bucket
//! arithmetic outside the representable time range is rejected as invalid input.

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::{InvalidInput, ResampleError};
use crate::{Candle, CandleSeries, Symbol, Timeframe};

/// How one column of a bucket collapses to a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    First,
    Last,
    Max,
    Min,
    Sum,
    Mean,
}

impl Aggregation {
    /// Reduce `field` over the candles of a bucket
    pub fn apply(self, bucket: &[Candle], field: fn(&Candle) -> f64) -> f64 {
        let mut values = bucket.iter().map(field);
        match self {
            Aggregation::First => values.next().unwrap_or(f64::NAN),
            Aggregation::Last => values.last().unwrap_or(f64::NAN),
            Aggregation::Max => values.fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Min => values.fold(f64::INFINITY, f64::min),
            Aggregation::Sum => values.sum(),
            Aggregation::Mean => {
                if bucket.is_empty() {
                    f64::NAN
                } else {
                    values.sum::<f64>() / bucket.len() as f64
                }
            }
        }
    }
}

/// Per-column aggregation map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationRules {
    pub open: Aggregation,
    pub high: Aggregation,
    pub low: Aggregation,
    pub close: Aggregation,
    pub volume: Aggregation,
}

impl Default for AggregationRules {
    fn default() -> Self {
        AggregationRules {
            open: Aggregation::First,
            high: Aggregation::Max,
            low: Aggregation::Min,
            close: Aggregation::Last,
            volume: Aggregation::Sum,
        }
    }
}

impl AggregationRules {
    /// Fold a non-empty bucket into one candle stamped at `bucket_start`
    pub fn aggregate(&self, bucket_start: DateTime<Utc>, bucket: &[Candle]) -> Candle {
        Candle::new_unchecked(
            bucket_start,
            self.open.apply(bucket, |c| c.open),
            self.high.apply(bucket, |c| c.high),
            self.low.apply(bucket, |c| c.low),
            self.close.apply(bucket, |c| c.close),
            self.volume.apply(bucket, |c| c.volume),
        )
    }
}

/// Resampling options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub aggregation: AggregationRules,
    /// Anchor for bucket boundaries
    pub origin: DateTime<Utc>,
    /// Largest number of buckets a single gap may synthesize; `None` fills any gap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fill_buckets: Option<usize>,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        ResampleConfig {
            aggregation: AggregationRules::default(),
            origin: DateTime::<Utc>::UNIX_EPOCH,
            max_fill_buckets: None,
        }
    }
}

/// Start of the bucket containing `ts`
pub fn bucket_start(
    ts: DateTime<Utc>,
    period: Duration,
    origin: DateTime<Utc>,
) -> Result<DateTime<Utc>, InvalidInput> {
    let out_of_range = || InvalidInput::OutOfRange { at: ts, period };

    let period_ns = positive_nanos(period)?;
    let offset_ns = (ts - origin).num_nanoseconds().ok_or_else(out_of_range)?;
    let start_ns = offset_ns
        .div_euclid(period_ns)
        .checked_mul(period_ns)
        .ok_or_else(out_of_range)?;

    origin
        .checked_add_signed(Duration::nanoseconds(start_ns))
        .ok_or_else(out_of_range)
}

/// Period length in nanoseconds
fn positive_nanos(period: Duration) -> Result<i64, InvalidInput> {
    if period <= Duration::zero() {
        return Err(InvalidInput::NonPositivePeriod(period));
    }
    period.num_nanoseconds().ok_or(InvalidInput::OutOfRange {
        at: DateTime::<Utc>::UNIX_EPOCH,
        period,
    })
}

fn validate(series: &CandleSeries, period: Duration) -> Result<(), InvalidInput> {
    if series.is_empty() {
        return Err(InvalidInput::EmptySeries);
    }
    positive_nanos(period)?;
    if let Some(native) = series.native_interval() {
        if period < native {
            return Err(InvalidInput::Upsampling {
                native,
                target: period,
            });
        }
    }
    Ok(())
}

/// Aggregate each non-empty bucket into one candle
///
/// The result is sorted and contains no candle for empty buckets.
pub fn resample_ohlcv(
    series: &CandleSeries,
    period: Duration,
    rules: &AggregationRules,
    origin: DateTime<Utc>,
) -> Result<Vec<Candle>, ResampleError> {
    validate(series, period)?;

    let candles = series.as_slice();
    let starts = candles
        .iter()
        .map(|c| bucket_start(c.datetime, period, origin))
        .collect::<Result<Vec<_>, _>>()?;

    let mut sparse = Vec::new();
    let mut offset = 0;
    for run in starts.chunk_by(|a, b| a == b) {
        let bucket = &candles[offset..offset + run.len()];
        sparse.push(rules.aggregate(run[0], bucket));
        offset += run.len();
    }

    debug!(
        "Aggregated {} candles into {} buckets of {}",
        series.len(),
        sparse.len(),
        period
    );

    Ok(sparse)
}

/// Forward-fill empty buckets between consecutive aggregated candles
///
/// Synthesized candles carry the previous close on open, high, low and close with zero
/// volume. Nothing is added before the first or after the last candle.
pub fn fill_missing_values(
    sparse: Vec<Candle>,
    period: Duration,
    max_fill_buckets: Option<usize>,
) -> Result<Vec<Candle>, ResampleError> {
    let period_ns = positive_nanos(period)?;

    let mut dense: Vec<Candle> = Vec::with_capacity(sparse.len());
    let mut filled = 0usize;

    for candle in sparse {
        if let Some(prev) = dense.last() {
            let (prev_time, prev_close) = (prev.datetime, prev.close);
            let gap_ns = (candle.datetime - prev_time)
                .num_nanoseconds()
                .ok_or(InvalidInput::OutOfRange {
                    at: candle.datetime,
                    period,
                })?;
            let missing = (gap_ns / period_ns - 1).max(0) as usize;

            if let Some(limit) = max_fill_buckets {
                if missing > limit {
                    return Err(ResampleError::GapTooLarge {
                        after: prev_time,
                        before: candle.datetime,
                        missing,
                        limit,
                    });
                }
            }

            // k * period_ns < gap_ns, so every step lands before `candle`
            for k in 1..=missing as i64 {
                let at = prev_time
                    .checked_add_signed(Duration::nanoseconds(k * period_ns))
                    .ok_or(InvalidInput::OutOfRange { at: prev_time, period })?;
                dense.push(Candle::flat(at, prev_close));
            }
            filled += missing;
        }
        dense.push(candle);
    }

    if filled > 0 {
        debug!("Forward-filled {} empty buckets", filled);
    }

    Ok(dense)
}

/// Resample with default aggregation, epoch alignment and unbounded gap filling
pub fn resample(series: &CandleSeries, period: Duration) -> Result<CandleSeries, ResampleError> {
    resample_with(series, period, &ResampleConfig::default())
}

/// Resample to `period` and fill interior gaps
pub fn resample_with(
    series: &CandleSeries,
    period: Duration,
    config: &ResampleConfig,
) -> Result<CandleSeries, ResampleError> {
    let sparse = resample_ohlcv(series, period, &config.aggregation, config.origin)?;
    let dense = fill_missing_values(sparse, period, config.max_fill_buckets)?;
    Ok(CandleSeries::from_sorted_unchecked(dense))
}

/// Resample a raw series to `timeframe`, ready for a backtest feed
pub fn preprocess_data(
    series: &CandleSeries,
    timeframe: Timeframe,
    config: &ResampleConfig,
) -> Result<CandleSeries, ResampleError> {
    let resampled = resample_with(series, timeframe.duration(), config)?;
    info!(
        "Preprocessed {} candles into {} {} candles",
        series.len(),
        resampled.len(),
        timeframe
    );
    Ok(resampled)
}

/// Resample several symbols in parallel; each symbol succeeds or fails on its own
pub fn resample_multi_symbol(
    data: &HashMap<Symbol, CandleSeries>,
    period: Duration,
    config: &ResampleConfig,
) -> HashMap<Symbol, Result<CandleSeries, ResampleError>> {
    data.par_iter()
        .map(|(symbol, series)| (symbol.clone(), resample_with(series, period, config)))
        .collect()
}
