//! Error types for series construction and resampling

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Reasons a `CandleSeries` cannot be built from a row batch
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("timestamps must be strictly increasing: row {index} at {current} follows {previous}")]
    NotIncreasing {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

/// Caller-supplied data or parameters the resampler refuses
#[derive(Debug, Error, PartialEq)]
pub enum InvalidInput {
    #[error("candle series is empty")]
    EmptySeries,

    #[error("target period must be positive (got {0})")]
    NonPositivePeriod(Duration),

    #[error("target period {target} is finer than the series interval {native}; upsampling is not supported")]
    Upsampling { native: Duration, target: Duration },

    #[error("bucket for {at} with period {period} falls outside the supported time range")]
    OutOfRange { at: DateTime<Utc>, period: Duration },
}

#[derive(Debug, Error, PartialEq)]
pub enum ResampleError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),

    #[error("gap between {after} and {before} needs {missing} synthesized buckets, limit is {limit}")]
    GapTooLarge {
        after: DateTime<Utc>,
        before: DateTime<Utc>,
        missing: usize,
        limit: usize,
    },
}

impl ResampleError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, ResampleError::InvalidInput(_))
    }
}
