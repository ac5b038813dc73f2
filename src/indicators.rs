//! Technical indicators powered by the `ta` crate
//!
//! Indicators are looked up by name in a static table instead of matched one by one,
//! so adding an indicator means adding a row to [`REGISTRY`].
//!
//! Available indicators:
//! - `sma`: Simple Moving Average of close (default period 20)
//! - `ema`: Exponential Moving Average of close (default period 20)
//! - `rsi`: Relative Strength Index of close (default period 14)

use serde::{Deserialize, Serialize};
use ta::indicators::{ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;
use thiserror::Error;

use crate::{Candle, CandleSeries};

/// Indicator computation over a candle window, one value per candle
pub type IndicatorFn = fn(&[Candle], usize) -> Vec<Option<f64>>;

/// Name, default period, computation
pub const REGISTRY: &[(&str, usize, IndicatorFn)] = &[
    ("sma", 20, sma_close),
    ("ema", 20, ema_close),
    ("rsi", 14, rsi_close),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("unknown indicator '{0}'")]
    Unknown(String),

    #[error("indicator '{name}' needs a positive period")]
    ZeroPeriod { name: String },
}

/// Requested indicator column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<usize>,
}

impl IndicatorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        IndicatorSpec {
            name: name.into(),
            period: None,
        }
    }

    pub fn with_period(name: impl Into<String>, period: usize) -> Self {
        IndicatorSpec {
            name: name.into(),
            period: Some(period),
        }
    }

    fn resolve(&self) -> Result<(String, usize, IndicatorFn), IndicatorError> {
        let key = self.name.trim().to_lowercase();
        let &(_, default_period, func) = REGISTRY
            .iter()
            .find(|(name, _, _)| *name == key)
            .ok_or_else(|| IndicatorError::Unknown(self.name.clone()))?;

        let period = self.period.unwrap_or(default_period);
        if period == 0 {
            return Err(IndicatorError::ZeroPeriod { name: key });
        }
        Ok((key, period, func))
    }

    /// Column name: the bare indicator name at its default period, `name_period` otherwise
    pub fn column_name(&self) -> String {
        let key = self.name.trim().to_lowercase();
        match self.period {
            Some(p) if REGISTRY.iter().all(|(n, d, _)| *n != key || *d != p) => {
                format!("{}_{}", key, p)
            }
            _ => key,
        }
    }
}

impl std::str::FromStr for IndicatorSpec {
    type Err = IndicatorError;

    /// Parses `"SMA"` or `"sma:50"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = match s.split_once(':') {
            Some((name, period)) => {
                let period = period
                    .trim()
                    .parse()
                    .map_err(|_| IndicatorError::Unknown(s.to_string()))?;
                IndicatorSpec::with_period(name.trim(), period)
            }
            None => IndicatorSpec::new(s.trim()),
        };
        spec.resolve()?;
        Ok(spec)
    }
}

/// Candles plus named indicator columns aligned row by row
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    pub series: CandleSeries,
    pub columns: Vec<(String, Vec<Option<f64>>)>,
}

impl IndicatorFrame {
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// Compute every requested indicator over `series`
pub fn add_indicators(
    series: CandleSeries,
    specs: &[IndicatorSpec],
) -> Result<IndicatorFrame, IndicatorError> {
    let mut columns = Vec::with_capacity(specs.len());

    for spec in specs {
        let (_, period, func) = spec.resolve()?;
        columns.push((spec.column_name(), func(series.as_slice(), period)));
    }

    Ok(IndicatorFrame { series, columns })
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

fn sma_close(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    sma(&closes(candles), period)
}

fn ema_close(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    ema(&closes(candles), period)
}

fn rsi_close(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    rsi(&closes(candles), period)
}

/// Feed `values` through a `ta` indicator, masking the first `warmup - 1` rows
fn run_with_warmup<I: Next<f64, Output = f64>>(
    mut indicator: I,
    values: &[f64],
    warmup: usize,
) -> Vec<Option<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let out = indicator.next(value);
            (i + 1 >= warmup).then_some(out)
        })
        .collect()
}

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    match SimpleMovingAverage::new(period) {
        Ok(i) => run_with_warmup(i, values, period),
        Err(_) => vec![None; values.len()],
    }
}

/// Calculate Exponential Moving Average
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    match ExponentialMovingAverage::new(period) {
        Ok(i) => run_with_warmup(i, values, period),
        Err(_) => vec![None; values.len()],
    }
}

/// Calculate RSI (Relative Strength Index)
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    // `period` price changes need `period + 1` closes
    match RelativeStrengthIndex::new(period) {
        Ok(i) => run_with_warmup(i, values, period + 1),
        Err(_) => vec![None; values.len()],
    }
}
