//! Ordered candle series with unique, strictly increasing timestamps

use chrono::{DateTime, Duration, Utc};
use itertools::Itertools;

use crate::error::SeriesError;
use crate::Candle;

/// Candles indexed by timestamp
///
/// Built once from a batch load and never mutated afterwards; resampling and
/// filtering produce new series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from rows already in timestamp order
    pub fn new(candles: Vec<Candle>) -> Result<Self, SeriesError> {
        if let Some((index, (prev, curr))) = candles
            .iter()
            .tuple_windows()
            .enumerate()
            .find(|(_, (prev, curr))| curr.datetime <= prev.datetime)
        {
            return Err(SeriesError::NotIncreasing {
                index: index + 1,
                previous: prev.datetime,
                current: curr.datetime,
            });
        }
        Ok(Self { candles })
    }

    /// Sort rows by timestamp and drop repeated timestamps, keeping the first row seen
    pub fn from_unsorted(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.datetime);
        candles.dedup_by_key(|c| c.datetime);
        Self { candles }
    }

    /// Caller guarantees ordering
    pub(crate) fn from_sorted_unchecked(candles: Vec<Candle>) -> Self {
        debug_assert!(candles.windows(2).all(|w| w[0].datetime < w[1].datetime));
        Self { candles }
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Last `n` candles (all of them if fewer)
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    /// First and last timestamps
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.first()?.datetime, self.last()?.datetime))
    }

    /// Sampling interval inferred as the smallest spacing between neighbours
    pub fn native_interval(&self) -> Option<Duration> {
        self.candles
            .iter()
            .tuple_windows()
            .map(|(a, b)| b.datetime - a.datetime)
            .min()
    }

    /// Keep candles inside `[start, end]`; open bounds are unbounded
    pub fn filter_by_date(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CandleSeries {
        let candles = self
            .candles
            .iter()
            .filter(|c| {
                let after_start = start.is_none_or(|s| c.datetime >= s);
                let before_end = end.is_none_or(|e| c.datetime <= e);
                after_start && before_end
            })
            .cloned()
            .collect();
        Self { candles }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

impl TryFrom<Vec<Candle>> for CandleSeries {
    type Error = SeriesError;

    fn try_from(candles: Vec<Candle>) -> Result<Self, Self::Error> {
        Self::new(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle_at(hour: u32, close: f64) -> Candle {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap();
        Candle::new_unchecked(dt, close, close, close, close, 1.0)
    }

    #[test]
    fn test_new_accepts_increasing() {
        let series = CandleSeries::new(vec![candle_at(0, 1.0), candle_at(1, 2.0)]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.native_interval(), Some(Duration::hours(1)));
    }

    #[test]
    fn test_new_rejects_duplicates_and_disorder() {
        let err = CandleSeries::new(vec![candle_at(0, 1.0), candle_at(0, 2.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { index: 1, .. }));

        let err = CandleSeries::new(vec![candle_at(0, 1.0), candle_at(2, 2.0), candle_at(1, 3.0)])
            .unwrap_err();
        assert!(matches!(err, SeriesError::NotIncreasing { index: 2, .. }));
    }

    #[test]
    fn test_from_unsorted_sorts_and_dedups() {
        let series = CandleSeries::from_unsorted(vec![
            candle_at(2, 3.0),
            candle_at(0, 1.0),
            candle_at(2, 9.0),
            candle_at(1, 2.0),
        ]);
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_native_interval_uses_smallest_gap() {
        let series =
            CandleSeries::new(vec![candle_at(0, 1.0), candle_at(3, 2.0), candle_at(4, 3.0)])
                .unwrap();
        assert_eq!(series.native_interval(), Some(Duration::hours(1)));

        let single = CandleSeries::new(vec![candle_at(0, 1.0)]).unwrap();
        assert_eq!(single.native_interval(), None);
    }

    #[test]
    fn test_tail_and_filter() {
        let series = CandleSeries::new((0..5).map(|h| candle_at(h, h as f64)).collect()).unwrap();
        assert_eq!(series.tail(2).len(), 2);
        assert_eq!(series.tail(10).len(), 5);
        assert_eq!(series.tail(1)[0].close, 4.0);

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        let filtered = series.filter_by_date(Some(start), Some(end));
        assert_eq!(filtered.closes(), vec![1.0, 2.0, 3.0]);
    }
}
