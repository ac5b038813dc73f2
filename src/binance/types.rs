//! Binance API types for klines (candlestick) data

/// Binance kline/candlestick data
/// API returns an array: [open_time, open, high, low, close, volume, close_time,
///                        quote_volume, trades, taker_buy_base, taker_buy_quote, ignore]
///
/// Only the OHLCV fields and open time are kept; the rest is dropped on parse.
#[derive(Debug, Clone, PartialEq)]
pub struct BinanceKline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl BinanceKline {
    /// Parse from raw JSON array returned by Binance API
    pub fn from_raw(raw: &[serde_json::Value]) -> Option<Self> {
        if raw.len() < 6 {
            return None;
        }

        Some(BinanceKline {
            open_time: raw[0].as_i64()?,
            open: parse_number(&raw[1])?,
            high: parse_number(&raw[2])?,
            low: parse_number(&raw[3])?,
            close: parse_number(&raw[4])?,
            volume: parse_number(&raw[5])?,
        })
    }
}

/// Binance encodes prices as strings; accept plain numbers too
fn parse_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        other => other.as_f64(),
    }
}

/// Valid Binance futures intervals
pub const BINANCE_INTERVALS: &[&str] = &[
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Check if interval is valid for Binance
pub fn is_valid_interval(interval: &str) -> bool {
    BINANCE_INTERVALS.contains(&interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_row() {
        let row = vec![
            json!(1_704_067_200_000i64),
            json!("42283.58"),
            json!("42554.57"),
            json!("42261.02"),
            json!("42475.23"),
            json!("1271.68108"),
            json!(1_704_070_799_999i64),
            json!("53957248.97"),
            json!(47134),
            json!("682.57581"),
            json!("28957416.82"),
            json!("0"),
        ];

        let kline = BinanceKline::from_raw(&row).unwrap();
        assert_eq!(kline.open_time, 1_704_067_200_000);
        assert_eq!(kline.open, 42283.58);
        assert_eq!(kline.close, 42475.23);
        assert_eq!(kline.volume, 1271.68108);
    }

    #[test]
    fn test_parse_rejects_short_or_malformed_rows() {
        assert!(BinanceKline::from_raw(&[json!(1), json!("1.0")]).is_none());

        let bad = vec![
            json!(1),
            json!("abc"),
            json!("1"),
            json!("1"),
            json!("1"),
            json!("1"),
        ];
        assert!(BinanceKline::from_raw(&bad).is_none());
    }

    #[test]
    fn test_valid_intervals() {
        assert!(is_valid_interval("1h"));
        assert!(is_valid_interval("4h"));
        assert!(is_valid_interval("1d"));
        assert!(!is_valid_interval("2d"));
    }
}
