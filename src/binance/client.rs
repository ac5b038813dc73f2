//! Binance futures API client for fetching historical kline (candlestick) data
//!
//! No API key required for public market data endpoints.
//!
//! # Example
//! ```no_run
//! use candle_pipeline::binance::BinanceClient;
//! use chrono::{TimeZone, Utc};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BinanceClient::new()?;
//!     let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//!     let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
//!     let klines = client.fetch_range("BTCUSDT", "1h", start, end).await?;
//!     println!("Fetched {} klines", klines.len());
//!     Ok(())
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

use super::types::BinanceKline;

/// Base URL for the Binance USDⓈ-M futures API
pub const BINANCE_FAPI_BASE: &str = "https://fapi.binance.com";

/// Maximum klines per request on the futures endpoint
const MAX_KLINES_PER_REQUEST: u32 = 1500;

/// Rate limit delay between requests (ms)
const RATE_LIMIT_DELAY_MS: u64 = 100;

/// Binance futures market data client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    /// Create a client against the public futures API
    pub fn new() -> Result<Self> {
        Self::with_base_url(BINANCE_FAPI_BASE)
    }

    /// Create a client against another host (testnet, proxy)
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(BinanceClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of klines
    ///
    /// # Arguments
    /// * `symbol` - Binance futures pair (e.g., "BTCUSDT")
    /// * `interval` - Timeframe (e.g., "1h", "4h", "1d")
    /// * `start_time` - Optional start time in milliseconds
    /// * `end_time` - Optional end time in milliseconds
    /// * `limit` - Optional number of klines to fetch (max 1500)
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<BinanceKline>> {
        let url = format!("{}/fapi/v1/klines", self.base_url);

        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
        ];

        if let Some(start) = start_time {
            params.push(("startTime", start.to_string()));
        }

        if let Some(end) = end_time {
            params.push(("endTime", end.to_string()));
        }

        let limit = limit
            .unwrap_or(MAX_KLINES_PER_REQUEST)
            .min(MAX_KLINES_PER_REQUEST);
        params.push(("limit", limit.to_string()));

        debug!(
            "Fetching klines: symbol={}, interval={}, limit={}",
            symbol, interval, limit
        );

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("Failed to send request to Binance")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_data: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .context("Failed to parse Binance response")?;

        let klines: Vec<BinanceKline> = raw_data
            .iter()
            .filter_map(|row| BinanceKline::from_raw(row))
            .collect();

        Ok(klines)
    }

    /// Fetch every kline opening inside `[start, end]` by paging through the range
    pub async fn fetch_range(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BinanceKline>> {
        if start > end {
            anyhow::bail!("Start {} is after end {}", start, end);
        }

        let end_time = end.timestamp_millis();
        let mut current_start = start.timestamp_millis();

        info!(
            "Fetching {} {} data from Binance futures ({} to {})",
            symbol,
            interval,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let mut all_klines = Vec::new();

        while current_start <= end_time {
            let klines = self
                .get_klines(
                    symbol,
                    interval,
                    Some(current_start),
                    Some(end_time),
                    Some(MAX_KLINES_PER_REQUEST),
                )
                .await
                .with_context(|| format!("Failed to fetch {} {} klines", symbol, interval))?;

            // Move start time to after last candle
            match klines.last() {
                Some(last) => current_start = last.open_time + 1,
                None => break,
            }

            all_klines.extend(klines);

            tokio::time::sleep(StdDuration::from_millis(RATE_LIMIT_DELAY_MS)).await;
        }

        all_klines.retain(|k| k.open_time <= end_time);
        all_klines.sort_by_key(|k| k.open_time);
        all_klines.dedup_by_key(|k| k.open_time);

        info!(
            "Fetched {} candles for {} {}",
            all_klines.len(),
            symbol,
            interval
        );

        Ok(all_klines)
    }
}
