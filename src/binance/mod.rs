//! Binance USDⓈ-M futures kline client for downloading historical OHLCV data
//! No API key needed for public market data endpoints.

mod client;
mod types;

pub use client::{BinanceClient, BINANCE_FAPI_BASE};
pub use types::*;
