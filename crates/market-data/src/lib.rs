//! # Zenith Market Data
//!
//! The historical price boundary of the backtest engine. The engine and the
//! strategies only ever see prices through the `PriceProvider` trait, which is
//! side-effect free and never touches the network. `HistoricalPrices` is the
//! in-memory implementation, loadable from a CSV file.

pub mod error;
pub mod provider;

pub use error::MarketDataError;
pub use provider::{HistoricalPrices, PriceProvider};
