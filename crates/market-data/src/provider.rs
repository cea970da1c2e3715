use crate::error::MarketDataError;
use core_types::TradingDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Read-only access to historical closing prices.
///
/// Implementations must be deterministic: the same question always gets the
/// same answer, and nothing is fetched over the network during a run.
pub trait PriceProvider {
    /// The closing price of `ticker` on `date`.
    fn get_price(&self, ticker: &str, date: TradingDate) -> Result<Decimal, MarketDataError>;

    /// Up to `n` closing prices on or before `until`, oldest first.
    fn history(&self, ticker: &str, until: TradingDate, n: usize) -> Vec<Decimal>;

    /// Every date in `[start, end]` on which at least one of `tickers` has a price, ascending.
    fn trading_dates(
        &self,
        tickers: &[String],
        start: TradingDate,
        end: TradingDate,
    ) -> Vec<TradingDate>;
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: TradingDate,
    ticker: String,
    close: String,
}

/// An in-memory price table, ticker → date → close.
#[derive(Debug, Clone, Default)]
pub struct HistoricalPrices {
    series: BTreeMap<String, BTreeMap<TradingDate, Decimal>>,
}

impl HistoricalPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one close. Negative prices are malformed data and are refused.
    pub fn insert(
        &mut self,
        ticker: &str,
        date: TradingDate,
        price: Decimal,
    ) -> Result<(), MarketDataError> {
        if price.is_sign_negative() {
            return Err(MarketDataError::InvalidPrice {
                ticker: ticker.to_string(),
                date,
                price,
            });
        }
        self.series
            .entry(ticker.to_string())
            .or_default()
            .insert(date, price);
        Ok(())
    }

    /// Builds a table from one price series per ticker.
    pub fn from_series<I, S>(series: I) -> Result<Self, MarketDataError>
    where
        I: IntoIterator<Item = (S, Vec<(TradingDate, Decimal)>)>,
        S: AsRef<str>,
    {
        let mut prices = Self::new();
        for (ticker, points) in series {
            for (date, price) in points {
                prices.insert(ticker.as_ref(), date, price)?;
            }
        }
        Ok(prices)
    }

    /// Loads `date,ticker,close` rows (with a header line) from any reader.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, MarketDataError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut prices = Self::new();
        for (line, row) in csv_reader.deserialize::<PriceRow>().enumerate() {
            let row = row?;
            let close = Decimal::from_str(&row.close).map_err(|e| {
                MarketDataError::Parse(format!(
                    "row {}: close '{}' for {} is not a number: {}",
                    line + 1,
                    row.close,
                    row.ticker,
                    e
                ))
            })?;
            prices.insert(&row.ticker, row.date, close)?;
        }

        tracing::debug!(
            tickers = prices.series.len(),
            rows = prices.len(),
            "Loaded historical prices"
        );
        Ok(prices)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, MarketDataError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Total number of stored closes.
    pub fn len(&self) -> usize {
        self.series.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl PriceProvider for HistoricalPrices {
    fn get_price(&self, ticker: &str, date: TradingDate) -> Result<Decimal, MarketDataError> {
        self.series
            .get(ticker)
            .and_then(|s| s.get(&date))
            .copied()
            .ok_or_else(|| MarketDataError::NotFound {
                ticker: ticker.to_string(),
                date,
            })
    }

    fn history(&self, ticker: &str, until: TradingDate, n: usize) -> Vec<Decimal> {
        let Some(series) = self.series.get(ticker) else {
            return Vec::new();
        };
        let mut closes: Vec<Decimal> = series
            .range(..=until)
            .rev()
            .take(n)
            .map(|(_, price)| *price)
            .collect();
        closes.reverse();
        closes
    }

    fn trading_dates(
        &self,
        tickers: &[String],
        start: TradingDate,
        end: TradingDate,
    ) -> Vec<TradingDate> {
        if start > end {
            return Vec::new();
        }
        let dates: BTreeSet<TradingDate> = tickers
            .iter()
            .filter_map(|t| self.series.get(t))
            .flat_map(|s| s.range(start..=end).map(|(d, _)| *d))
            .collect();
        dates.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> TradingDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    const CSV: &str = "date,ticker,close
2024-01-02,AAPL,185.64
2024-01-03,AAPL,184.25
2024-01-04,AAPL,181.91
2024-01-02,MSFT,370.87
2024-01-05,MSFT,367.75
";

    #[test]
    fn loads_csv_and_answers_point_queries() {
        let prices = HistoricalPrices::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(prices.len(), 5);
        assert_eq!(prices.get_price("AAPL", d(3)).unwrap(), dec!(184.25));
        assert!(matches!(
            prices.get_price("MSFT", d(3)),
            Err(MarketDataError::NotFound { .. })
        ));
        assert!(prices.get_price("TSLA", d(2)).is_err());
    }

    #[test]
    fn history_is_oldest_first_and_bounded() {
        let prices = HistoricalPrices::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(
            prices.history("AAPL", d(4), 2),
            vec![dec!(184.25), dec!(181.91)]
        );
        assert_eq!(prices.history("AAPL", d(2), 10), vec![dec!(185.64)]);
        assert!(prices.history("AAPL", d(1), 10).is_empty());
    }

    #[test]
    fn trading_dates_is_the_union_in_range() {
        let prices = HistoricalPrices::from_csv_reader(CSV.as_bytes()).unwrap();
        let tickers = vec!["AAPL".to_string(), "MSFT".to_string()];
        assert_eq!(
            prices.trading_dates(&tickers, d(3), d(31)),
            vec![d(3), d(4), d(5)]
        );
        assert!(prices.trading_dates(&tickers, d(5), d(2)).is_empty());
    }

    #[test]
    fn negative_prices_are_refused() {
        let bad = "date,ticker,close\n2024-01-02,AAPL,-1\n";
        assert!(matches!(
            HistoricalPrices::from_csv_reader(bad.as_bytes()),
            Err(MarketDataError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn non_numeric_close_is_a_parse_error() {
        let bad = "date,ticker,close\n2024-01-02,AAPL,NaN\n";
        assert!(matches!(
            HistoricalPrices::from_csv_reader(bad.as_bytes()),
            Err(MarketDataError::Parse(_))
        ));
    }
}
