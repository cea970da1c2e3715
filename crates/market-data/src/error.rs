use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("No price for {ticker} on {date}")]
    NotFound { ticker: String, date: NaiveDate },

    #[error("Invalid price {price} for {ticker} on {date}")]
    InvalidPrice {
        ticker: String,
        date: NaiveDate,
        price: Decimal,
    },

    #[error("Failed to parse price file: {0}")]
    Parse(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
