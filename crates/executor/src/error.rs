use core_types::Action;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Invalid order quantity for closing {ticker}. Requested: {requested}, Available: {available}")]
    InvalidClosingQuantity {
        ticker: String,
        requested: String,
        available: String,
    },

    #[error("Action '{0}' cannot be executed")]
    UnsupportedAction(Action),

    #[error("Invalid fill: {0}")]
    InvalidFill(String),

    #[error("Post-trade invariant broken: NAV is {nav} after trading {ticker}")]
    PostTradeInvariant { ticker: String, nav: Decimal },
}
