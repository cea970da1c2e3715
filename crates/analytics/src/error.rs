use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Invalid analytics input: {0}")]
    InvalidInput(String),

    #[error("Error in calculation: {0}")]
    Calculation(String),
}
