use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Not enough data to perform calculation: {0}")]
    NotEnoughData(String),

    #[error("Invalid close price {price} on {date}: prices must be finite and positive")]
    InvalidPrice { date: String, price: f64 },
}
