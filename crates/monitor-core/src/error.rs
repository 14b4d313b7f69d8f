use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Exchange not available: {0}")]
    ExchangeUnavailable(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Store contention: {0}")]
    StoreContention(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Notification error: {0}")]
    Notify(String),
}
