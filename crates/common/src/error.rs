use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid strategy parameters: {0}")]
    InvalidStrategy(String),

    #[error("insufficient cash: need {need:.2}, have {have:.2}")]
    InsufficientCash { need: f64, have: f64 },

    #[error("insufficient position: trying to sell {requested}, have {held}")]
    InsufficientPosition { requested: u64, held: u64 },

    #[error("Exchange error: {0}")]
    Exchange(String),

    #[error("runtime is stopped")]
    RuntimeStopped,

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
