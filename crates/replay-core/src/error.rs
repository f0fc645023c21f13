use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("Missing session credential")]
    MissingCredential,

    #[error("Database error: {0}")]
    Database(String),
}
