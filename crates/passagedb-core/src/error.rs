use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration, including the corpus snapshot.
    /// Fatal: callers should not retry.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An encoder could not produce vectors. Consumed by the dense fallback
    /// chain and never returned from a retrieval call.
    #[error("Encoder unavailable: {0}")]
    EncoderUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn is_config(&self) -> bool {
        matches!(self, Error::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
