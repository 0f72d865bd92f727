use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed user input. Raised before any network call is made.
    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Listing source unavailable: {0}")]
    SourceUnavailable(String),

    /// The listing source rejected the bearer credential. Callers should
    /// re-authenticate instead of retrying.
    #[error("Listing source authorization expired: {0}")]
    AuthExpired(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
