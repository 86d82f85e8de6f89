use thiserror::Error;

/// Errors that can occur during model resolution operations.
#[derive(Error, Debug)]
pub enum ModelScoutError {
    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("model not found: {filename}")]
    NotFound { filename: String },

    #[error("model not resolved: {filename}")]
    Unresolved { filename: String },

    #[error("deserialization error: {message}")]
    Deserialization { message: String },

    #[error("lookup error: {message}")]
    Lookup { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Convenience alias for results using `ModelScoutError`.
pub type Result<T> = std::result::Result<T, ModelScoutError>;
