//! Error types for BubbleBook

use thiserror::Error;

/// The main error type for BubbleBook operations
#[derive(Debug, Error)]
pub enum BookError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Model not loaded; call load_model first")]
    ModelNotLoaded,

    #[error("Image error: {0}")]
    ImageError(String),

    #[error("Missing image files: {}", .0.join(", "))]
    MissingImages(Vec<String>),

    #[error("PDF error: {0}")]
    PdfError(String),
}

/// Result type alias for BubbleBook operations
pub type Result<T> = std::result::Result<T, BookError>;

impl From<toml::de::Error> for BookError {
    fn from(err: toml::de::Error) -> Self {
        BookError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for BookError {
    fn from(err: toml::ser::Error) -> Self {
        BookError::TomlSerError(err.to_string())
    }
}
