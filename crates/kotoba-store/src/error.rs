use kotoba_core::QuizError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Quiz(#[from] QuizError),
}

impl From<StoreError> for QuizError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Quiz(inner) => inner,
            other => QuizError::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
