use thiserror::Error;

#[derive(Error, Debug)]
pub enum AriaError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate key: intent '{intent}' for user {user_id:?} already exists")]
    DuplicateKey {
        user_id: Option<String>,
        intent: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl AriaError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True when a unique constraint rejected the write.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, AriaError>;
