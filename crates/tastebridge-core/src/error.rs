use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
