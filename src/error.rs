use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapfarmError {
    #[error("Unknown mapping method: {0}")]
    UnknownMethod(String),

    #[error("Farm submission failed: {0}")]
    Submission(String),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Corrupt store row: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MapfarmError>;
