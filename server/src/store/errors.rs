use thiserror::Error;

use crate::deadline::Interrupted;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("store operation deadline exceeded")]
    DeadlineExceeded,

    #[error("store operation cancelled")]
    Cancelled,

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_deadline(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

impl From<Interrupted> for StorageError {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
            Interrupted::Cancelled => Self::Cancelled,
        }
    }
}
