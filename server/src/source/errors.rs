use reqwest::StatusCode;
use thiserror::Error;

use crate::deadline::Interrupted;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("quote provider answered {0}")]
    Status(StatusCode),

    #[error("quote request deadline exceeded")]
    DeadlineExceeded,

    #[error("quote request cancelled")]
    Cancelled,

    #[error("invalid quote payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("quote payload has no `{0}` entry")]
    MissingPair(String),
}

impl SourceError {
    /// `true` for malformed or unexpected payloads; everything else is a
    /// transport failure.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::MissingPair(_))
    }

    pub fn is_deadline(&self) -> bool {
        match self {
            Self::DeadlineExceeded => true,
            Self::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

impl From<Interrupted> for SourceError {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::DeadlineExceeded => Self::DeadlineExceeded,
            Interrupted::Cancelled => Self::Cancelled,
        }
    }
}
