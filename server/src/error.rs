use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::source::SourceError;
use crate::store::StorageError;

/// Pipeline step a request was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Connect,
    Fetch,
    Schema,
    Persist,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Connect => "connect",
            Stage::Fetch => "fetch",
            Stage::Schema => "schema",
            Stage::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Transport,
    Decode,
    Storage,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] SourceError),

    #[error("{stage} failed: {source}")]
    Storage {
        stage: Stage,
        #[source]
        source: StorageError,
    },
}

impl PipelineError {
    pub fn storage(stage: Stage, source: StorageError) -> Self {
        Self::Storage { stage, source }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Fetch(_) => Stage::Fetch,
            Self::Storage { stage, .. } => *stage,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(e) if e.is_decode() => ErrorKind::Decode,
            Self::Fetch(_) => ErrorKind::Transport,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    pub fn is_deadline(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_deadline(),
            Self::Storage { source, .. } => source.is_deadline(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Fetch(SourceError::Cancelled)
                | Self::Storage {
                    source: StorageError::Cancelled,
                    ..
                }
        )
    }
}
