//! Request-scoped deadline chain.
//!
//! A [`RequestContext`] is created once per inbound request and handed to
//! every pipeline stage. Stages never share a budget: each one derives its
//! own child with [`RequestContext::child`], whose deadline is the earlier of
//! the parent's deadline and `now + budget`. Cancelling a context cancels
//! every child derived from it.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Why a bounded operation did not complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

#[derive(Clone, Debug)]
pub struct RequestContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl RequestContext {
    /// Root context with no deadline. Ends only when cancelled.
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Root context that expires `budget` from now.
    pub fn with_timeout(budget: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + budget),
            token: CancellationToken::new(),
        }
    }

    /// Root context with an optional budget.
    pub fn rooted(budget: Option<Duration>) -> Self {
        match budget {
            Some(b) => Self::with_timeout(b),
            None => Self::background(),
        }
    }

    /// Derives a stage context: `min(parent deadline, now + budget)`, cancelled
    /// together with `self`.
    pub fn child(&self, budget: Duration) -> Self {
        let own = Instant::now() + budget;
        let deadline = match self.deadline {
            Some(parent) => parent.min(own),
            None => own,
        };

        Self {
            deadline: Some(deadline),
            token: self.token.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Guard that cancels this context (and all children) when dropped.
    ///
    /// Held by the HTTP handler so that dropping the request future on client
    /// disconnect propagates into every in-flight stage.
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Runs `fut` until it completes, the deadline passes, or the context is
    /// cancelled, whichever comes first. `fut` is dropped on interruption.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        let expired = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Interrupted::Cancelled),
            _ = expired => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
