//! Cooperative per-request deadline.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a deadline is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeadlineError {
    #[error("deadline exceeded")]
    Exceeded,
    #[error("request cancelled")]
    Cancelled,
}

/// A point in time after which the request should give up, plus an explicit
/// cancellation signal.
///
/// Nothing is interrupted when the deadline passes; handlers check
/// [`Deadline::is_done`] (or await [`Deadline::done`]) and decide what to do.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    token: CancellationToken,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now() + timeout,
            token: CancellationToken::new(),
        }
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    pub fn err(&self) -> Option<DeadlineError> {
        if self.token.is_cancelled() {
            Some(DeadlineError::Cancelled)
        } else if Instant::now() >= self.expires_at {
            Some(DeadlineError::Exceeded)
        } else {
            None
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Resolve when the deadline expires or is cancelled.
    pub async fn done(&self) -> DeadlineError {
        tokio::select! {
            _ = self.token.cancelled() => DeadlineError::Cancelled,
            _ = tokio::time::sleep_until(self.expires_at.into()) => DeadlineError::Exceeded,
        }
    }
}
