use std::time::Duration;

use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::HealthError;

/// Lifetime of a watch: a cancellation token plus an optional deadline.
///
/// The default context is never cancelled and has no deadline.
#[derive(Debug, Clone, Default)]
pub struct WatchContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl WatchContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel, deadline: None }
    }

    pub fn with_deadline(
        mut self,
        deadline: Instant,
    ) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(
        self,
        timeout: Duration,
    ) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Derives a context that ends with this one but can also be cancelled on
    /// its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    /// The cause if the context has already ended.
    pub fn err(&self) -> Option<HealthError> {
        if self.cancel.is_cancelled() {
            return Some(HealthError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(HealthError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context ends, yielding the cause.
    pub async fn done(&self) -> HealthError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => HealthError::Cancelled,
                    _ = sleep_until(deadline) => HealthError::DeadlineExceeded,
                }
            }
            None => {
                self.cancel.cancelled().await;
                HealthError::Cancelled
            }
        }
    }
}
