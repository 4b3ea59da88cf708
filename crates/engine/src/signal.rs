//! Cancellation signal with an optional deadline.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::StopCause;

/// Caller-owned signal that asks a copy session to stop.
///
/// Clones share the same underlying token, so any clone can cancel.
/// A deadline, when set, fires as [`StopCause::DeadlineExceeded`];
/// an explicit [`cancel`](Self::cancel) fires as [`StopCause::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl StopSignal {
    /// Creates a signal that only fires when cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing token (e.g. a child of an application-wide token).
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Adds a deadline. If one is already set the earlier of the two wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Adds a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Cancels the signal.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the underlying token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Derives a signal that fires when this one does, but can also be
    /// cancelled on its own. The deadline is inherited.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cause if the signal has already fired.
    ///
    /// An explicit cancel takes precedence over a passed deadline.
    pub fn cause(&self) -> Option<StopCause> {
        if self.token.is_cancelled() {
            return Some(StopCause::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StopCause::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns `true` if the signal has fired.
    pub fn is_stopped(&self) -> bool {
        self.cause().is_some()
    }

    /// Waits until the signal fires.
    pub async fn stopped(&self) -> StopCause {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => StopCause::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => StopCause::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                StopCause::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_signal_is_not_stopped() {
        let stop = StopSignal::new();
        assert!(!stop.is_stopped());
        assert_eq!(stop.cause(), None);
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let stop = StopSignal::new();
        let other = stop.clone();
        other.cancel();
        assert_eq!(stop.cause(), Some(StopCause::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires_as_deadline_exceeded() {
        let stop = StopSignal::new().with_timeout(Duration::from_secs(5));
        assert!(!stop.is_stopped());

        let cause = stop.stopped().await;
        assert_eq!(cause, StopCause::DeadlineExceeded);
        assert_eq!(stop.cause(), Some(StopCause::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_wins_over_pending_deadline() {
        let stop = StopSignal::new().with_timeout(Duration::from_secs(60));
        stop.cancel();
        assert_eq!(stop.stopped().await, StopCause::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_deadline_is_kept() {
        let now = Instant::now();
        let stop = StopSignal::new()
            .with_deadline(now + Duration::from_secs(10))
            .with_deadline(now + Duration::from_secs(2))
            .with_deadline(now + Duration::from_secs(30));
        assert_eq!(stop.deadline(), Some(now + Duration::from_secs(2)));
    }

    #[test]
    fn from_token_observes_parent_cancel() {
        let parent = CancellationToken::new();
        let stop = StopSignal::from_token(parent.child_token());
        parent.cancel();
        assert!(stop.is_stopped());
    }

    #[test]
    fn child_cancel_does_not_reach_parent() {
        let parent = StopSignal::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_stopped());
        assert!(!parent.is_stopped());

        let other = parent.child();
        parent.cancel();
        assert_eq!(other.cause(), Some(StopCause::Cancelled));
    }
}
