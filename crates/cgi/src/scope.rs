//! Cancellation context of a single request.
//!
//! A request is cancelled either when its processing deadline passes or when
//! the caller cancels its token (typically because the client disconnected).
//! [`RequestScope`] folds both into one value that every suspending step of
//! the request runs under.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::protocol::CgiError;

#[derive(Debug, Clone)]
pub struct RequestScope {
    deadline: Instant,
    timeout: Duration,
    abort: CancellationToken,
}

impl RequestScope {
    /// Starts the budget now; `abort` is the caller's own cancellation signal.
    pub fn new(timeout: Duration, abort: CancellationToken) -> Self {
        Self { deadline: Instant::now() + timeout, timeout, abort }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns true when the caller cancelled the request.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Runs `fut` until it completes, the deadline passes or the caller aborts.
    ///
    /// `fut` is dropped on cancellation, releasing whatever it borrowed.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, CgiError>
    where
        F: Future<Output = Result<T, CgiError>>,
    {
        tokio::select! {
            biased;
            () = self.abort.cancelled() => Err(CgiError::Aborted),
            () = tokio::time::sleep_until(self.deadline) => Err(CgiError::Timeout { timeout: self.timeout }),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_budget() {
        let scope = RequestScope::new(Duration::from_secs(5), CancellationToken::new());
        let result = scope.run(async { Ok::<_, CgiError>(7) }).await;

        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires() {
        let started = Instant::now();
        let scope = RequestScope::new(Duration::from_millis(100), CancellationToken::new());
        assert_eq!(scope.deadline(), started + Duration::from_millis(100));
        assert!(!scope.is_expired());

        let result = scope
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, CgiError>(())
            })
            .await;

        assert!(result.unwrap_err().is_timeout());
        assert!(Instant::now() >= scope.deadline());
        assert!(scope.is_expired());
        assert!(!scope.is_aborted());
    }

    #[tokio::test]
    async fn caller_abort_wins() {
        let token = CancellationToken::new();
        let scope = RequestScope::new(Duration::from_secs(5), token.clone());
        token.cancel();

        let result = scope.run(std::future::pending::<Result<(), CgiError>>()).await;

        assert!(result.unwrap_err().is_aborted());
        assert!(scope.is_aborted());
    }
}
