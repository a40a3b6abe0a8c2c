/// Deadlines for long-running calls
///
/// A [`Deadline`] races a future against a [`CancellationToken`] that a
/// spawned enforcer cancels once the duration has elapsed. On expiry the
/// future is dropped (abandoning the call) and [`DeadlineExceeded`] is
/// returned. Nothing is retried.
///
/// # Example
///
/// ```
/// use astra_shared::deadline::Deadline;
/// use std::time::Duration;
///
/// # async fn example() {
/// let deadline = Deadline::new(Duration::from_secs(30));
/// let value = deadline.run("dashboard_load", async { 42 }).await;
/// assert_eq!(value.unwrap(), 42);
/// # }
/// ```

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Bulk dashboard load
pub const DASHBOARD_DEADLINE: Duration = Duration::from_secs(30);

/// Drive sync webhook call
pub const SYNC_WEBHOOK_DEADLINE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{label} did not finish within {}s", .after.as_secs())]
pub struct DeadlineExceeded {
    pub label: &'static str,
    pub after: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    duration: Duration,
}

impl Deadline {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Runs `fut` to completion or until the deadline passes
    pub async fn run<F, T>(&self, label: &'static str, fut: F) -> Result<T, DeadlineExceeded>
    where
        F: Future<Output = T>,
    {
        let token = CancellationToken::new();
        let enforcer = self.enforce(label, token.clone());

        let outcome = tokio::select! {
            biased;
            value = fut => Ok(value),
            _ = token.cancelled() => Err(DeadlineExceeded {
                label,
                after: self.duration,
            }),
        };

        enforcer.abort();
        outcome
    }

    fn enforce(&self, label: &'static str, token: CancellationToken) -> JoinHandle<()> {
        let duration = self.duration;

        tokio::spawn(async move {
            sleep(duration).await;

            if !token.is_cancelled() {
                tracing::warn!(
                    label,
                    deadline_secs = duration.as_secs(),
                    "Deadline reached, abandoning call"
                );
                token.cancel();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let deadline = Deadline::new(Duration::from_secs(30));

        let result = deadline
            .run("quick", async {
                sleep(Duration::from_secs(1)).await;
                "done"
            })
            .await;

        assert_eq!(result, Ok("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_and_abandons_future() {
        let deadline = Deadline::new(DASHBOARD_DEADLINE);
        let finished = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = finished.clone();

        let started = tokio::time::Instant::now();
        let result = deadline
            .run("slow", async move {
                sleep(Duration::from_secs(60)).await;
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
            })
            .await;

        assert_eq!(
            result,
            Err(DeadlineExceeded {
                label: "slow",
                after: Duration::from_secs(30),
            })
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30) && elapsed < Duration::from_secs(60));
        assert!(!finished.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_error_message() {
        let err = DeadlineExceeded {
            label: "drive_sync",
            after: SYNC_WEBHOOK_DEADLINE,
        };
        assert_eq!(err.to_string(), "drive_sync did not finish within 300s");
    }
}
