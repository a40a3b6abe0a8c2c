/// Gmail access token refresh
///
/// Google access tokens live for an hour. Every tick the poller refreshes
/// each active connection that expires within [`REFRESH_BUFFER_MINUTES`] so the
/// stored token is always usable.
///
/// # Reentrancy
///
/// A check that starts while another is still running returns
/// [`RefreshOutcome::Skipped`] without touching the network. The guard is
/// an `AtomicBool` released on drop, so a failed or panicking check never
/// leaves it held.

use astra_shared::integrations::google::{GoogleOAuthClient, TokenGrant};
use astra_shared::integrations::IntegrationError;
use astra_shared::models::integration::{needs_refresh, GmailConnection};
use astra_shared::redis::{ChangeOp, ChangePublisher, ChangeTable};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Tokens expiring within this many minutes are refreshed
pub const REFRESH_BUFFER_MINUTES: i64 = 5;

pub fn refresh_buffer() -> Duration {
    Duration::minutes(REFRESH_BUFFER_MINUTES)
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, IntegrationError>;
}

#[async_trait]
impl TokenRefresher for GoogleOAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, IntegrationError> {
        GoogleOAuthClient::refresh(self, refresh_token).await
    }
}

/// Where Gmail connections are read from and written back to
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    async fn due(&self, cutoff: DateTime<Utc>) -> Result<Vec<GmailConnection>, sqlx::Error>;

    async fn store(
        &self,
        id: Uuid,
        grant: &TokenGrant,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error>;
}

#[async_trait]
impl ConnectionStore for PgPool {
    async fn due(&self, cutoff: DateTime<Utc>) -> Result<Vec<GmailConnection>, sqlx::Error> {
        GmailConnection::due_for_refresh(self, cutoff).await
    }

    async fn store(
        &self,
        id: Uuid,
        grant: &TokenGrant,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        GmailConnection::store_refreshed(
            self,
            id,
            &grant.access_token,
            grant.refresh_token.as_deref(),
            grant.expires_at(now),
        )
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed { refreshed: usize, failed: usize },

    /// Another check was already running
    Skipped,
}

/// Clears the running flag when dropped
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct TokenRefreshPoller {
    refresher: Arc<dyn TokenRefresher>,
    store: Arc<dyn ConnectionStore>,
    changes: ChangePublisher,
    running: Arc<AtomicBool>,
}

impl TokenRefreshPoller {
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        store: Arc<dyn ConnectionStore>,
        changes: ChangePublisher,
    ) -> Self {
        Self {
            refresher,
            store,
            changes,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Refreshes every connection due at `now`
    ///
    /// A failure on one connection is logged and counted; the others are
    /// still refreshed.
    ///
    /// # Errors
    ///
    /// Only when the due connections cannot be loaded.
    pub async fn check(&self, now: DateTime<Utc>) -> Result<RefreshOutcome, sqlx::Error> {
        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            tracing::debug!("Token refresh already running, skipping");
            return Ok(RefreshOutcome::Skipped);
        };

        let buffer = refresh_buffer();
        let due = self.store.due(now + buffer).await?;
        let mut refreshed = 0;
        let mut failed = 0;

        for connection in due {
            if !connection.is_active || !needs_refresh(connection.expires_at, now, buffer) {
                continue;
            }
            let Some(refresh_token) = connection.refresh_token.as_deref() else {
                continue;
            };

            let grant = match self.refresher.refresh(refresh_token).await {
                Ok(grant) => grant,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %connection.id,
                        user_id = %connection.user_id,
                        error = %e,
                        "Gmail token refresh failed"
                    );
                    failed += 1;
                    continue;
                }
            };

            match self.store.store(connection.id, &grant, now).await {
                Ok(_) => {
                    refreshed += 1;
                    self.changes
                        .publish(ChangeTable::GmailConnections, ChangeOp::Update, Some(connection.id))
                        .await;
                }
                Err(e) => {
                    tracing::error!(
                        connection_id = %connection.id,
                        error = %e,
                        "Failed to store refreshed Gmail token"
                    );
                    failed += 1;
                }
            }
        }

        if refreshed + failed > 0 {
            tracing::info!(refreshed, failed, "Gmail token refresh finished");
        }

        Ok(RefreshOutcome::Completed { refreshed, failed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct SlowRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TokenRefresher for SlowRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, IntegrationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;

            if self.fail {
                return Err(IntegrationError::Api {
                    status: 400,
                    message: "invalid_grant".to_string(),
                });
            }

            Ok(TokenGrant {
                access_token: "fresh".to_string(),
                refresh_token: None,
                expires_in: 3600,
                scope: None,
            })
        }
    }

    struct MemoryStore {
        connections: Vec<GmailConnection>,
        stored: Mutex<Vec<(Uuid, String)>>,
        broken: bool,
    }

    #[async_trait]
    impl ConnectionStore for MemoryStore {
        async fn due(&self, cutoff: DateTime<Utc>) -> Result<Vec<GmailConnection>, sqlx::Error> {
            if self.broken {
                return Err(sqlx::Error::PoolTimedOut);
            }
            Ok(self
                .connections
                .iter()
                .filter(|c| c.expires_at <= cutoff)
                .cloned()
                .collect())
        }

        async fn store(
            &self,
            id: Uuid,
            grant: &TokenGrant,
            _now: DateTime<Utc>,
        ) -> Result<bool, sqlx::Error> {
            self.stored
                .lock()
                .unwrap()
                .push((id, grant.access_token.clone()));
            Ok(true)
        }
    }

    fn connection(expires_at: DateTime<Utc>, refresh_token: Option<&str>) -> GmailConnection {
        GmailConnection {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            google_email: Some("someone@example.com".to_string()),
            access_token: "stale".to_string(),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
            is_active: true,
            created_at: expires_at - Duration::hours(1),
            updated_at: expires_at - Duration::hours(1),
        }
    }

    fn poller(
        connections: Vec<GmailConnection>,
        fail: bool,
        broken: bool,
    ) -> (TokenRefreshPoller, Arc<SlowRefresher>, Arc<MemoryStore>) {
        let refresher = Arc::new(SlowRefresher {
            calls: AtomicUsize::new(0),
            fail,
        });
        let store = Arc::new(MemoryStore {
            connections,
            stored: Mutex::new(Vec::new()),
            broken,
        });
        let poller = TokenRefreshPoller::new(
            refresher.clone(),
            store.clone(),
            ChangePublisher::disabled(),
        );
        (poller, refresher, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_checks_refresh_once() {
        let now = Utc::now();
        let (poller, refresher, store) =
            poller(vec![connection(now + Duration::minutes(2), Some("rt"))], false, false);

        let (first, second) = tokio::join!(poller.check(now), poller.check(now));

        assert_eq!(
            first.unwrap(),
            RefreshOutcome::Completed { refreshed: 1, failed: 0 }
        );
        assert_eq!(second.unwrap(), RefreshOutcome::Skipped);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.stored.lock().unwrap().len(), 1);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_due_connections_with_refresh_token() {
        let now = Utc::now();
        let due = connection(now + Duration::minutes(5), Some("rt"));
        let due_id = due.id;
        let (poller, refresher, store) = poller(
            vec![
                due,
                connection(now + Duration::minutes(30), Some("rt")),
                connection(now - Duration::minutes(1), None),
            ],
            false,
            false,
        );

        let outcome = poller.check(now).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Completed { refreshed: 1, failed: 0 });
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.stored.lock().unwrap().as_slice(),
            &[(due_id, "fresh".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_counted_and_guard_released() {
        let now = Utc::now();
        let (poller, _, store) = poller(
            vec![
                connection(now, Some("a")),
                connection(now + Duration::minutes(1), Some("b")),
            ],
            true,
            false,
        );

        let outcome = poller.check(now).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Completed { refreshed: 0, failed: 2 });
        assert!(store.stored.lock().unwrap().is_empty());
        assert!(!poller.is_running());
    }

    #[tokio::test]
    async fn test_store_error_releases_guard() {
        let (poller, refresher, _) = poller(Vec::new(), false, true);

        assert!(poller.check(Utc::now()).await.is_err());
        assert!(!poller.is_running());
        assert!(poller.check(Utc::now()).await.is_err());
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }
}
