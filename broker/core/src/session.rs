//! Lock-guarded authenticated session for token-based venues. One `TokenSession` per adapter instance;
//! every outbound call borrows the current token through [`TokenSession::token`]
//! and reports a 401 back through [`TokenSession::reauthenticate`] so a
//! storm of concurrent 401s collapses into a single re-auth call.
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Knows how to mint a fresh token for one venue. Adapters implement this
/// against their own login/refresh endpoint.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Returns the new token and how long it is valid for.
    async fn authenticate(&self) -> Result<(String, Duration)>;
}

struct Inner {
    token: String,
    issued_at: Instant,
    lifetime: Duration,
}

/// Refresh proactively once 90% of the published lifetime has elapsed,
/// rather than waiting for the venue to reject a stale token.
const PROACTIVE_REFRESH_FRACTION: f64 = 0.9;

pub struct TokenSession {
    refresher: Arc<dyn TokenRefresher>,
    inner: Mutex<Inner>,
}

impl TokenSession {
    pub async fn new(refresher: Arc<dyn TokenRefresher>) -> Result<Self> {
        let (token, lifetime) = refresher.authenticate().await?;
        Ok(Self { refresher, inner: Mutex::new(Inner { token, issued_at: Instant::now(), lifetime }) })
    }

    /// A constructor for venues whose token never expires (e.g. a
    /// long-lived personal access token): still routes through the same
    /// lock-guarded path, just never trips the proactive refresh.
    pub fn from_static_token(refresher: Arc<dyn TokenRefresher>, token: String) -> Self {
        Self { refresher, inner: Mutex::new(Inner { token, issued_at: Instant::now(), lifetime: Duration::MAX }) }
    }

    /// Returns a usable token, refreshing first if we're past the proactive
    /// refresh threshold.
    pub async fn token(&self) -> Result<String> {
        let mut guard = self.inner.lock().await;
        if Self::past_threshold(guard.issued_at, guard.lifetime) {
            self.do_refresh(&mut guard).await?;
        }
        Ok(guard.token.clone())
    }

    /// Called after the venue rejects a call with 401. Re-authenticates
    /// under the lock, so concurrent callers that all saw the same 401
    /// share one re-auth round trip instead of racing.
    pub async fn reauthenticate(&self) -> Result<String> {
        let mut guard = self.inner.lock().await;
        self.do_refresh(&mut guard).await?;
        Ok(guard.token.clone())
    }

    fn past_threshold(issued_at: Instant, lifetime: Duration) -> bool {
        if lifetime == Duration::MAX {
            return false;
        }
        issued_at.elapsed().as_secs_f64() >= lifetime.as_secs_f64() * PROACTIVE_REFRESH_FRACTION
    }

    async fn do_refresh(&self, guard: &mut Inner) -> Result<()> {
        let (token, lifetime) = self.refresher.authenticate().await?;
        guard.token = token;
        guard.issued_at = Instant::now();
        guard.lifetime = lifetime;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingRefresher {
        calls: AtomicU32,
        lifetime: Duration,
    }

    #[async_trait]
    impl TokenRefresher for CountingRefresher {
        async fn authenticate(&self) -> Result<(String, Duration)> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((format!("token-{n}"), self.lifetime))
        }
    }

    #[tokio::test]
    async fn does_not_refresh_before_the_threshold() {
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0), lifetime: Duration::from_secs(3600) });
        let session = TokenSession::new(refresher).await.unwrap();
        assert_eq!(session.token().await.unwrap(), "token-0");
        assert_eq!(session.token().await.unwrap(), "token-0");
    }

    #[tokio::test]
    async fn reauthenticate_always_mints_a_fresh_token() {
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0), lifetime: Duration::from_secs(3600) });
        let session = TokenSession::new(refresher).await.unwrap();
        assert_eq!(session.token().await.unwrap(), "token-0");
        assert_eq!(session.reauthenticate().await.unwrap(), "token-1");
        assert_eq!(session.token().await.unwrap(), "token-1");
    }

    #[tokio::test]
    async fn static_token_never_proactively_refreshes() {
        let refresher = Arc::new(CountingRefresher { calls: AtomicU32::new(0), lifetime: Duration::from_secs(3600) });
        let session = TokenSession::from_static_token(refresher, "fixed".to_string());
        assert_eq!(session.token().await.unwrap(), "fixed");
        assert_eq!(session.token().await.unwrap(), "fixed");
    }
}
