//! Session lifecycle: keeps a valid catalog-A access token installed.
//!
//! The stored session credential is exchanged for a short-lived access token
//! whenever the stored token has expired. Exchanges are serialized behind a
//! single refresh lock; callers that queued behind an exchange observe its
//! outcome instead of starting their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use tastebridge_core::model::{AccessToken, SessionCredential};
use tastebridge_core::store::{load_json, save_json, KeyValueStore};
use tastebridge_core::{Clock, StatusBoard};

use crate::client::{Authenticator, CredentialExchanger, TokenSink};
use crate::error::{CatalogError, SyncResult};

/// Storage key of the current access token.
pub const TOKEN_KEY: &str = "session.token";
/// Storage key of the long-lived credential pair.
pub const CREDENTIAL_KEY: &str = "session.credential";

/// Owns the access token and the credential it is derived from.
#[derive(Debug)]
pub struct SessionManager {
    exchanger: Arc<dyn CredentialExchanger>,
    sink: Arc<dyn TokenSink>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    status: Arc<StatusBoard>,
    refresh_lock: Mutex<()>,
    /// Number of finished exchanges, successful or not.
    exchanges: AtomicU64,
}

impl SessionManager {
    pub fn new(
        exchanger: Arc<dyn CredentialExchanger>,
        sink: Arc<dyn TokenSink>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        status: Arc<StatusBoard>,
    ) -> Self {
        Self {
            exchanger,
            sink,
            store,
            clock,
            status,
            refresh_lock: Mutex::new(()),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Make sure a valid token is installed on the client.
    ///
    /// Returns `false` when no valid token could be obtained; the reason has
    /// already been logged and, for a dead credential, surfaced through the
    /// needs-re-login signal.
    pub async fn ensure_authenticated(&self) -> bool {
        match self.authenticate().await {
            Ok(_) => true,
            Err(e) => {
                log::warn!("authentication failed: {e}");
                false
            }
        }
    }

    /// Like [`ensure_authenticated`](Self::ensure_authenticated) but returns
    /// the token or the typed failure.
    pub async fn authenticate(&self) -> SyncResult<AccessToken> {
        // Read before the first check so an exchange that fails in between
        // is still observed below.
        let seen = self.exchanges.load(Ordering::Acquire);
        if let Some(token) = self.install_stored_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.install_stored_token() {
            return Ok(token);
        }
        if self.exchanges.load(Ordering::Acquire) != seen {
            return Err(CatalogError::Unauthenticated {
                message: "concurrent token refresh failed".to_string(),
            });
        }

        self.exchange_locked().await
    }

    /// Replace a token that catalog A rejected before its recorded expiry.
    ///
    /// Callers that were rejected together share one exchange: whoever gets
    /// the refresh lock after an exchange has finished takes its result.
    pub async fn renew_rejected(&self) -> SyncResult<AccessToken> {
        let seen = self.exchanges.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.exchanges.load(Ordering::Acquire) != seen {
            return self
                .install_stored_token()
                .ok_or_else(|| CatalogError::Unauthenticated {
                    message: "concurrent token refresh failed".to_string(),
                });
        }

        log::info!("stored access token rejected; discarding it");
        self.store.remove(TOKEN_KEY)?;
        self.sink.clear();
        self.exchange_locked().await
    }

    /// Exchange the credential. Must hold `refresh_lock`.
    async fn exchange_locked(&self) -> SyncResult<AccessToken> {
        let result = self.refresh().await;
        self.exchanges.fetch_add(1, Ordering::Release);

        match result {
            Ok(token) => Ok(token),
            Err(e) if e.is_credential_dead() => {
                log::warn!("session credential rejected; re-login required");
                self.invalidate_credentials();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh(&self) -> SyncResult<AccessToken> {
        let credential = self
            .stored_credential()?
            .ok_or_else(|| CatalogError::Unauthenticated {
                message: "no stored session credential".to_string(),
            })?;

        log::info!("refreshing catalog A access token");
        let token = self.exchanger.exchange(&credential).await?;

        save_json(self.store.as_ref(), TOKEN_KEY, &token)?;
        self.status.set_needs_relogin(false);
        self.sink.install(&token);
        log::info!("access token valid until {}", token.expires_at);
        Ok(token)
    }

    /// Store the credential pair produced by the login flow.
    ///
    /// Any previous token belongs to the old credential and is discarded.
    pub fn login(&self, credential: &SessionCredential) -> SyncResult<()> {
        if credential.is_empty() {
            return Err(CatalogError::Unauthenticated {
                message: "empty session credential".to_string(),
            });
        }
        save_json(self.store.as_ref(), CREDENTIAL_KEY, credential)?;
        self.store.remove(TOKEN_KEY)?;
        self.sink.clear();
        self.status.set_needs_relogin(false);
        log::info!("stored new session credential");
        Ok(())
    }

    /// Forget the credential and token. Does not raise the re-login flag.
    pub fn logout(&self) -> SyncResult<()> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(CREDENTIAL_KEY)?;
        self.sink.clear();
        log::info!("logged out");
        Ok(())
    }

    pub fn has_credential(&self) -> bool {
        matches!(self.stored_credential(), Ok(Some(_)))
    }

    /// The stored token, valid or not.
    pub fn stored_token(&self) -> Option<AccessToken> {
        match load_json::<AccessToken>(self.store.as_ref(), TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                log::warn!("discarding unreadable stored token: {e}");
                None
            }
        }
    }

    pub fn needs_relogin(&self) -> bool {
        self.status.needs_relogin()
    }

    pub fn subscribe_needs_relogin(&self) -> watch::Receiver<bool> {
        self.status.subscribe_needs_relogin()
    }

    fn install_stored_token(&self) -> Option<AccessToken> {
        let token = self
            .stored_token()
            .filter(|t| t.is_valid_at(self.clock.now()))?;
        self.sink.install(&token);
        Some(token)
    }

    fn stored_credential(&self) -> SyncResult<Option<SessionCredential>> {
        let credential: Option<SessionCredential> = load_json(self.store.as_ref(), CREDENTIAL_KEY)?;
        Ok(credential.filter(|c| !c.is_empty()))
    }

    fn invalidate_credentials(&self) {
        for key in [TOKEN_KEY, CREDENTIAL_KEY] {
            if let Err(e) = self.store.remove(key) {
                log::warn!("failed to clear {key}: {e}");
            }
        }
        self.sink.clear();
        self.status.set_needs_relogin(true);
    }
}

#[async_trait]
impl Authenticator for SessionManager {
    async fn authenticate(&self) -> SyncResult<AccessToken> {
        SessionManager::authenticate(self).await
    }

    async fn renew_rejected(&self) -> SyncResult<AccessToken> {
        SessionManager::renew_rejected(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use tastebridge_core::{ManualClock, MemoryStore};

    #[derive(Debug)]
    enum Outcome {
        Token,
        Dead,
        Offline,
    }

    #[derive(Debug)]
    struct FakeExchanger {
        calls: AtomicUsize,
        outcome: Outcome,
        clock: Arc<ManualClock>,
    }

    #[async_trait]
    impl CredentialExchanger for FakeExchanger {
        async fn exchange(&self, _credential: &SessionCredential) -> SyncResult<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            match self.outcome {
                Outcome::Token => Ok(AccessToken::new(
                    "fresh",
                    self.clock.now() + ChronoDuration::hours(1),
                )),
                Outcome::Dead => Err(CatalogError::Unauthenticated {
                    message: "expired".into(),
                }),
                Outcome::Offline => Err(CatalogError::Unreachable {
                    message: "offline".into(),
                }),
            }
        }
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        token: StdMutex<Option<String>>,
    }

    impl TokenSink for RecordingSink {
        fn install(&self, token: &AccessToken) {
            *self.token.lock().unwrap() = Some(token.value.clone());
        }

        fn clear(&self) {
            *self.token.lock().unwrap() = None;
        }
    }

    struct Fixture {
        manager: Arc<SessionManager>,
        exchanger: Arc<FakeExchanger>,
        sink: Arc<RecordingSink>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        status: Arc<StatusBoard>,
    }

    fn fixture(outcome: Outcome) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let exchanger = Arc::new(FakeExchanger {
            calls: AtomicUsize::new(0),
            outcome,
            clock: Arc::clone(&clock),
        });
        let sink = Arc::new(RecordingSink::default());
        let store = Arc::new(MemoryStore::new());
        let status = Arc::new(StatusBoard::new());
        let manager = Arc::new(SessionManager::new(
            Arc::clone(&exchanger) as Arc<dyn CredentialExchanger>,
            Arc::clone(&sink) as Arc<dyn TokenSink>,
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::clone(&status),
        ));
        manager
            .login(&SessionCredential::new("primary", "secondary"))
            .unwrap();
        Fixture {
            manager,
            exchanger,
            sink,
            store,
            clock,
            status,
        }
    }

    #[tokio::test]
    async fn test_valid_stored_token_installed_without_exchange() {
        let fx = fixture(Outcome::Token);
        let token = AccessToken::new("stored", fx.clock.now() + ChronoDuration::minutes(10));
        save_json(fx.store.as_ref(), TOKEN_KEY, &token).unwrap();

        assert!(fx.manager.ensure_authenticated().await);
        assert_eq!(fx.exchanger.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.sink.token.lock().unwrap().as_deref(), Some("stored"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let fx = fixture(Outcome::Token);
        let token = AccessToken::new("old", fx.clock.now());
        save_json(fx.store.as_ref(), TOKEN_KEY, &token).unwrap();

        assert!(fx.manager.ensure_authenticated().await);
        assert_eq!(fx.exchanger.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.manager.stored_token().unwrap().value, "fresh");
        assert_eq!(fx.sink.token.lock().unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_exchange() {
        let fx = fixture(Outcome::Token);
        let callers = (0..8).map(|_| {
            let manager = Arc::clone(&fx.manager);
            tokio::spawn(async move { manager.ensure_authenticated().await })
        });
        let results = futures::future::join_all(callers).await;

        assert!(results.into_iter().all(|r| r.unwrap()));
        assert_eq!(fx.exchanger.calls.load(Ordering::SeqCst), 1);
        let token = fx.manager.stored_token().unwrap();
        assert!(token.is_valid_at(fx.clock.now()));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_a_failed_exchange() {
        let fx = fixture(Outcome::Offline);
        let callers = (0..5).map(|_| {
            let manager = Arc::clone(&fx.manager);
            tokio::spawn(async move { manager.ensure_authenticated().await })
        });
        let results = futures::future::join_all(callers).await;

        assert!(results.into_iter().all(|r| !r.unwrap()));
        assert_eq!(fx.exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dead_credential_clears_state_and_flags_relogin() {
        let fx = fixture(Outcome::Dead);
        let mut relogin = fx.manager.subscribe_needs_relogin();

        assert!(!fx.manager.ensure_authenticated().await);
        assert!(fx.status.needs_relogin());
        assert!(!fx.manager.has_credential());
        assert!(fx.sink.token.lock().unwrap().is_none());
        assert!(relogin.has_changed().unwrap());
        relogin.mark_unchanged();
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_credential() {
        let fx = fixture(Outcome::Offline);

        assert!(!fx.manager.ensure_authenticated().await);
        assert!(!fx.status.needs_relogin());
        assert!(fx.manager.has_credential());
    }

    #[tokio::test]
    async fn test_login_clears_relogin_flag() {
        let fx = fixture(Outcome::Dead);
        assert!(!fx.manager.ensure_authenticated().await);
        assert!(fx.manager.needs_relogin());

        fx.manager
            .login(&SessionCredential::new("new", "pair"))
            .unwrap();
        assert!(!fx.manager.needs_relogin());
        assert!(fx.manager.has_credential());
    }

    #[tokio::test]
    async fn test_logout_forgets_everything() {
        let fx = fixture(Outcome::Token);
        assert!(fx.manager.ensure_authenticated().await);
        fx.manager.logout().unwrap();
        assert!(!fx.manager.has_credential());
        assert!(fx.manager.stored_token().is_none());
        assert!(fx.sink.token.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejected_token_is_replaced_before_expiry() {
        let fx = fixture(Outcome::Token);
        let token = AccessToken::new("revoked", fx.clock.now() + ChronoDuration::minutes(30));
        save_json(fx.store.as_ref(), TOKEN_KEY, &token).unwrap();

        let renewed = fx.manager.renew_rejected().await.unwrap();
        assert_eq!(renewed.value, "fresh");
        assert_eq!(fx.exchanger.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.sink.token.lock().unwrap().as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_concurrent_rejections_share_one_exchange() {
        let fx = fixture(Outcome::Token);
        let token = AccessToken::new("revoked", fx.clock.now() + ChronoDuration::minutes(30));
        save_json(fx.store.as_ref(), TOKEN_KEY, &token).unwrap();

        let callers = (0..6).map(|_| {
            let manager = Arc::clone(&fx.manager);
            tokio::spawn(async move { manager.renew_rejected().await })
        });
        let results = futures::future::join_all(callers).await;

        assert!(results.into_iter().all(|r| r.unwrap().is_ok()));
        assert_eq!(fx.exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejection_with_dead_credential_flags_relogin() {
        let fx = fixture(Outcome::Dead);
        let token = AccessToken::new("revoked", fx.clock.now() + ChronoDuration::minutes(30));
        save_json(fx.store.as_ref(), TOKEN_KEY, &token).unwrap();

        assert!(fx.manager.renew_rejected().await.is_err());
        assert!(fx.manager.needs_relogin());
        assert!(fx.manager.stored_token().is_none());
    }
}
