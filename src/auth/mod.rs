//! Credentials for the Google APIs.
//!
//! [`CredentialProvider`] hands out one process-wide [`ClientHandle`]. The
//! first caller triggers authentication through an [`Authenticator`]; callers
//! that arrive while that attempt is running await the same attempt rather
//! than starting their own. A successful handle is kept for the life of the
//! process. A failed attempt is reported to everyone who awaited it and then
//! forgotten, so the next call authenticates again.
//!
//! The handle itself is a token source: it re-mints its access token through
//! the same [`Authenticator`] shortly before the token expires, again with a
//! single attempt shared by concurrent callers.

mod metadata;
mod single_flight;

pub use metadata::MetadataAuthenticator;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures_util::future::FutureExt;
use std::sync::Arc;

use single_flight::SingleFlight;

/// OAuth scopes requested for every token
pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

/// Tokens are refreshed this many seconds before they expire
pub const REFRESH_SKEW_SECS: i64 = 60;

/// A minted OAuth access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl AccessToken {
    /// Build a bearer token with no known expiry
    pub fn bearer(value: impl Into<String>, scopes: &[&str]) -> Self {
        Self {
            value: value.into(),
            token_type: "Bearer".to_string(),
            expires_at: None,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Set the expiry hint
    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the token is expired or about to be at `now`
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expiry| expiry - Duration::seconds(REFRESH_SKEW_SECS) <= now)
    }
}

/// Mints access tokens for a fixed scope set
#[async_trait]
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Perform one authentication round trip
    async fn authenticate(&self, scopes: &[&str]) -> Result<AccessToken, AuthError>;
}

/// Errors raised while obtaining credentials
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// The token endpoint rejected the request
    #[error("Token endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The token response could not be understood
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

/// An authenticated, self-refreshing handle for the Google REST APIs
pub struct ClientHandle {
    authenticator: Arc<dyn Authenticator>,
    token: SingleFlight<Arc<AccessToken>>,
}

impl std::fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandle")
            .field("authenticator", &self.authenticator)
            .field(
                "expires_at",
                &self.token.current().and_then(|t| t.expires_at),
            )
            .finish()
    }
}

impl ClientHandle {
    fn new(authenticator: Arc<dyn Authenticator>, token: AccessToken) -> Self {
        Self {
            authenticator,
            token: SingleFlight::ready(Arc::new(token)),
        }
    }

    /// A token valid for at least [`REFRESH_SKEW_SECS`], re-minted if needed
    pub async fn access_token(&self) -> Result<Arc<AccessToken>, AuthError> {
        let authenticator = Arc::clone(&self.authenticator);
        self.token
            .get_or_start(
                |token| !token.needs_refresh(Utc::now()),
                move || {
                    async move {
                        tracing::debug!("Refreshing Google access token");
                        match authenticator.authenticate(SCOPES).await {
                            Ok(token) => Ok(Arc::new(token)),
                            Err(e) => {
                                tracing::warn!("Google token refresh failed: {}", e);
                                Err(e)
                            }
                        }
                    }
                    .boxed()
                },
            )
            .await
    }
}

/// Single-flight, memoizing source of [`ClientHandle`]s
pub struct CredentialProvider {
    authenticator: Arc<dyn Authenticator>,
    handle: SingleFlight<Arc<ClientHandle>>,
}

impl std::fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProvider")
            .field("authenticator", &self.authenticator)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl CredentialProvider {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            handle: SingleFlight::new(),
        }
    }

    /// Whether a handle has been obtained
    pub fn is_initialized(&self) -> bool {
        self.handle.current().is_some()
    }

    /// Get the shared handle, authenticating on first use
    pub async fn client_handle(&self) -> Result<Arc<ClientHandle>, AuthError> {
        let authenticator = Arc::clone(&self.authenticator);
        self.handle
            .get_or_start(
                |_| true,
                move || {
                    async move {
                        tracing::debug!("Authenticating with Google");
                        match authenticator.authenticate(SCOPES).await {
                            Ok(token) => {
                                tracing::info!("Google credentials initialized");
                                Ok(Arc::new(ClientHandle::new(authenticator, token)))
                            }
                            Err(e) => {
                                tracing::warn!("Google authentication failed: {}", e);
                                Err(e)
                            }
                        }
                    }
                    .boxed()
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// What the n-th round trip of [`ScriptedAuthenticator`] returns
    #[derive(Debug, Clone, Copy)]
    enum Outcome {
        Valid,
        Expired,
        Fail,
    }

    /// Counts round trips and follows a script; unscripted calls succeed
    #[derive(Debug, Default)]
    struct ScriptedAuthenticator {
        calls: AtomicUsize,
        script: Mutex<Vec<Outcome>>,
    }

    impl ScriptedAuthenticator {
        fn with_script(script: Vec<Outcome>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for ScriptedAuthenticator {
        async fn authenticate(&self, scopes: &[&str]) -> Result<AccessToken, AuthError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .script
                .lock()
                .unwrap()
                .get(call)
                .copied()
                .unwrap_or(Outcome::Valid);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;

            let token = AccessToken::bearer(format!("token-{}", call), scopes);
            match outcome {
                Outcome::Valid => Ok(token.expires_at(Utc::now() + Duration::hours(1))),
                Outcome::Expired => Ok(token.expires_at(Utc::now() - Duration::seconds(1))),
                Outcome::Fail => Err(AuthError::Rejected {
                    status: 401,
                    message: "denied".into(),
                }),
            }
        }
    }

    #[test]
    fn test_needs_refresh_honours_skew() {
        let now = Utc::now();
        let token = AccessToken::bearer("t", SCOPES);
        assert!(!token.needs_refresh(now));
        assert!(token.clone().expires_at(now - Duration::seconds(1)).needs_refresh(now));
        assert!(token.clone().expires_at(now + Duration::seconds(30)).needs_refresh(now));
        assert!(!token.expires_at(now + Duration::minutes(10)).needs_refresh(now));
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_round_trip() {
        let auth = Arc::new(ScriptedAuthenticator::default());
        let provider = CredentialProvider::new(auth.clone());

        let (a, b) = tokio::join!(provider.client_handle(), provider.client_handle());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(auth.calls(), 1);
        assert!(Arc::ptr_eq(&a, &b));

        let token = a.access_token().await.unwrap();
        assert_eq!(token.value, "token-0");
        assert_eq!(token.scopes.len(), SCOPES.len());
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_handle_is_memoized() {
        let auth = Arc::new(ScriptedAuthenticator::default());
        let provider = CredentialProvider::new(auth.clone());

        assert!(!provider.is_initialized());
        let first = provider.client_handle().await.unwrap();
        let second = provider.client_handle().await.unwrap();

        assert!(provider.is_initialized());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(auth.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_reaches_all_waiters_and_is_not_cached() {
        let auth = Arc::new(ScriptedAuthenticator::with_script(vec![Outcome::Fail]));
        let provider = CredentialProvider::new(auth.clone());

        let (a, b) = tokio::join!(provider.client_handle(), provider.client_handle());
        assert!(matches!(a, Err(AuthError::Rejected { status: 401, .. })));
        assert!(matches!(b, Err(AuthError::Rejected { status: 401, .. })));
        assert_eq!(auth.calls(), 1);
        assert!(!provider.is_initialized());

        let retried = provider.client_handle().await.unwrap();
        assert_eq!(retried.access_token().await.unwrap().value, "token-1");
        assert_eq!(auth.calls(), 2);
    }

    #[tokio::test]
    async fn test_expired_token_is_reminted_once() {
        let auth = Arc::new(ScriptedAuthenticator::with_script(vec![Outcome::Expired]));
        let provider = CredentialProvider::new(auth.clone());
        let handle = provider.client_handle().await.unwrap();

        let (a, b) = tokio::join!(handle.access_token(), handle.access_token());
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.value, "token-1");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.needs_refresh(Utc::now()));
        assert_eq!(auth.calls(), 2);

        let again = handle.access_token().await.unwrap();
        assert_eq!(again.value, "token-1");
        assert_eq!(auth.calls(), 2);

        // The provider still hands out the same handle
        assert!(Arc::ptr_eq(&handle, &provider.client_handle().await.unwrap()));
    }

    #[tokio::test]
    async fn test_failed_refresh_is_retried_on_next_call() {
        let auth = Arc::new(ScriptedAuthenticator::with_script(vec![
            Outcome::Expired,
            Outcome::Fail,
        ]));
        let provider = CredentialProvider::new(auth.clone());
        let handle = provider.client_handle().await.unwrap();

        assert!(handle.access_token().await.is_err());
        assert_eq!(auth.calls(), 2);

        let token = handle.access_token().await.unwrap();
        assert_eq!(token.value, "token-2");
        assert_eq!(auth.calls(), 3);
    }
}
