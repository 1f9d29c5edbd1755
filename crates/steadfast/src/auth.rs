//! Bearer token authentication with refresh on 401
//!
//! [`BearerAuth`] is both an adapter and a retrier. As an adapter it sets
//! `Authorization: Bearer <token>` on every attempt. As a retrier it reacts
//! to `401 Unauthorized`: it asks its [`TokenRefresher`] for a new token and
//! votes to retry immediately. Each logical request triggers at most one
//! refresh; a second 401 for the same request is left to the other retriers.
//!
//! # Example
//!
//! ```rust
//! use secrecy::SecretString;
//! use steadfast::auth::BearerAuth;
//! use steadfast::RetrierError;
//!
//! let auth = BearerAuth::new("initial-token").with_refresher(|| async {
//!     Ok::<_, RetrierError>(SecretString::new("fresh-token".into()))
//! });
//! let interceptor = auth.into_interceptor();
//! assert_eq!(interceptor.adapter_count(), 1);
//! assert_eq!(interceptor.retrier_count(), 1);
//! ```

use async_trait::async_trait;
use http::header::{AUTHORIZATION, HeaderValue};
use http::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use steadfast_core::{
    AdaptationError, Adapter, Interceptor, OutgoingRequest, RequestError, RequestId, Retrier,
    RetrierError, RetryContext, RetryDecision,
};
use tokio::sync::RwLock;

/// Requests remembered as having already triggered a refresh
const REMEMBERED_REFRESHES: usize = 64;

/// Source of fresh bearer tokens.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<SecretString, RetrierError>>`.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Obtain a new token.
    async fn refresh(&self) -> Result<SecretString, RetrierError>;
}

#[async_trait]
impl<F, Fut> TokenRefresher for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<SecretString, RetrierError>> + Send + 'static,
{
    async fn refresh(&self) -> Result<SecretString, RetrierError> {
        self().await
    }
}

struct TokenState {
    token: SecretString,
    refreshed_for: VecDeque<RequestId>,
}

/// Bearer token adapter and 401-refresh retrier.
pub struct BearerAuth {
    state: RwLock<TokenState>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl BearerAuth {
    /// Authenticate with a fixed token and no refresher.
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_secret(SecretString::new(token.into().into_boxed_str()))
    }

    /// Authenticate with a token already held as a secret.
    pub fn from_secret(token: SecretString) -> Self {
        Self {
            state: RwLock::new(TokenState {
                token,
                refreshed_for: VecDeque::new(),
            }),
            refresher: None,
        }
    }

    /// Refresh the token through `refresher` when a request gets a 401.
    pub fn with_refresher(mut self, refresher: impl TokenRefresher + 'static) -> Self {
        self.refresher = Some(Arc::new(refresher));
        self
    }

    /// Replace the current token.
    pub async fn set_token(&self, token: SecretString) {
        self.state.write().await.token = token;
    }

    /// Wrap into an interceptor that uses this value as both its adapter
    /// and its retrier.
    pub fn into_interceptor(self) -> Interceptor {
        let auth = Arc::new(self);
        let adapter: Arc<dyn Adapter> = auth.clone();
        let retrier: Arc<dyn Retrier> = auth;
        Interceptor::from_parts("bearer-auth", vec![adapter], vec![retrier])
    }

    fn is_unauthorized(context: &RetryContext, error: &RequestError) -> bool {
        let status = context
            .last_response()
            .map(|head| head.status.as_u16())
            .or_else(|| error.status_code());
        status == Some(StatusCode::UNAUTHORIZED.as_u16())
    }
}

#[async_trait]
impl Adapter for BearerAuth {
    async fn adapt(&self, mut request: OutgoingRequest) -> Result<OutgoingRequest, AdaptationError> {
        let state = self.state.read().await;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", state.token.expose_secret()))
            .map_err(|e| AdaptationError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
                reason: e.to_string(),
            })?;
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }
}

#[async_trait]
impl Retrier for BearerAuth {
    async fn retry(&self, context: &RetryContext, error: &RequestError) -> RetryDecision {
        if !Self::is_unauthorized(context, error) {
            return RetryDecision::DoNotRetry;
        }
        let Some(refresher) = &self.refresher else {
            return RetryDecision::DoNotRetry;
        };

        let request_id = context.request_id();
        let mut state = self.state.write().await;
        if state.refreshed_for.contains(&request_id) {
            tracing::debug!(request_id = %request_id, "Token already refreshed for this request");
            return RetryDecision::DoNotRetry;
        }

        let sent = context
            .request()
            .header(AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "));
        if sent != Some(state.token.expose_secret()) {
            // Another request rotated the token after this one was sent.
            return RetryDecision::RetryNow;
        }

        match refresher.refresh().await {
            Ok(token) => {
                state.token = token;
                if state.refreshed_for.len() == REMEMBERED_REFRESHES {
                    state.refreshed_for.pop_front();
                }
                state.refreshed_for.push_back(request_id);
                tracing::debug!(request_id = %request_id, "Refreshed bearer token");
                RetryDecision::RetryNow
            }
            Err(err) => {
                tracing::warn!(request_id = %request_id, error = %err, "Token refresh failed");
                RetryDecision::DoNotRetryWithError(err)
            }
        }
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth")
            .field("token", &"[REDACTED]")
            .field("has_refresher", &self.refresher.is_some())
            .finish()
    }
}
