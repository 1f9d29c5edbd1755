//! Exponential backoff retry policy.

use super::context::RetryContext;
use super::decision::RetryDecision;
use crate::error::{NetworkErrorCode, PolicyError, RequestError};
use crate::interceptor::Retrier;
use async_trait::async_trait;
use http::Method;
use std::collections::HashSet;
use std::time::Duration;

/// Status codes retried by default: request timeout and server-side overload.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 5] = [408, 500, 502, 503, 504];

const DEFAULT_RETRY_LIMIT: u32 = 2;
const DEFAULT_BASE: u32 = 2;
const DEFAULT_SCALE: f64 = 0.5;

/// Methods that are idempotent by convention and safe to re-issue silently.
pub fn default_retryable_methods() -> HashSet<Method> {
    [
        Method::DELETE,
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::PUT,
        Method::TRACE,
    ]
    .into_iter()
    .collect()
}

/// Retry policy with exponential backoff for idempotent requests.
///
/// A failed attempt is retried when all of the following hold:
///
/// 1. `retry_count < retry_limit`
/// 2. the request method is in `retryable_methods`
/// 3. the last response status is in `retryable_status_codes`, or the error
///    is a network failure whose code is in `retryable_network_errors`
///
/// # Mathematical Formula
///
/// ```text
/// delay(retry_count) = scale * base ^ retry_count
/// ```
///
/// With the defaults (`base = 2`, `scale = 0.5`) the delays are
/// 0.5s, 1s, 2s, 4s, ... No jitter is applied, so delays are exact.
///
/// # Examples
///
/// ```rust
/// use steadfast_core::retry::ExponentialBackoffRetryPolicy;
/// use std::time::Duration;
///
/// // Default configuration (retry_limit=2, base=2, scale=0.5)
/// let policy = ExponentialBackoffRetryPolicy::default();
/// assert_eq!(policy.delay_for(0), Duration::from_millis(500));
/// assert_eq!(policy.delay_for(1), Duration::from_secs(1));
///
/// // Custom configuration
/// let policy = ExponentialBackoffRetryPolicy::builder()
///     .retry_limit(5)
///     .base(3)
///     .scale(0.1)
///     .retryable_status_codes([503])
///     .build()
///     .unwrap();
/// assert_eq!(policy.retry_limit(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct ExponentialBackoffRetryPolicy {
    retry_limit: u32,
    base: u32,
    scale: f64,
    retryable_methods: HashSet<Method>,
    retryable_status_codes: HashSet<u16>,
    retryable_network_errors: HashSet<NetworkErrorCode>,
}

impl ExponentialBackoffRetryPolicy {
    /// Create a new builder for configuring the policy.
    pub fn builder() -> ExponentialBackoffRetryPolicyBuilder {
        ExponentialBackoffRetryPolicyBuilder::default()
    }

    /// Maximum number of retries after the first attempt.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Exponential base.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Scale in seconds.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Methods eligible for retry.
    pub fn retryable_methods(&self) -> &HashSet<Method> {
        &self.retryable_methods
    }

    /// Status codes eligible for retry.
    pub fn retryable_status_codes(&self) -> &HashSet<u16> {
        &self.retryable_status_codes
    }

    /// Network failures eligible for retry.
    pub fn retryable_network_errors(&self) -> &HashSet<NetworkErrorCode> {
        &self.retryable_network_errors
    }

    /// Delay before the retry that follows `retry_count` earlier retries.
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let seconds = f64::from(self.base).powi(exponent) * self.scale;
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }

    /// Whether the failure is one this policy classifies as retryable.
    ///
    /// The status of `context.last_response()` is checked first, then the
    /// status carried by the error itself, then its network code.
    pub fn is_retryable_failure(&self, context: &RetryContext, error: &RequestError) -> bool {
        if !error.is_retry_candidate() {
            return false;
        }

        let status = context
            .last_response()
            .map(|head| head.status.as_u16())
            .or_else(|| error.status_code());
        if status.is_some_and(|code| self.retryable_status_codes.contains(&code)) {
            return true;
        }

        error
            .network_code()
            .is_some_and(|code| self.retryable_network_errors.contains(&code))
    }

    /// Decide whether and when to retry. Pure, no side effects.
    pub fn decide(&self, context: &RetryContext, error: &RequestError) -> RetryDecision {
        if context.retry_count() >= self.retry_limit {
            return RetryDecision::DoNotRetry;
        }
        if !self.retryable_methods.contains(context.request().method()) {
            return RetryDecision::DoNotRetry;
        }
        if !self.is_retryable_failure(context, error) {
            return RetryDecision::DoNotRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(context.retry_count()))
    }
}

impl Default for ExponentialBackoffRetryPolicy {
    /// Create a policy with the stock defaults.
    ///
    /// Defaults:
    /// - `retry_limit`: 2
    /// - `base`: 2
    /// - `scale`: 0.5 seconds
    /// - `retryable_methods`: DELETE, GET, HEAD, OPTIONS, PUT, TRACE
    /// - `retryable_status_codes`: 408, 500, 502, 503, 504
    /// - `retryable_network_errors`: [`NetworkErrorCode::TRANSIENT`]
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            base: DEFAULT_BASE,
            scale: DEFAULT_SCALE,
            retryable_methods: default_retryable_methods(),
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
            retryable_network_errors: NetworkErrorCode::TRANSIENT.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Retrier for ExponentialBackoffRetryPolicy {
    async fn retry(&self, context: &RetryContext, error: &RequestError) -> RetryDecision {
        self.decide(context, error)
    }
}

/// Builder for configuring [`ExponentialBackoffRetryPolicy`].
///
/// Provides a fluent API for setting retry parameters. Unset parameters keep
/// their defaults.
///
/// # Examples
///
/// ```rust
/// use steadfast_core::retry::ExponentialBackoffRetryPolicy;
/// use http::Method;
///
/// let policy = ExponentialBackoffRetryPolicy::builder()
///     .retry_limit(3)
///     .retryable_methods([Method::GET])
///     .build()
///     .unwrap();
/// assert!(!policy.retryable_methods().contains(&Method::PUT));
/// ```
#[derive(Debug, Default)]
pub struct ExponentialBackoffRetryPolicyBuilder {
    retry_limit: Option<u32>,
    base: Option<u32>,
    scale: Option<f64>,
    retryable_methods: Option<HashSet<Method>>,
    retryable_status_codes: Option<HashSet<u16>>,
    retryable_network_errors: Option<HashSet<NetworkErrorCode>>,
}

impl ExponentialBackoffRetryPolicyBuilder {
    /// Set the maximum number of retries after the first attempt.
    ///
    /// Default: 2
    pub fn retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = Some(retry_limit);
        self
    }

    /// Set the exponential base. Must be at least 2.
    ///
    /// Default: 2
    pub fn base(mut self, base: u32) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the scale in seconds. Must be finite and positive.
    ///
    /// Default: 0.5
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Replace the set of retryable methods.
    pub fn retryable_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.retryable_methods = Some(methods.into_iter().collect());
        self
    }

    /// Replace the set of retryable status codes.
    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = Some(codes.into_iter().collect());
        self
    }

    /// Replace the set of retryable network failures.
    pub fn retryable_network_errors(
        mut self,
        codes: impl IntoIterator<Item = NetworkErrorCode>,
    ) -> Self {
        self.retryable_network_errors = Some(codes.into_iter().collect());
        self
    }

    /// Build the policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if `base < 2` or `scale` is not finite and
    /// positive.
    pub fn build(self) -> Result<ExponentialBackoffRetryPolicy, PolicyError> {
        let defaults = ExponentialBackoffRetryPolicy::default();

        let base = self.base.unwrap_or(defaults.base);
        if base < 2 {
            return Err(PolicyError::InvalidBase(base));
        }
        let scale = self.scale.unwrap_or(defaults.scale);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PolicyError::InvalidScale(scale));
        }

        Ok(ExponentialBackoffRetryPolicy {
            retry_limit: self.retry_limit.unwrap_or(defaults.retry_limit),
            base,
            scale,
            retryable_methods: self.retryable_methods.unwrap_or(defaults.retryable_methods),
            retryable_status_codes: self
                .retryable_status_codes
                .unwrap_or(defaults.retryable_status_codes),
            retryable_network_errors: self
                .retryable_network_errors
                .unwrap_or(defaults.retryable_network_errors),
        })
    }
}

/// Policy that retries only when the connection was lost mid-request.
///
/// Same backoff and method rules as [`ExponentialBackoffRetryPolicy`], but no
/// status code is retryable and the only retryable network failure is
/// [`NetworkErrorCode::NetworkConnectionLost`].
#[derive(Debug, Clone)]
pub struct ConnectionLostRetryPolicy {
    inner: ExponentialBackoffRetryPolicy,
}

impl ConnectionLostRetryPolicy {
    /// Create the policy with explicit backoff parameters.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] for an invalid base or scale.
    pub fn new(retry_limit: u32, base: u32, scale: f64) -> Result<Self, PolicyError> {
        let inner = ExponentialBackoffRetryPolicy::builder()
            .retry_limit(retry_limit)
            .base(base)
            .scale(scale)
            .retryable_status_codes([])
            .retryable_network_errors([NetworkErrorCode::NetworkConnectionLost])
            .build()?;
        Ok(Self { inner })
    }

    /// Get the underlying exponential policy.
    pub fn inner(&self) -> &ExponentialBackoffRetryPolicy {
        &self.inner
    }
}

impl Default for ConnectionLostRetryPolicy {
    fn default() -> Self {
        let mut inner = ExponentialBackoffRetryPolicy::default();
        inner.retryable_status_codes.clear();
        inner.retryable_network_errors = [NetworkErrorCode::NetworkConnectionLost]
            .into_iter()
            .collect();
        Self { inner }
    }
}

#[async_trait]
impl Retrier for ConnectionLostRetryPolicy {
    async fn retry(&self, context: &RetryContext, error: &RequestError) -> RetryDecision {
        self.inner.decide(context, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::request::OutgoingRequest;
    use crate::response::ResponseHead;
    use http::StatusCode;
    use rstest::rstest;

    fn context(method: Method, retry_count: u32, status: Option<u16>) -> RetryContext {
        let request = OutgoingRequest::parse(method, "https://example.com/resource").unwrap();
        let mut ctx = RetryContext::new(request);
        for _ in 0..retry_count {
            ctx.record_retry();
        }
        let head = status.map(|s| ResponseHead::new(StatusCode::from_u16(s).unwrap()));
        let error = match status {
            Some(status) => RequestError::ResponseStatus { status },
            None => RequestError::Transport(TransportError::network(
                NetworkErrorCode::TimedOut,
                "timed out",
            )),
        };
        ctx.record_failure(error, head);
        ctx
    }

    fn network_error(code: NetworkErrorCode) -> RequestError {
        RequestError::Transport(TransportError::network(code, "boom"))
    }

    #[test]
    fn test_exponential_delay_calculation() {
        let policy = ExponentialBackoffRetryPolicy::default();

        // 0.5s * 2^n
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_delay_saturates() {
        let policy = ExponentialBackoffRetryPolicy::builder()
            .base(10)
            .scale(1000.0)
            .build()
            .unwrap();
        assert_eq!(policy.delay_for(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_builder_defaults() {
        let policy = ExponentialBackoffRetryPolicy::builder().build().unwrap();

        assert_eq!(policy.retry_limit(), 2);
        assert_eq!(policy.base(), 2);
        assert_eq!(policy.scale(), 0.5);
        assert_eq!(policy.retryable_methods(), &default_retryable_methods());
        assert_eq!(policy.retryable_status_codes().len(), 5);
        assert_eq!(policy.retryable_network_errors().len(), 18);
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        assert_eq!(
            ExponentialBackoffRetryPolicy::builder().base(1).build().unwrap_err(),
            PolicyError::InvalidBase(1)
        );
        assert!(matches!(
            ExponentialBackoffRetryPolicy::builder().scale(0.0).build(),
            Err(PolicyError::InvalidScale(_))
        ));
        assert!(matches!(
            ExponentialBackoffRetryPolicy::builder().scale(f64::NAN).build(),
            Err(PolicyError::InvalidScale(_))
        ));
    }

    #[rstest]
    #[case(Method::GET, true)]
    #[case(Method::HEAD, true)]
    #[case(Method::PUT, true)]
    #[case(Method::DELETE, true)]
    #[case(Method::OPTIONS, true)]
    #[case(Method::TRACE, true)]
    #[case(Method::POST, false)]
    #[case(Method::PATCH, false)]
    #[case(Method::CONNECT, false)]
    fn test_method_gate(#[case] method: Method, #[case] retried: bool) {
        let policy = ExponentialBackoffRetryPolicy::default();
        let ctx = context(method, 0, Some(503));
        let decision = policy.decide(&ctx, ctx.last_error().unwrap());
        assert_eq!(decision.is_retry_required(), retried);
    }

    #[rstest]
    #[case(408, true)]
    #[case(500, true)]
    #[case(502, true)]
    #[case(503, true)]
    #[case(504, true)]
    #[case(400, false)]
    #[case(401, false)]
    #[case(403, false)]
    #[case(404, false)]
    #[case(429, false)]
    #[case(501, false)]
    fn test_status_classification(#[case] status: u16, #[case] retried: bool) {
        let policy = ExponentialBackoffRetryPolicy::default();
        let ctx = context(Method::GET, 0, Some(status));
        let decision = policy.decide(&ctx, ctx.last_error().unwrap());
        assert_eq!(decision.is_retry_required(), retried, "status {status}");
    }

    #[rstest]
    #[case(NetworkErrorCode::TimedOut, true)]
    #[case(NetworkErrorCode::DnsLookupFailed, true)]
    #[case(NetworkErrorCode::NetworkConnectionLost, true)]
    #[case(NetworkErrorCode::NotConnectedToInternet, true)]
    #[case(NetworkErrorCode::SecureConnectionFailed, true)]
    #[case(NetworkErrorCode::ServerCertificateNotYetValid, true)]
    #[case(NetworkErrorCode::BackgroundSessionWasDisconnected, true)]
    #[case(NetworkErrorCode::BadUrl, false)]
    #[case(NetworkErrorCode::ServerCertificateUntrusted, false)]
    #[case(NetworkErrorCode::Unknown, false)]
    fn test_network_classification(#[case] code: NetworkErrorCode, #[case] retried: bool) {
        let policy = ExponentialBackoffRetryPolicy::default();
        let ctx = context(Method::GET, 0, None);
        let decision = policy.decide(&ctx, &network_error(code));
        assert_eq!(decision.is_retry_required(), retried, "{code}");
    }

    #[test]
    fn test_respects_retry_limit() {
        let policy = ExponentialBackoffRetryPolicy::default();

        let first = context(Method::GET, 0, Some(503));
        assert_eq!(
            policy.decide(&first, first.last_error().unwrap()),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );

        let second = context(Method::GET, 1, Some(503));
        assert_eq!(
            policy.decide(&second, second.last_error().unwrap()),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );

        // retry_count 2 is not < retry_limit 2
        let third = context(Method::GET, 2, Some(503));
        assert_eq!(
            policy.decide(&third, third.last_error().unwrap()),
            RetryDecision::DoNotRetry
        );
    }

    #[test]
    fn test_post_never_retried_even_for_503() {
        let policy = ExponentialBackoffRetryPolicy::default();
        let ctx = context(Method::POST, 0, Some(503));
        assert_eq!(
            policy.decide(&ctx, ctx.last_error().unwrap()),
            RetryDecision::DoNotRetry
        );
    }

    #[test]
    fn test_non_candidates_not_retried() {
        let policy = ExponentialBackoffRetryPolicy::default();
        let ctx = context(Method::GET, 0, None);

        assert_eq!(
            policy.decide(&ctx, &RequestError::Cancelled),
            RetryDecision::DoNotRetry
        );
        assert_eq!(
            policy.decide(&ctx, &RequestError::Transport(TransportError::Cancelled)),
            RetryDecision::DoNotRetry
        );
    }

    #[test]
    fn test_connection_lost_policy() {
        let policy = ConnectionLostRetryPolicy::default();

        let ctx = context(Method::GET, 0, None);
        let lost = network_error(NetworkErrorCode::NetworkConnectionLost);
        let timed_out = network_error(NetworkErrorCode::TimedOut);
        assert!(policy.inner().decide(&ctx, &lost).is_retry_required());
        assert!(!policy.inner().decide(&ctx, &timed_out).is_retry_required());

        let status_ctx = context(Method::GET, 0, Some(503));
        assert!(
            !policy
                .inner()
                .decide(&status_ctx, status_ctx.last_error().unwrap())
                .is_retry_required()
        );
    }

    #[tokio::test]
    async fn test_policy_as_retrier() {
        let policy = ExponentialBackoffRetryPolicy::default();
        let ctx = context(Method::GET, 1, Some(500));

        let decision = policy.retry(&ctx, ctx.last_error().unwrap()).await;
        assert_eq!(decision, RetryDecision::RetryAfter(Duration::from_secs(1)));
    }
}
