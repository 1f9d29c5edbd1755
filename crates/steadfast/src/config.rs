//! Configuration for steadfast sessions

use crate::error::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use steadfast_core::retry::{DEFAULT_RETRYABLE_STATUS_CODES, default_retryable_methods};
use steadfast_core::{ExponentialBackoffRetryPolicy, NetworkErrorCode};

/// Configuration for a [`Session`](crate::Session).
///
/// Every field has a default, so a config file only needs to name what it
/// changes:
///
/// ```rust
/// use steadfast::SessionConfig;
///
/// let config = SessionConfig::from_toml_str(r#"
///     validate_status = true
///
///     [retry]
///     retry_limit = 4
///     retryable_status_codes = [429, 503]
/// "#).unwrap();
///
/// assert_eq!(config.retry.retry_limit, 4);
/// assert_eq!(config.retry.base, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Built-in exponential backoff policy
    pub retry: RetryConfig,

    /// Start requests as soon as they are created
    pub start_requests_immediately: bool,

    /// Treat non-2xx responses as failures
    pub validate_status: bool,

    /// Headers added to every request that does not already set them
    pub default_headers: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            start_requests_immediately: true,
            validate_status: true,
            default_headers: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is read first, if present.
    /// This will look for:
    /// - `STEADFAST_RETRY_ENABLED` to turn the built-in policy on or off
    /// - `STEADFAST_RETRY_LIMIT` for the number of retries
    /// - `STEADFAST_BACKOFF_BASE` for the exponential base
    /// - `STEADFAST_BACKOFF_SCALE` for the delay scale in seconds
    #[cfg(feature = "env")]
    pub fn from_env() -> Result<Self> {
        use std::env;

        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(value) = env::var("STEADFAST_RETRY_ENABLED") {
            config.retry.enabled = parse_env("STEADFAST_RETRY_ENABLED", &value)?;
        }
        if let Ok(value) = env::var("STEADFAST_RETRY_LIMIT") {
            config.retry.retry_limit = parse_env("STEADFAST_RETRY_LIMIT", &value)?;
        }
        if let Ok(value) = env::var("STEADFAST_BACKOFF_BASE") {
            config.retry.base = parse_env("STEADFAST_BACKOFF_BASE", &value)?;
        }
        if let Ok(value) = env::var("STEADFAST_BACKOFF_SCALE") {
            config.retry.scale = parse_env("STEADFAST_BACKOFF_SCALE", &value)?;
        }

        Ok(config)
    }

    /// Default headers as a validated header map.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::with_capacity(self.default_headers.len());
        for (name, value) in &self.default_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Config(format!("invalid header name {name:?}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::Config(format!("invalid value for header {name:?}: {e}")))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }

    /// Build the backoff policy described by [`SessionConfig::retry`].
    pub fn retry_policy(&self) -> Result<ExponentialBackoffRetryPolicy> {
        self.retry.policy()
    }
}

#[cfg(feature = "env")]
fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}={value:?}: {e}")))
}

/// Settings for the built-in exponential backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Append the policy to the session's retriers
    pub enabled: bool,

    /// Retries allowed after the first attempt (default: 2)
    pub retry_limit: u32,

    /// Exponential base, at least 2 (default: 2)
    pub base: u32,

    /// Delay of the first retry in seconds (default: 0.5)
    pub scale: f64,

    /// Methods that may be retried
    pub retryable_methods: Vec<String>,

    /// Response statuses that trigger a retry
    pub retryable_status_codes: Vec<u16>,

    /// Network failures that trigger a retry
    pub retryable_network_errors: Vec<NetworkErrorCode>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let mut methods: Vec<String> = default_retryable_methods()
            .iter()
            .map(|m| m.as_str().to_string())
            .collect();
        methods.sort();

        Self {
            enabled: true,
            retry_limit: 2,
            base: 2,
            scale: 0.5,
            retryable_methods: methods,
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.to_vec(),
            retryable_network_errors: NetworkErrorCode::TRANSIENT.to_vec(),
        }
    }
}

impl RetryConfig {
    /// Build and validate the policy.
    pub fn policy(&self) -> Result<ExponentialBackoffRetryPolicy> {
        let methods = self
            .retryable_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|e| Error::Config(format!("invalid HTTP method {m:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;

        let policy = ExponentialBackoffRetryPolicy::builder()
            .retry_limit(self.retry_limit)
            .base(self.base)
            .scale(self.scale)
            .retryable_methods(methods)
            .retryable_status_codes(self.retryable_status_codes.iter().copied())
            .retryable_network_errors(self.retryable_network_errors.iter().copied())
            .build()?;
        Ok(policy)
    }
}
