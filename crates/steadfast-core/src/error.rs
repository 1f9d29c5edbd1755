//! Error types for the resilience layer
//!
//! The taxonomy separates failures that happen *before* a request is
//! dispatched ([`AdaptationError`]) from failures observed *after* dispatch
//! ([`TransportError`] and non-2xx statuses). Only the latter are ever handed
//! to the retry chain.
//!
//! Every error here is `Clone`: the same failure is shown to each retrier in
//! a chain and then returned to the caller unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A request mutation step failed.
///
/// Fatal for the current logical request and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdaptationError {
    /// The request URL could not be parsed or built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name or value was rejected.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Header name as supplied
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Signing or authorizing the request failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Encoding the request body failed.
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Any other adapter failure.
    #[error("{0}")]
    Other(String),
}

/// Network-layer failure codes reported by a transport.
///
/// This is a closed set. The first eighteen variants are transient by
/// default (see [`NetworkErrorCode::is_transient`]); the rest are permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorCode {
    /// A background session is already owned by another process.
    BackgroundSessionInUseByAnotherProcess,
    /// A background session was disconnected from its owner.
    BackgroundSessionWasDisconnected,
    /// The server sent a response that could not be parsed.
    BadServerResponse,
    /// The connection was interrupted by an active phone call.
    CallIsActive,
    /// The host refused or could not accept the connection.
    CannotConnectToHost,
    /// The host name could not be resolved to a host.
    CannotFindHost,
    /// The resource could not be loaded from the network.
    CannotLoadFromNetwork,
    /// The cellular network disallowed the connection.
    DataNotAllowed,
    /// DNS lookup failed.
    DnsLookupFailed,
    /// Decoding a download failed part way through.
    DownloadDecodingFailedMidStream,
    /// Decoding a download failed after the transfer completed.
    DownloadDecodingFailedToComplete,
    /// Roaming is disabled and the device is roaming.
    InternationalRoamingOff,
    /// The connection was lost mid-request.
    NetworkConnectionLost,
    /// There is no network connection.
    NotConnectedToInternet,
    /// The TLS handshake failed.
    SecureConnectionFailed,
    /// The server certificate has expired.
    ServerCertificateHasBadDate,
    /// The server certificate is not valid yet.
    ServerCertificateNotYetValid,
    /// The request timed out.
    TimedOut,

    /// The URL is malformed.
    BadUrl,
    /// The URL scheme is not supported.
    UnsupportedUrl,
    /// The server certificate is not trusted.
    ServerCertificateUntrusted,
    /// The server rejected the client certificate.
    ClientCertificateRejected,
    /// The server requires user authentication.
    UserAuthenticationRequired,
    /// Anything the transport could not classify.
    Unknown,
}

impl NetworkErrorCode {
    /// Codes retried by default: connectivity, DNS, TLS timing and
    /// background-session interruptions.
    pub const TRANSIENT: [NetworkErrorCode; 18] = [
        Self::BackgroundSessionInUseByAnotherProcess,
        Self::BackgroundSessionWasDisconnected,
        Self::BadServerResponse,
        Self::CallIsActive,
        Self::CannotConnectToHost,
        Self::CannotFindHost,
        Self::CannotLoadFromNetwork,
        Self::DataNotAllowed,
        Self::DnsLookupFailed,
        Self::DownloadDecodingFailedMidStream,
        Self::DownloadDecodingFailedToComplete,
        Self::InternationalRoamingOff,
        Self::NetworkConnectionLost,
        Self::NotConnectedToInternet,
        Self::SecureConnectionFailed,
        Self::ServerCertificateHasBadDate,
        Self::ServerCertificateNotYetValid,
        Self::TimedOut,
    ];

    /// Whether this code is in the default transient set.
    pub fn is_transient(self) -> bool {
        Self::TRANSIENT.contains(&self)
    }
}

impl fmt::Display for NetworkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Network or transport failure reported after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A classified network failure.
    #[error("Network error ({code}): {message}")]
    Network {
        /// Classified failure code
        code: NetworkErrorCode,
        /// Transport-supplied description
        message: String,
    },

    /// The task was cancelled before it completed.
    #[error("Request cancelled")]
    Cancelled,

    /// Generic transport error
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a network error.
    pub fn network(code: NetworkErrorCode, message: impl Into<String>) -> Self {
        Self::Network {
            code,
            message: message.into(),
        }
    }

    /// The network code, if this is a classified network failure.
    pub fn network_code(&self) -> Option<NetworkErrorCode> {
        match self {
            Self::Network { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Check if this error reports a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error a retrier substitutes for the natural outcome of a request.
///
/// Wraps any error type behind an `Arc` so it can be cloned through the
/// chain and returned to the caller as-is.
#[derive(Clone)]
pub struct RetrierError(Arc<dyn std::error::Error + Send + Sync>);

impl RetrierError {
    /// Wrap an existing error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Create an error from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Arc::new(Message(message.into())))
    }

    /// Borrow the wrapped error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.0.as_ref()
    }

    /// Attempt to downcast the wrapped error.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for RetrierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RetrierError").field(&self.0.to_string()).finish()
    }
}

impl fmt::Display for RetrierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for RetrierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl PartialEq for RetrierError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.to_string() == other.0.to_string()
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

/// Why a logical request failed, or why an attempt is being judged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// An adapter rejected the request before dispatch.
    #[error("Request adaptation failed: {0}")]
    Adaptation(#[from] AdaptationError),

    /// The transport failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A non-2xx response was observed.
    #[error("Response status {status} is not acceptable")]
    ResponseStatus {
        /// HTTP status code
        status: u16,
    },

    /// A retrier replaced the outcome with its own error.
    #[error("{0}")]
    Retrier(#[from] RetrierError),

    /// The request was cancelled by the caller.
    #[error("Request cancelled")]
    Cancelled,
}

impl RequestError {
    /// HTTP status carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ResponseStatus { status } => Some(*status),
            _ => None,
        }
    }

    /// Network code carried by this error, if any.
    pub fn network_code(&self) -> Option<NetworkErrorCode> {
        match self {
            Self::Transport(err) => err.network_code(),
            _ => None,
        }
    }

    /// Check if this error represents a cancellation at any level.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Transport(err) => err.is_cancelled(),
            _ => false,
        }
    }

    /// Whether this failure may be shown to the retry chain.
    ///
    /// Only failures observed after a successful dispatch qualify.
    pub fn is_retry_candidate(&self) -> bool {
        match self {
            Self::Transport(err) => !err.is_cancelled(),
            Self::ResponseStatus { .. } => true,
            Self::Adaptation(_) | Self::Retrier(_) | Self::Cancelled => false,
        }
    }
}

/// Invalid backoff policy configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    /// The exponential base must be at least 2.
    #[error("Backoff base must be >= 2, got {0}")]
    InvalidBase(u32),

    /// The scale must be a finite, positive number of seconds.
    #[error("Backoff scale must be finite and > 0, got {0}")]
    InvalidScale(f64),
}
