//! Transport error types and failure classification

use std::error::Error as StdError;
use std::io;
use steadfast_core::{NetworkErrorCode, TransportError};
use thiserror::Error;

/// Result type for transport setup
pub type Result<T> = std::result::Result<T, TransportSetupError>;

/// Errors raised while building a transport
#[derive(Debug, Error)]
pub enum TransportSetupError {
    /// No tokio runtime is available to drive tasks
    #[error("HTTP transport requires a running tokio runtime: {0}")]
    NoRuntime(String),

    /// The underlying HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Map a reqwest failure onto the closed set of network codes.
///
/// Connect failures are inspected by message first (DNS, TLS), then by the
/// first `io::Error` found in the source chain.
pub fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    TransportError::network(classify_code(err), err.to_string())
}

fn classify_code(err: &reqwest::Error) -> NetworkErrorCode {
    if err.is_timeout() {
        return NetworkErrorCode::TimedOut;
    }
    if err.is_builder() {
        return NetworkErrorCode::BadUrl;
    }

    let text = chain_text(err);
    if err.is_connect() {
        if is_dns_failure(&text) {
            return NetworkErrorCode::DnsLookupFailed;
        }
        if is_tls_failure(&text) {
            return NetworkErrorCode::SecureConnectionFailed;
        }
        return io_code(err).unwrap_or(NetworkErrorCode::CannotConnectToHost);
    }

    if let Some(code) = io_code(err) {
        return code;
    }
    if err.is_decode() {
        return NetworkErrorCode::BadServerResponse;
    }
    if err.is_body() || err.is_request() {
        return NetworkErrorCode::NetworkConnectionLost;
    }
    NetworkErrorCode::Unknown
}

fn io_code(err: &(dyn StdError + 'static)) -> Option<NetworkErrorCode> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return classify_io_kind(io_err.kind());
        }
        current = e.source();
    }
    None
}

/// Classify an I/O error kind, if it maps to a known network failure.
pub fn classify_io_kind(kind: io::ErrorKind) -> Option<NetworkErrorCode> {
    match kind {
        io::ErrorKind::TimedOut => Some(NetworkErrorCode::TimedOut),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::HostUnreachable => {
            Some(NetworkErrorCode::CannotConnectToHost)
        }
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(NetworkErrorCode::NetworkConnectionLost),
        io::ErrorKind::NotConnected
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::NetworkDown
        | io::ErrorKind::AddrNotAvailable => Some(NetworkErrorCode::NotConnectedToInternet),
        _ => None,
    }
}

fn chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        text.push_str(": ");
        text.push_str(&e.to_string());
        current = e.source();
    }
    text.to_lowercase()
}

fn is_dns_failure(text: &str) -> bool {
    text.contains("dns error")
        || text.contains("failed to lookup address")
        || text.contains("name or service not known")
        || text.contains("no such host")
}

fn is_tls_failure(text: &str) -> bool {
    text.contains("certificate") || text.contains("tls") || text.contains("handshake")
}
