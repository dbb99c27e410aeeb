//! Error types for keepalive-dns.

/// A malformed call to a [`Lookup`](crate::Lookup) handle.
///
/// These are programming errors on the caller's side and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The hostname argument was empty.
    #[error("Invalid arguments: hostname must be passed")]
    MissingHostname,

    /// The handle is bound to a different hostname.
    #[error("Invalid lookup: expected {expected} but got {actual}")]
    HostnameMismatch {
        /// The hostname the handle's poller is bound to.
        expected: String,
        /// The hostname the caller asked for.
        actual: String,
    },
}

/// A failure to resolve a hostname to addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The underlying resolver reported an error.
    #[error("DNS lookup for {hostname} failed: {message}")]
    Lookup {
        /// The hostname that was queried.
        hostname: String,
        /// The resolver's error message.
        message: String,
    },

    /// The resolver answered, but with no addresses.
    #[error("No IPv4 addresses found for hostname: {0}")]
    NoAddresses(String),

    /// The handle was used after its first resolution attempt failed and no
    /// addresses have been cached since.
    #[error("{0} has not been resolved yet")]
    NotResolved(String),

    /// The poller behind a pending handle no longer exists.
    #[error("poller for {0} has been dropped")]
    PollerDropped(String),
}

impl ResolveError {
    /// Build a [`ResolveError::Lookup`] from any displayable resolver error.
    pub fn lookup(hostname: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Lookup {
            hostname: hostname.into(),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by the keep-alive agents.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    /// A lookup handle was invoked incorrectly.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The target hostname could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    /// Request timed out.
    #[error("Request timed out")]
    Timeout,
    /// Connection refused or failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// HTTP request failed.
    #[error("HTTP request error: {0}")]
    Request(String),
    /// Proxy configuration error.
    #[error("Proxy error: {0}")]
    Proxy(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// A specialized Result type for agent operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
