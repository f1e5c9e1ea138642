//! Error types for the refresh controller.

use thiserror::Error;

/// Failure of a single report fetch.
///
/// Only `AuthExpired` is fatal to the calling flow; every other variant is
/// transient and leaves whatever is on screen untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("session expired or credential rejected")]
    AuthExpired,

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Network(String),

    #[error("malformed report payload: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::AuthExpired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error("could not build chart in {target}: {reason}")]
    Construction { target: String, reason: String },
}

/// Crate-level error for setup and the binary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_source() {
        let cause = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let err = Error::from(cause);

        assert!(matches!(err, Error::Http(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn only_auth_expiry_is_fatal() {
        assert!(!FetchError::AuthExpired.is_transient());
        assert!(FetchError::Network("reset".into()).is_transient());
        assert!(FetchError::Malformed("eof".into()).is_transient());
    }
}
