//! Driver error types.

use thiserror::Error;

/// Server error code for "server has gone away".
pub const CR_SERVER_GONE_ERROR: u16 = 2006;

/// Server error code for "lost connection during query".
pub const CR_SERVER_LOST: u16 = 2013;

/// Errors reported by a driver.
///
/// The pool only needs to tell two things apart: a session that can no longer
/// be used (`Connect`, `ConnectionLost`) and a statement the server rejected
/// (`Server`), which leaves the session intact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Could not establish a session.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The session dropped while a statement was running or being sent.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The server rejected a statement.
    #[error("server error {code}: {message}")]
    Server {
        /// Server error code.
        code: u16,
        /// Server error message.
        message: String,
    },

    /// Invalid connection parameters.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DriverError {
    /// Classify a server-reported error by code.
    ///
    /// Codes 2006 and 2013 mean the session itself is gone and map to
    /// [`DriverError::ConnectionLost`]; anything else is a statement error.
    #[must_use]
    pub fn server(code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            CR_SERVER_GONE_ERROR | CR_SERVER_LOST => Self::ConnectionLost(message),
            _ => Self::Server { code, message },
        }
    }

    /// Check if this error means the session is no longer usable.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::ConnectionLost(_))
    }

    /// Get the server error code, if this is a server error.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_connection_codes_are_connectivity() {
        assert!(DriverError::server(2006, "gone away").is_connectivity());
        assert!(DriverError::server(2013, "lost during query").is_connectivity());
    }

    #[test]
    fn test_statement_errors_are_not_connectivity() {
        let err = DriverError::server(1064, "syntax error");
        assert!(!err.is_connectivity());
        assert_eq!(err.code(), Some(1064));
    }

    #[test]
    fn test_display() {
        let err = DriverError::server(1146, "table missing");
        assert_eq!(err.to_string(), "server error 1146: table missing");
    }
}
