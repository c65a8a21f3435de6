//! Pool error types.

use std::time::Duration;

use connmgr_driver::DriverError;
use thiserror::Error;

use crate::lifecycle::ConnectionState;

/// Errors that can occur during pool and manager operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Opening a session failed (refused, handshake error or timeout).
    #[error("failed to create connection: {0}")]
    ConnectFailed(String),

    /// No connection became available within the acquire timeout.
    #[error("connection acquisition timeout after {0:?}")]
    Timeout(Duration),

    /// The pool has been shut down.
    #[error("pool is closed")]
    Closed,

    /// No connection is registered under the requested name.
    #[error("no connection named '{0}'")]
    NotFound(String),

    /// The session was lost while executing a statement.
    #[error("connectivity lost: {0}")]
    ConnectivityLost(String),

    /// The server rejected a statement.
    #[error(transparent)]
    Driver(DriverError),

    /// Invalid pool or manager configuration.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// A connection was borrowed while not idle.
    #[error("connection is {0:?}, not idle")]
    NotIdle(ConnectionState),
}

impl PoolError {
    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ConnectivityLost(_))
    }
}

impl From<DriverError> for PoolError {
    fn from(err: DriverError) -> Self {
        if err.is_connectivity() {
            Self::ConnectivityLost(err.to_string())
        } else {
            Self::Driver(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_classification() {
        let lost: PoolError = DriverError::server(2013, "lost connection").into();
        assert!(matches!(lost, PoolError::ConnectivityLost(_)));
        assert!(lost.is_transient());

        let rejected: PoolError = DriverError::server(1062, "duplicate entry").into();
        assert!(matches!(rejected, PoolError::Driver(_)));
        assert!(!rejected.is_transient());
    }

    #[test]
    fn test_display() {
        let err = PoolError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "connection acquisition timeout after 250ms");
        assert_eq!(
            PoolError::NotFound("reports".into()).to_string(),
            "no connection named 'reports'"
        );
    }
}
