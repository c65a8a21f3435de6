//! Raw connection capability.
//!
//! A driver hands out [`RawConnection`]s: one live session each, with no
//! pooling, retry or bookkeeping of its own. Everything above that lives in
//! `connmgr-pool`.

use crate::config::ConnectionConfig;
use crate::error::DriverError;
use crate::value::{QueryResult, Value};

/// Opens sessions against a database server.
///
/// Uses `#[async_trait]` so pools can hold an `Arc<dyn Driver>`.
#[async_trait::async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Perform the network handshake and log in.
    ///
    /// Implementations should not retry; callers own the retry policy.
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn RawConnection>, DriverError>;

    /// Driver name for log output.
    fn name(&self) -> &'static str {
        "driver"
    }
}

/// One open database session.
///
/// A session is never used by two callers at once; `&mut self` on the
/// operations that talk to the server enforces that.
#[async_trait::async_trait]
pub trait RawConnection: Send + 'static {
    /// Check that the session is alive and responsive.
    async fn ping(&mut self) -> bool;

    /// Execute one statement with positional parameters.
    ///
    /// A connectivity failure must be reported as
    /// [`DriverError::ConnectionLost`] (or a server code that
    /// [`DriverError::server`] classifies as such).
    async fn execute(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> Result<QueryResult, DriverError>;

    /// Close the session. Errors while closing are swallowed by the driver.
    async fn close(self: Box<Self>);
}
