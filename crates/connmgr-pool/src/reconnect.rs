//! One-shot reconnect on lost sessions.
//!
//! When a statement fails because the session went away, the broken session
//! is closed, a new one is opened with the same configuration, and the
//! statement is executed once more. A second failure is returned to the
//! caller as-is and leaves the connection broken.

use connmgr_driver::{QueryResult, Value};
use tokio::time::Instant;

use crate::error::PoolError;
use crate::factory::ConnectionFactory;
use crate::lifecycle::ManagedConnection;
use crate::metrics::MetricsRecorder;

pub(crate) async fn execute_with_reconnect(
    factory: &ConnectionFactory,
    conn: &mut ManagedConnection,
    statement: &str,
    params: &[Value],
    reconnect: bool,
    metrics: Option<&MetricsRecorder>,
) -> Result<QueryResult, PoolError> {
    let reason = match conn.execute(statement, params).await {
        Err(PoolError::ConnectivityLost(reason)) if reconnect => reason,
        other => return other,
    };

    tracing::warn!(conn_id = conn.id(), %reason, "connection lost, reconnecting");
    if let Some(m) = metrics {
        m.reconnect_attempted();
    }

    conn.close_raw().await;
    let raw = match factory.create().await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(conn_id = conn.id(), error = %e, "reconnect failed");
            return Err(e);
        }
    };
    conn.replace_raw(raw, Instant::now());

    if let Some(m) = metrics {
        m.reconnect_succeeded();
    }
    tracing::info!(
        conn_id = conn.id(),
        reconnects = conn.metadata().reconnects,
        "reconnected, retrying statement"
    );

    conn.execute(statement, params).await
}
