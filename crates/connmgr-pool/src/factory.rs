//! Opening sessions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use connmgr_driver::{ConnectionConfig, Driver, RawConnection};
use tokio::time::Instant;

use crate::error::PoolError;
use crate::lifecycle::ManagedConnection;

/// Opens sessions for one [`ConnectionConfig`].
///
/// Every session gets the configured charset, time zone and autocommit mode
/// applied before it is handed out. The whole handshake is bounded by
/// [`ConnectionConfig::connect_timeout`]. Cloning shares the driver, the
/// configuration and the id sequence.
#[derive(Clone)]
pub struct ConnectionFactory {
    driver: Arc<dyn Driver>,
    config: Arc<ConnectionConfig>,
    next_id: Arc<AtomicU64>,
}

impl ConnectionFactory {
    /// Create a factory.
    pub fn new(driver: Arc<dyn Driver>, config: ConnectionConfig) -> Self {
        Self {
            driver,
            config: Arc::new(config),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Configuration every session is opened with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Open a session and prepare it for use.
    ///
    /// Driver failures, a failing session statement and the connect
    /// timeout are all reported as [`PoolError::ConnectFailed`]. No retry is
    /// attempted.
    pub async fn create(&self) -> Result<Box<dyn RawConnection>, PoolError> {
        let started = Instant::now();
        let timeout = self.config.connect_timeout;

        tracing::debug!(
            driver = self.driver.name(),
            host = %self.config.host,
            database = self.config.database.as_deref().unwrap_or(""),
            "opening connection"
        );

        match tokio::time::timeout(timeout, self.open_and_prepare()).await {
            Ok(Ok(raw)) => {
                tracing::debug!(
                    endpoint = %self.config.endpoint(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "connection opened"
                );
                Ok(raw)
            }
            Ok(Err(e)) => {
                tracing::error!(endpoint = %self.config.endpoint(), error = %e, "failed to open connection");
                Err(e)
            }
            Err(_) => {
                tracing::error!(
                    endpoint = %self.config.endpoint(),
                    timeout_ms = timeout.as_millis() as u64,
                    "connection attempt timed out"
                );
                Err(PoolError::ConnectFailed(format!(
                    "connecting to {} timed out after {timeout:?}",
                    self.config.endpoint()
                )))
            }
        }
    }

    /// Open a session and wrap it as a fresh, idle [`ManagedConnection`].
    pub async fn create_managed(&self) -> Result<ManagedConnection, PoolError> {
        let raw = self.create().await?;
        Ok(ManagedConnection::new(self.next_id(), raw, Instant::now()))
    }

    /// Allocate a connection id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn open_and_prepare(&self) -> Result<Box<dyn RawConnection>, PoolError> {
        let mut raw = self
            .driver
            .open(&self.config)
            .await
            .map_err(|e| PoolError::ConnectFailed(e.to_string()))?;

        for statement in self.config.session_statements() {
            if let Err(e) = raw.execute(&statement, &[]).await {
                raw.close().await;
                return Err(PoolError::ConnectFailed(format!(
                    "session set-up `{statement}` failed: {e}"
                )));
            }
        }

        Ok(raw)
    }
}

impl fmt::Debug for ConnectionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionFactory")
            .field("driver", &self.driver.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use connmgr_testing::{MockDriver, MockResponse, fixtures};

    use super::*;

    #[tokio::test]
    async fn test_create_applies_session_statements() {
        let driver = MockDriver::new();
        let factory = ConnectionFactory::new(Arc::new(driver.clone()), fixtures::test_config("orders"));

        let raw = factory.create().await.unwrap();
        raw.close().await;

        assert_eq!(
            driver.statements_for(1),
            vec![
                "SET NAMES utf8".to_string(),
                "SET time_zone = '+00:00'".to_string(),
                "SET autocommit = 1".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_reports_driver_failure() {
        let driver = MockDriver::new();
        driver.fail_next_opens(1);
        let factory = ConnectionFactory::new(Arc::new(driver.clone()), fixtures::test_config("orders"));

        let err = factory.create().await.err().unwrap();
        assert!(matches!(err, PoolError::ConnectFailed(_)));
        assert_eq!(driver.opens(), 0);
    }

    #[tokio::test]
    async fn test_failed_session_setup_closes_session() {
        let driver = MockDriver::builder()
            .with_response("SET NAMES utf8", MockResponse::error(1115, "unknown charset"))
            .build();
        let factory = ConnectionFactory::new(Arc::new(driver.clone()), fixtures::test_config("orders"));

        let err = factory.create().await.err().unwrap();
        assert!(matches!(err, PoolError::ConnectFailed(_)));
        assert_eq!(driver.live_sessions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_times_out() {
        let driver = MockDriver::builder()
            .with_open_delay(Duration::from_secs(60))
            .build();
        let config = fixtures::test_config("orders").connect_timeout(Duration::from_secs(2));
        let factory = ConnectionFactory::new(Arc::new(driver), config);

        let started = Instant::now();
        let err = factory.create().await.err().unwrap();
        assert!(matches!(err, PoolError::ConnectFailed(_)));
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_ids_are_unique_across_clones() {
        let factory = ConnectionFactory::new(Arc::new(MockDriver::new()), fixtures::test_config("orders"));
        let clone = factory.clone();

        let a = factory.create_managed().await.unwrap();
        let b = clone.create_managed().await.unwrap();
        assert_ne!(a.id(), b.id());
    }
}
