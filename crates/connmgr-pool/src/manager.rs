//! Named connections.
//!
//! A [`ConnectionManager`] maps logical names to connection settings. Each
//! name can be used through a pool, created lazily on first use and cached
//! for the life of the manager, or through a [`StandaloneConnection`] that
//! is opened and closed per call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use connmgr_driver::{ConnectionConfig, Driver, QueryResult, Value};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::{PoolOptions, PoolSettings};
use crate::error::PoolError;
use crate::factory::ConnectionFactory;
use crate::lifecycle::{ConnectionMetadata, ManagedConnection};
use crate::pool::{Pool, ShutdownReport};
use crate::reconnect::execute_with_reconnect;

/// Name used when no default is configured.
pub const DEFAULT_CONNECTION_NAME: &str = "default";

static GLOBAL: OnceCell<ConnectionManager> = OnceCell::new();

/// Install the process-wide connection manager.
///
/// Fails with [`PoolError::Configuration`] if one is already installed.
pub fn install_global(manager: ConnectionManager) -> Result<&'static ConnectionManager, PoolError> {
    GLOBAL
        .set(manager)
        .map_err(|_| PoolError::Configuration("a global connection manager is already installed".into()))?;
    GLOBAL
        .get()
        .ok_or_else(|| PoolError::Configuration("global connection manager missing".into()))
}

/// The process-wide connection manager, if one was installed.
pub fn global() -> Option<&'static ConnectionManager> {
    GLOBAL.get()
}

struct Entry {
    factory: ConnectionFactory,
    pool: Option<PoolOptions>,
}

/// Registry of named connections with one default.
pub struct ConnectionManager {
    default_name: String,
    entries: HashMap<String, Entry>,
    pools: Mutex<HashMap<String, Pool>>,
}

impl ConnectionManager {
    /// Create a builder using `driver` for every connection.
    pub fn builder<D: Driver>(driver: D) -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new(Arc::new(driver))
    }

    /// Build a manager from deserialized settings.
    pub fn from_settings(
        driver: Arc<dyn Driver>,
        settings: ManagerSettings,
    ) -> Result<Self, PoolError> {
        let mut builder = ConnectionManagerBuilder::new(driver).default_name(settings.default);
        for (name, entry) in settings.connections {
            builder = match entry.pool {
                Some(pool) => builder.pooled(name, entry.config, pool.into()),
                None => builder.connection(name, entry.config),
            };
        }
        builder.build()
    }

    /// Name used when a lookup gives none.
    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn entry(&self, name: Option<&str>) -> Result<(&str, &Entry), PoolError> {
        let name = name.unwrap_or(&self.default_name);
        self.entries
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| PoolError::NotFound(name.to_string()))
    }

    /// Look up the settings for `name`, or for the default when `None`.
    pub fn resolve(
        &self,
        name: Option<&str>,
    ) -> Result<(&ConnectionConfig, Option<&PoolOptions>), PoolError> {
        let (_, entry) = self.entry(name)?;
        Ok((entry.factory.config(), entry.pool.as_ref()))
    }

    /// The pool for `name`, created on first use.
    ///
    /// Every call for the same name returns a handle to the same pool. A
    /// name registered without pool options gets the default options.
    pub fn pool(&self, name: Option<&str>) -> Result<Pool, PoolError> {
        let (name, entry) = self.entry(name)?;

        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(name) {
            return Ok(pool.clone());
        }

        let pool = Pool::new(entry.factory.clone(), entry.pool.clone().unwrap_or_default())?;
        tracing::debug!(name, "created pool");
        pools.insert(name.to_string(), pool.clone());
        Ok(pool)
    }

    /// Open a connection for `name` outside any pool.
    pub async fn connection(&self, name: Option<&str>) -> Result<StandaloneConnection, PoolError> {
        let (name, entry) = self.entry(name)?;
        let mut conn = entry.factory.create_managed().await?;
        conn.borrow()?;
        tracing::debug!(name, conn_id = conn.id(), "opened standalone connection");

        Ok(StandaloneConnection {
            conn: Some(conn),
            factory: entry.factory.clone(),
        })
    }

    /// Run `f` on a standalone connection for `name`, closing it afterwards.
    pub async fn with_connection<T, E, F>(&self, name: Option<&str>, f: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut StandaloneConnection) -> Result<T, E>,
        E: From<PoolError>,
    {
        let mut conn = self.connection(name).await?;
        let result = f(&mut conn).await;
        conn.close().await;
        result
    }

    /// Shut down every pool created so far.
    ///
    /// The cache is cleared, so a later [`pool`](Self::pool) call builds a
    /// fresh pool.
    pub async fn shutdown(&self) -> Vec<(String, ShutdownReport)> {
        let pools: Vec<(String, Pool)> = self.pools.lock().drain().collect();
        let mut reports = Vec::with_capacity(pools.len());
        for (name, pool) in pools {
            let report = pool.shutdown().await;
            reports.push((name, report));
        }
        reports.sort_by(|a, b| a.0.cmp(&b.0));
        reports
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("default_name", &self.default_name)
            .field("names", &self.names())
            .finish()
    }
}

/// Builder for [`ConnectionManager`].
pub struct ConnectionManagerBuilder {
    driver: Arc<dyn Driver>,
    default_name: String,
    entries: Vec<(String, ConnectionConfig, Option<PoolOptions>)>,
}

impl ConnectionManagerBuilder {
    /// Create a builder using `driver` for every connection.
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            default_name: DEFAULT_CONNECTION_NAME.to_string(),
            entries: Vec::new(),
        }
    }

    /// Register a connection used without pooling by default.
    #[must_use]
    pub fn connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.entries.push((name.into(), config, None));
        self
    }

    /// Register a pooled connection.
    #[must_use]
    pub fn pooled(
        mut self,
        name: impl Into<String>,
        config: ConnectionConfig,
        options: PoolOptions,
    ) -> Self {
        self.entries.push((name.into(), config, Some(options)));
        self
    }

    /// Set the name used when a lookup gives none.
    #[must_use]
    pub fn default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = name.into();
        self
    }

    /// Build the manager.
    pub fn build(self) -> Result<ConnectionManager, PoolError> {
        if self.entries.is_empty() {
            return Err(PoolError::Configuration("no connections configured".into()));
        }

        let mut entries = HashMap::with_capacity(self.entries.len());
        for (name, config, pool) in self.entries {
            if let Some(options) = &pool {
                options.validate()?;
            }
            let factory = ConnectionFactory::new(Arc::clone(&self.driver), config);
            if entries.insert(name.clone(), Entry { factory, pool }).is_some() {
                return Err(PoolError::Configuration(format!(
                    "connection '{name}' is configured twice"
                )));
            }
        }

        if !entries.contains_key(&self.default_name) {
            return Err(PoolError::Configuration(format!(
                "default connection '{}' is not configured",
                self.default_name
            )));
        }

        Ok(ConnectionManager {
            default_name: self.default_name,
            entries,
            pools: Mutex::new(HashMap::new()),
        })
    }
}

/// Manager configuration as it appears in a settings file.
///
/// ```rust
/// use connmgr_pool::ManagerSettings;
///
/// let settings: ManagerSettings = serde_json::from_str(r#"{
///     "default": "main",
///     "connections": {
///         "main": { "host": "db1", "user": "app", "pool": { "max_size": 5 } },
///         "reports": { "host": "replica", "database": "analytics" }
///     }
/// }"#)?;
/// assert_eq!(settings.connections.len(), 2);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerSettings {
    /// Name used when a lookup gives none.
    #[serde(default = "default_connection_name")]
    pub default: String,
    /// Connections by name.
    pub connections: HashMap<String, ConnectionSettings>,
}

/// One named connection in [`ManagerSettings`].
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    /// Connection parameters.
    #[serde(flatten)]
    pub config: ConnectionConfig,
    /// Pool options; absent for unpooled connections.
    #[serde(default)]
    pub pool: Option<PoolSettings>,
}

fn default_connection_name() -> String {
    DEFAULT_CONNECTION_NAME.to_string()
}

/// A connection opened outside any pool.
///
/// Lost sessions are reopened once and the statement retried, as for pooled
/// connections. Dropping it closes the session in the background.
pub struct StandaloneConnection {
    conn: Option<ManagedConnection>,
    factory: ConnectionFactory,
}

impl StandaloneConnection {
    /// Connection metadata.
    pub fn metadata(&self) -> Option<&ConnectionMetadata> {
        self.conn.as_ref().map(ManagedConnection::metadata)
    }

    /// Execute one statement.
    pub async fn execute(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> Result<QueryResult, PoolError> {
        let conn = self.conn.as_mut().ok_or(PoolError::Closed)?;
        execute_with_reconnect(&self.factory, conn, statement, params, true, None).await
    }

    /// Check that the session is alive.
    pub async fn ping(&mut self) -> bool {
        match self.conn.as_mut() {
            Some(conn) => conn.ping().await,
            None => false,
        }
    }

    /// Close the session.
    pub async fn close(mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::debug!(conn_id = conn.id(), "closing standalone connection");
            conn.close().await;
        }
    }
}

impl fmt::Debug for StandaloneConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandaloneConnection")
            .field("conn", &self.conn)
            .finish()
    }
}
