//! # connmgr-pool
//!
//! Connection pooling and named connection management.
//!
//! A [`Pool`] keeps at most `max_size` sessions to one database and retires
//! them when they hit a usage limit, sit idle too long or outlive their
//! lifetime. A [`ConnectionManager`] maps logical names to connection
//! settings and hands out pools or standalone connections by name.
//!
//! ## Features
//!
//! - Fair (first come, first served) waiting when the pool is exhausted
//! - Usage, idle and lifetime limits checked on checkout and on return
//! - One transparent reconnect and retry when a session is lost mid-statement
//! - Scoped checkout with [`Pool::with_connection`]
//! - Graceful shutdown that waits for checked-out connections
//!
//! ## Example
//!
//! ```rust,ignore
//! use connmgr_pool::{Pool, PoolError};
//! use connmgr_driver::ConnectionConfig;
//!
//! let pool = Pool::builder()
//!     .driver(my_driver)
//!     .connection_config(ConnectionConfig::from_connection_string(
//!         "Host=db.internal;User=app;Password=secret;Database=orders",
//!     )?)
//!     .max_size(20)
//!     .idle_timeout(Duration::from_secs(300))
//!     .build()?;
//!
//! let mut conn = pool.get().await?;
//! conn.execute("UPDATE orders SET state = ? WHERE id = ?", &["shipped".into(), 42.into()])
//!     .await?;
//! conn.release(true).await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod manager;
pub mod metrics;
pub mod pool;
mod reconnect;

pub use config::{PoolOptions, PoolSettings};
pub use error::PoolError;
pub use factory::ConnectionFactory;
pub use lifecycle::{ConnectionMetadata, ConnectionState, ManagedConnection, RetireReason};
pub use manager::{
    ConnectionManager, ConnectionManagerBuilder, ConnectionSettings, ManagerSettings,
    StandaloneConnection,
};
pub use metrics::PoolMetrics;
pub use pool::{Pool, PoolBuilder, PoolStatus, PooledConnection, ShutdownReport};
