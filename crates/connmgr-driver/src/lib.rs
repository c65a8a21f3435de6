//! # connmgr-driver
//!
//! The seam between connmgr and a concrete database driver.
//!
//! A driver implements [`Driver`] (open a session) and [`RawConnection`]
//! (ping, execute, close one session). Connection parameters travel as a
//! [`ConnectionConfig`], statements carry [`Value`] parameters and produce a
//! [`QueryResult`], and failures are reported as [`DriverError`], which keeps
//! lost sessions apart from rejected statements.
//!
//! ## Example
//!
//! ```rust
//! use connmgr_driver::ConnectionConfig;
//!
//! let config = ConnectionConfig::from_connection_string(
//!     "Host=db.internal;User=app;Password=secret;Database=orders",
//! )
//! .unwrap();
//!
//! assert_eq!(config.port, 3306);
//! assert_eq!(config.timezone, "+00:00");
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod value;

pub use config::ConnectionConfig;
pub use connection::{Driver, RawConnection};
pub use error::DriverError;
pub use value::{QueryResult, Value};
