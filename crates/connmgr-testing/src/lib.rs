//! # connmgr-testing
//!
//! Test infrastructure for connmgr.
//!
//! This crate provides an in-memory driver so pools and managers can be
//! exercised without a database server.
//!
//! ## Features
//!
//! - Session open/close/ping counters
//! - Scripted statement responses
//! - Fault injection: refused opens, failed pings, sessions lost on a given
//!   statement, severing every open session
//! - Statement recording per session
//!
//! ## Example
//!
//! ```rust,ignore
//! use connmgr_testing::{MockDriver, MockResponse, fixtures};
//!
//! #[tokio::test]
//! async fn test_with_mock_driver() {
//!     let driver = MockDriver::builder()
//!         .with_response("SELECT 1", MockResponse::scalar_int(1))
//!         .build();
//!
//!     let config = fixtures::test_config("orders");
//!     // Hand `driver` and `config` to a connection factory...
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod fixtures;
pub mod mock_driver;

pub use mock_driver::{MockConnection, MockDriver, MockDriverBuilder, MockResponse, RecordedStatement};
