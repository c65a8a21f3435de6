//! Test fixture utilities.

use std::time::Duration;

use connmgr_driver::ConnectionConfig;

/// Connection parameters used across the test suites.
#[must_use]
pub fn test_config(database: &str) -> ConnectionConfig {
    ConnectionConfig::new()
        .host("mock.local")
        .credentials("tester", "secret")
        .database(database)
        .connect_timeout(Duration::from_secs(2))
}

/// Install a `tracing` subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
