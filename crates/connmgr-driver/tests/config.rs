//! Connection string parsing edge case tests.
//!
//! Tests edge cases that users commonly encounter with connection strings.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use connmgr_driver::ConnectionConfig;

// ============================================================================
// Basic Parsing Tests
// ============================================================================

#[test]
fn test_empty_connection_string() {
    // Empty string should parse to defaults
    let config = ConnectionConfig::from_connection_string("").unwrap();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 3306);
}

#[test]
fn test_whitespace_only_connection_string() {
    let config = ConnectionConfig::from_connection_string("   \t\n  ");
    assert!(config.is_ok());
}

#[test]
fn test_multiple_semicolons() {
    let config = ConnectionConfig::from_connection_string(";;;");
    assert!(config.is_ok());
}

// ============================================================================
// Key-Value Edge Cases
// ============================================================================

#[test]
fn test_missing_equals_sign() {
    let result = ConnectionConfig::from_connection_string("Hostlocalhost;");
    assert!(result.is_err());
}

#[test]
fn test_multiple_equals_in_value() {
    // Everything after the first '=' belongs to the value
    let config =
        ConnectionConfig::from_connection_string("Host=localhost;Password=pa=ss=word;").unwrap();
    assert_eq!(config.password, "pa=ss=word");
}

#[test]
fn test_case_insensitive_keys() {
    let config1 = ConnectionConfig::from_connection_string("HOST=host1;").unwrap();
    let config2 = ConnectionConfig::from_connection_string("host=host1;").unwrap();
    let config3 = ConnectionConfig::from_connection_string("Host=host1;").unwrap();

    assert_eq!(config1.host, config2.host);
    assert_eq!(config2.host, config3.host);
}

#[test]
fn test_alternative_key_names() {
    let config = ConnectionConfig::from_connection_string(
        "Server=db;Uid=app;Pwd=secret;Initial Catalog=orders;Time Zone=+09:00",
    )
    .unwrap();

    assert_eq!(config.host, "db");
    assert_eq!(config.user, "app");
    assert_eq!(config.password, "secret");
    assert_eq!(config.database.as_deref(), Some("orders"));
    assert_eq!(config.timezone, "+09:00");
}

#[test]
fn test_empty_database_is_none() {
    let config = ConnectionConfig::from_connection_string("Database=;").unwrap();
    assert!(config.database.is_none());
}

// ============================================================================
// Server Address Formats
// ============================================================================

#[test]
fn test_server_ipv4_with_port() {
    let config = ConnectionConfig::from_connection_string("Host=10.0.0.5,3310;").unwrap();
    assert_eq!(config.host, "10.0.0.5");
    assert_eq!(config.port, 3310);
}

#[test]
fn test_invalid_port_number() {
    let result = ConnectionConfig::from_connection_string("Port=abc;");
    assert!(result.is_err());
}

#[test]
fn test_port_overflow() {
    let result = ConnectionConfig::from_connection_string("Host=db,70000;");
    assert!(result.is_err());
}

// ============================================================================
// Boolean and Timeout Parsing
// ============================================================================

#[test]
fn test_autocommit_true_values() {
    for value in ["true", "TRUE", "yes", "1"] {
        let config =
            ConnectionConfig::from_connection_string(&format!("Autocommit={value}")).unwrap();
        assert!(config.autocommit, "value {value} should enable autocommit");
    }
}

#[test]
fn test_autocommit_false_values() {
    for value in ["false", "No", "0"] {
        let config =
            ConnectionConfig::from_connection_string(&format!("Autocommit={value}")).unwrap();
        assert!(!config.autocommit, "value {value} should disable autocommit");
    }
}

#[test]
fn test_connect_timeout_parsing() {
    let config = ConnectionConfig::from_connection_string("Connection Timeout=45;").unwrap();
    assert_eq!(config.connect_timeout, Duration::from_secs(45));
}

#[test]
fn test_negative_timeout_rejected() {
    let result = ConnectionConfig::from_connection_string("Connect Timeout=-1;");
    assert!(result.is_err());
}

// ============================================================================
// Special Character Handling
// ============================================================================

#[test]
fn test_whitespace_around_equals() {
    let config = ConnectionConfig::from_connection_string(" Host = db1 ; Port = 3307 ").unwrap();
    assert_eq!(config.host, "db1");
    assert_eq!(config.port, 3307);
}

#[test]
fn test_unknown_keys_ignored() {
    let config =
        ConnectionConfig::from_connection_string("Host=db1;Compression=zstd;Pipelining=on;")
            .unwrap();
    assert_eq!(config.host, "db1");
}

#[test]
fn test_repeated_keys_last_wins() {
    let config = ConnectionConfig::from_connection_string("Host=first;Host=second;").unwrap();
    assert_eq!(config.host, "second");
}
