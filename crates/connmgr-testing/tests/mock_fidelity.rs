//! Mock driver fidelity tests.
//!
//! These tests validate that the mock driver behaves like a driver the pool
//! can rely on: sessions are counted, statements recorded, and injected
//! faults surface as the right `DriverError` variants.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use connmgr_driver::{Driver, DriverError, Value};
use connmgr_testing::{MockDriver, MockResponse, fixtures};

#[tokio::test]
async fn test_open_and_close_are_counted() {
    let driver = MockDriver::new();
    let config = fixtures::test_config("orders");

    let conn = driver.open(&config).await.expect("open should succeed");
    assert_eq!(driver.opens(), 1);
    assert_eq!(driver.live_sessions(), 1);

    conn.close().await;
    assert_eq!(driver.closes(), 1);
    assert_eq!(driver.live_sessions(), 0);
    assert_eq!(driver.last_config(), Some(config));
}

#[tokio::test]
async fn test_scripted_responses() {
    let driver = MockDriver::builder()
        .with_response("SELECT 1", MockResponse::scalar_int(1))
        .with_response("DELETE FROM t", MockResponse::affected(4))
        .with_response("SELEC", MockResponse::error(1064, "syntax error"))
        .build();
    let mut conn = driver.open(&fixtures::test_config("orders")).await.unwrap();

    let result = conn.execute("SELECT 1", &[]).await.unwrap();
    assert_eq!(result.first_value(), Some(&Value::Int(1)));

    let result = conn.execute("DELETE FROM t", &[]).await.unwrap();
    assert_eq!(result.affected_rows, 4);

    let err = conn.execute("SELEC", &[]).await.unwrap_err();
    assert_eq!(err.code(), Some(1064));
    assert!(!err.is_connectivity());

    // Unscripted statements fall back to the default response
    let result = conn.execute("UPDATE t SET x = 1", &[]).await.unwrap();
    assert_eq!(result.row_count(), 0);
}

#[tokio::test]
async fn test_custom_response_sees_params() {
    let driver = MockDriver::builder()
        .with_response(
            "SELECT ?",
            MockResponse::Custom(std::sync::Arc::new(|_, params| {
                MockResponse::Result(connmgr_driver::QueryResult::scalar(
                    "echo",
                    params.first().cloned().unwrap_or_default(),
                ))
            })),
        )
        .build();
    let mut conn = driver.open(&fixtures::test_config("orders")).await.unwrap();

    let result = conn.execute("SELECT ?", &[Value::from("hi")]).await.unwrap();
    assert_eq!(result.first_value().and_then(Value::as_str), Some("hi"));
}

#[tokio::test]
async fn test_fail_next_opens() {
    let driver = MockDriver::new();
    driver.fail_next_opens(2);
    let config = fixtures::test_config("orders");

    assert!(matches!(driver.open(&config).await, Err(DriverError::Connect(_))));
    assert!(matches!(driver.open(&config).await, Err(DriverError::Connect(_))));
    assert!(driver.open(&config).await.is_ok());
    assert_eq!(driver.open_attempts(), 3);
    assert_eq!(driver.opens(), 1);
}

#[tokio::test]
async fn test_lose_connectivity_on_statement() {
    let driver = MockDriver::new();
    driver.lose_connectivity_on("SELECT 1", 1);
    let mut conn = driver.open(&fixtures::test_config("orders")).await.unwrap();

    let err = conn.execute("SELECT 1", &[]).await.unwrap_err();
    assert!(err.is_connectivity());

    // Other statements are unaffected and the countdown is spent
    assert!(conn.execute("SELECT 2", &[]).await.is_ok());
    assert!(conn.execute("SELECT 1", &[]).await.is_ok());
    assert_eq!(driver.execution_count("SELECT 1"), 2);
}

#[tokio::test]
async fn test_severed_sessions_stay_dead() {
    let driver = MockDriver::new();
    let config = fixtures::test_config("orders");
    let mut old = driver.open(&config).await.unwrap();

    driver.sever_open_sessions();
    let mut fresh = driver.open(&config).await.unwrap();

    assert!(!old.ping().await);
    assert!(old.execute("SELECT 1", &[]).await.unwrap_err().is_connectivity());
    assert!(fresh.ping().await);
    assert!(fresh.execute("SELECT 1", &[]).await.is_ok());
    assert_eq!(driver.statements_for(2), vec!["SELECT 1".to_string()]);
}

#[tokio::test]
async fn test_fail_next_pings() {
    let driver = MockDriver::new();
    driver.fail_next_pings(1);
    let mut conn = driver.open(&fixtures::test_config("orders")).await.unwrap();

    assert!(!conn.ping().await);
    assert!(conn.ping().await);
    assert_eq!(driver.pings(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_open_delay_follows_tokio_clock() {
    let driver = MockDriver::builder()
        .with_open_delay(Duration::from_secs(5))
        .build();
    let start = tokio::time::Instant::now();

    driver.open(&fixtures::test_config("orders")).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(5));
}
