//! Connection pooling with metrics example.
//!
//! Runs a pool against the in-memory mock driver, so no database server is
//! needed. The mock injects a lost session halfway through to show the
//! transparent reconnect.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=connmgr_pool=debug cargo run -p connmgr-pool --example connection_pool
//! ```

// Allow common patterns in example code
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use connmgr_driver::{ConnectionConfig, Value};
use connmgr_pool::{Pool, PoolError, PoolOptions, PooledConnection};
use connmgr_testing::{MockDriver, MockResponse};
use tokio::time::Instant;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ConnectionConfig::from_connection_string(
        "Host=db.internal;User=app;Password=secret;Database=orders;Time Zone=+00:00",
    )?;

    let driver = MockDriver::builder()
        .with_response("SELECT VERSION()", MockResponse::Result(
            connmgr_driver::QueryResult::scalar("version", "8.0.36-mock"),
        ))
        .with_default_response(MockResponse::affected(1))
        .build();

    println!("=== Connection Pool with Metrics Example ===\n");

    let options = PoolOptions::new()
        .max_size(4)
        .max_usage(Some(25))
        .idle_timeout(Duration::from_secs(300))
        .acquire_timeout(Duration::from_secs(5));

    println!("Pool configuration:");
    println!("  Max size: {}", options.max_size);
    println!("  Max usage: {:?}", options.max_usage);
    println!("  Idle timeout: {:?}", options.idle_timeout);
    println!();

    let pool = Pool::builder()
        .driver(driver.clone())
        .connection_config(config)
        .options(options)
        .build()?;

    print_pool_status(&pool);

    // Example 1: Basic pool usage
    println!("\n1. Basic pool usage:");
    {
        let mut conn = pool.get().await?;
        let result = conn.execute("SELECT VERSION()", &[]).await?;
        if let Some(version) = result.first_value().and_then(Value::as_str) {
            println!("  Connected to: {version}");
        }
        conn.release(true).await;
    }

    // Example 2: Concurrent usage
    println!("\n2. Concurrent pool usage (10 parallel statements):");
    let start = Instant::now();
    let mut handles = vec![];

    for i in 0..10_i64 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let mut conn = pool.get().await?;
            conn.execute("UPDATE orders SET touched = NOW() WHERE id = ?", &[Value::Int(i)])
                .await?;
            conn.release(true).await;
            Ok::<_, PoolError>(i)
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            completed += 1;
        }
    }

    println!("  Completed {} statements in {:?}", completed, start.elapsed());
    print_pool_metrics(&pool);

    // Example 3: Scoped checkout with a lost session
    println!("\n3. Scoped checkout surviving a lost session:");
    driver.lose_connectivity_on("SELECT VERSION()", 1);
    let version = pool
        .with_connection(async |conn: &mut PooledConnection| {
            let result = conn.execute("SELECT VERSION()", &[]).await?;
            Ok::<_, PoolError>(result.first_value().and_then(Value::as_str).map(String::from))
        })
        .await?;
    println!("  Still answered: {version:?}");

    // Example 4: Monitor pool health
    println!("\n4. Pool health monitoring:");
    let status = pool.status();

    let utilization = status.utilization();
    let health_status = if utilization < 70.0 {
        "HEALTHY"
    } else if utilization < 90.0 {
        "WARNING"
    } else {
        "CRITICAL"
    };

    println!("  Pool health: {health_status}");
    println!("  Utilization: {utilization:.1}%");

    // Example 5: Exhausting the pool
    println!("\n5. Exhausting the pool:");
    let mut held = Vec::new();
    for _ in 0..pool.options().max_size {
        held.push(pool.get().await?);
    }
    print_pool_status(&pool);
    match pool.acquire(Duration::from_millis(100)).await {
        Err(PoolError::Timeout(waited)) => println!("  Timed out after {waited:?} as expected"),
        other => println!("  Unexpected: {other:?}"),
    }
    for conn in held {
        conn.release(true).await;
    }

    // Final metrics
    println!("\n6. Final pool metrics:");
    print_pool_metrics(&pool);
    print_pool_status(&pool);

    // Graceful shutdown
    println!("\n7. Graceful shutdown:");
    let report = pool.shutdown().await;
    println!(
        "  Closed {} idle connections, {} still checked out",
        report.closed, report.outstanding
    );
    println!("  Sessions left open on the server: {}", driver.live_sessions());

    Ok(())
}

fn print_pool_status(pool: &Pool) {
    let status = pool.status();
    println!(
        "  Status: {}/{} connections in use, {} idle ({:.1}% utilization)",
        status.in_use,
        status.total,
        status.available,
        status.utilization()
    );
}

fn print_pool_metrics(pool: &Pool) {
    let metrics = pool.metrics();
    println!("  Metrics:");
    println!("    Connections created: {}", metrics.connections_created);
    println!("    Connections closed: {}", metrics.connections_closed);
    println!(
        "    Checkout success rate: {:.2}%",
        metrics.checkout_success_rate() * 100.0
    );
    println!(
        "    Reconnects: {} attempted, {} succeeded",
        metrics.reconnects_attempted, metrics.reconnects_succeeded
    );
}
