//! Connection pool implementation.
//!
//! The pool hands out at most `max_size` connections at a time. Capacity is
//! a fair semaphore with one permit per slot: a checked-out connection holds
//! its permit, so waiters are served strictly in arrival order and each
//! release wakes exactly one of them.
//!
//! Idle connections and the size counters live behind a synchronous mutex
//! that is never held across an `.await`. Session I/O (open, ping, close)
//! always happens outside the lock.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use connmgr_driver::{ConnectionConfig, Driver, QueryResult, Value};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, watch};
use tokio::time::Instant;

use crate::config::PoolOptions;
use crate::error::PoolError;
use crate::factory::ConnectionFactory;
use crate::lifecycle::{ConnectionMetadata, ManagedConnection, RetireReason, ReturnOutcome};
use crate::metrics::{MetricsRecorder, PoolMetrics};
use crate::reconnect::execute_with_reconnect;

/// A pool of connections to one database.
///
/// Cloning a `Pool` is cheap and yields another handle to the same pool.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    factory: ConnectionFactory,
    options: PoolOptions,
    slots: Arc<Semaphore>,
    state: Mutex<PoolState>,
    closed: AtomicBool,
    checked_out: watch::Sender<u32>,
    metrics: MetricsRecorder,
}

#[derive(Default)]
struct PoolState {
    /// Returned connections, least recently used at the front.
    idle: VecDeque<ManagedConnection>,
    /// Idle + checked out + being opened.
    size: u32,
    checked_out: u32,
}

enum Next {
    Idle(ManagedConnection),
    Open,
    Unavailable,
}

impl Pool {
    /// Create a new pool builder.
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Create a pool opening connections through `factory`.
    ///
    /// No connection is opened until the first acquire.
    pub fn new(factory: ConnectionFactory, options: PoolOptions) -> Result<Self, PoolError> {
        options.validate()?;
        let (checked_out, _) = watch::channel(0);

        tracing::debug!(
            endpoint = %factory.config().endpoint(),
            max_size = options.max_size,
            "connection pool created"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                slots: Arc::new(Semaphore::new(options.max_size as usize)),
                factory,
                options,
                state: Mutex::new(PoolState::default()),
                closed: AtomicBool::new(false),
                checked_out,
                metrics: MetricsRecorder::default(),
            }),
        })
    }

    /// Get a connection, waiting at most the configured acquire timeout.
    pub async fn get(&self) -> Result<PooledConnection, PoolError> {
        self.acquire(self.inner.options.acquire_timeout).await
    }

    /// Get a connection, waiting at most `timeout`.
    ///
    /// Reuses the most recently returned idle connection that is still
    /// within its limits, otherwise opens a new one if the pool has room,
    /// otherwise waits in line for a release. Idle connections found past
    /// their idle timeout, lifetime or usage limit are closed on the way.
    ///
    /// With a zero timeout the call still succeeds if a connection is
    /// available without waiting.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledConnection, PoolError> {
        if self.is_closed() {
            self.inner.metrics.checkout_failed();
            return Err(PoolError::Closed);
        }

        tracing::trace!("acquiring connection from pool");
        let started = Instant::now();

        match tokio::time::timeout(timeout, PoolInner::checkout(&self.inner)).await {
            Ok(Ok(conn)) => {
                self.inner.metrics.checkout_succeeded();
                tracing::trace!(
                    conn_id = conn.id(),
                    wait_ms = started.elapsed().as_millis() as u64,
                    "connection acquired"
                );
                Ok(conn)
            }
            Ok(Err(e)) => {
                self.inner.metrics.checkout_failed();
                Err(e)
            }
            Err(_) => {
                self.inner.metrics.checkout_timed_out();
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "timed out waiting for a pooled connection"
                );
                Err(PoolError::Timeout(timeout))
            }
        }
    }

    /// Take an idle connection without waiting or opening a new one.
    ///
    /// Returns `Ok(None)` when no idle connection is available. The
    /// checkout ping is not performed.
    pub fn try_get(&self) -> Result<Option<PooledConnection>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        let permit = match Arc::clone(&self.inner.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
            Err(TryAcquireError::NoPermits) => return Ok(None),
        };

        // Evicted sessions are closed in the background by their drop.
        drop(self.inner.evict_idle());

        match self.inner.take_idle(false) {
            Next::Idle(conn) => {
                self.inner.metrics.checkout_succeeded();
                Ok(Some(PooledConnection::new(
                    conn,
                    Arc::clone(&self.inner),
                    Some(permit),
                )))
            }
            Next::Open | Next::Unavailable => Ok(None),
        }
    }

    /// Hand a connection back.
    ///
    /// Same as [`PooledConnection::release`].
    pub async fn release(&self, conn: PooledConnection, healthy: bool) {
        conn.release(healthy).await;
    }

    /// Run `f` with a pooled connection and release it afterwards.
    ///
    /// The connection is released healthy if `f` returns `Ok`, and retired
    /// if it returns `Err` or panics. If the returned future is dropped before `f`
    /// finishes, the connection is still returned; a statement interrupted
    /// mid-flight retires it.
    ///
    /// ```rust,ignore
    /// let count = pool
    ///     .with_connection(async |conn| {
    ///         let result = conn.execute("SELECT COUNT(*) FROM orders", &[]).await?;
    ///         Ok::<_, PoolError>(result.first_value().and_then(Value::as_i64))
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_connection<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut PooledConnection) -> Result<T, E>,
        E: From<PoolError>,
    {
        let mut conn = self.get().await?;
        let result = f(&mut conn).await;
        conn.release(result.is_ok()).await;
        result
    }

    /// Shut the pool down.
    ///
    /// New and waiting acquirers fail with [`PoolError::Closed`] right away.
    /// Checked-out connections are given up to `shutdown_grace` to come back;
    /// idle connections are then closed. Connections returned later are
    /// closed on return. Calling `shutdown` again is harmless.
    pub async fn shutdown(&self) -> ShutdownReport {
        let first = !self.inner.closed.swap(true, Ordering::AcqRel);
        self.inner.slots.close();
        if first {
            tracing::info!(
                endpoint = %self.inner.factory.config().endpoint(),
                "connection pool shutting down"
            );
        }

        let grace = self.inner.options.shutdown_grace;
        let mut rx = self.inner.checked_out.subscribe();
        let drained_in_time = tokio::time::timeout(grace, rx.wait_for(|n| *n == 0))
            .await
            .is_ok();
        let outstanding = if drained_in_time { 0 } else { *rx.borrow() };
        if outstanding > 0 {
            tracing::warn!(
                outstanding,
                grace_ms = grace.as_millis() as u64,
                "shutdown grace period expired with connections still checked out"
            );
        }

        let idle: Vec<ManagedConnection> = {
            let mut state = self.inner.state.lock();
            let idle: Vec<_> = state.idle.drain(..).collect();
            state.size = state.size.saturating_sub(idle.len() as u32);
            idle
        };
        let closed = idle.len() as u32;
        for conn in idle {
            self.inner.metrics.retired(RetireReason::PoolClosed);
            conn.close().await;
        }

        tracing::info!(closed, outstanding, "connection pool closed");
        ShutdownReport {
            closed,
            outstanding,
        }
    }

    /// Check if the pool has been shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            available: state.idle.len() as u32,
            in_use: state.checked_out,
            total: state.size,
            max: self.inner.options.max_size,
        }
    }

    /// Get a snapshot of the pool counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        self.inner.metrics.snapshot()
    }

    /// Get the pool options.
    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// Get the connection configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        self.inner.factory.config()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("endpoint", &self.config().endpoint())
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PoolInner {
    async fn checkout(self: &Arc<Self>) -> Result<PooledConnection, PoolError> {
        let mut permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(PoolError::Closed);
            }

            for conn in self.evict_idle() {
                conn.close().await;
            }

            match self.take_idle(true) {
                Next::Idle(conn) => {
                    let mut pooled = PooledConnection::new(conn, Arc::clone(self), Some(permit));
                    if !self.options.test_on_checkout {
                        return Ok(pooled);
                    }

                    let passed = pooled.ping().await;
                    self.metrics.health_check(passed);
                    if passed {
                        return Ok(pooled);
                    }

                    tracing::debug!(conn_id = pooled.id(), "idle connection failed checkout ping");
                    permit = match pooled.discard(RetireReason::FailedPing).await {
                        Some(permit) => permit,
                        None => Arc::clone(&self.slots)
                            .acquire_owned()
                            .await
                            .map_err(|_| PoolError::Closed)?,
                    };
                }
                Next::Open => {
                    let reservation = SlotReservation {
                        pool: Arc::clone(self),
                        permit: Some(permit),
                        committed: false,
                    };
                    return self.open(reservation).await;
                }
                Next::Unavailable => return Err(PoolError::Closed),
            }
        }
    }

    async fn open(self: &Arc<Self>, reservation: SlotReservation) -> Result<PooledConnection, PoolError> {
        let mut conn = self.factory.create_managed().await?;

        if self.closed.load(Ordering::Acquire) {
            conn.close().await;
            return Err(PoolError::Closed);
        }

        conn.borrow()?;
        self.metrics.connection_created();
        tracing::debug!(conn_id = conn.id(), "new connection added to pool");

        let permit = reservation.commit();
        Ok(PooledConnection::new(conn, Arc::clone(self), permit))
    }

    /// Remove idle connections past their limits. The caller closes them.
    fn evict_idle(&self) -> Vec<ManagedConnection> {
        let now = Instant::now();
        let mut state = self.state.lock();
        if state.idle.is_empty() {
            return Vec::new();
        }

        let mut evicted = Vec::new();
        let mut kept = VecDeque::with_capacity(state.idle.len());
        while let Some(conn) = state.idle.pop_front() {
            match conn.eviction_reason(now, &self.options) {
                Some(reason) => {
                    self.metrics.retired(reason);
                    tracing::debug!(conn_id = conn.id(), reason = reason.as_str(), "evicting idle connection");
                    evicted.push(conn);
                }
                None => kept.push_back(conn),
            }
        }
        state.idle = kept;
        state.size = state.size.saturating_sub(evicted.len() as u32);
        evicted
    }

    /// Check out the most recently returned idle connection, or reserve a
    /// slot for a new one when `reserve` is set.
    fn take_idle(&self, reserve: bool) -> Next {
        let mut state = self.state.lock();

        while let Some(mut conn) = state.idle.pop_back() {
            match conn.borrow() {
                Ok(()) => {
                    state.checked_out += 1;
                    self.checked_out.send_replace(state.checked_out);
                    return Next::Idle(conn);
                }
                Err(e) => {
                    tracing::warn!(conn_id = conn.id(), error = %e, "dropping idle connection in unexpected state");
                    state.size = state.size.saturating_sub(1);
                    self.metrics.retired(RetireReason::Broken);
                }
            }
        }

        if !reserve {
            return Next::Unavailable;
        }

        // Holding a permit guarantees room: every counted connection that is
        // not idle holds a permit of its own.
        debug_assert!(state.size < self.options.max_size);
        state.size += 1;
        Next::Open
    }

    /// Return a connection. Yields the connection back if it must be closed.
    fn checkin(&self, mut conn: ManagedConnection, healthy: bool) -> Option<ManagedConnection> {
        let outcome = conn.return_and_validate(healthy, Instant::now(), &self.options);

        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        let retired = match outcome {
            ReturnOutcome::Recycled if !self.closed.load(Ordering::Acquire) => {
                state.idle.push_back(conn);
                None
            }
            ReturnOutcome::Recycled => Some((conn, RetireReason::PoolClosed)),
            ReturnOutcome::Retired(reason) => Some((conn, reason)),
        };
        if retired.is_some() {
            state.size = state.size.saturating_sub(1);
        }
        self.checked_out.send_replace(state.checked_out);
        drop(state);

        retired.map(|(conn, reason)| {
            self.metrics.retired(reason);
            tracing::debug!(conn_id = conn.id(), reason = reason.as_str(), "retiring connection");
            conn
        })
    }

    /// Forget a checked-out connection without returning it.
    fn forget(&self) {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        state.size = state.size.saturating_sub(1);
        self.checked_out.send_replace(state.checked_out);
    }
}

/// A slot counted in `size` for a connection still being opened.
///
/// Dropping it uncommitted gives the slot back, then the permit.
struct SlotReservation {
    pool: Arc<PoolInner>,
    permit: Option<OwnedSemaphorePermit>,
    committed: bool,
}

impl SlotReservation {
    fn commit(mut self) -> Option<OwnedSemaphorePermit> {
        let mut state = self.pool.state.lock();
        state.checked_out += 1;
        self.pool.checked_out.send_replace(state.checked_out);
        drop(state);
        self.committed = true;
        self.permit.take()
    }
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        if !self.committed {
            let mut state = self.pool.state.lock();
            state.size = state.size.saturating_sub(1);
        }
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub available: u32,
    /// Number of connections currently checked out.
    pub in_use: u32,
    /// Total number of connections, including ones being opened.
    pub total: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Checked-out connections as a percentage of `max`.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            0.0
        } else {
            f64::from(self.in_use) / f64::from(self.max) * 100.0
        }
    }
}

/// Outcome of [`Pool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Idle connections closed.
    pub closed: u32,
    /// Connections still checked out when the grace period ran out.
    pub outstanding: u32,
}

/// A connection checked out of a [`Pool`].
///
/// Give it back with [`release`](Self::release). If it is dropped instead,
/// it is returned as healthy unless it is broken, was interrupted in the
/// middle of a statement or ping, or is dropped while unwinding from a
/// panic, in which case it is retired.
pub struct PooledConnection {
    conn: Option<ManagedConnection>,
    pool: Arc<PoolInner>,
    permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection {
    fn new(conn: ManagedConnection, pool: Arc<PoolInner>, permit: Option<OwnedSemaphorePermit>) -> Self {
        Self {
            conn: Some(conn),
            pool,
            permit,
        }
    }

    fn managed(&self) -> &ManagedConnection {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("pooled connection used after return"),
        }
    }

    /// Connection metadata.
    pub fn metadata(&self) -> &ConnectionMetadata {
        self.managed().metadata()
    }

    /// Connection id.
    pub fn id(&self) -> u64 {
        self.managed().id()
    }

    /// Execute one statement.
    ///
    /// If the session was lost and the pool has reconnect enabled, a new
    /// session is opened and the statement is retried once.
    pub async fn execute(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> Result<QueryResult, PoolError> {
        let Some(conn) = self.conn.as_mut() else {
            unreachable!("pooled connection used after return");
        };
        execute_with_reconnect(
            &self.pool.factory,
            conn,
            statement,
            params,
            self.pool.options.reconnect,
            Some(&self.pool.metrics),
        )
        .await
    }

    /// Check that the session is alive.
    pub async fn ping(&mut self) -> bool {
        match self.conn.as_mut() {
            Some(conn) => conn.ping().await,
            None => false,
        }
    }

    /// Hand the connection back to the pool.
    ///
    /// A healthy connection within its limits becomes idle; anything else is
    /// closed. Either way one waiting acquirer is woken.
    pub async fn release(mut self, healthy: bool) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if let Some(retired) = self.pool.checkin(conn, healthy) {
            self.permit.take();
            retired.close().await;
        }
    }

    /// Take the connection out of the pool for good.
    ///
    /// The pool forgets it and frees its slot. The caller owns the session
    /// and should [`close`](ManagedConnection::close) it when done.
    pub fn detach(mut self) -> Option<ManagedConnection> {
        let conn = self.conn.take()?;
        self.pool.forget();
        tracing::debug!(conn_id = conn.id(), "connection detached from pool");
        Some(conn)
    }

    /// Retire the connection and return its permit to the caller.
    async fn discard(mut self, reason: RetireReason) -> Option<OwnedSemaphorePermit> {
        if let Some(conn) = self.conn.take() {
            self.pool.forget();
            self.pool.metrics.retired(reason);
            tracing::debug!(conn_id = conn.id(), reason = reason.as_str(), "retiring connection");
            conn.close().await;
        }
        self.permit.take()
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if conn.is_in_flight() {
                tracing::debug!(conn_id = conn.id(), "statement interrupted, retiring connection");
            }
            // A panicking borrower left the session in an unknown state.
            let healthy = !std::thread::panicking()
                && !conn.is_in_flight()
                && !conn.state().should_remove();
            if let Some(retired) = self.pool.checkin(conn, healthy) {
                self.permit.take();
                // Closed in the background by its own drop.
                drop(retired);
            }
        }
    }
}

/// Builder for [`Pool`].
#[derive(Default)]
pub struct PoolBuilder {
    driver: Option<Arc<dyn Driver>>,
    config: ConnectionConfig,
    options: PoolOptions,
}

impl PoolBuilder {
    /// Create a builder with default connection settings and pool options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the driver that opens sessions.
    #[must_use]
    pub fn driver<D: Driver>(mut self, driver: D) -> Self {
        self.driver = Some(Arc::new(driver));
        self
    }

    /// Set a shared driver.
    #[must_use]
    pub fn shared_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Set the connection configuration.
    #[must_use]
    pub fn connection_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace all pool options.
    #[must_use]
    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_size(mut self, size: u32) -> Self {
        self.options.max_size = size;
        self
    }

    /// Set the per-connection checkout limit.
    #[must_use]
    pub fn max_usage(mut self, uses: Option<u32>) -> Self {
        self.options.max_usage = uses;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.options.max_lifetime = lifetime;
        self
    }

    /// Set the acquisition timeout used by `get()`.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.options.acquire_timeout = timeout;
        self
    }

    /// Enable or disable pinging idle connections on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.options.test_on_checkout = enabled;
        self
    }

    /// Enable or disable the one-shot reconnect.
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.options.reconnect = enabled;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.options.shutdown_grace = grace;
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<Pool, PoolError> {
        let driver = self
            .driver
            .ok_or_else(|| PoolError::Configuration("a driver is required".into()))?;
        Pool::new(ConnectionFactory::new(driver, self.config), self.options)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use connmgr_testing::{MockDriver, fixtures};

    use super::*;

    fn pool(driver: &MockDriver, max_size: u32) -> Pool {
        Pool::builder()
            .driver(driver.clone())
            .connection_config(fixtures::test_config("orders"))
            .max_size(max_size)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_driver() {
        let err = Pool::builder().build().unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn test_builder_validates_options() {
        let err = Pool::builder()
            .driver(MockDriver::new())
            .max_size(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }

    #[test]
    fn test_status_utilization() {
        let status = PoolStatus {
            available: 1,
            in_use: 3,
            total: 4,
            max: 4,
        };
        assert!((status.utilization() - 75.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_release_makes_connection_idle() {
        let driver = MockDriver::new();
        let pool = pool(&driver, 2);

        let conn = pool.get().await.unwrap();
        assert_eq!(pool.status().in_use, 1);
        assert_eq!(pool.status().total, 1);

        conn.release(true).await;
        let status = pool.status();
        assert_eq!(status.in_use, 0);
        assert_eq!(status.available, 1);
        assert_eq!(status.total, 1);
    }

    #[tokio::test]
    async fn test_drop_returns_connection() {
        let driver = MockDriver::new();
        let pool = pool(&driver, 2);

        let id = {
            let conn = pool.get().await.unwrap();
            conn.id()
        };
        assert_eq!(pool.status().available, 1);

        let conn = pool.get().await.unwrap();
        assert_eq!(conn.id(), id);
        assert_eq!(driver.opens(), 1);
    }

    #[tokio::test]
    async fn test_try_get() {
        let driver = MockDriver::new();
        let pool = pool(&driver, 1);

        assert!(pool.try_get().unwrap().is_none());

        pool.get().await.unwrap().release(true).await;
        let conn = pool.try_get().unwrap().expect("idle connection");

        // The only slot is taken
        assert!(pool.try_get().unwrap().is_none());
        conn.release(true).await;
    }

    #[tokio::test]
    async fn test_detach_frees_slot() {
        let driver = MockDriver::new();
        let pool = pool(&driver, 1);

        let detached = pool.get().await.unwrap().detach().unwrap();
        assert_eq!(pool.status().total, 0);

        let conn = pool.acquire(Duration::ZERO).await.unwrap();
        assert_ne!(conn.id(), detached.id());
        detached.close().await;
    }

    #[tokio::test]
    async fn test_unhealthy_release_closes_session() {
        let driver = MockDriver::new();
        let pool = pool(&driver, 1);

        pool.get().await.unwrap().release(false).await;

        assert_eq!(pool.status().total, 0);
        assert_eq!(driver.closes(), 1);
        assert_eq!(pool.metrics().retired_broken, 1);
    }
}
