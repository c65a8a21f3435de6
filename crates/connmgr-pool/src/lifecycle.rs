//! Connection lifecycle management.
//!
//! A [`ManagedConnection`] wraps one driver session with the bookkeeping the
//! pool needs to decide when it must be retired: when it was opened, when it
//! was last returned, how often it has been handed out, and which state it is
//! in.
//!
//! ```text
//!            borrow                  return (healthy, within limits)
//!   Idle ─────────────▶ InUse ───────────────────────────────────▶ Idle
//!                         │  connectivity lost
//!                         ▼
//!                       Broken ── reconnect ──▶ InUse
//!                         │
//!   any state ────────────┴──── retire ─────────────────────────▶ Retired
//! ```

use std::fmt;
use std::time::Duration;

use connmgr_driver::{QueryResult, RawConnection, Value};
use tokio::time::Instant;

use crate::config::PoolOptions;
use crate::error::PoolError;

/// Statements taking at least this long are logged at `info`.
pub const SLOW_STATEMENT: Duration = Duration::from_secs(5);

/// Statements taking at least this long are logged at `warn`.
pub const VERY_SLOW_STATEMENT: Duration = Duration::from_secs(10);

/// Longest statement text written to the log.
const MAX_LOGGED_STATEMENT: usize = 512;

/// Connection state tracked by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is idle and available for use.
    Idle,
    /// Connection is checked out.
    InUse,
    /// The session was lost; the connection must reconnect or be retired.
    Broken,
    /// Connection is closed and will not be used again.
    Retired,
}

impl ConnectionState {
    /// Check if the connection is available for checkout.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if the connection should be removed from the pool.
    #[must_use]
    pub fn should_remove(&self) -> bool {
        matches!(self, Self::Broken | Self::Retired)
    }
}

/// Why a connection left the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetireReason {
    /// Sat idle for longer than the idle timeout.
    IdleTimeout,
    /// Lived longer than the maximum lifetime.
    Lifetime,
    /// Reached its checkout limit.
    UsageLimit,
    /// Lost its session and could not be reconnected.
    Broken,
    /// The borrower reported it unhealthy.
    Unhealthy,
    /// Failed the checkout ping.
    FailedPing,
    /// The pool was shut down.
    PoolClosed,
}

impl RetireReason {
    /// Short label used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdleTimeout => "idle_timeout",
            Self::Lifetime => "lifetime",
            Self::UsageLimit => "usage_limit",
            Self::Broken => "broken",
            Self::Unhealthy => "unhealthy",
            Self::FailedPing => "failed_ping",
            Self::PoolClosed => "pool_closed",
        }
    }
}

impl fmt::Display for RetireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a connection handed back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// The connection is idle again and may be reused.
    Recycled,
    /// The connection is retired; its session must be closed.
    Retired(RetireReason),
}

/// Metadata about a pooled connection.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Unique identifier for this connection.
    pub id: u64,
    /// When the current session was opened.
    pub created_at: Instant,
    /// When the connection was last returned (or opened).
    pub last_used_at: Instant,
    /// Number of healthy returns so far.
    pub usage_count: u32,
    /// Current connection state.
    pub state: ConnectionState,
    /// Number of times the session was reopened after a connectivity loss.
    pub reconnects: u32,
}

impl ConnectionMetadata {
    /// Create metadata for a freshly opened connection.
    #[must_use]
    pub fn new(id: u64, now: Instant) -> Self {
        Self {
            id,
            created_at: now,
            last_used_at: now,
            usage_count: 0,
            state: ConnectionState::Idle,
            reconnects: 0,
        }
    }

    /// Age of the current session.
    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Time since the connection was last returned.
    #[must_use]
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used_at)
    }

    /// Whether the session has outlived `max_lifetime`.
    #[must_use]
    pub fn is_expired(&self, now: Instant, max_lifetime: Option<Duration>) -> bool {
        max_lifetime.is_some_and(|ttl| self.age(now) >= ttl)
    }

    /// Whether the connection has been idle for at least `idle_timeout`.
    #[must_use]
    pub fn is_idle_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        self.idle_time(now) >= idle_timeout
    }

    /// Whether the connection has used up its checkouts.
    #[must_use]
    pub fn is_usage_exhausted(&self, max_usage: Option<u32>) -> bool {
        max_usage.is_some_and(|max| self.usage_count >= max)
    }
}

/// One driver session plus its lifecycle bookkeeping.
///
/// Dropping a `ManagedConnection` that still owns a session closes the
/// session on a background task; prefer [`ManagedConnection::close`] where
/// the caller can await.
pub struct ManagedConnection {
    raw: Option<Box<dyn RawConnection>>,
    meta: ConnectionMetadata,
    in_flight: bool,
}

impl ManagedConnection {
    /// Wrap a freshly opened session.
    pub fn new(id: u64, raw: Box<dyn RawConnection>, now: Instant) -> Self {
        Self {
            raw: Some(raw),
            meta: ConnectionMetadata::new(id, now),
            in_flight: false,
        }
    }

    /// Connection metadata.
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.meta
    }

    /// Connection id.
    pub fn id(&self) -> u64 {
        self.meta.id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.meta.state
    }

    /// Whether a statement was interrupted before it completed.
    ///
    /// Set while [`execute`](Self::execute) is awaiting the driver; if that
    /// future is dropped the flag stays set and the session is in an
    /// unknown state.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether the connection could be handed out right now.
    ///
    /// Idle timeout is not part of this check; the pool evicts idle
    /// connections separately.
    pub fn is_usable(&self, now: Instant, options: &PoolOptions) -> bool {
        self.meta.state.is_available()
            && self.raw.is_some()
            && !self.meta.is_expired(now, options.max_lifetime)
            && !self.meta.is_usage_exhausted(options.max_usage)
    }

    /// The reason an idle connection must be evicted, if any.
    pub fn eviction_reason(&self, now: Instant, options: &PoolOptions) -> Option<RetireReason> {
        if self.raw.is_none() || self.meta.state.should_remove() {
            Some(RetireReason::Broken)
        } else if self.meta.is_expired(now, options.max_lifetime) {
            Some(RetireReason::Lifetime)
        } else if self.meta.is_usage_exhausted(options.max_usage) {
            Some(RetireReason::UsageLimit)
        } else if self.meta.is_idle_expired(now, options.idle_timeout) {
            Some(RetireReason::IdleTimeout)
        } else {
            None
        }
    }

    /// Mark the connection checked out.
    pub fn borrow(&mut self) -> Result<(), PoolError> {
        if !self.meta.state.is_available() {
            return Err(PoolError::NotIdle(self.meta.state));
        }
        self.meta.state = ConnectionState::InUse;
        Ok(())
    }

    /// Hand the connection back and decide whether it may be reused.
    ///
    /// A healthy return counts as one use. The connection goes back to
    /// `Idle` unless it was reported unhealthy, is broken, or has reached
    /// its usage or lifetime limit; in those cases it is marked `Retired`
    /// and the caller must [`close`](Self::close) it.
    pub fn return_and_validate(
        &mut self,
        healthy: bool,
        now: Instant,
        options: &PoolOptions,
    ) -> ReturnOutcome {
        let reason = if self.meta.state.should_remove() || self.raw.is_none() || self.in_flight {
            Some(RetireReason::Broken)
        } else if !healthy {
            Some(RetireReason::Unhealthy)
        } else {
            self.meta.usage_count = self.meta.usage_count.saturating_add(1);
            self.meta.last_used_at = now;
            if self.meta.is_usage_exhausted(options.max_usage) {
                Some(RetireReason::UsageLimit)
            } else if self.meta.is_expired(now, options.max_lifetime) {
                Some(RetireReason::Lifetime)
            } else {
                None
            }
        };

        match reason {
            Some(reason) => {
                self.meta.state = ConnectionState::Retired;
                ReturnOutcome::Retired(reason)
            }
            None => {
                self.meta.state = ConnectionState::Idle;
                ReturnOutcome::Recycled
            }
        }
    }

    /// Check that the session is alive.
    ///
    /// Like [`execute`](Self::execute), an interrupted ping leaves the
    /// connection in flight.
    pub async fn ping(&mut self) -> bool {
        let Some(raw) = self.raw.as_mut() else {
            return false;
        };
        self.in_flight = true;
        let alive = raw.ping().await;
        self.in_flight = false;
        alive
    }

    /// Execute one statement on the session.
    ///
    /// A lost session marks the connection `Broken` and is reported as
    /// [`PoolError::ConnectivityLost`]; any other driver failure leaves the
    /// connection usable and is reported as [`PoolError::Driver`].
    pub async fn execute(
        &mut self,
        statement: &str,
        params: &[Value],
    ) -> Result<QueryResult, PoolError> {
        let Some(raw) = self.raw.as_mut() else {
            self.meta.state = ConnectionState::Broken;
            return Err(PoolError::ConnectivityLost("session is closed".into()));
        };

        self.in_flight = true;
        let started = Instant::now();
        let result = raw.execute(statement, params).await;
        self.in_flight = false;
        let elapsed = started.elapsed();

        match result {
            Ok(result) => {
                log_statement(self.meta.id, statement, elapsed);
                Ok(result)
            }
            Err(e) => {
                tracing::error!(
                    conn_id = self.meta.id,
                    statement = %loggable(statement),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "statement failed"
                );
                if e.is_connectivity() {
                    self.meta.state = ConnectionState::Broken;
                }
                Err(e.into())
            }
        }
    }

    /// Close the current session, keeping the bookkeeping.
    ///
    /// The connection is left `Broken` until [`replace_raw`](Self::replace_raw)
    /// installs a new session.
    pub async fn close_raw(&mut self) {
        self.meta.state = ConnectionState::Broken;
        if let Some(raw) = self.raw.take() {
            raw.close().await;
        }
    }

    /// Install a freshly opened session after a reconnect.
    ///
    /// Resets the age and idle clocks and counts the reconnect; the usage
    /// count is kept. Returns the previous session, if any, for closing.
    pub fn replace_raw(
        &mut self,
        raw: Box<dyn RawConnection>,
        now: Instant,
    ) -> Option<Box<dyn RawConnection>> {
        let previous = self.raw.replace(raw);
        self.meta.created_at = now;
        self.meta.last_used_at = now;
        self.meta.reconnects = self.meta.reconnects.saturating_add(1);
        self.meta.state = ConnectionState::InUse;
        self.in_flight = false;
        previous
    }

    /// Retire the connection and close its session.
    pub async fn close(mut self) {
        self.meta.state = ConnectionState::Retired;
        if let Some(raw) = self.raw.take() {
            raw.close().await;
        }
    }
}

impl fmt::Debug for ManagedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedConnection")
            .field("meta", &self.meta)
            .field("open", &self.raw.is_some())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl Drop for ManagedConnection {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            close_in_background(self.meta.id, raw);
        }
    }
}

/// Close a session without awaiting it.
pub(crate) fn close_in_background(conn_id: u64, raw: Box<dyn RawConnection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                raw.close().await;
                tracing::trace!(conn_id, "session closed in background");
            });
        }
        Err(_) => {
            tracing::warn!(conn_id, "no runtime available, dropping session without close");
        }
    }
}

/// Collapse whitespace and cap the length of a statement for logging.
fn loggable(statement: &str) -> String {
    let mut out = String::with_capacity(statement.len().min(MAX_LOGGED_STATEMENT));
    for (i, word) in statement.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(word);
        if out.len() >= MAX_LOGGED_STATEMENT {
            break;
        }
    }
    if out.len() > MAX_LOGGED_STATEMENT {
        let mut end = MAX_LOGGED_STATEMENT;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
    }
    out
}

fn log_statement(conn_id: u64, statement: &str, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    if elapsed >= VERY_SLOW_STATEMENT {
        tracing::warn!(conn_id, statement = %loggable(statement), elapsed_ms, "very slow statement");
    } else if elapsed >= SLOW_STATEMENT {
        tracing::info!(conn_id, statement = %loggable(statement), elapsed_ms, "slow statement");
    } else {
        tracing::debug!(conn_id, statement = %loggable(statement), elapsed_ms, "statement executed");
    }
}
