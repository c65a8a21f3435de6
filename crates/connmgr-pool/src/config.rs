//! Pool configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::PoolError;

/// Default maximum number of connections per pool.
pub const DEFAULT_MAX_SIZE: u32 = 10;

/// Default time an idle connection is kept.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time `get()` waits for a connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time `shutdown()` waits for checked-out connections.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Configuration for a connection pool.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future minor versions without breaking changes. Use the builder
/// pattern methods or [`Default::default()`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PoolOptions {
    /// Maximum number of connections, idle plus checked out.
    pub max_size: u32,

    /// Retire a connection after this many checkouts. `None` is unlimited.
    pub max_usage: Option<u32>,

    /// Retire a connection after it has been idle this long.
    pub idle_timeout: Duration,

    /// Retire a connection this long after it was opened. `None` is unlimited.
    pub max_lifetime: Option<Duration>,

    /// How long [`Pool::get`](crate::Pool::get) waits for a connection.
    pub acquire_timeout: Duration,

    /// Ping idle connections before handing them out.
    pub test_on_checkout: bool,

    /// Reopen a lost session once and retry the statement.
    pub reconnect: bool,

    /// How long shutdown waits for checked-out connections to come back.
    pub shutdown_grace: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            max_usage: None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_lifetime: None,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            test_on_checkout: false,
            reconnect: true,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl PoolOptions {
    /// Create pool options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_size(mut self, size: u32) -> Self {
        self.max_size = size;
        self
    }

    /// Set the per-connection checkout limit.
    #[must_use]
    pub fn max_usage(mut self, uses: Option<u32>) -> Self {
        self.max_usage = uses;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    #[must_use]
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Set the acquisition timeout used by `get()`.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Enable or disable pinging idle connections on checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    /// Enable or disable the one-shot reconnect on lost sessions.
    #[must_use]
    pub fn reconnect(mut self, enabled: bool) -> Self {
        self.reconnect = enabled;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.max_size == 0 {
            return Err(PoolError::Configuration(
                "max_size must be greater than 0".into(),
            ));
        }
        if self.max_usage == Some(0) {
            return Err(PoolError::Configuration(
                "max_usage must be greater than 0 (use None for unlimited)".into(),
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(PoolError::Configuration(
                "idle_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Pool options as they appear in a settings file.
///
/// Counts and durations are plain integers; `0` means unlimited for
/// `max_usage` and `ttl_seconds`. `idle_seconds` must be at least 1.
///
/// ```rust
/// use connmgr_pool::{PoolOptions, PoolSettings};
///
/// let settings: PoolSettings = serde_json::from_str(r#"{"max_size": 4, "ttl_seconds": 600}"#)?;
/// let options = PoolOptions::from(settings);
/// assert_eq!(options.max_size, 4);
/// assert_eq!(options.max_usage, None);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections.
    pub max_size: u32,
    /// Checkouts per connection, `0` for unlimited.
    pub max_usage: u32,
    /// Idle timeout in seconds, at least 1.
    pub idle_seconds: u64,
    /// Connection lifetime in seconds, `0` for unlimited.
    pub ttl_seconds: u64,
    /// Acquisition timeout in seconds.
    pub acquire_timeout_seconds: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let options = PoolOptions::default();
        Self {
            max_size: options.max_size,
            max_usage: 0,
            idle_seconds: options.idle_timeout.as_secs(),
            ttl_seconds: 0,
            acquire_timeout_seconds: options.acquire_timeout.as_secs(),
        }
    }
}

impl From<PoolSettings> for PoolOptions {
    fn from(settings: PoolSettings) -> Self {
        PoolOptions::new()
            .max_size(settings.max_size)
            .max_usage((settings.max_usage > 0).then_some(settings.max_usage))
            .idle_timeout(Duration::from_secs(settings.idle_seconds))
            .max_lifetime((settings.ttl_seconds > 0).then(|| Duration::from_secs(settings.ttl_seconds)))
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_seconds))
    }
}
