//! Pool counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::lifecycle::RetireReason;

/// Snapshot of pool counters since the pool was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Connections opened by the pool; reconnects are counted separately.
    pub connections_created: u64,
    /// Connections retired and closed by the pool.
    pub connections_closed: u64,
    /// Acquisitions that returned a connection.
    pub checkouts_successful: u64,
    /// Acquisitions that failed, including timeouts.
    pub checkouts_failed: u64,
    /// Acquisitions that timed out.
    pub timeouts: u64,
    /// Connections retired for sitting idle too long.
    pub retired_idle: u64,
    /// Connections retired for exceeding their lifetime.
    pub retired_lifetime: u64,
    /// Connections retired after reaching the usage limit.
    pub retired_usage: u64,
    /// Connections retired as broken, unhealthy or failing a ping.
    pub retired_broken: u64,
    /// Reconnect attempts after a lost session.
    pub reconnects_attempted: u64,
    /// Reconnect attempts that opened a new session.
    pub reconnects_succeeded: u64,
    /// Checkout pings performed.
    pub health_checks_performed: u64,
    /// Checkout pings that failed.
    pub health_checks_failed: u64,
}

impl PoolMetrics {
    /// Fraction of acquisitions that succeeded, `1.0` when there were none.
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            1.0
        } else {
            self.checkouts_successful as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    checkouts_successful: AtomicU64,
    checkouts_failed: AtomicU64,
    timeouts: AtomicU64,
    retired_idle: AtomicU64,
    retired_lifetime: AtomicU64,
    retired_usage: AtomicU64,
    retired_broken: AtomicU64,
    reconnects_attempted: AtomicU64,
    reconnects_succeeded: AtomicU64,
    health_checks_performed: AtomicU64,
    health_checks_failed: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl MetricsRecorder {
    pub(crate) fn connection_created(&self) {
        bump(&self.connections_created);
    }

    pub(crate) fn checkout_succeeded(&self) {
        bump(&self.checkouts_successful);
    }

    pub(crate) fn checkout_failed(&self) {
        bump(&self.checkouts_failed);
    }

    pub(crate) fn checkout_timed_out(&self) {
        bump(&self.checkouts_failed);
        bump(&self.timeouts);
    }

    pub(crate) fn reconnect_attempted(&self) {
        bump(&self.reconnects_attempted);
    }

    pub(crate) fn reconnect_succeeded(&self) {
        bump(&self.reconnects_succeeded);
    }

    pub(crate) fn health_check(&self, passed: bool) {
        bump(&self.health_checks_performed);
        if !passed {
            bump(&self.health_checks_failed);
        }
    }

    /// Count one connection leaving the pool.
    pub(crate) fn retired(&self, reason: RetireReason) {
        bump(&self.connections_closed);
        match reason {
            RetireReason::IdleTimeout => bump(&self.retired_idle),
            RetireReason::Lifetime => bump(&self.retired_lifetime),
            RetireReason::UsageLimit => bump(&self.retired_usage),
            RetireReason::Broken | RetireReason::Unhealthy | RetireReason::FailedPing => {
                bump(&self.retired_broken);
            }
            RetireReason::PoolClosed => {}
        }
    }

    pub(crate) fn snapshot(&self) -> PoolMetrics {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PoolMetrics {
            connections_created: load(&self.connections_created),
            connections_closed: load(&self.connections_closed),
            checkouts_successful: load(&self.checkouts_successful),
            checkouts_failed: load(&self.checkouts_failed),
            timeouts: load(&self.timeouts),
            retired_idle: load(&self.retired_idle),
            retired_lifetime: load(&self.retired_lifetime),
            retired_usage: load(&self.retired_usage),
            retired_broken: load(&self.retired_broken),
            reconnects_attempted: load(&self.reconnects_attempted),
            reconnects_succeeded: load(&self.reconnects_succeeded),
            health_checks_performed: load(&self.health_checks_performed),
            health_checks_failed: load(&self.health_checks_failed),
        }
    }
}
