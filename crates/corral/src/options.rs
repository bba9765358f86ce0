//! Pool configuration
//!
//! Every field can also be changed on a live pool through the setters on
//! [`Pool`](crate::pool::Pool); this struct is the initial snapshot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_active() -> usize {
    2
}

fn default_max_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_validation_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_idle_time() -> Duration {
    Duration::from_secs(60)
}

fn default_true() -> bool {
    true
}

/// Pool configuration
///
/// A `Duration` of zero disables the corresponding behavior: a zero
/// `max_wait` waits indefinitely, a zero `validation_interval` disables
/// the background validator, zero `max_idle_time` / `max_life_time`
/// disable the respective evictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolOptions {
    /// Hard cap on total connections
    #[serde(default = "default_max_active")]
    pub max_active: usize,

    /// Warm connections to maintain
    #[serde(default)]
    pub min_active: usize,

    /// How long a borrower waits for an idle connection
    #[serde(default = "default_max_wait", with = "humantime_serde")]
    pub max_wait: Duration,

    /// Period of the background validation sweep
    #[serde(default = "default_validation_interval", with = "humantime_serde")]
    pub validation_interval: Duration,

    /// Idle connections older than this are evicted (down to `min_active`)
    #[serde(default = "default_max_idle_time", with = "humantime_serde")]
    pub max_idle_time: Duration,

    /// Connections older than this are evicted regardless of use
    #[serde(default, with = "humantime_serde")]
    pub max_life_time: Duration,

    /// Drop dead connections at borrow time
    #[serde(default = "default_true")]
    pub test_on_borrow: bool,

    /// Drop dead connections at return time
    #[serde(default = "default_true")]
    pub test_on_return: bool,

    /// Reset connections at borrow time
    #[serde(default)]
    pub reset_connections: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_active: default_max_active(),
            min_active: 0,
            max_wait: default_max_wait(),
            validation_interval: default_validation_interval(),
            max_idle_time: default_max_idle_time(),
            max_life_time: Duration::ZERO,
            test_on_borrow: true,
            test_on_return: true,
            reset_connections: false,
        }
    }
}

impl PoolOptions {
    /// Create options with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections
    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    /// Set the warm minimum
    pub fn with_min_active(mut self, min_active: usize) -> Self {
        self.min_active = min_active;
        self
    }

    /// Set the borrow wait limit
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the validation sweep period
    pub fn with_validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    /// Set the idle eviction threshold
    pub fn with_max_idle_time(mut self, max_idle_time: Duration) -> Self {
        self.max_idle_time = max_idle_time;
        self
    }

    /// Set the lifetime eviction threshold
    pub fn with_max_life_time(mut self, max_life_time: Duration) -> Self {
        self.max_life_time = max_life_time;
        self
    }

    /// Enable/disable the liveness test at borrow time
    pub fn with_test_on_borrow(mut self, test: bool) -> Self {
        self.test_on_borrow = test;
        self
    }

    /// Enable/disable the liveness test at return time
    pub fn with_test_on_return(mut self, test: bool) -> Self {
        self.test_on_return = test;
        self
    }

    /// Enable/disable the reset call at borrow time
    pub fn with_reset_connections(mut self, reset: bool) -> Self {
        self.reset_connections = reset;
        self
    }

    /// Clamp `min_active` so it never exceeds `max_active`
    pub(crate) fn normalize(&mut self) {
        if self.min_active > self.max_active {
            self.min_active = self.max_active;
        }
    }
}
