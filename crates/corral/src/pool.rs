//! Connection pool façade
//!
//! Orchestrates the idle queue, the connection registry, the creation
//! gate and the background validator into the borrow/return state
//! machine:
//!
//! - `get` hands out a live connection, creating one through the gate
//!   when the pool is below its cap, otherwise waiting FIFO on the idle
//!   queue.
//! - `put` takes a connection back and reports what happened to it.
//! - the validator periodically drops dead, idle-expired and aged
//!   connections and refills the pool to its warm minimum.
//! - `set_max_active` resizes a live pool by swapping the idle queue;
//!   blocked borrowers migrate to the new queue, excess connections are
//!   destroyed as they come back.
//!
//! # Example
//!
//! ```rust,ignore
//! use corral::prelude::*;
//!
//! let pool = Pool::new(connector, ConnectOptions::new("amqp://localhost/bus"),
//!     PoolOptions::new().with_max_active(8).with_min_active(2))?;
//! pool.init().await;
//!
//! let conn = pool.get().await?;
//! // use the connection; it returns to the pool on drop
//! ```

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::connection::{ConnectOptions, Connection, Connector};
use crate::error::{Error, Result};
use crate::gate::CreationGate;
use crate::options::PoolOptions;
use crate::queue::{IdleQueue, Pop, Push, TryPop};
use crate::stats::{Counters, PoolStats};

const STATE_NEW: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// What happened to a returned connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStatus {
    /// Accepted into the idle queue
    Accepted,
    /// The pool is closed or was never initialized; the connection was destroyed
    PoolNotInitialized,
    /// The connection does not belong to this pool; it was destroyed
    NotPartOfPool,
    /// The idle queue was full (possible after a resize-down); destroyed
    LimitReached,
    /// The connection failed the liveness test; destroyed
    DeadConnection,
    /// The connection exceeded its maximum lifetime; destroyed
    MaxLifeTime,
    /// The idle queue was closed mid-return; destroyed
    PoolClosed,
}

impl ReturnStatus {
    /// Whether the connection went back into the idle queue
    #[inline]
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl std::fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => write!(f, "accepted"),
            Self::PoolNotInitialized => write!(f, "pool-not-initialized"),
            Self::NotPartOfPool => write!(f, "not-part-of-pool"),
            Self::LimitReached => write!(f, "limit-reached"),
            Self::DeadConnection => write!(f, "dead-connection"),
            Self::MaxLifeTime => write!(f, "max-life-time"),
            Self::PoolClosed => write!(f, "pool-closed"),
        }
    }
}

/// A registered connection moving between the queue and borrowers
pub(crate) struct Entry {
    id: u64,
    conn: Box<dyn Connection>,
}

/// Outcome of the creation path
enum Creation {
    Created(Entry),
    /// Lost the re-check under the gate; the borrower starts over
    NoCapacity,
}

struct PoolCore {
    connector: Arc<dyn Connector>,
    connect_opts: ConnectOptions,
    options: RwLock<PoolOptions>,
    state: AtomicU8,
    /// Connection id -> creation time. Source of truth for membership
    /// and for the total count.
    registry: Mutex<HashMap<u64, Instant>>,
    /// Swapped out wholesale on resize; never mutated in place.
    idle: RwLock<Arc<IdleQueue<Entry>>>,
    gate: CreationGate,
    counters: Counters,
    next_id: AtomicU64,
    validator: Mutex<Option<JoinHandle<()>>>,
}

/// Generic async connection pool
///
/// Cheap to clone; all clones share the same pool.
#[derive(Clone)]
pub struct Pool {
    core: Arc<PoolCore>,
}

/// A borrowed connection that returns itself to the pool on drop
///
/// Dereferences to [`Connection`]. Use [`Pool::put`] instead of dropping
/// when the return status matters.
pub struct PooledConnection {
    entry: Option<Entry>,
    pool: Pool,
}

impl PooledConnection {
    /// Get the underlying connection
    pub fn connection(&self) -> &(dyn Connection + 'static) {
        self.entry
            .as_ref()
            .expect("connection already returned")
            .conn
            .as_ref()
    }

    /// Get mutable access to the underlying connection
    pub fn connection_mut(&mut self) -> &mut (dyn Connection + 'static) {
        self.entry
            .as_mut()
            .expect("connection already returned")
            .conn
            .as_mut()
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(entry) = self.entry.take() {
            let status = self.pool.core.return_entry(entry);
            debug!("connection returned on drop: {status}");
        }
    }
}

impl Pool {
    /// Create a pool
    ///
    /// The pool does nothing until [`init`](Self::init) is called.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `max_active` is zero.
    pub fn new(
        connector: Arc<dyn Connector>,
        connect_opts: ConnectOptions,
        mut options: PoolOptions,
    ) -> Result<Self> {
        if options.max_active == 0 {
            return Err(Error::configuration("max_active must be at least 1"));
        }
        options.normalize();
        let capacity = options.max_active;
        Ok(Self {
            core: Arc::new(PoolCore {
                connector,
                connect_opts,
                options: RwLock::new(options),
                state: AtomicU8::new(STATE_NEW),
                registry: Mutex::new(HashMap::new()),
                idle: RwLock::new(Arc::new(IdleQueue::new(capacity))),
                gate: CreationGate::new(),
                counters: Counters::default(),
                next_id: AtomicU64::new(0),
                validator: Mutex::new(None),
            }),
        })
    }

    /// Bring the pool to life
    ///
    /// Idempotent. Allocates the idle queue, starts the validator when
    /// `validation_interval` is non-zero and warms the pool up to
    /// `min_active`. A no-op on an already-active or closed pool;
    /// a closed pool stays closed.
    pub async fn init(&self) {
        if self
            .core
            .state
            .compare_exchange(STATE_NEW, STATE_ACTIVE, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let (max_active, min_active) = {
            let opts = self.core.options.read();
            (opts.max_active, opts.min_active)
        };
        self.core.replace_idle_queue(max_active);
        self.reschedule_validator();
        if min_active > 0 {
            self.core.fill_pool().await;
        }
        info!("pool initialized (max_active={max_active}, min_active={min_active})");
    }

    /// Shut the pool down
    ///
    /// Idempotent and non-blocking: the validator is stopped and every
    /// connection is detached immediately; idle connections are closed
    /// by a background task the caller never waits for. Borrowers
    /// blocked on the idle queue fail with [`Error::Closed`].
    pub fn close(&self) {
        let prev = self.core.state.swap(STATE_CLOSED, Ordering::SeqCst);
        if prev == STATE_CLOSED {
            return;
        }
        if let Some(handle) = self.core.validator.lock().take() {
            handle.abort();
        }
        let detached = {
            let mut registry = self.core.registry.lock();
            let count = registry.len();
            registry.clear();
            count
        };
        if prev == STATE_ACTIVE {
            let queue = self.core.idle_queue();
            tokio::spawn(async move {
                loop {
                    match queue.try_pop() {
                        TryPop::Item(mut entry) => {
                            if let Err(err) = entry.conn.close().await {
                                debug!("connection close failed: {err}");
                            }
                        }
                        TryPop::Empty | TryPop::Closed => break,
                    }
                }
                for mut entry in queue.close() {
                    if let Err(err) = entry.conn.close().await {
                        debug!("connection close failed: {err}");
                    }
                }
            });
        }
        info!("pool closed ({detached} connections detached)");
    }

    /// Borrow a connection
    ///
    /// # Errors
    ///
    /// - [`Error::Closed`] when the pool is not initialized or closed.
    /// - [`Error::WaitTimeout`] when no connection became available
    ///   within `max_wait`.
    /// - A connector error when creating a replacement failed.
    /// - A reset error when `reset_connections` is set and the reset
    ///   failed (the connection is destroyed, not handed out).
    pub async fn get(&self) -> Result<PooledConnection> {
        let entry = self.core.acquire_entry().await?;
        Ok(PooledConnection {
            entry: Some(entry),
            pool: self.clone(),
        })
    }

    /// Return a connection, reporting what happened to it
    ///
    /// Never fails; a connection that is not accepted back is destroyed
    /// in the background.
    pub fn put(&self, mut conn: PooledConnection) -> ReturnStatus {
        let entry = conn.entry.take().expect("connection already returned");
        self.core.return_entry(entry)
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> PoolStats {
        let total = self.total_count();
        let idle = self.idle_count();
        PoolStats {
            max_active: self.core.options.read().max_active,
            total,
            idle,
            in_use: total.saturating_sub(idle),
            wait_count: self.core.counters.wait_count(),
            wait_duration: self.core.counters.wait_duration(),
            idle_closed: self.core.counters.idle_closed(),
            life_closed: self.core.counters.life_closed(),
        }
    }

    /// Connections currently owned by the pool
    pub fn total_count(&self) -> usize {
        self.core.total_count()
    }

    /// Connections currently idle
    pub fn idle_count(&self) -> usize {
        self.core.idle_count()
    }

    /// Change the connection cap, resizing a live pool
    ///
    /// Growing takes effect immediately; borrowers blocked on the idle
    /// queue are released and re-evaluate against the new capacity.
    /// Shrinking never revokes live borrows: excess connections are
    /// destroyed as they are returned ([`ReturnStatus::LimitReached`]).
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `max_active` is zero.
    pub fn set_max_active(&self, max_active: usize) -> Result<()> {
        if max_active == 0 {
            return Err(Error::configuration("max_active must be at least 1"));
        }
        let changed = {
            let mut opts = self.core.options.write();
            let previous = opts.max_active;
            opts.max_active = max_active;
            opts.normalize();
            previous != max_active
        };
        if changed && self.core.state() == STATE_ACTIVE {
            self.core.replace_idle_queue(max_active);
        }
        Ok(())
    }

    /// Change the warm minimum; values above `max_active` are clamped
    ///
    /// Takes effect at the next validator sweep.
    pub fn set_min_active(&self, min_active: usize) {
        let mut opts = self.core.options.write();
        opts.min_active = min_active.min(opts.max_active);
    }

    /// Change the borrow wait limit; zero waits indefinitely
    pub fn set_max_wait(&self, max_wait: Duration) {
        self.core.options.write().max_wait = max_wait;
    }

    /// Change the validation period, rescheduling the validator live
    ///
    /// Zero stops the validator.
    pub fn set_validation_interval(&self, interval: Duration) {
        self.core.options.write().validation_interval = interval;
        if self.core.state() == STATE_ACTIVE {
            self.reschedule_validator();
        }
    }

    /// Change the idle eviction threshold; zero disables it
    pub fn set_max_idle_time(&self, max_idle_time: Duration) {
        self.core.options.write().max_idle_time = max_idle_time;
    }

    /// Change the lifetime eviction threshold; zero disables it
    pub fn set_max_life_time(&self, max_life_time: Duration) {
        self.core.options.write().max_life_time = max_life_time;
    }

    /// Enable/disable the liveness test at borrow time
    pub fn set_test_on_borrow(&self, test: bool) {
        self.core.options.write().test_on_borrow = test;
    }

    /// Enable/disable the liveness test at return time
    pub fn set_test_on_return(&self, test: bool) {
        self.core.options.write().test_on_return = test;
    }

    /// Enable/disable the reset call at borrow time
    pub fn set_reset_connections(&self, reset: bool) {
        self.core.options.write().reset_connections = reset;
    }

    /// Current connection cap
    pub fn max_active(&self) -> usize {
        self.core.options.read().max_active
    }

    /// Current warm minimum
    pub fn min_active(&self) -> usize {
        self.core.options.read().min_active
    }

    /// Current borrow wait limit
    pub fn max_wait(&self) -> Duration {
        self.core.options.read().max_wait
    }

    /// Current validation period
    pub fn validation_interval(&self) -> Duration {
        self.core.options.read().validation_interval
    }

    /// Current idle eviction threshold
    pub fn max_idle_time(&self) -> Duration {
        self.core.options.read().max_idle_time
    }

    /// Current lifetime eviction threshold
    pub fn max_life_time(&self) -> Duration {
        self.core.options.read().max_life_time
    }

    /// Whether dead connections are dropped at borrow time
    pub fn test_on_borrow(&self) -> bool {
        self.core.options.read().test_on_borrow
    }

    /// Whether dead connections are dropped at return time
    pub fn test_on_return(&self) -> bool {
        self.core.options.read().test_on_return
    }

    /// Whether connections are reset at borrow time
    pub fn reset_connections(&self) -> bool {
        self.core.options.read().reset_connections
    }

    /// Whether the pool has been initialized and not closed
    pub fn is_active(&self) -> bool {
        self.core.state() == STATE_ACTIVE
    }

    fn reschedule_validator(&self) {
        let mut slot = self.core.validator.lock();
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        if self.core.state() != STATE_ACTIVE {
            return;
        }
        *slot = spawn_validator(&self.core);
    }
}

fn spawn_validator(core: &Arc<PoolCore>) -> Option<JoinHandle<()>> {
    let period = core.options.read().validation_interval;
    if period.is_zero() {
        return None;
    }
    let weak: Weak<PoolCore> = Arc::downgrade(core);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(core) = weak.upgrade() else { break };
            if core.state() != STATE_ACTIVE {
                break;
            }
            core.run_sweep();
            core.fill_pool().await;
        }
    }))
}

impl PoolCore {
    fn state(&self) -> u8 {
        self.state.load(Ordering::SeqCst)
    }

    fn idle_queue(&self) -> Arc<IdleQueue<Entry>> {
        self.idle.read().clone()
    }

    fn total_count(&self) -> usize {
        self.registry.lock().len()
    }

    fn idle_count(&self) -> usize {
        self.idle_queue().len()
    }

    fn detach(&self, id: u64) -> Option<Instant> {
        self.registry.lock().remove(&id)
    }

    /// Close a connection on a detached task; close errors are swallowed
    fn destroy_conn(&self, mut conn: Box<dyn Connection>) {
        tokio::spawn(async move {
            if let Err(err) = conn.close().await {
                debug!("connection close failed: {err}");
            }
        });
    }

    /// The borrow state machine
    async fn acquire_entry(&self) -> Result<Entry> {
        loop {
            if self.state() != STATE_ACTIVE {
                return Err(Error::Closed);
            }
            // Let an in-flight creation finish so the checks below see
            // its outcome instead of racing it for the last slot.
            self.gate.wait_released().await;

            let (max_active, max_wait, test_on_borrow, max_life, reset) = {
                let opts = self.options.read();
                (
                    opts.max_active,
                    opts.max_wait,
                    opts.test_on_borrow,
                    opts.max_life_time,
                    opts.reset_connections,
                )
            };
            let queue = self.idle_queue();

            if queue.is_empty() && self.total_count() < max_active {
                match self.create_entry().await? {
                    Creation::Created(entry) => return Ok(entry),
                    Creation::NoCapacity => continue,
                }
            }

            let blocked = queue.is_empty();
            let wait_started = Instant::now();
            let limit = if max_wait.is_zero() {
                None
            } else {
                Some(max_wait)
            };
            match queue.pop(limit).await {
                Pop::Item(mut entry) => {
                    if blocked {
                        self.counters.record_wait(wait_started.elapsed());
                    }
                    if test_on_borrow && !entry.conn.is_alive() {
                        debug!("dropping dead connection {} on borrow", entry.id);
                        self.detach(entry.id);
                        self.destroy_conn(entry.conn);
                        match self.create_entry().await? {
                            Creation::Created(entry) => return Ok(entry),
                            Creation::NoCapacity => continue,
                        }
                    }
                    if self.life_expired(entry.id, max_life) {
                        debug!("dropping aged connection {} on borrow", entry.id);
                        self.detach(entry.id);
                        self.destroy_conn(entry.conn);
                        match self.create_entry().await? {
                            Creation::Created(entry) => return Ok(entry),
                            Creation::NoCapacity => continue,
                        }
                    }
                    if reset {
                        if let Err(err) = entry.conn.reset().await {
                            self.detach(entry.id);
                            self.destroy_conn(entry.conn);
                            return Err(err);
                        }
                    }
                    return Ok(entry);
                }
                Pop::Closed => {
                    if self.state() == STATE_ACTIVE {
                        // The queue was replaced by a resize; start over
                        // against the new one.
                        continue;
                    }
                    return Err(Error::Closed);
                }
                Pop::TimedOut => {
                    let waited = wait_started.elapsed();
                    self.counters.record_wait(waited);
                    return Err(Error::WaitTimeout { waited });
                }
            }
        }
    }

    /// Whether the entry's registration is missing or older than `max_life`
    fn life_expired(&self, id: u64, max_life: Duration) -> bool {
        match self.registry.lock().get(&id).copied() {
            Some(created_at) => {
                !max_life.is_zero()
                    && created_at
                        .checked_add(max_life)
                        .is_some_and(|deadline| deadline <= Instant::now())
            }
            // Detached behind our back (resize/close race); replace it.
            None => true,
        }
    }

    /// Create a connection through the gate
    ///
    /// The capacity check runs again under the gate: several borrowers
    /// can decide to create while the previous creation is suspended in
    /// the connector, and only those that still see room may proceed.
    async fn create_entry(&self) -> Result<Creation> {
        let guard = self.gate.acquire().await;
        if self.state() != STATE_ACTIVE {
            return Err(Error::Closed);
        }
        let max_active = self.options.read().max_active;
        if self.total_count() >= max_active {
            return Ok(Creation::NoCapacity);
        }
        match self.connector.connect(&self.connect_opts).await {
            Ok(conn) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                self.registry.lock().insert(id, Instant::now());
                drop(guard);
                debug!("created connection {id}");
                Ok(Creation::Created(Entry { id, conn }))
            }
            Err(err) => {
                drop(guard);
                Err(err)
            }
        }
    }

    /// The return state machine; never suspends
    fn return_entry(&self, entry: Entry) -> ReturnStatus {
        if self.state() != STATE_ACTIVE {
            self.destroy_conn(entry.conn);
            return ReturnStatus::PoolNotInitialized;
        }
        let created_at = match self.registry.lock().get(&entry.id).copied() {
            Some(created_at) => created_at,
            None => {
                self.destroy_conn(entry.conn);
                return ReturnStatus::NotPartOfPool;
            }
        };
        let (test_on_return, max_life) = {
            let opts = self.options.read();
            (opts.test_on_return, opts.max_life_time)
        };
        if test_on_return && !entry.conn.is_alive() {
            self.detach(entry.id);
            self.destroy_conn(entry.conn);
            return ReturnStatus::DeadConnection;
        }
        let aged = !max_life.is_zero()
            && created_at
                .checked_add(max_life)
                .is_some_and(|deadline| deadline <= Instant::now());
        if aged {
            self.detach(entry.id);
            self.destroy_conn(entry.conn);
            self.counters.record_life_closed();
            return ReturnStatus::MaxLifeTime;
        }
        match self.idle_queue().try_push(entry) {
            Push::Queued | Push::Handed => ReturnStatus::Accepted,
            Push::Full(entry) => {
                self.detach(entry.id);
                self.destroy_conn(entry.conn);
                ReturnStatus::LimitReached
            }
            Push::Closed(entry) => {
                self.detach(entry.id);
                self.destroy_conn(entry.conn);
                ReturnStatus::PoolClosed
            }
        }
    }

    /// One validation sweep over the idle queue
    fn run_sweep(&self) {
        let queue = self.idle_queue();
        let mut drained = Vec::new();
        let aborted = loop {
            match queue.try_pop() {
                TryPop::Item(entry) => drained.push(entry),
                TryPop::Empty => break false,
                TryPop::Closed => break true,
            }
        };
        if aborted {
            // The queue was closed under us (shutdown or resize); the
            // return path re-homes or destroys what we already took.
            for entry in drained {
                let status = self.return_entry(entry);
                debug!("sweep aborted, connection re-routed: {status}");
            }
            return;
        }

        let (min_active, max_idle, max_life) = {
            let opts = self.options.read();
            (opts.min_active, opts.max_idle_time, opts.max_life_time)
        };
        let mut survivors = Vec::with_capacity(drained.len());
        for entry in drained {
            if entry.conn.is_alive() {
                survivors.push(entry);
            } else {
                debug!("dropping dead idle connection {}", entry.id);
                self.detach(entry.id);
                self.destroy_conn(entry.conn);
            }
        }

        let mut count = self.total_count();
        let now = Instant::now();
        let mut push_failed = false;
        for entry in survivors {
            if push_failed {
                self.detach(entry.id);
                self.destroy_conn(entry.conn);
                continue;
            }
            let Some(created_at) = self.registry.lock().get(&entry.id).copied() else {
                self.destroy_conn(entry.conn);
                continue;
            };
            let idle_expired = !max_idle.is_zero()
                && count > min_active
                && entry
                    .conn
                    .last_used_at()
                    .checked_add(max_idle)
                    .is_some_and(|deadline| deadline <= now);
            // Idle expiry is checked first: an idle-expired connection
            // is surplus whether or not it is also aged.
            if idle_expired {
                debug!("evicting idle connection {}", entry.id);
                self.detach(entry.id);
                self.destroy_conn(entry.conn);
                count -= 1;
                self.counters.record_idle_closed();
                continue;
            }
            let life_expired = !max_life.is_zero()
                && created_at
                    .checked_add(max_life)
                    .is_some_and(|deadline| deadline <= now);
            if life_expired {
                debug!("evicting aged connection {}", entry.id);
                self.detach(entry.id);
                self.destroy_conn(entry.conn);
                count -= 1;
                self.counters.record_life_closed();
                continue;
            }
            match queue.try_push(entry) {
                Push::Queued | Push::Handed => {}
                Push::Full(entry) | Push::Closed(entry) => {
                    self.detach(entry.id);
                    self.destroy_conn(entry.conn);
                    push_failed = true;
                }
            }
        }
    }

    /// Top the pool up to `min_active`
    ///
    /// Stops on the first connector failure rather than hammering a
    /// backend that is down; the next sweep retries.
    async fn fill_pool(&self) {
        loop {
            if self.state() != STATE_ACTIVE {
                break;
            }
            {
                let opts = self.options.read();
                if self.total_count() >= opts.min_active {
                    break;
                }
            }
            if self.gate.is_held() {
                // A borrower is creating; the next sweep picks this up.
                break;
            }
            let guard = self.gate.acquire().await;
            if self.state() != STATE_ACTIVE {
                break;
            }
            let (min_active, max_active) = {
                let opts = self.options.read();
                (opts.min_active, opts.max_active)
            };
            let count = self.total_count();
            if count >= min_active || count >= max_active {
                break;
            }
            match self.connector.connect(&self.connect_opts).await {
                Ok(conn) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    self.registry.lock().insert(id, Instant::now());
                    drop(guard);
                    debug!("fill created connection {id}");
                    match self.idle_queue().try_push(Entry { id, conn }) {
                        Push::Queued | Push::Handed => {}
                        Push::Full(entry) | Push::Closed(entry) => {
                            self.detach(entry.id);
                            self.destroy_conn(entry.conn);
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!("fill: connector failed: {err}");
                    break;
                }
            }
        }
    }

    /// Swap the idle queue for one of the new capacity
    fn replace_idle_queue(&self, capacity: usize) {
        let fresh = Arc::new(IdleQueue::new(capacity));
        let old = {
            let mut slot = self.idle.write();
            std::mem::replace(&mut *slot, fresh.clone())
        };
        loop {
            match old.try_pop() {
                TryPop::Item(entry) => match fresh.try_push(entry) {
                    Push::Queued | Push::Handed => {}
                    Push::Full(entry) | Push::Closed(entry) => {
                        self.detach(entry.id);
                        self.destroy_conn(entry.conn);
                    }
                },
                TryPop::Empty | TryPop::Closed => break,
            }
        }
        // Closing the old queue releases borrowers blocked on it; they
        // restart and land on the fresh queue. A return that raced the
        // swap may have parked an entry in the old queue after our
        // drain; close() surfaces those.
        for entry in old.close() {
            match fresh.try_push(entry) {
                Push::Queued | Push::Handed => {}
                Push::Full(entry) | Push::Closed(entry) => {
                    self.detach(entry.id);
                    self.destroy_conn(entry.conn);
                }
            }
        }
        debug!("idle queue replaced (capacity={capacity})");
    }
}
