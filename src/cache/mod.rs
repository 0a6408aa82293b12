//! Generic refresh-ahead memoization for slow, periodically-changing lookups.
//!
//! [`RefreshingCache`] wraps a single-argument delegate function with:
//!
//! - bounded capacity (least-recently-accessed eviction)
//! - access expiry (entries unread for a duration are dropped)
//! - refresh-ahead: an entry older than the refresh period is recomputed on
//!   a background worker pool while readers keep receiving the previous
//!   value; the new value becomes visible only once the recomputation
//!   succeeds
//! - listener registration: observers are told `(key, old, new)` after each
//!   successful refresh, on the refresh-completion thread
//!
//! Failure policy: a delegate error on a *cold* load propagates
//! synchronously to every caller collapsed onto that load; a delegate error
//! during a *background* refresh is logged and the stale value is retained.
//!
//! Concurrent readers of the same missing key collapse into a single
//! delegate invocation (pending-slot + condvar), and refreshes are
//! serialized per key through an in-flight set.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Boxed error type returned by cache delegates
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Delegate signature wrapped by the cache
pub type Loader<K, V> = Box<dyn Fn(&K) -> Result<V, BoxError> + Send + Sync>;

/// Observer invoked after a successful background refresh
pub type RefreshListener<K, V> = Box<dyn Fn(&K, &Arc<V>, &Arc<V>) + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The delegate failed on a cold load. The original error is shared so
    /// that every collapsed waiter receives it; callers may `downcast_ref`
    /// to recover the delegate's own error type.
    #[error("cache load failed: {0}")]
    Load(Arc<dyn std::error::Error + Send + Sync + 'static>),
}

impl CacheError {
    pub fn delegate_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        match self {
            Self::Load(e) => e.as_ref(),
        }
    }
}

/// Counters exposed for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub refresh_failures: u64,
}

/// Deserializable cache tuning shared by the resolvers and pipeline stages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    /// Refresh-ahead period in seconds; `None` disables refresh
    pub refresh_secs: Option<u64>,
    /// Access expiry in seconds; `None` disables expiry
    pub expire_secs: Option<u64>,
    pub workers: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            refresh_secs: Some(24 * 3600),
            expire_secs: Some(7 * 24 * 3600),
            workers: 1,
        }
    }
}

impl CacheSettings {
    pub fn builder(&self, name: impl Into<String>) -> CacheBuilder {
        let mut builder = CacheBuilder::new(name)
            .capacity(self.capacity)
            .workers(self.workers);
        if let Some(secs) = self.refresh_secs {
            builder = builder.refresh_after_write(Duration::from_secs(secs));
        }
        if let Some(secs) = self.expire_secs {
            builder = builder.expire_after_access(Duration::from_secs(secs));
        }
        builder
    }
}

/// Builder for [`RefreshingCache`]
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    name: String,
    capacity: usize,
    expire_after_access: Option<Duration>,
    refresh_after_write: Option<Duration>,
    workers: usize,
}

impl CacheBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: 10_000,
            expire_after_access: None,
            refresh_after_write: None,
            workers: 1,
        }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn expire_after_access(mut self, duration: Duration) -> Self {
        self.expire_after_access = Some(duration);
        self
    }

    pub fn refresh_after_write(mut self, period: Duration) -> Self {
        self.refresh_after_write = Some(period);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn build<K, V>(self, loader: Loader<K, V>) -> RefreshingCache<K, V>
    where
        K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<K>();
        let inner = Arc::new(Inner {
            name: self.name,
            capacity: self.capacity,
            expire_after_access: self.expire_after_access,
            refresh_after_write: self.refresh_after_write,
            slots: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            listeners: RwLock::new(Vec::new()),
            loader,
            tx,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
        });

        for worker_id in 0..self.workers {
            spawn_refresh_worker(worker_id, Arc::downgrade(&inner), rx.clone());
        }

        RefreshingCache { inner }
    }
}

struct Entry<V> {
    value: Arc<V>,
    written: Instant,
    accessed: Instant,
}

/// A load in progress; waiters block on the condvar until `done` is filled
struct PendingLoad<V> {
    done: Mutex<Option<Result<Arc<V>, CacheError>>>,
    cv: Condvar,
}

enum Slot<V> {
    Ready(Entry<V>),
    Pending(Arc<PendingLoad<V>>),
}

struct Inner<K, V> {
    name: String,
    capacity: usize,
    expire_after_access: Option<Duration>,
    refresh_after_write: Option<Duration>,
    slots: Mutex<HashMap<K, Slot<V>>>,
    in_flight: Mutex<HashSet<K>>,
    listeners: RwLock<Vec<RefreshListener<K, V>>>,
    loader: Loader<K, V>,
    tx: Sender<K>,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
}

/// Memoizing wrapper around a `K -> Result<V, _>` delegate. Cheap to clone;
/// clones share the same entries, listeners, and worker pool.
pub struct RefreshingCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for RefreshingCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> RefreshingCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Look up `key`, loading through the delegate on a miss.
    ///
    /// A hit on an entry older than the refresh period returns the current
    /// value immediately and schedules an asynchronous recomputation.
    ///
    /// # Errors
    ///
    /// Propagates the delegate's error only for cold loads; background
    /// refresh failures never surface here.
    pub fn get(&self, key: &K) -> Result<Arc<V>, CacheError> {
        enum Probe<V> {
            Hit { value: Arc<V>, stale: bool },
            Expired,
            Wait(Arc<PendingLoad<V>>),
            Miss,
        }

        let inner = &self.inner;
        let pending: Arc<PendingLoad<V>>;
        {
            let mut slots = inner.slots.lock();
            let probe = match slots.get_mut(key) {
                Some(Slot::Ready(entry)) if !inner.is_access_expired(entry) => {
                    entry.accessed = Instant::now();
                    Probe::Hit {
                        value: Arc::clone(&entry.value),
                        stale: inner
                            .refresh_after_write
                            .is_some_and(|p| entry.written.elapsed() >= p),
                    }
                }
                Some(Slot::Ready(_)) => Probe::Expired,
                Some(Slot::Pending(p)) => Probe::Wait(Arc::clone(p)),
                None => Probe::Miss,
            };

            match probe {
                Probe::Hit { value, stale } => {
                    inner.hits.fetch_add(1, Ordering::Relaxed);
                    if stale {
                        inner.schedule_refresh(key);
                    }
                    return Ok(value);
                }
                Probe::Wait(p) => {
                    drop(slots);
                    return wait_for_pending(&p);
                }
                Probe::Expired => {
                    // Unread past the access expiry; reload cold
                    slots.remove(key);
                }
                Probe::Miss => {}
            }

            // Cold load: claim the slot before releasing the lock so every
            // concurrent miss collapses onto this computation
            pending = Arc::new(PendingLoad {
                done: Mutex::new(None),
                cv: Condvar::new(),
            });
            slots.insert(key.clone(), Slot::Pending(Arc::clone(&pending)));
            inner.misses.fetch_add(1, Ordering::Relaxed);
        }

        let result = (inner.loader)(key)
            .map(Arc::new)
            .map_err(|e| CacheError::Load(Arc::from(e)));

        {
            let mut slots = inner.slots.lock();
            match &result {
                Ok(value) => {
                    let now = Instant::now();
                    slots.insert(
                        key.clone(),
                        Slot::Ready(Entry {
                            value: Arc::clone(value),
                            written: now,
                            accessed: now,
                        }),
                    );
                    inner.evict_excess(&mut slots, key);
                }
                Err(_) => {
                    // Errors are not cached; the next caller retries
                    slots.remove(key);
                }
            }
        }

        let mut done = pending.done.lock();
        *done = Some(result.clone());
        pending.cv.notify_all();
        drop(done);

        result
    }

    /// Register an observer for successful background refreshes
    pub fn add_listener(&self, listener: RefreshListener<K, V>) {
        self.inner.listeners.write().push(listener);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            refreshes: self.inner.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.inner.refresh_failures.load(Ordering::Relaxed),
        }
    }

    /// Number of resident entries (ready or loading)
    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn wait_for_pending<V>(pending: &PendingLoad<V>) -> Result<Arc<V>, CacheError> {
    let mut done = pending.done.lock();
    while done.is_none() {
        pending.cv.wait(&mut done);
    }
    // Filled exactly once before notify_all
    done.clone().expect("pending load resolved")
}

impl<K, V> Inner<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn is_access_expired(&self, entry: &Entry<V>) -> bool {
        self.expire_after_access
            .is_some_and(|d| entry.accessed.elapsed() >= d)
    }

    /// Queue a background refresh unless one is already in flight for `key`
    fn schedule_refresh(&self, key: &K) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.insert(key.clone()) {
            debug!(cache = %self.name, key = ?key, "scheduling background refresh");
            // Send can only fail if all workers exited, i.e. during teardown
            let _ = self.tx.send(key.clone());
        }
    }

    /// Evict least-recently-accessed ready entries beyond capacity,
    /// never evicting `protect` (the entry just inserted)
    fn evict_excess(&self, slots: &mut HashMap<K, Slot<V>>, protect: &K) {
        while slots.len() > self.capacity {
            let victim = slots
                .iter()
                .filter_map(|(k, slot)| match slot {
                    Slot::Ready(e) if k != protect => Some((k.clone(), e.accessed)),
                    _ => None,
                })
                .min_by_key(|(_, accessed)| *accessed)
                .map(|(k, _)| k);
            match victim {
                Some(k) => {
                    debug!(cache = %self.name, key = ?k, "evicting entry over capacity");
                    slots.remove(&k);
                }
                None => break,
            }
        }
    }

    fn run_refresh(&self, key: &K) {
        let result = (self.loader)(key);
        let notify: Option<(Arc<V>, Arc<V>)>;
        {
            let mut slots = self.slots.lock();
            match result {
                Ok(value) => {
                    let new_value = Arc::new(value);
                    match slots.get_mut(key) {
                        Some(Slot::Ready(entry)) => {
                            let old = std::mem::replace(&mut entry.value, Arc::clone(&new_value));
                            entry.written = Instant::now();
                            notify = Some((old, new_value));
                        }
                        // Evicted (or replaced by a pending load) while the
                        // refresh ran; discard the computed value
                        _ => notify = None,
                    }
                    self.refreshes.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    // Stale value retained; readers are never failed here
                    warn!(cache = %self.name, key = ?key, error = %e,
                          "background refresh failed, keeping stale value");
                    self.refresh_failures.fetch_add(1, Ordering::Relaxed);
                    notify = None;
                }
            }
            self.in_flight.lock().remove(key);
        }

        if let Some((old, new)) = notify {
            for listener in self.listeners.read().iter() {
                listener(key, &old, &new);
            }
        }
    }
}

fn spawn_refresh_worker<K, V>(worker_id: usize, inner: Weak<Inner<K, V>>, rx: Receiver<K>)
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    std::thread::Builder::new()
        .name(format!("cache-refresh-{worker_id}"))
        .spawn(move || {
            while let Ok(key) = rx.recv() {
                let Some(inner) = inner.upgrade() else { break };
                inner.run_refresh(&key);
            }
        })
        .expect("failed to spawn cache refresh worker");
}
