use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);
const JITTER_FRAC: f32 = 0.5;

struct QueueState<T> {
    queue: VecDeque<T>,
    dirty: HashSet<T>,
    processing: HashSet<T>,
    shutting_down: bool,
}

struct Inner<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

/// Deduplicating FIFO of pending reconciliation work.
///
/// An item is at most once in the pending set: re-adding an identity that
/// is already pending collapses to one delivery. Re-adding while the item
/// is in flight does not deliver it a second time concurrently; it is
/// re-queued when `done` is called. `get` parks the worker until work
/// arrives or the queue shuts down.
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                notify: Notify::new(),
            }),
        }
    }

    pub fn add(&self, item: T) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.shutting_down {
            return;
        }
        if !state.dirty.insert(item.clone()) {
            return;
        }
        if state.processing.contains(&item) {
            // re-queued by done() once the in-flight run finishes
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Delayed admission, used to debounce bursts of creation events.
    pub fn add_after(&self, item: T, delay: Duration) {
        if delay.is_zero() {
            self.add(item);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(item);
        });
    }

    /// Next pending item, or None once the queue has shut down. The item
    /// is moved to the in-flight set until `done` is called for it.
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
                if state.shutting_down {
                    drop(state);
                    // chain the wakeup so every parked worker drains
                    self.inner.notify.notify_one();
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn done(&self, item: &T) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.processing.remove(item);
        if state.dirty.contains(item) && !state.shutting_down {
            state.queue.push_back(item.clone());
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Unblocks every parked `get` with the shutdown signal. Items still
    /// pending are dropped; callers are expected to drain first.
    pub fn shut_down(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.shutting_down = true;
        drop(state);
        self.inner.notify.notify_waiters();
        // covers a waiter that checked state but had not yet parked
        self.inner.notify.notify_one();
    }

    pub fn len(&self) -> usize {
        let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-item exponential backoff with jitter, governing how fast a
/// chronically-failing item is retried. The caller owns the accounting:
/// `delay` on failure, `forget` on success.
pub struct ItemBackoff<T> {
    failures: Mutex<HashMap<T, u32>>,
    base: Duration,
    max: Duration,
}

impl<T> Default for ItemBackoff<T>
where
    T: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new(BACKOFF_BASE, BACKOFF_MAX)
    }
}

impl<T> ItemBackoff<T>
where
    T: Clone + Eq + Hash,
{
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            base,
            max,
        }
    }

    /// Record one more failure and return how long to wait before the
    /// next attempt: base * 2^(n-1), capped, with +/- 50% jitter.
    pub fn delay(&self, item: &T) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let n = failures.entry(item.clone()).or_insert(0);
        *n += 1;
        let exp = self
            .base
            .saturating_mul(1u32 << (*n - 1).min(16))
            .min(self.max);
        jitter(exp, JITTER_FRAC)
    }

    pub fn forget(&self, item: &T) {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.remove(item);
    }

    pub fn failure_count(&self, item: &T) -> u32 {
        let failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        failures.get(item).copied().unwrap_or(0)
    }
}

fn jitter(d: Duration, frac: f32) -> Duration {
    let ms = d.as_millis() as i64;
    let delta = (ms as f32 * frac) as i64;
    if delta == 0 {
        return d;
    }
    let j = rand::random_range(-delta..=delta);
    Duration::from_millis((ms + j).max(0) as u64)
}
