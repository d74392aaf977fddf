//! Deduplicating, checkout-based work queue with delayed and rate-limited
//! re-delivery.
//!
//! ## Invariants
//! - A key is pending at most once, however many times it was added.
//! - A key checked out by `get` is never handed to a second caller before
//!   `done`. An `add` that arrives meanwhile is parked in the dirty set and
//!   replayed by `done`.
//! - A delayed key is held once, at its earliest requested ready time.
//!
//! All state sits behind one mutex. Blocked getters park on a [`Notify`]
//! and, while delayed keys exist, also on a timer for the earliest deadline;
//! expired delayed keys are promoted by whichever getter wakes first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::collections::HashSet;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus::IntGauge;
use tokio::sync::Notify;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tracing::trace;

use super::RateLimiter;

struct WaitingEntry<K> {
    ready_at: Instant,
    seq: u64,
    key: K,
}

impl<K> PartialEq for WaitingEntry<K> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.ready_at == other.ready_at && self.seq == other.seq
    }
}

impl<K> Eq for WaitingEntry<K> {}

impl<K> PartialOrd for WaitingEntry<K> {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so that `BinaryHeap` pops the earliest deadline first
impl<K> Ord for WaitingEntry<K> {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        other.ready_at.cmp(&self.ready_at).then_with(|| other.seq.cmp(&self.seq))
    }
}

struct QueueState<K> {
    /// FIFO of keys ready to be handed out
    queue: VecDeque<K>,
    /// Keys that need processing: everything in `queue` plus keys re-added while checked out
    dirty: HashSet<K>,
    /// Keys currently checked out
    processing: HashSet<K>,
    /// Delayed keys; stale heap entries are skipped by comparing with `waiting_ready_at`
    waiting: BinaryHeap<WaitingEntry<K>>,
    waiting_ready_at: HashMap<K, Instant>,
    seq: u64,
    shutting_down: bool,
}

impl<K> QueueState<K>
where K: Clone + Eq + Hash
{
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            waiting: BinaryHeap::new(),
            waiting_ready_at: HashMap::new(),
            seq: 0,
            shutting_down: false,
        }
    }

    /// Returns true when the key became newly available to a getter
    fn insert(
        &mut self,
        key: K,
    ) -> bool {
        if self.dirty.contains(&key) {
            return false;
        }
        self.dirty.insert(key.clone());
        if self.processing.contains(&key) {
            return false;
        }
        self.queue.push_back(key);
        true
    }

    fn insert_waiting(
        &mut self,
        key: K,
        ready_at: Instant,
    ) {
        if let Some(existing) = self.waiting_ready_at.get(&key) {
            if *existing <= ready_at {
                return;
            }
        }
        self.waiting_ready_at.insert(key.clone(), ready_at);
        self.seq = self.seq.wrapping_add(1);
        self.waiting.push(WaitingEntry {
            ready_at,
            seq: self.seq,
            key,
        });
    }

    /// Moves every expired delayed key into the ready queue.
    /// Returns the earliest remaining deadline.
    fn promote_expired(
        &mut self,
        now: Instant,
    ) -> Option<Instant> {
        while let Some(head) = self.waiting.peek() {
            let current = self.waiting_ready_at.get(&head.key).copied();
            if current != Some(head.ready_at) {
                // superseded by an earlier deadline for the same key
                self.waiting.pop();
                continue;
            }
            if head.ready_at > now {
                return Some(head.ready_at);
            }
            if let Some(entry) = self.waiting.pop() {
                self.waiting_ready_at.remove(&entry.key);
                self.insert(entry.key);
            }
        }
        None
    }
}

/// Work queue shared by watch handlers (producers) and pool workers (consumers).
pub struct RateLimitedQueue<K> {
    state: Mutex<QueueState<K>>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter<K>>,
    /// Mirrors `len()`; refreshed under the lock on every change to the ready queue
    depth: Option<IntGauge>,
}

impl<K> RateLimitedQueue<K>
where K: Clone + Eq + Hash + Debug + Send + Sync + 'static
{
    pub fn new(rate_limiter: Box<dyn RateLimiter<K>>) -> Self {
        Self {
            state: Mutex::new(QueueState::new()),
            notify: Notify::new(),
            rate_limiter,
            depth: None,
        }
    }

    /// Reports the number of ready keys through `gauge`.
    pub fn with_depth_gauge(
        mut self,
        gauge: IntGauge,
    ) -> Self {
        gauge.set(self.state.get_mut().queue.len() as i64);
        self.depth = Some(gauge);
        self
    }

    fn observe_depth(
        &self,
        state: &QueueState<K>,
    ) {
        if let Some(gauge) = &self.depth {
            gauge.set(state.queue.len() as i64);
        }
    }

    /// Idempotent enqueue. No-op if the key is already pending or the queue is shut down.
    pub fn add(
        &self,
        key: K,
    ) {
        let woke = {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            let woke = state.insert(key);
            self.observe_depth(&state);
            woke
        };
        if woke {
            self.notify.notify_one();
        }
    }

    /// Enqueues the key once `delay` has elapsed.
    pub fn add_after(
        &self,
        key: K,
        delay: Duration,
    ) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        {
            let mut state = self.state.lock();
            if state.shutting_down {
                return;
            }
            trace!(?key, ?delay, "delaying key");
            state.insert_waiting(key, Instant::now() + delay);
        }
        // a sleeping getter may need to shorten its timer
        self.notify.notify_one();
    }

    /// Enqueues the key after the rate limiter's backoff for it.
    pub fn add_rate_limited(
        &self,
        key: K,
    ) {
        let delay = self.rate_limiter.when(&key);
        self.add_after(key, delay);
    }

    pub fn num_requeues(
        &self,
        key: &K,
    ) -> u32 {
        self.rate_limiter.num_requeues(key)
    }

    /// Resets the key's failure history.
    pub fn forget(
        &self,
        key: &K,
    ) {
        self.rate_limiter.forget(key);
    }

    /// Waits for a key and checks it out. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<K> {
        loop {
            // Registered before inspecting state so a concurrent `shut_down`
            // (notify_waiters) cannot slip between the check and the wait.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let deadline = {
                let mut state = self.state.lock();
                if state.shutting_down {
                    return None;
                }
                let deadline = state.promote_expired(Instant::now());
                let popped = state.queue.pop_front();
                self.observe_depth(&state);
                if let Some(key) = popped {
                    state.processing.insert(key.clone());
                    state.dirty.remove(&key);
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        // pass the wakeup on
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                deadline
            };

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = sleep_until(deadline) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Releases the checkout. A key re-added while checked out becomes ready again.
    pub fn done(
        &self,
        key: &K,
    ) {
        let woke = {
            let mut state = self.state.lock();
            state.processing.remove(key);
            if state.dirty.contains(key) && !state.shutting_down {
                state.queue.push_back(key.clone());
                self.observe_depth(&state);
                true
            } else {
                false
            }
        };
        if woke {
            self.notify.notify_one();
        }
    }

    /// Stops handing out work. Keys already checked out may still call `done`.
    pub fn shut_down(&self) {
        self.state.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }

    /// Keys ready to be handed out (excludes delayed and checked-out keys)
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently checked out by a worker
    pub fn in_flight(&self) -> usize {
        self.state.lock().processing.len()
    }

    /// Keys waiting for a delay to elapse
    pub fn delayed(&self) -> usize {
        self.state.lock().waiting_ready_at.len()
    }
}
