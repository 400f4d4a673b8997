//! Collapses concurrent invocations for the same key into a single execution.
//!
//! When many callers concurrently request the same expensive work (identified by a key),
//! exactly one of them - the **leader** - performs the work while all others wait and receive
//! a clone of the leader's result. As soon as the work has completed, the key is forgotten:
//! a later invocation starts a fresh execution.
//!
//! This primitive exists to protect a data source from a thundering herd: without it, a cache
//! miss on a hot key would translate each concurrent lookup into its own upstream fetch.
//!
//! Note what this deliberately does **not** provide: per-caller cancellation or deadlines.
//! Once a caller has joined an execution, it shares the leader's fate. Callers which require
//! timeouts must enforce them inside the work itself. However, if the leader itself is
//! cancelled (its future is dropped), one of the waiting callers takes over and performs the
//! work in its stead, so no caller is ever stranded.
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, OnceLock};

use event_listener::Event;
use parking_lot::Mutex;

/// The result slot and wake-up event shared between a leader and its waiters.
///
/// The slot is written exactly once by the leader. Waiters keep the allocation alive until the
/// last of them has read the result, even though the pending map has long forgotten the key.
struct Shared<T> {
    result: OnceLock<T>,
    done: Event,
}

impl<T> Shared<T> {
    fn new() -> Self {
        Shared {
            result: OnceLock::new(),
            done: Event::new(),
        }
    }
}

/// Removes the pending entry and wakes all waiters once the leader is done - no matter how.
///
/// The guard covers every exit path of the leader: regular completion, a panic inside the
/// work and cancellation of the leader's future. Waiters which are woken without finding a
/// result know that the leader is gone and re-enter the protocol.
struct LeaderGuard<'a, K: Hash + Eq, T> {
    pending: &'a Mutex<HashMap<K, Arc<Shared<T>>>>,
    key: &'a K,
    shared: &'a Arc<Shared<T>>,
}

impl<K: Hash + Eq, T> Drop for LeaderGuard<'_, K, T> {
    fn drop(&mut self) {
        {
            let mut pending = self.pending.lock();
            // Only remove the entry if it still belongs to this execution. A successor might
            // already have published a new one for the same key.
            if pending
                .get(self.key)
                .map(|current| Arc::ptr_eq(current, self.shared))
                .unwrap_or(false)
            {
                let _ = pending.remove(self.key);
            }
        }

        let _ = self.shared.done.notify(usize::MAX);
    }
}

/// Suppresses duplicate concurrent executions per key.
///
/// For every distinct key, at most one execution is in flight at any instant. All callers
/// which join while that execution is running receive a clone of its result.
///
/// # Examples
/// ```
/// # use ganymede::singleflight::Singleflight;
/// # use std::sync::atomic::{AtomicUsize, Ordering};
/// # use std::time::Duration;
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let flight: Singleflight<String, u64> = Singleflight::new();
///     let invocations = AtomicUsize::new(0);
///
///     let expensive = || async {
///         let _ = invocations.fetch_add(1, Ordering::SeqCst);
///         tokio::time::sleep(Duration::from_millis(10)).await;
///         42
///     };
///
///     // Three concurrent callers for the same key...
///     let (a, b, c) = tokio::join!(
///         flight.execute("answer".to_owned(), expensive),
///         flight.execute("answer".to_owned(), expensive),
///         flight.execute("answer".to_owned(), expensive),
///     );
///
///     // ...share a single execution and all observe its result.
///     assert_eq!((a, b, c), (42, 42, 42));
///     assert_eq!(invocations.load(Ordering::SeqCst), 1);
/// }
/// ```
pub struct Singleflight<K, T> {
    pending: Mutex<HashMap<K, Arc<Shared<T>>>>,
}

impl<K, T> Default for Singleflight<K, T> {
    fn default() -> Self {
        Singleflight {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> Singleflight<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Creates a new duplicate suppression group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Executes the given work for the given key, suppressing duplicates.
    ///
    /// If no execution for the key is currently in flight, the caller becomes the leader and
    /// runs **func**. Otherwise the caller waits for the in-flight execution and receives a
    /// clone of its result. The key is forgotten before any caller returns, so a subsequent
    /// call starts a fresh execution.
    ///
    /// If the leader's future is dropped before the work completes, one of the waiting
    /// callers takes over as the new leader and runs its own copy of **func**.
    pub async fn execute<F, Fut>(&self, key: K, func: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut func = Some(func);

        loop {
            let (shared, is_leader) = {
                let mut pending = self.pending.lock();
                match pending.get(&key) {
                    Some(shared) => (Arc::clone(shared), false),
                    None => {
                        let shared = Arc::new(Shared::new());
                        let _ = pending.insert(key.clone(), Arc::clone(&shared));
                        (shared, true)
                    }
                }
            };

            if is_leader {
                let guard = LeaderGuard {
                    pending: &self.pending,
                    key: &key,
                    shared: &shared,
                };

                let func = func
                    .take()
                    .expect("A singleflight execution claimed leadership twice!");
                let value = func().await;
                let _ = shared.result.set(value.clone());

                // Unpublishes the key and wakes all waiters...
                drop(guard);

                return value;
            }

            if let Some(value) = self.wait(&shared).await {
                return value;
            }

            // The leader vanished without publishing a result - retry (and possibly lead)...
        }
    }

    /// Waits until the leader owning **shared** has finished and returns its result.
    ///
    /// Returns **None** if the leader disappeared without publishing a result.
    async fn wait(&self, shared: &Arc<Shared<T>>) -> Option<T> {
        if let Some(value) = shared.result.get() {
            return Some(value.clone());
        }

        // Register before re-checking, otherwise a wake-up could slip through between
        // the check and the registration...
        let listener = shared.done.listen();

        if let Some(value) = shared.result.get() {
            return Some(value.clone());
        }

        listener.await;

        // Being woken without a result means that the leader is gone for good, as the
        // wake-up only happens once its guard has been dropped...
        shared.result.get().cloned()
    }
}
