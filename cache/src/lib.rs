//! A bounded LRU cache with single-flight population.
//!
//! When several threads miss on the same key concurrently (the common case
//! under a FUSE filesystem, where the kernel dispatches `lookup`/`read`
//! calls from many threads at once), only one of them should pay the cost of
//! fetching the value; the rest should block until it's ready and then read
//! it straight out of the cache. [`LockingCache::get_or_populate`] hands the
//! first caller a [`Populate`] guard and blocks everyone else on a
//! [`parking_lot::Condvar`] until that guard is resolved.

mod lru;

use lru::Lru;
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::hash::Hash;

struct State<K, V> {
    cache: Lru<K, V>,
    pending: HashSet<K>,
}

pub struct LockingCache<K, V> {
    state: Mutex<State<K, V>>,
    condvar: Condvar,
}

/// The result of [`LockingCache::get_or_populate`]: either the value was
/// already cached, or this caller is now responsible for computing it.
pub enum Lookup<'a, K: Eq + Hash + Clone, V: Clone> {
    Hit(V),
    Miss(Populate<'a, K, V>),
}

/// Holds single-flight ownership of `key` until [`Populate::finish`] is
/// called or the guard is dropped. Dropping without finishing (an early
/// return, a propagated error, a panic) releases the key without caching
/// anything, so the next caller retries the computation from scratch.
pub struct Populate<'a, K: Eq + Hash + Clone, V: Clone> {
    cache: &'a LockingCache<K, V>,
    key: Option<K>,
}

impl<K: Eq + Hash + Clone, V: Clone> LockingCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        LockingCache {
            state: Mutex::new(State {
                cache: Lru::new(capacity),
                pending: HashSet::new(),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Non-blocking lookup: returns `None` both for "absent" and "another
    /// thread is currently populating it" without waiting. Most callers want
    /// [`get_or_populate`](Self::get_or_populate) instead; this exists for
    /// the one spec case (`path_size` over an already-fetched raw block)
    /// that wants to check the block cache without joining its single
    /// flight.
    pub fn peek(&self, key: &K) -> Option<V> {
        let mut state = self.state.lock();
        state.cache.get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        let mut state = self.state.lock();
        state.cache.insert(key, value);
        drop(state);
        self.condvar.notify_all();
    }

    /// Looks up `key`, blocking while another thread populates it. Returns
    /// either the cached value or a [`Populate`] guard for the caller to
    /// fill in.
    pub fn get_or_populate(&self, key: K) -> Lookup<'_, K, V> {
        let mut state = self.state.lock();
        loop {
            if let Some(v) = state.cache.get(&key) {
                return Lookup::Hit(v.clone());
            }
            if state.pending.contains(&key) {
                self.condvar.wait(&mut state);
                continue;
            }
            state.pending.insert(key.clone());
            return Lookup::Miss(Populate {
                cache: self,
                key: Some(key),
            });
        }
    }
}

impl<'a, K: Eq + Hash + Clone, V: Clone> Populate<'a, K, V> {
    /// Caches `value` under the held key, releases the single-flight lock,
    /// and returns `value` back to the caller for convenience.
    pub fn finish(mut self, value: V) -> V {
        let key = self.key.take().expect("finish runs at most once");
        {
            let mut state = self.cache.state.lock();
            state.cache.insert(key.clone(), value.clone());
            state.pending.remove(&key);
        }
        self.cache.condvar.notify_all();
        value
    }
}

impl<'a, K: Eq + Hash + Clone, V: Clone> Drop for Populate<'a, K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            {
                let mut state = self.cache.state.lock();
                state.pending.remove(&key);
            }
            self.cache.condvar.notify_all();
        }
    }
}
