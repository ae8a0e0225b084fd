//! Expiring key/value cache for upstream data.
//!
//! The cache is an explicitly constructed instance owned by the application
//! and shared by `Rc` handle. It holds values for an optional time-to-live and
//! evicts lazily: an expired entry is removed the moment a `get` notices it,
//! there is no background sweep.
//!
//! # Entry Structure
//! - `value`: the stored value, handed out as a shared `Rc` (never deep-cloned)
//! - `expires_at`: absolute expiry in epoch milliseconds, `0` = never expires
//!
//! The host is single threaded, so storage sits behind a `RefCell`. Every
//! operation takes the one borrow for its whole check-then-act sequence.

use crate::ReferenceSet;
use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Source of the current time in epoch milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock: `Date.now()` in the browser, system time elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Clock driven by hand. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock(Rc<Cell<u64>>);

impl ManualClock {
    pub fn starting_at(now_ms: u64) -> Self {
        Self(Rc::new(Cell::new(now_ms)))
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

#[derive(Debug)]
pub struct CacheEntry<V> {
    pub value: Rc<V>,
    pub expires_at: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at != 0 && now_ms >= self.expires_at
    }
}

/// String-keyed cache with optional per-entry time-to-live.
pub struct ExpiringCache<V, C = SystemClock> {
    store: RefCell<HashMap<String, CacheEntry<V>>>,
    clock: C,
}

/// Cache holding the ranked reference list.
pub type ReferenceCache<C = SystemClock> = ExpiringCache<ReferenceSet, C>;

impl<V> ExpiringCache<V, SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<V> Default for ExpiringCache<V, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, C: Clock> ExpiringCache<V, C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            store: RefCell::new(HashMap::new()),
            clock,
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// A positive `ttl_ms` expires the entry `ttl_ms` from now; zero or a
    /// negative value keeps it until it is deleted or cleared.
    pub fn set(&self, key: &str, value: V, ttl_ms: i64) {
        self.set_shared(key, Rc::new(value), ttl_ms);
    }

    /// Like [`set`](Self::set) for a value the caller keeps a handle to.
    pub fn set_shared(&self, key: &str, value: Rc<V>, ttl_ms: i64) {
        let expires_at = if ttl_ms > 0 {
            self.clock.now_ms() + ttl_ms as u64
        } else {
            0
        };
        self.store
            .borrow_mut()
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    /// Return the live value for `key`, dropping it first if it has expired.
    pub fn get(&self, key: &str) -> Option<Rc<V>> {
        let mut store = self.store.borrow_mut();
        let now = self.clock.now_ms();
        let expired_at = match store.get(key) {
            None => return None,
            Some(entry) if !entry.is_expired(now) => return Some(Rc::clone(&entry.value)),
            Some(entry) => entry.expires_at,
        };
        debug!("Cache entry '{}' expired at {}, evicting", key, expired_at);
        store.remove(key);
        None
    }

    pub fn del(&self, key: &str) {
        self.store.borrow_mut().remove(key);
    }

    pub fn clear(&self) {
        self.store.borrow_mut().clear();
    }

    /// Whether an entry is physically stored, expired or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.store.borrow().contains_key(key)
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }
}
