//! Captured path parameters and the buffer pool they are drawn from.
//!
//! # Design Decisions
//! - One `(key, value)` pair per matched wildcard, in left-to-right path order
//! - Buffers are only drawn from the pool on the first capture of a request
//! - `PooledParams` hands its buffer back on drop, so release happens on every
//!   exit path of a request, including early returns and panics

use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError};

/// A single captured wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub key: String,
    pub value: String,
}

/// Ordered list of captured wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Value captured for the wildcard called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.key == name)
            .map(|p| p.value.as_str())
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(Param {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn pop(&mut self) -> Option<Param> {
        self.0.pop()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    fn clear(&mut self) {
        self.0.clear();
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.push(k, v);
        }
        params
    }
}

/// Shared free-list of parameter buffers.
///
/// Safe to use from any number of request tasks at once. A buffer handed out
/// by [`ParamsPool::acquire`] belongs to its caller until it is released.
#[derive(Debug)]
pub struct ParamsPool {
    free: Mutex<Vec<Params>>,
    max_idle: usize,
}

impl ParamsPool {
    /// Create a pool keeping at most `max_idle` spare buffers.
    pub fn new(max_idle: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Take an empty buffer.
    pub fn acquire(&self) -> Params {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_else(|| Params::with_capacity(4))
    }

    /// Return a buffer. Its contents are discarded.
    pub fn release(&self, mut params: Params) {
        params.clear();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(params);
        }
    }

    /// Number of spare buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for ParamsPool {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// Request-owned parameters; returns its buffer to the pool when dropped.
#[derive(Debug, Default)]
pub struct PooledParams {
    params: Option<Params>,
    pool: Option<Arc<ParamsPool>>,
}

static EMPTY: Params = Params(Vec::new());

impl PooledParams {
    pub(crate) fn new(params: Option<Params>, pool: Arc<ParamsPool>) -> Self {
        Self {
            params,
            pool: Some(pool),
        }
    }

    /// Parameters that never came from a pool, for building contexts by hand.
    pub fn detached(params: Params) -> Self {
        Self {
            params: Some(params),
            pool: None,
        }
    }
}

impl Deref for PooledParams {
    type Target = Params;

    fn deref(&self) -> &Params {
        self.params.as_ref().unwrap_or(&EMPTY)
    }
}

impl Drop for PooledParams {
    fn drop(&mut self) {
        if let (Some(params), Some(pool)) = (self.params.take(), self.pool.as_ref()) {
            pool.release(params);
        }
    }
}
