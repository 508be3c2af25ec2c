//! Memoization of finished translations, keyed by exact prompt text.
//!
//! Only successful results are stored; failures are never memoized, so a
//! transient collaborator problem cannot poison later requests.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use crate::query::StructuredQuery;

/// Pluggable result cache so tests and callers that want fresh answers can
/// substitute a no-op.
pub trait ResultCache: Send + Sync {
    fn get(&self, prompt: &str) -> Option<StructuredQuery>;
    fn put(&self, prompt: &str, result: StructuredQuery);
}

/// Bounded cache with least-recently-used eviction.
pub struct LruResultCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<String, StructuredQuery>,
    /// Keys ordered oldest-first; a key appears at most once.
    order: VecDeque<String>,
}

impl LruResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.lock() {
            Ok(inner) => inner.map.len(),
            Err(poisoned) => poisoned.into_inner().map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Inner {
    fn touch(&mut self, prompt: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == prompt) {
            if let Some(key) = self.order.remove(pos) {
                self.order.push_back(key);
            }
        }
    }
}

impl ResultCache for LruResultCache {
    fn get(&self, prompt: &str) -> Option<StructuredQuery> {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        let hit = inner.map.get(prompt).cloned();
        if hit.is_some() {
            inner.touch(prompt);
            debug!(prompt, "translation cache hit");
        }
        hit
    }

    fn put(&self, prompt: &str, result: StructuredQuery) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.map.insert(prompt.to_string(), result).is_some() {
            inner.touch(prompt);
            return;
        }
        inner.order.push_back(prompt.to_string());
        if inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
                debug!(prompt = %evicted, "evicted least recently used translation");
            }
        }
    }
}

/// Cache that remembers nothing.
pub struct NoopResultCache;

impl ResultCache for NoopResultCache {
    fn get(&self, _prompt: &str) -> Option<StructuredQuery> {
        None
    }

    fn put(&self, _prompt: &str, _result: StructuredQuery) {}
}
