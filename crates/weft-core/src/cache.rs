//! Node result caching
//!
//! A node declared with a [`CachePolicy`] has its plain updates cached,
//! keyed by the exact input snapshot it received. Within the policy's TTL
//! the engine replays the cached update instead of invoking the action.
//! Only plain updates are cached; results that route (Commands) or dispatch
//! (Sends) always execute.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-node caching configuration
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    /// How long a cached result stays valid; `None` means forever
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted_at.elapsed() >= ttl,
            None => false,
        }
    }
}

/// Cache of node updates keyed by `(node name, input snapshot)`
#[derive(Debug, Default)]
pub struct NodeCache {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(node: &str, snapshot: &Value) -> (String, String) {
        (node.to_string(), snapshot.to_string())
    }

    /// Look up a non-expired cached update for this node and input.
    pub fn get(&self, node: &str, snapshot: &Value) -> Option<Value> {
        let key = Self::cache_key(node, snapshot);
        let mut entries = self.entries.lock().expect("node cache poisoned");
        match entries.get(&key) {
            Some(entry) if !entry.is_expired() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Record an update under this node and input.
    pub fn put(&self, node: &str, snapshot: &Value, value: Value, policy: &CachePolicy) {
        let key = Self::cache_key(node, snapshot);
        let mut entries = self.entries.lock().expect("node cache poisoned");
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl: policy.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("node cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().expect("node cache poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn caches_by_node_and_snapshot() {
        let cache = NodeCache::new();
        let policy = CachePolicy::new();
        let snapshot = json!({"input": 1});

        assert!(cache.get("n", &snapshot).is_none());
        cache.put("n", &snapshot, json!({"out": 2}), &policy);

        assert_eq!(cache.get("n", &snapshot), Some(json!({"out": 2})));
        assert!(cache.get("n", &json!({"input": 2})).is_none());
        assert!(cache.get("other", &snapshot).is_none());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = NodeCache::new();
        let policy = CachePolicy::new().with_ttl(Duration::from_millis(0));
        let snapshot = json!({});

        cache.put("n", &snapshot, json!(1), &policy);
        // zero TTL expires immediately
        assert!(cache.get("n", &snapshot).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = NodeCache::new();
        cache.put("n", &json!({}), json!(1), &CachePolicy::new());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
