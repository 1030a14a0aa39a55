use std::sync::RwLock;

use indexmap::IndexMap;
use serde_json::Value;

/// Concurrency-safe key→value store used to publish "provided data" from
/// upstream agents to downstream ones (spec §3 `SharedDataBus`). Writes are
/// single-writer-per-key by construction: the coordinator only ever lets the
/// agent that declared a key in its `provided_data` publish it, so the lock
/// here only needs to protect the underlying map, not arbitrate writers.
#[derive(Default)]
pub struct SharedDataBus {
    values: RwLock<IndexMap<String, Value>>,
}

impl SharedDataBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, key: impl Into<String>, value: Value) {
        let mut guard = self.values.write().expect("shared data bus lock poisoned");
        guard.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().expect("shared data bus lock poisoned").get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.read().expect("shared data bus lock poisoned").contains_key(key)
    }

    /// True when every required key is already present on the bus — the
    /// readiness check a worker must pass before it's allowed to start
    /// (spec testable property #3).
    pub fn has_all(&self, keys: &[String]) -> bool {
        let guard = self.values.read().expect("shared data bus lock poisoned");
        keys.iter().all(|key| guard.contains_key(key))
    }

    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.values.read().expect("shared data bus lock poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_all_requires_every_key_present() {
        let bus = SharedDataBus::new();
        bus.publish("a", Value::from(1));
        assert!(!bus.has_all(&["a".to_string(), "b".to_string()]));
        bus.publish("b", Value::from(2));
        assert!(bus.has_all(&["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn empty_requirement_list_is_always_ready() {
        let bus = SharedDataBus::new();
        assert!(bus.has_all(&[]));
    }
}
