use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Concurrency-safe collection of running/finished agents plus counters
/// (spec §3 `AgentRegistry`). Scoped to a single investigation run; a fresh
/// registry is created per coordinator invocation.
#[derive(Default)]
pub struct AgentRegistry {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    names: Mutex<Vec<String>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent_name: impl Into<String>) {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.names.lock().expect("registry lock poisoned").push(agent_name.into());
    }

    pub fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn mark_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// The invariant the aggregator asserts before producing `_metadata`
    /// (spec testable property #4: `metadata.total == completed + failed`).
    pub fn is_settled(&self) -> bool {
        self.total() == self.completed() + self.failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_once_every_agent_resolves() {
        let registry = AgentRegistry::new();
        registry.register("a");
        registry.register("b");
        assert!(!registry.is_settled());
        registry.mark_completed();
        assert!(!registry.is_settled());
        registry.mark_failed();
        assert!(registry.is_settled());
        assert_eq!(registry.total(), 2);
    }
}
