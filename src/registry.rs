//! Per-protocol flow registry: `flow_key → flow_record`, guarded by one lock
//! covering lookup-or-insert (spec.md §5). After insertion a flow record is
//! touched only by its owning decoder task; the registry's job is routing
//! new segments to existing tasks and reaping closed ones.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::flow::FlowKey;

/// Generic per-protocol registry. `T` is whatever a capture loop needs to
/// hand a segment to its flow's decoder task — typically a small struct of
/// `mpsc::Sender` handles.
pub struct FlowRegistry<T> {
    flows: Mutex<HashMap<FlowKey, T>>,
}

impl<T: Clone> FlowRegistry<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            flows: Mutex::new(HashMap::new()),
        })
    }

    /// Look up the handle for `key`, inserting via `make` if absent. `make`
    /// runs under the registry's lock — it must not block, so it should do
    /// no more than build channels and `tokio::spawn` the decoder task.
    pub fn get_or_insert_with(&self, key: FlowKey, make: impl FnOnce() -> T) -> T {
        let mut flows = self.flows.lock();
        flows.entry(key).or_insert_with(make).clone()
    }

    /// Remove a flow's record. Called by the owning decoder task itself on
    /// teardown (EOF, idle timeout, or unreadable frame), never by a
    /// capture loop.
    pub fn remove(&self, key: FlowKey) {
        self.flows.lock().remove(&key);
    }

    pub fn len(&self) -> usize {
        self.flows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[derive(Clone)]
    struct Handle(u32);

    #[test]
    fn inserts_once_and_reuses_on_second_lookup() {
        let registry = FlowRegistry::<Handle>::new();
        let key = FlowKey::new(IpAddr::from([10, 0, 0, 1]), 1, IpAddr::from([10, 0, 0, 2]), 2);

        let mut calls = 0;
        let first = registry.get_or_insert_with(key, || {
            calls += 1;
            Handle(1)
        });
        let second = registry.get_or_insert_with(key, || {
            calls += 1;
            Handle(2)
        });

        assert_eq!(first.0, 1);
        assert_eq!(second.0, 1);
        assert_eq!(calls, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_drops_the_record() {
        let registry = FlowRegistry::<Handle>::new();
        let key = FlowKey::new(IpAddr::from([10, 0, 0, 1]), 1, IpAddr::from([10, 0, 0, 2]), 2);
        registry.get_or_insert_with(key, || Handle(1));
        registry.remove(key);
        assert!(registry.is_empty());
    }
}
