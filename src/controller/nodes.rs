use std::collections::HashMap;

use parking_lot::RwLock;

/// Bookkeeping for callers that reference the shared engine by name.
///
/// An entry records only that a name requested the engine; it carries no
/// liveness of its own and must be checked together with the engine state.
pub struct NodeRegistry {
    entries: RwLock<HashMap<String, bool>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, name: &str) {
        self.entries.write().insert(name.to_string(), true);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.write().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn is_recorded(&self, name: &str) -> bool {
        self.entries.read().get(name).copied().unwrap_or(false)
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_remove() {
        let nodes = NodeRegistry::new();
        assert!(!nodes.is_recorded("a"));

        nodes.record("a");
        assert!(nodes.is_recorded("a"));
        assert!(!nodes.is_recorded("b"));

        assert!(nodes.remove("a"));
        assert!(!nodes.remove("a"));
        assert!(!nodes.is_recorded("a"));
    }

    #[test]
    fn test_clear_drops_every_entry() {
        let nodes = NodeRegistry::new();
        nodes.record("a");
        nodes.record("b");
        nodes.clear();
        assert!(!nodes.is_recorded("a"));
        assert!(!nodes.is_recorded("b"));
    }
}
