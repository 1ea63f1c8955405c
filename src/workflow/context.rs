//! The orchestrator's live mapping of in-flight run handles.

use crate::backend::RunHandle;
use std::fmt;
use std::sync::Arc;

/// Insertion-ordered mapping from entry-point key to the run handle of its
/// currently in-flight, not-yet-waited-on submission.
///
/// The context is mutated only by the single orchestrating task; a handle is
/// removed the first time something waits on it, so no handle is ever waited
/// on twice.
#[derive(Default)]
pub struct RuntimeContext {
    entries: Vec<(String, Arc<dyn RunHandle>)>,
}

impl RuntimeContext {
    /// Creates an empty runtime context.
    #[must_use]
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Tracks a newly submitted handle under its entry-point key.
    pub fn insert(&mut self, key: impl Into<String>, handle: Arc<dyn RunHandle>) {
        self.entries.push((key.into(), handle));
    }

    /// Returns true if a handle is still outstanding for the key.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Returns the outstanding handle for a key, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Arc<dyn RunHandle>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, h)| h)
    }

    /// Removes and returns the outstanding handle for a key, if any.
    pub fn remove(&mut self, key: &str) -> Option<Arc<dyn RunHandle>> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Removes and returns the oldest outstanding submission.
    pub fn pop_front(&mut self) -> Option<(String, Arc<dyn RunHandle>)> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Iterates the outstanding keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the number of outstanding submissions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no submissions are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRunHandle;

    fn handle(id: &str) -> Arc<dyn RunHandle> {
        Arc::new(MockRunHandle::succeeding(id))
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut ctx = RuntimeContext::new();
        ctx.insert("b", handle("1"));
        ctx.insert("a", handle("2"));
        ctx.insert("c", handle("3"));

        let keys: Vec<&str> = ctx.keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);

        assert_eq!(ctx.pop_front().map(|(k, _)| k), Some("b".to_string()));
        assert_eq!(ctx.pop_front().map(|(k, _)| k), Some("a".to_string()));
    }

    #[test]
    fn test_remove_by_key() {
        let mut ctx = RuntimeContext::new();
        ctx.insert("a", handle("1"));

        assert!(ctx.contains("a"));
        assert!(ctx.remove("a").is_some());
        assert!(!ctx.contains("a"));
        assert!(ctx.remove("a").is_none());
    }
}
