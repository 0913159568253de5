use std::collections::{HashMap, HashSet};

/// Same-run memory of capture files the dispatcher has seen.
///
/// Each name maps to whether it has been delivered. Delivered names are never
/// batched again while they remain on disk. The filesystem stays the source of
/// truth across restarts; this set only covers the current process.
#[derive(Clone, Debug, Default)]
pub struct PendingSet {
    entries: HashMap<String, bool>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovered name as not yet sent. Known names are left alone.
    pub fn observe(&mut self, name: &str) {
        if !self.entries.contains_key(name) {
            self.entries.insert(name.to_string(), false);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_sent(&self, name: &str) -> bool {
        self.entries.get(name).copied().unwrap_or(false)
    }

    pub fn mark_sent(&mut self, name: &str) {
        self.entries.insert(name.to_string(), true);
    }

    /// Number of known names not yet delivered.
    pub fn unsent(&self) -> usize {
        self.entries.values().filter(|sent| !**sent).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry whose file is no longer on disk.
    ///
    /// A sent name that is still present (its deletion failed) stays recorded.
    pub fn retain_present(&mut self, on_disk: &HashSet<String>) {
        self.entries.retain(|name, _| on_disk.contains(name));
    }
}
