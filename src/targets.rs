// Ordered, duplicate-free set of monitored URLs behind a mutex.
// Callers only ever see owned snapshots; the lock is never held across an await.

use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct TargetSet {
    inner: Mutex<Vec<String>>,
}

impl TargetSet {
    /// Seeds the set in order, skipping duplicates.
    pub fn new<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = Self::default();
        for t in initial {
            set.insert(t.into());
        }
        set
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        // A panic while holding this lock cannot leave the Vec half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the current targets in insertion order.
    pub fn snapshot(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Appends `target` if absent. Returns `true` when it was added.
    pub fn insert(&self, target: String) -> bool {
        let mut targets = self.lock();
        if targets.contains(&target) {
            return false;
        }
        targets.push(target);
        true
    }

    /// Removes `target` if present. Returns `true` when it was removed.
    pub fn remove(&self, target: &str) -> bool {
        let mut targets = self.lock();
        let before = targets.len();
        targets.retain(|t| t != target);
        targets.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
