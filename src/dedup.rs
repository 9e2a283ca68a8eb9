use std::collections::HashSet;
use std::sync::Mutex;

/// Maximum number of keys kept before the set is wiped.
const MAX_KEYS: usize = 5000;

/// Process-lifetime webhook de-duplication.
///
/// Remembers every key it has been asked about. Once the set grows past
/// [`MAX_KEYS`] it is cleared in full before the next insert — a coarse,
/// unordered bound rather than an LRU. A burst of more than `MAX_KEYS`
/// unique deliveries resets history and can readmit a very old duplicate;
/// that failure mode is accepted. State is never persisted.
pub struct DedupGuard {
    seen: Mutex<HashSet<String>>,
}

impl DedupGuard {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Returns true when `key` was already seen in this process lifetime.
    /// Otherwise records it (clearing the whole set first if over the
    /// bound) and returns false.
    pub fn check_and_record(&self, key: &str) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        if seen.contains(key) {
            return true;
        }
        if seen.len() > MAX_KEYS {
            tracing::warn!("dedup set exceeded {} keys, clearing", MAX_KEYS);
            seen.clear();
        }
        seen.insert(key.to_string());
        false
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Default for DedupGuard {
    fn default() -> Self {
        Self::new()
    }
}
