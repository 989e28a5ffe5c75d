// crates/framepress-resolver/src/singleflight.rs
// ============================================================================
// Module: Single-Flight Lock Registry
// Description: Process-wide per-key mutexes for template acquisition.
// Purpose: Ensure at most one download+extract per template key.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The registry maps `{code}:{version}:{checksum}` lock keys to per-key
//! mutexes. Lookup takes a read lock on the map; only a miss takes the
//! write lock, re-checking before inserting.
//! Invariants:
//! - Entries are never removed; the map is bounded by the number of
//!   distinct keys seen by the process.
//! - The registry is lazily initialized and never cleared.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::sync::RwLock;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Process-wide lock registry.
static KEY_LOCKS: OnceLock<RwLock<HashMap<String, Arc<Mutex<()>>>>> = OnceLock::new();

/// Returns the single-flight mutex for a lock key, creating it on first use.
#[must_use]
pub fn key_lock(lock_key: &str) -> Arc<Mutex<()>> {
    let registry = KEY_LOCKS.get_or_init(|| RwLock::new(HashMap::new()));
    {
        let map = registry.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = map.get(lock_key) {
            return Arc::clone(lock);
        }
    }
    let mut map = registry.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(lock_key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    /// Tests repeated lookups return the same mutex.
    #[test]
    fn same_key_returns_same_mutex() {
        let first = key_lock("tpl:0.0.1:aaaa");
        let second = key_lock("tpl:0.0.1:aaaa");
        assert!(Arc::ptr_eq(&first, &second));
    }

    /// Tests distinct keys get independent mutexes.
    #[test]
    fn distinct_keys_get_independent_mutexes() {
        let first = key_lock("tpl:0.0.1:aaaa");
        let other = key_lock("tpl:0.0.2:aaaa");
        assert!(!Arc::ptr_eq(&first, &other));
        // Holding one key must not block the other.
        let _held = first.lock().expect("lock");
        let handle = thread::spawn(move || {
            let _other = other.lock().expect("other lock");
        });
        handle.join().expect("join");
    }

    /// Tests concurrent first lookups converge on one mutex.
    #[test]
    fn racing_lookups_converge() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| key_lock("tpl:9.9.9:race")))
            .collect();
        let locks: Vec<_> = handles.into_iter().map(|h| h.join().expect("join")).collect();
        for lock in &locks[1..] {
            assert!(Arc::ptr_eq(&locks[0], lock));
        }
    }
}
