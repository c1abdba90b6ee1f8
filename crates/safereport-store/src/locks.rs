//! Process-wide named async locks.
//!
//! Two handles over the same secret (two `KeyStore`s, two `KeyringStorage`
//! values) do not share any state of their own, so creation is serialized
//! through a lock looked up by name instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tokio::sync::Mutex as AsyncMutex;

static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>> = OnceLock::new();

/// The lock registered under `name`, created on first request.
///
/// Every call with the same name returns the same lock for the lifetime of
/// the process.
pub(crate) fn named(name: &str) -> Arc<AsyncMutex<()>> {
    let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
    // A panicking holder cannot leave the map half-updated.
    let mut locks = registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    locks
        .entry(name.to_string())
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_same_lock() {
        let a = named("locks-test:a");
        let b = named("locks-test:a");
        let c = named("locks-test:c");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_held_lock_blocks_other_handle() {
        let held = named("locks-test:held");
        let _guard = held.lock().await;
        assert!(named("locks-test:held").try_lock().is_err());
    }
}
