use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// In-process mutual exclusion keyed by string, e.g. `name:<db>` and `user:<login>`.
/// Entries are pruned once no guard or waiter references them.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    table: LockTable,
}

/// Holds every requested key until dropped
pub struct KeyGuard {
    guards: Vec<OwnedMutexGuard<()>>,
    keys: Vec<String>,
    table: LockTable,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire all keys. Keys are sorted and deduplicated first so concurrent
    /// callers always lock in the same order.
    pub async fn acquire<I, S>(&self, keys: I) -> KeyGuard
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            let lock = {
                let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
                table.entry(key.clone()).or_default().clone()
            };
            guards.push(lock.lock_owned().await);
        }

        KeyGuard {
            guards,
            keys,
            table: self.table.clone(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guards.clear();
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        for key in &self.keys {
            // Only the table itself still holds the mutex: nobody is waiting
            if table.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                table.remove(key);
            }
        }
    }
}

/// Lock key for a database name (names are unique across flavours)
pub fn name_key(name: &str) -> String {
    format!("name:{name}")
}

/// Lock key for a database login
pub fn user_key(user: &str) -> String {
    format!("user:{user}")
}
