//! Per-user serialization
//!
//! Concurrent deliveries for the same user run their read-compare-write
//! cycle one at a time. Entries are dropped once no holder or waiter is left.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
pub struct UserLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `user_id`
    pub async fn lock(&self, user_id: &str) -> UserLockGuard {
        let mutex = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;
        UserLockGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            user_id: user_id.to_string(),
        }
    }

    /// Number of users currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct UserLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    user_id: String,
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.user_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
