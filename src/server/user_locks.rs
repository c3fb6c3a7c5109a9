use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-user async mutexes serializing read-validate-write sequences on a
/// user's tag graph.
///
/// Contention is partitioned by user id; two users never wait on each other.
/// Entries are never pruned: the table holds one mutex per user that has ever
/// taken a lock, so it is bounded by the number of users.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<i32, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `user_id`'s graph. The guard releases the
    /// lock when dropped.
    pub async fn lock(&self, user_id: i32) -> OwnedMutexGuard<()> {
        // The DashMap shard guard must be released before awaiting.
        let mutex = Arc::clone(&self.locks.entry(user_id).or_default());
        mutex.lock_owned().await
    }
}
