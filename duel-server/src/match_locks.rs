use std::sync::Arc;

use dashmap::DashMap;
use duel_types::MatchId;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// One async mutex per match id. Callers for the same match queue up;
/// callers for different matches never touch the same lock.
#[derive(Default)]
pub struct MatchLocks {
    locks: DashMap<MatchId, Arc<Mutex<()>>>,
}

impl MatchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `match_id`. Released when the guard drops.
    pub async fn acquire(&self, match_id: MatchId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is not held across the await
        let lock = self
            .locks
            .entry(match_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    /// Drop entries nobody is holding or waiting on.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let pruned = before.saturating_sub(self.locks.len());

        if pruned > 0 {
            debug!("Pruned {} idle match locks", pruned);
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
