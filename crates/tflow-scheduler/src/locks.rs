//! Per-entity write serialization.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use tflow_core::EntityId;

/// One async mutex per entity, created on first use.
///
/// Held across the gateway call and the writes for that entity, so two
/// cadences never interleave updates to the same entity.
#[derive(Debug, Default)]
pub struct EntityLocks {
    locks: DashMap<EntityId, Arc<Mutex<()>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: EntityId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the map shard is not held while waiting.
        let lock = self.locks.entry(id).or_default().clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_entity_waits_other_entity_does_not() {
        let locks = Arc::new(EntityLocks::new());
        let held = locks.lock(EntityId::new(1)).await;

        // A different entity is independent.
        let _other = tokio::time::timeout(Duration::from_millis(50), locks.lock(EntityId::new(2)))
            .await
            .expect("other entity should lock immediately");

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(EntityId::new(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 2);
    }
}
