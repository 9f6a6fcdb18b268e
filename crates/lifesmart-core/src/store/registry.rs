// ── Entity registry ──
//
// Concurrent storage of the entities currently registered with the host.
// Each entity lives behind its own `watch` channel so a single entity can
// be observed without diffing snapshots; a registry-wide snapshot and a
// broadcast of changes are rebuilt on every mutation.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{broadcast, watch};

use crate::model::{Entity, EntityId, StateDelta};
use crate::stream::{EntityStream, EntityWatch, RegistrySnapshot};

const CHANGE_CHANNEL_SIZE: usize = 256;

/// A state change published to the host.
#[derive(Debug, Clone)]
pub struct StateChanged {
    pub entity_id: EntityId,
    pub entity: Arc<Entity>,
}

/// Entities registered for one integration instance, keyed by canonical id.
pub struct EntityRegistry {
    entities: DashMap<EntityId, watch::Sender<Arc<Entity>>>,
    snapshot: watch::Sender<RegistrySnapshot>,
    changes: broadcast::Sender<StateChanged>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        Self {
            entities: DashMap::new(),
            snapshot,
            changes,
        }
    }

    /// Insert or replace an entity. Returns `true` if the id was new.
    ///
    /// Replacing keeps existing per-entity subscribers attached.
    pub fn register(&self, entity: Entity) -> bool {
        let id = entity.id.clone();
        let entity = Arc::new(entity);

        let is_new = match self.entities.entry(id.clone()) {
            Entry::Occupied(slot) => {
                slot.get().send_replace(Arc::clone(&entity));
                false
            }
            Entry::Vacant(slot) => {
                let (tx, _) = watch::channel(Arc::clone(&entity));
                slot.insert(tx);
                true
            }
        };

        self.rebuild_snapshot();
        let _ = self.changes.send(StateChanged { entity_id: id, entity });
        is_new
    }

    /// Remove an entity. Its subscribers observe the end of their stream.
    pub fn unregister(&self, id: &EntityId) -> Option<Arc<Entity>> {
        let (_, slot) = self.entities.remove(id)?;
        self.rebuild_snapshot();
        let last = slot.borrow().clone();
        Some(last)
    }

    pub fn get(&self, id: &EntityId) -> Option<Arc<Entity>> {
        self.entities.get(id).map(|slot| slot.borrow().clone())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Merge `delta` into a registered entity.
    ///
    /// Returns `false` when the entity is not registered; the delta is
    /// dropped. A delta that changes nothing publishes nothing.
    pub fn apply(&self, id: &EntityId, delta: &StateDelta) -> bool {
        let updated = {
            let Some(slot) = self.entities.get(id) else {
                return false;
            };
            let mut updated = None;
            slot.send_if_modified(|current| {
                let mut next = Entity::clone(current);
                if !next.apply(delta, Utc::now()) {
                    return false;
                }
                *current = Arc::new(next);
                updated = Some(Arc::clone(current));
                true
            });
            updated
        };

        if let Some(entity) = updated {
            self.rebuild_snapshot();
            let _ = self.changes.send(StateChanged {
                entity_id: id.clone(),
                entity,
            });
        }
        true
    }

    /// Current snapshot of every registered entity (cheap `Arc` clone).
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch one entity. `None` if it is not registered.
    pub fn subscribe(&self, id: &EntityId) -> Option<EntityWatch> {
        self.entities.get(id).map(|slot| EntityStream::new(slot.subscribe()))
    }

    /// Every published change, in publication order.
    pub fn changes(&self) -> broadcast::Receiver<StateChanged> {
        self.changes.subscribe()
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Entity>> = self.entities.iter().map(|r| r.value().borrow().clone()).collect();
        values.sort_by(|a, b| a.id.cmp(&b.id));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
