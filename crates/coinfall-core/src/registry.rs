//! Registry of live currency entities
//!
//! Maps each currency entity to its [`CurrencyRecord`]. Iteration follows
//! registration order, which is also the stacking tie-break: the first
//! entity of a neighbourhood becomes the merge target.
//!
//! The table lock is never held while calling into the world or the label
//! tracker.

use crate::{
    CurrencyRecord, CurrencySource, EntityId, Error, LabelTracker, Millis, Result, TimeSource,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Live currency entities and their spawn records
pub struct CurrencyRegistry {
    records: RwLock<IndexMap<EntityId, CurrencyRecord>>,
    labels: Arc<LabelTracker>,
    clock: Arc<dyn TimeSource>,
}

/// Outcome of merging entities into a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absorbed {
    /// Target amount after the merge
    pub total: u32,
    /// Entities whose records were actually removed
    pub entities: Vec<EntityId>,
}

impl CurrencyRegistry {
    pub fn new(labels: Arc<LabelTracker>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            records: RwLock::new(IndexMap::new()),
            labels,
            clock,
        }
    }

    /// Track a freshly spawned currency entity and give it a label
    ///
    /// Registering an already tracked entity resets its spawn time.
    pub fn register(&self, entity: EntityId, amount: u32, source: CurrencySource) -> Result<()> {
        if amount == 0 {
            return Err(Error::InvalidAmount(amount));
        }
        let record = CurrencyRecord::new(self.clock.now_millis(), amount, source);
        let previous = self.records.write().insert(entity, record);
        if previous.is_some() {
            debug!(%entity, "Currency entity re-registered");
        }

        if let Err(e) = self.labels.create(entity, amount) {
            debug!(%entity, error = %e, "Could not create label");
        }
        Ok(())
    }

    /// Stop tracking an entity and drop its label; returns whether it was tracked
    pub fn unregister(&self, entity: EntityId) -> bool {
        self.take(entity).is_some()
    }

    /// Stop tracking an entity, handing back its record
    pub fn take(&self, entity: EntityId) -> Option<CurrencyRecord> {
        let record = self.records.write().shift_remove(&entity);
        self.labels.remove(entity);
        record
    }

    pub fn get(&self, entity: EntityId) -> Option<CurrencyRecord> {
        self.records.read().get(&entity).cloned()
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.records.read().contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Copy of up to `limit` records in registration order
    pub fn snapshot(&self, limit: usize) -> Vec<(EntityId, CurrencyRecord)> {
        self.records
            .read()
            .iter()
            .take(limit)
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    /// Up to `limit` records, in order, that pass `filter`
    pub fn scan<F>(&self, limit: usize, mut filter: F) -> Vec<(EntityId, CurrencyRecord)>
    where
        F: FnMut(EntityId, &CurrencyRecord) -> bool,
    {
        self.records
            .read()
            .iter()
            .filter(|(id, record)| filter(**id, *record))
            .take(limit)
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    /// Remove every record older than `max_age` at `now`
    ///
    /// Labels of the removed entities are dropped; removing the entities
    /// from the world is left to the caller.
    pub fn drain_expired(&self, now: Millis, max_age: Millis) -> Vec<EntityId> {
        let mut expired = Vec::new();
        self.records.write().retain(|id, record| {
            let keep = record.age(now) <= max_age;
            if !keep {
                expired.push(*id);
            }
            keep
        });
        for entity in &expired {
            self.labels.remove(*entity);
        }
        expired
    }

    /// Fold the amounts of `sources` into `target`
    ///
    /// Sources no longer tracked are skipped and contribute nothing, so the
    /// total is always conserved. Returns `None` if the target itself is gone.
    pub fn absorb(&self, target: EntityId, sources: &[EntityId]) -> Option<Absorbed> {
        let absorbed = {
            let mut records = self.records.write();
            if !records.contains_key(&target) {
                return None;
            }
            let mut gained: u32 = 0;
            let mut entities = Vec::with_capacity(sources.len());
            for source in sources.iter().filter(|s| **s != target) {
                if let Some(record) = records.shift_remove(source) {
                    gained = gained.saturating_add(record.amount);
                    entities.push(*source);
                }
            }
            let record = records.get_mut(&target)?;
            record.amount = record.amount.saturating_add(gained);
            Absorbed {
                total: record.amount,
                entities,
            }
        };
        for entity in &absorbed.entities {
            self.labels.remove(*entity);
        }
        Some(absorbed)
    }

    /// Last name visibility pushed for `entity`
    pub fn name_visible(&self, entity: EntityId) -> Option<bool> {
        self.records.read().get(&entity).map(|r| r.name_visible)
    }

    /// Remember the name visibility pushed for `entity`
    pub fn set_name_visible(&self, entity: EntityId, visible: bool) {
        if let Some(record) = self.records.write().get_mut(&entity) {
            record.name_visible = visible;
        }
    }

    /// Sum of all tracked amounts
    pub fn total_amount(&self) -> u64 {
        self.records.read().values().map(|r| r.amount as u64).sum()
    }
}
