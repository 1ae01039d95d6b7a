//! Floating amount labels bound to currency entities
//!
//! Each live currency entity gets at most one label entity hovering above
//! it. Instead of one repeating task per label, the host calls
//! [`LabelTracker::tick`] once per simulation tick and every label is
//! repositioned in a single pass.

use crate::config::LabelConfig;
use crate::{EntityId, Error, Result, World};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Owns every label entity, keyed by the currency entity it follows
pub struct LabelTracker {
    world: Arc<dyn World>,
    config: LabelConfig,
    /// owner -> label entity
    labels: Mutex<IndexMap<EntityId, EntityId>>,
    /// Reused by `tick` so the per-tick pass does not allocate
    scratch: Mutex<Vec<(EntityId, EntityId)>>,
}

impl LabelTracker {
    pub fn new(world: Arc<dyn World>, config: LabelConfig) -> Self {
        Self {
            world,
            config,
            labels: Mutex::new(IndexMap::new()),
            scratch: Mutex::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Text shown for an amount, e.g. `"8 ⛃"`
    pub fn text_for(&self, amount: u32) -> String {
        format!("{} {}", amount, self.config.glyph)
    }

    /// Spawn a label above `owner`
    ///
    /// Replaces any label the owner already had. No-op when labels are disabled.
    pub fn create(&self, owner: EntityId, amount: u32) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }
        let at = self
            .world
            .location(owner)
            .ok_or(Error::EntityGone(owner))?
            .up(self.config.height);
        let label = self.world.spawn_label(&at, &self.text_for(amount))?;

        let previous = self.labels.lock().insert(owner, label);
        if let Some(previous) = previous {
            self.world.remove(previous);
        }
        Ok(())
    }

    /// Refresh the text after the owner's amount changed
    pub fn set_amount(&self, owner: EntityId, amount: u32) -> Result<()> {
        let label = self.labels.lock().get(&owner).copied();
        match label {
            Some(label) => match self.world.set_text(label, &self.text_for(amount)) {
                Err(e) if e.is_gone() => {
                    // Label vanished under us; put a fresh one up
                    self.labels.lock().swap_remove(&owner);
                    self.create(owner, amount)
                }
                other => other,
            },
            None => self.create(owner, amount),
        }
    }

    /// Reposition every label; drop labels whose owner is gone
    ///
    /// Returns the number of labels removed. Call once per simulation tick
    /// from the tick thread.
    pub fn tick(&self) -> usize {
        let mut scratch = self.scratch.lock();
        scratch.clear();
        scratch.extend(self.labels.lock().iter().map(|(owner, label)| (*owner, *label)));

        let mut removed = 0;
        for &(owner, label) in scratch.iter() {
            match self.world.follow(label, owner, self.config.height) {
                Ok(()) => {}
                Err(e) if e.is_gone() => {
                    self.remove(owner);
                    removed += 1;
                }
                Err(e) => debug!(%owner, error = %e, "Label reposition failed"),
            }
        }
        removed
    }

    /// Destroy the label of `owner`, if any
    pub fn remove(&self, owner: EntityId) {
        let label = self.labels.lock().swap_remove(&owner);
        if let Some(label) = label {
            self.world.remove(label);
        }
    }

    /// Destroy every label
    pub fn remove_all(&self) {
        let labels = std::mem::take(&mut *self.labels.lock());
        if !labels.is_empty() {
            debug!(count = labels.len(), "Removing all labels");
        }
        for label in labels.into_values() {
            self.world.remove(label);
        }
    }

    /// Label entity currently bound to `owner`
    pub fn label_of(&self, owner: EntityId) -> Option<EntityId> {
        self.labels.lock().get(&owner).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.lock().is_empty()
    }
}
