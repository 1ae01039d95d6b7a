//! In-memory world for headless hosts and tests

use super::{Observer, World};
use crate::{CurrencySource, EntityId, Error, Location, PlayerId, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashSet;

/// What an in-memory entity is
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEntityKind {
    Currency { amount: u32, source: CurrencySource },
    Label { text: String },
}

/// A single entity stored by [`MemoryWorld`]
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntity {
    pub id: EntityId,
    pub kind: MemoryEntityKind,
    pub location: Location,
    pub name_visible: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// All live entities by ID
    entities: IndexMap<EntityId, MemoryEntity>,
    /// Next entity ID to assign
    next_id: u64,
    players: IndexMap<PlayerId, Observer>,
    /// Delivered messages, `None` recipient for broadcasts
    messages: Vec<(Option<PlayerId>, String)>,
    /// When set, spawns fail with a world error
    refuse_spawns: bool,
    /// Entities whose updates fail with a world error
    failing: HashSet<EntityId>,
}

impl MemoryState {
    fn spawn(&mut self, kind: MemoryEntityKind, at: &Location) -> Result<EntityId> {
        if self.refuse_spawns {
            return Err(Error::World("spawning disabled".to_string()));
        }
        self.next_id += 1;
        let id = EntityId::new(self.next_id);
        self.entities.insert(
            id,
            MemoryEntity {
                id,
                kind,
                location: at.clone(),
                name_visible: false,
            },
        );
        Ok(id)
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut MemoryEntity> {
        if self.failing.contains(&id) {
            return Err(Error::World(format!("{} rejected the update", id)));
        }
        self.entities.get_mut(&id).ok_or(Error::EntityGone(id))
    }
}

/// A [`World`] that keeps every entity and player in process memory
///
/// Entity IDs are handed out sequentially from 1 and never reused.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    state: Mutex<MemoryState>,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or move a player
    pub fn upsert_player(&self, id: PlayerId, name: impl Into<String>, location: Location) {
        let name = name.into();
        self.state
            .lock()
            .players
            .insert(id, Observer { id, name, location });
    }

    pub fn remove_player(&self, id: PlayerId) {
        self.state.lock().players.shift_remove(&id);
    }

    /// Move an entity, as physics would
    pub fn move_entity(&self, id: EntityId, to: Location) -> bool {
        match self.state.lock().entities.get_mut(&id) {
            Some(entity) => {
                entity.location = to;
                true
            }
            None => false,
        }
    }

    /// Snapshot of one entity
    pub fn entity(&self, id: EntityId) -> Option<MemoryEntity> {
        self.state.lock().entities.get(&id).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.state.lock().entities.len()
    }

    /// IDs of all live currency entities
    pub fn currency_ids(&self) -> Vec<EntityId> {
        self.state
            .lock()
            .entities
            .values()
            .filter(|e| matches!(e.kind, MemoryEntityKind::Currency { .. }))
            .map(|e| e.id)
            .collect()
    }

    /// IDs of all live labels
    pub fn label_ids(&self) -> Vec<EntityId> {
        self.state
            .lock()
            .entities
            .values()
            .filter(|e| matches!(e.kind, MemoryEntityKind::Label { .. }))
            .map(|e| e.id)
            .collect()
    }

    /// Text of a label entity
    pub fn label_text(&self, id: EntityId) -> Option<String> {
        match self.entity(id)?.kind {
            MemoryEntityKind::Label { text } => Some(text),
            _ => None,
        }
    }

    /// Messages delivered so far
    pub fn messages(&self) -> Vec<(Option<PlayerId>, String)> {
        self.state.lock().messages.clone()
    }

    /// Make subsequent spawns fail
    pub fn refuse_spawns(&self, refuse: bool) {
        self.state.lock().refuse_spawns = refuse;
    }

    /// Make updates to `id` fail until [`MemoryWorld::heal_entity`]
    pub fn fail_entity(&self, id: EntityId) {
        self.state.lock().failing.insert(id);
    }

    pub fn heal_entity(&self, id: EntityId) {
        self.state.lock().failing.remove(&id);
    }
}

impl World for MemoryWorld {
    fn is_valid(&self, entity: EntityId) -> bool {
        self.state.lock().entities.contains_key(&entity)
    }

    fn location(&self, entity: EntityId) -> Option<Location> {
        self.state
            .lock()
            .entities
            .get(&entity)
            .map(|e| e.location.clone())
    }

    fn remove(&self, entity: EntityId) {
        self.state.lock().entities.shift_remove(&entity);
    }

    fn spawn_currency(
        &self,
        at: &Location,
        amount: u32,
        source: CurrencySource,
    ) -> Result<EntityId> {
        self.state
            .lock()
            .spawn(MemoryEntityKind::Currency { amount, source }, at)
    }

    fn set_amount(&self, entity: EntityId, amount: u32) -> Result<()> {
        let mut state = self.state.lock();
        match &mut state.entity_mut(entity)?.kind {
            MemoryEntityKind::Currency { amount: current, .. } => {
                *current = amount;
                Ok(())
            }
            MemoryEntityKind::Label { .. } => {
                Err(Error::World(format!("{} is not a currency item", entity)))
            }
        }
    }

    fn spawn_label(&self, at: &Location, text: &str) -> Result<EntityId> {
        let mut state = self.state.lock();
        let id = state.spawn(
            MemoryEntityKind::Label {
                text: text.to_string(),
            },
            at,
        )?;
        if let Some(label) = state.entities.get_mut(&id) {
            label.name_visible = true;
        }
        Ok(id)
    }

    fn set_text(&self, entity: EntityId, text: &str) -> Result<()> {
        let mut state = self.state.lock();
        match &mut state.entity_mut(entity)?.kind {
            MemoryEntityKind::Label { text: current } => {
                current.clear();
                current.push_str(text);
                Ok(())
            }
            _ => Err(Error::World(format!("{} is not a label", entity))),
        }
    }

    fn follow(&self, follower: EntityId, target: EntityId, dy: f64) -> Result<()> {
        let mut state = self.state.lock();
        let Some(to) = state.entities.get(&target).map(|t| t.location.up(dy)) else {
            return Err(Error::EntityGone(target));
        };
        match state.entities.get_mut(&follower) {
            Some(f) => {
                f.location = to;
                Ok(())
            }
            None => Err(Error::EntityGone(follower)),
        }
    }

    fn set_name_visible(&self, entity: EntityId, visible: bool) -> Result<()> {
        self.state.lock().entity_mut(entity)?.name_visible = visible;
        Ok(())
    }

    fn observers(&self) -> Vec<Observer> {
        self.state.lock().players.values().cloned().collect()
    }

    fn send_message(&self, player: PlayerId, message: &str) {
        self.state
            .lock()
            .messages
            .push((Some(player), message.to_string()));
    }

    fn broadcast(&self, message: &str) {
        self.state.lock().messages.push((None, message.to_string()));
    }
}
