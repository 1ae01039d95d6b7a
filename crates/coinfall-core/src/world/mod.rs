//! Interface to the host world simulation
//!
//! Everything coinfall needs from the game server goes through [`World`]:
//! entity spawn/remove/validity, positions, label text, name visibility,
//! the set of connected players and chat delivery. Implementations must be
//! callable from the tick thread and from background workers alike.

mod memory;

pub use memory::{MemoryEntity, MemoryEntityKind, MemoryWorld};

use crate::{CurrencySource, EntityId, Location, PlayerId, Result};

/// A connected player who can see world objects
#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
    pub id: PlayerId,
    pub name: String,
    pub location: Location,
}

/// Host world operations
pub trait World: Send + Sync {
    /// Whether the entity still exists and is alive
    fn is_valid(&self, entity: EntityId) -> bool;

    /// Current location, `None` once the entity is gone
    fn location(&self, entity: EntityId) -> Option<Location>;

    /// Remove an entity; removing a missing entity is a no-op
    fn remove(&self, entity: EntityId);

    /// Drop a currency item carrying `amount` at `at`
    fn spawn_currency(&self, at: &Location, amount: u32, source: CurrencySource)
        -> Result<EntityId>;

    /// Rewrite the amount carried by a currency item
    fn set_amount(&self, entity: EntityId, amount: u32) -> Result<()>;

    /// Spawn a non-physical, non-interactive text marker
    fn spawn_label(&self, at: &Location, text: &str) -> Result<EntityId>;

    /// Replace the visible text of a label
    fn set_text(&self, entity: EntityId, text: &str) -> Result<()>;

    /// Move `follower` to the location of `target` raised by `dy`
    ///
    /// Fails with [`crate::Error::EntityGone`] naming whichever of the two
    /// no longer exists.
    fn follow(&self, follower: EntityId, target: EntityId, dy: f64) -> Result<()>;

    /// Toggle whether the entity's name is rendered
    fn set_name_visible(&self, entity: EntityId, visible: bool) -> Result<()>;

    /// Players currently present
    fn observers(&self) -> Vec<Observer>;

    /// Deliver a chat message to one player
    fn send_message(&self, player: PlayerId, message: &str);

    /// Deliver a chat message to every present player
    fn broadcast(&self, message: &str) {
        for observer in self.observers() {
            self.send_message(observer.id, message);
        }
    }
}
