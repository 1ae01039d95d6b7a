//! Player earnings rows.

use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// Running earnings of one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct StoredEarnings {
    /// Primary key - player ID.
    #[primary_key]
    pub player: u64,
    /// Display name at the last update.
    pub player_name: String,
    pub from_mobs: u64,
    pub from_blocks: u64,
    pub total: u64,
    /// Last update in epoch milliseconds.
    pub last_updated: i64,
}

impl StoredEarnings {
    /// Empty row for a player.
    pub fn new(player: u64, player_name: impl Into<String>) -> Self {
        Self {
            player,
            player_name: player_name.into(),
            from_mobs: 0,
            from_blocks: 0,
            total: 0,
            last_updated: 0,
        }
    }
}
