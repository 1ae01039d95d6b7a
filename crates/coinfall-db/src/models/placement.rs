//! Placed-block rows.

use native_db::*;
use native_model::{native_model, Model};
use serde::{Deserialize, Serialize};

/// One player-placed block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct StoredPlacement {
    /// Primary key - block key rendered as `world:x:y:z`.
    #[primary_key]
    pub key: String,
    /// Placement time in epoch milliseconds.
    pub placed_at: i64,
}

impl StoredPlacement {
    pub fn new(key: impl Into<String>, placed_at: i64) -> Self {
        Self {
            key: key.into(),
            placed_at,
        }
    }
}
