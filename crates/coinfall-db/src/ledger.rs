//! Ledger of player-placed blocks
//!
//! A block placed by a player is recorded by its block-granular key. When
//! that block is broken again the host checks the ledger and skips the drop,
//! which stops place/break farming.
//!
//! The table is a concurrent map, so the tick thread can record and check
//! while the cleanup job prunes. Only one caller evicts at a time; others
//! that overflow the cap meanwhile just insert.

use crate::error::Result;
use crate::store::Store;
use coinfall_core::config::AntiDuplicationConfig;
use coinfall_core::{BlockKey, Millis, TimeSource};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Placed-block keys and their placement time
pub struct PlacementLedger {
    config: AntiDuplicationConfig,
    clock: Arc<dyn TimeSource>,
    entries: DashMap<BlockKey, Millis>,
    store: Option<Arc<Store>>,
    evicting: Mutex<()>,
}

impl PlacementLedger {
    /// Ledger without persistence
    pub fn new(config: AntiDuplicationConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            clock,
            entries: DashMap::new(),
            store: None,
            evicting: Mutex::new(()),
        }
    }

    /// Ledger that loads from and saves to `store` when `persist_data` is on
    pub fn with_store(
        config: AntiDuplicationConfig,
        clock: Arc<dyn TimeSource>,
        store: Arc<Store>,
    ) -> Self {
        Self {
            store: Some(store),
            ..Self::new(config, clock)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &AntiDuplicationConfig {
        &self.config
    }

    fn persistent_store(&self) -> Option<&Store> {
        if self.config.enabled && self.config.persist_data {
            self.store.as_deref()
        } else {
            None
        }
    }

    /// Record a player-placed block at the current time
    pub fn record(&self, key: BlockKey) {
        if !self.config.enabled {
            return;
        }
        self.entries.insert(key, self.clock.now_millis());
        if self.entries.len() > self.config.max_tracked_blocks {
            self.evict_oldest();
        }
    }

    /// Whether `key` was placed by a player
    pub fn contains(&self, key: &BlockKey) -> bool {
        self.config.enabled && self.entries.contains_key(key)
    }

    /// Forget `key`; returns whether it was recorded
    pub fn remove(&self, key: &BlockKey) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Placement time of `key`
    pub fn placed_at(&self, key: &BlockKey) -> Option<Millis> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let Some(_guard) = self.evicting.try_lock() else {
            return;
        };
        let len = self.entries.len();
        let cap = self.config.max_tracked_blocks;
        if len <= cap {
            return;
        }
        let fraction = self.config.eviction_fraction.clamp(0.0, 1.0);
        let count = ((len as f64 * fraction).ceil() as usize)
            .max(len - cap)
            .min(len);

        let mut by_age: Vec<(Millis, BlockKey)> = self
            .entries
            .iter()
            .map(|entry| (*entry.value(), entry.key().clone()))
            .collect();
        by_age.sort_unstable_by_key(|(placed_at, _)| *placed_at);
        for (_, key) in by_age.into_iter().take(count) {
            self.entries.remove(&key);
        }

        debug!(evicted = count, remaining = self.entries.len(), "Evicted oldest placements");
    }

    /// Drop records older than the configured maximum age
    ///
    /// Returns the number removed; 0 when age pruning is disabled.
    pub fn cleanup_expired(&self) -> usize {
        let Some(max_age) = self.config.max_age_millis() else {
            return 0;
        };
        let now = self.clock.now_millis();
        let mut removed = 0;
        self.entries.retain(|_, placed_at| {
            let keep = now.saturating_sub(*placed_at) <= max_age;
            if !keep {
                removed += 1;
            }
            keep
        });
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Pruned expired placements");
        }
        removed
    }

    fn is_fresh(&self, placed_at: Millis, now: Millis) -> bool {
        match self.config.max_age_millis() {
            Some(max_age) => now.saturating_sub(placed_at) <= max_age,
            None => true,
        }
    }

    /// Replace the ledger with stored placements, skipping expired and
    /// malformed rows
    pub fn load(&self) -> Result<usize> {
        let Some(store) = self.persistent_store() else {
            return Ok(0);
        };
        self.entries.clear();
        let now = self.clock.now_millis();
        let mut loaded = 0;
        for (raw, placed_at) in store.load_placements()? {
            let key: BlockKey = match raw.parse() {
                Ok(key) => key,
                Err(e) => {
                    warn!(error = %e, "Skipping stored placement");
                    continue;
                }
            };
            if self.is_fresh(placed_at, now) {
                self.entries.insert(key, placed_at);
                loaded += 1;
            }
        }
        if self.entries.len() > self.config.max_tracked_blocks {
            self.evict_oldest();
        }
        info!(loaded, tracked = self.entries.len(), "Loaded placed blocks");
        Ok(loaded)
    }

    /// Write every fresh record to the store, replacing what was there
    pub fn save(&self) -> Result<usize> {
        let Some(store) = self.persistent_store() else {
            return Ok(0);
        };
        let now = self.clock.now_millis();
        let rows: Vec<(String, Millis)> = self
            .entries
            .iter()
            .filter(|entry| self.is_fresh(*entry.value(), now))
            .map(|entry| (entry.key().to_string(), *entry.value()))
            .collect();
        store.save_placements(&rows)?;
        info!(saved = rows.len(), "Saved placed blocks");
        Ok(rows.len())
    }

    /// Forget every record, persisting the empty ledger when enabled
    pub fn clear_all(&self) -> Result<()> {
        self.entries.clear();
        if let Some(store) = self.persistent_store() {
            store.save_placements(&[])?;
        }
        Ok(())
    }

    /// Save if persistence is on, then release memory
    pub fn shutdown(&self) -> Result<()> {
        let saved = self.save();
        self.entries.clear();
        saved.map(|_| ())
    }
}
