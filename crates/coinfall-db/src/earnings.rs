//! Per-player earnings statistics.

use crate::error::{Error, Result};
use crate::models::*;
use crate::store::Store;
use chrono::{DateTime, Utc};
use coinfall_core::{CurrencySource, PlayerId};
use tracing::info;

/// Earnings of one player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEarnings {
    pub player: PlayerId,
    pub player_name: String,
    pub from_mobs: u64,
    pub from_blocks: u64,
    pub total: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

impl From<StoredEarnings> for PlayerEarnings {
    fn from(stored: StoredEarnings) -> Self {
        Self {
            player: PlayerId::new(stored.player),
            player_name: stored.player_name,
            from_mobs: stored.from_mobs,
            from_blocks: stored.from_blocks,
            total: stored.total,
            last_updated: DateTime::from_timestamp_millis(stored.last_updated),
        }
    }
}

/// Target of the scheduled statistics reset
pub trait StatisticsReset: Send + Sync {
    /// Wipe every player's statistics; returns how many rows were cleared
    fn reset_statistics(&self) -> Result<usize>;
}

impl Store {
    /// Credit `amount` earned from `source` to a player.
    pub fn add_earnings(
        &self,
        player: PlayerId,
        player_name: &str,
        amount: u32,
        source: CurrencySource,
    ) -> Result<PlayerEarnings> {
        let rw = self.db.rw_transaction()?;
        let mut row = rw
            .get()
            .primary::<StoredEarnings>(player.raw())?
            .unwrap_or_else(|| StoredEarnings::new(player.raw(), player_name));

        let amount = amount as u64;
        // untagged currency counts as mob loot
        match source {
            CurrencySource::Block => row.from_blocks = row.from_blocks.saturating_add(amount),
            CurrencySource::Mob | CurrencySource::Unknown => {
                row.from_mobs = row.from_mobs.saturating_add(amount)
            }
        }
        row.total = row.total.saturating_add(amount);
        row.player_name = player_name.to_string();
        row.last_updated = Utc::now().timestamp_millis();

        rw.upsert(row.clone())?;
        rw.commit()?;
        Ok(row.into())
    }

    /// Earnings of one player, if any were recorded.
    pub fn earnings(&self, player: PlayerId) -> Result<Option<PlayerEarnings>> {
        let r = self.db.r_transaction()?;
        let stored: Option<StoredEarnings> = r.get().primary(player.raw())?;
        Ok(stored.map(Into::into))
    }

    /// Top `limit` players by total earnings.
    pub fn top_earners(&self, limit: usize) -> Result<Vec<PlayerEarnings>> {
        let mut all = self.all_earnings()?;
        all.sort_by(|a, b| b.total.cmp(&a.total).then(a.player.raw().cmp(&b.player.raw())));
        all.truncate(limit);
        Ok(all)
    }

    fn all_earnings(&self) -> Result<Vec<PlayerEarnings>> {
        let r = self.db.r_transaction()?;
        let scan = r.scan().primary::<StoredEarnings>()?;
        let iter = scan.all()?;
        let rows: std::result::Result<Vec<StoredEarnings>, _> = iter.collect();
        let rows = rows.map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete every earnings row.
    pub fn reset_earnings(&self) -> Result<usize> {
        let rw = self.db.rw_transaction()?;
        let rows: Vec<StoredEarnings> = {
            let scan = rw.scan().primary::<StoredEarnings>()?;
            let rows: std::result::Result<Vec<StoredEarnings>, _> = scan.all()?.collect();
            rows?
        };
        let cleared = rows.len();
        for row in rows {
            rw.remove(row)?;
        }
        rw.commit()?;

        info!(cleared, "Earnings statistics reset");
        Ok(cleared)
    }
}

impl StatisticsReset for Store {
    fn reset_statistics(&self) -> Result<usize> {
        self.reset_earnings()
    }
}
