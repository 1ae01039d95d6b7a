//! Database store wrapper.

use crate::error::{Error, Result};
use crate::models::*;
use native_db::*;
use std::path::Path;
use std::sync::LazyLock;

// Static models for the database
static MODELS: LazyLock<Models> = LazyLock::new(|| {
    let mut models = Models::new();
    models.define::<StoredPlacement>().unwrap();
    models.define::<StoredEarnings>().unwrap();
    models
});

/// Embedded database holding ledger and earnings rows.
pub struct Store {
    pub(crate) db: Database<'static>,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Builder::new()
            .create(&MODELS, path.as_ref())
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(Self { db })
    }

    /// Create an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let db = Builder::new()
            .create_in_memory(&MODELS)
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(Self { db })
    }

    /// Replace every stored placement with `rows` in one transaction.
    pub fn save_placements(&self, rows: &[(String, i64)]) -> Result<()> {
        let rw = self.db.rw_transaction()?;
        let stale: Vec<StoredPlacement> = {
            let scan = rw.scan().primary::<StoredPlacement>()?;
            let rows: std::result::Result<Vec<StoredPlacement>, _> = scan.all()?.collect();
            rows?
        };
        for row in stale {
            rw.remove(row)?;
        }

        for (key, placed_at) in rows {
            rw.upsert(StoredPlacement::new(key.clone(), *placed_at))?;
        }

        rw.commit()?;
        Ok(())
    }

    /// Load every stored placement as `(key, placed_at)`.
    pub fn load_placements(&self) -> Result<Vec<(String, i64)>> {
        let r = self.db.r_transaction()?;
        let scan = r.scan().primary::<StoredPlacement>()?;
        let iter = scan.all()?;
        let rows: std::result::Result<Vec<StoredPlacement>, _> = iter.collect();
        let rows = rows.map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.into_iter().map(|p| (p.key, p.placed_at)).collect())
    }

    /// Number of stored placements.
    pub fn placement_count(&self) -> Result<usize> {
        let r = self.db.r_transaction()?;
        let scan = r.scan().primary::<StoredPlacement>()?;
        Ok(scan.all()?.count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_replaces_placements() {
        let store = Store::in_memory().unwrap();

        store
            .save_placements(&[
                ("world:1:2:3".to_string(), 100),
                ("world:4:5:6".to_string(), 200),
            ])
            .unwrap();
        assert_eq!(store.placement_count().unwrap(), 2);

        store
            .save_placements(&[("world:7:8:9".to_string(), 300)])
            .unwrap();
        let rows = store.load_placements().unwrap();
        assert_eq!(rows, vec![("world:7:8:9".to_string(), 300)]);

        store.save_placements(&[]).unwrap();
        assert_eq!(store.placement_count().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_saves_never_merge() {
        let store = std::sync::Arc::new(Store::in_memory().unwrap());
        let left: Vec<(String, i64)> = (0..50).map(|x| (format!("world:{x}:64:0"), 1)).collect();
        let right: Vec<(String, i64)> = (0..50).map(|x| (format!("world:{x}:70:0"), 2)).collect();

        let writers: Vec<_> = [left.clone(), right.clone()]
            .into_iter()
            .map(|rows| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        store.save_placements(&rows).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let mut stored = store.load_placements().unwrap();
        stored.sort();
        let mut expected_left = left;
        expected_left.sort();
        let mut expected_right = right;
        expected_right.sort();
        assert!(stored == expected_left || stored == expected_right);
    }
}
