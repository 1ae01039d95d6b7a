//! Coinfall DB - Persistence layer using native_db
//!
//! Provides:
//! - The placed-block ledger that keeps player-placed blocks from dropping
//!   currency when broken again
//! - Stored ledger rows, so the ledger can survive restarts
//! - Per-player earnings statistics and their bulk reset

mod earnings;
mod error;
mod ledger;
mod models;
mod store;

pub use earnings::{PlayerEarnings, StatisticsReset};
pub use error::{Error, Result};
pub use ledger::PlacementLedger;
pub use store::Store;
