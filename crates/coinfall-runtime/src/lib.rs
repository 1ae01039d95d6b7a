//! Coinfall Runtime - Scheduling and the plugin surface
//!
//! Wires the core registry, labels and optimizer together with the
//! placement ledger and earnings store:
//! - `jobs` - repeating tokio tasks for the sweep and ledger cleanup
//! - `reset` - wall-clock statistics reset (daily, weekly, monthly)
//! - `CoinFall` - the facade a host forwards its world events to

mod error;
pub mod jobs;
mod plugin;
pub mod reset;

pub use error::{Error, Result};
pub use plugin::{CoinFall, PickupOutcome};
pub use reset::{Cadence, ResetScheduler};
