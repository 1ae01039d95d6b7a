//! Coinfall Core - Currency drops for live worlds
//!
//! This crate provides the world-facing half of coinfall:
//! - Identity, geometry and time types (`EntityId`, `Location`, `BlockKey`)
//! - The `World` and `Economy` interfaces a host implements
//! - Drop rules, amount ranges and the world filter
//! - The currency registry and its floating amount labels
//! - The optimizer sweep (expiry, visibility culling, stacking)
//!
//! Persistence lives in `coinfall-db`; background scheduling in
//! `coinfall-runtime`.
//!
//! ## Headless hosts
//!
//! `MemoryWorld`, `MemoryEconomy` and `ManualClock` implement the host
//! interfaces entirely in memory, for tests and simulations.

pub mod config;
mod currency;
mod drops;
mod economy;
mod error;
mod geometry;
mod identity;
mod labels;
mod optimizer;
mod registry;
mod rng;
pub mod time;
pub mod world;

pub use config::Config;
pub use currency::{CurrencyRecord, CurrencySource};
pub use drops::{AmountRange, DropRule, DropTable, WorldFilter};
pub use economy::{Economy, MemoryEconomy};
pub use error::{Error, Result};
pub use geometry::{BlockKey, Location, ParseBlockKeyError};
pub use identity::{EntityId, PlayerId, WorldId};
pub use labels::LabelTracker;
pub use optimizer::{Optimizer, SweepReport};
pub use registry::{Absorbed, CurrencyRegistry};
pub use rng::DropRng;
pub use time::{ManualClock, Millis, SystemClock, TimeSource};
pub use world::{MemoryWorld, Observer, World};
