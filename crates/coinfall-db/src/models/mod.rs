//! Database models for persistent storage.

mod earnings;
mod placement;

pub use earnings::*;
pub use placement::*;
