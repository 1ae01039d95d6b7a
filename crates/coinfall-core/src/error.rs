//! Error types for coinfall-core

use crate::EntityId;
use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// The entity is no longer present in the world
    #[error("Entity gone: {0}")]
    EntityGone(EntityId),

    /// The host world refused or failed an operation
    #[error("World error: {0}")]
    World(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(u32),

    #[error("Config IO error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

impl Error {
    /// Whether this error is an expected world race rather than a fault
    pub fn is_gone(&self) -> bool {
        matches!(self, Error::EntityGone(_))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
