//! Error types for coinfall-runtime

use thiserror::Error;

/// Runtime error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Core error: {0}")]
    Core(#[from] coinfall_core::Error),

    #[error("Database error: {0}")]
    Db(#[from] coinfall_db::Error),

    /// A background job iteration panicked
    #[error("Job {job} panicked: {message}")]
    JobPanicked { job: &'static str, message: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
