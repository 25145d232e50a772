//! Custom error types for the backup plugin core.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential validation failed: {0}")]
    Credentials(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    #[error("No backup job in progress")]
    NoCurrentJob,
}

pub type Result<T> = std::result::Result<T, PluginError>;
