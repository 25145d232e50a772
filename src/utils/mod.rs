//! Shared utilities: errors and logging.

pub mod errors;
pub mod logger;
