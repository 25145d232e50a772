//! Incremental object-storage backup core.
//!
//! Enumerates buckets and objects from a remote store on a background
//! worker, filters them by modification time against the last successful
//! run, and feeds a bounded job channel consumed by a callback-driven
//! backup driver. The restore direction decodes flattened object paths and
//! writes byte streams back into a filesystem namespace.

pub mod change;
pub mod config;
pub mod driver;
pub mod enumerate;
pub mod path;
pub mod queue;
pub mod restore;
pub mod store;
pub mod stream;
pub mod utils;

// Re-export commonly used types
pub use config::PluginOptions;
pub use driver::{BackupDriver, FileStatus, JobProgress, SaveRecord, StatRecord};
pub use queue::{JobDescriptor, QueueEntry};
pub use restore::{FileAttributes, RestoreWriter};
pub use utils::errors::PluginError;
pub type Result<T> = std::result::Result<T, PluginError>;
