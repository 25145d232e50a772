//! Object-store client boundary.
//!
//! The concrete wire protocol lives behind the [`ObjectStore`] trait; the
//! backup pipeline only ever sees container/object listings and lazily
//! chunked object bodies.

pub mod memory;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Chunked object body as yielded lazily by a store client.
pub type ChunkIter = Box<dyn Iterator<Item = Result<Bytes, StoreError>> + Send>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("object not found: {0}/{1}")]
    ObjectNotFound(String, String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("transport error: {0}")]
    Transport(String),
}

/// Summary of a container as reported by the store.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub name: String,
}

/// Summary of an object within a container.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub name: String,

    /// Object size in bytes.
    pub size: u64,

    /// Provider-supplied modification timestamp, unparsed.
    pub last_modified: String,
}

/// Minimal client surface the backup pipeline needs from an object store.
pub trait ObjectStore: Send + Sync {
    /// Cheap existence check for a container name.
    fn probe(&self, container: &str) -> Result<(), StoreError>;

    /// Containers in the store's own iteration order.
    fn list_containers(&self) -> Result<Vec<ContainerInfo>, StoreError>;

    /// Objects of one container in the store's own iteration order.
    fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, StoreError>;

    /// Lazily chunked object body.
    fn get_object(&self, container: &str, key: &str) -> Result<ChunkIter, StoreError>;
}

/// Some S3-compatible clients report a spurious authentication failure when
/// fetching keys that end in `~`, even though the same credentials worked
/// for every other request in the session. Map that case to "object not
/// found" so one odd key stays a per-object error instead of looking like a
/// credential problem.
pub fn normalize_fetch_error(bucket: &str, key: &str, err: StoreError) -> StoreError {
    match err {
        StoreError::InvalidCredentials if key.ends_with('~') => {
            debug!("spurious credential error on tilde-ending key {}/{}", bucket, key);
            StoreError::ObjectNotFound(bucket.to_string(), key.to_string())
        }
        other => other,
    }
}
