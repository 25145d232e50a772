//! In-memory object store.
//!
//! Deterministic [`ObjectStore`] implementation backing the test suite:
//! preserves insertion order for containers and objects, and serves object
//! bodies in small chunks so readers get exercised across chunk boundaries.

use bytes::Bytes;

use super::{ChunkIter, ContainerInfo, ObjectInfo, ObjectStore, StoreError};

const DEFAULT_CHUNK_SIZE: usize = 16;

struct MemoryObject {
    name: String,
    last_modified: String,
    data: Bytes,
}

struct MemoryContainer {
    name: String,
    objects: Vec<MemoryObject>,
}

pub struct MemoryStore {
    containers: Vec<MemoryContainer>,
    chunk_size: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Serve object bodies in chunks of `chunk_size` bytes.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            containers: Vec::new(),
            chunk_size,
        }
    }

    /// Insert an object, creating its container on first use.
    pub fn put_object(
        &mut self,
        bucket: &str,
        key: &str,
        last_modified: &str,
        data: impl Into<Bytes>,
    ) {
        let container = match self.containers.iter_mut().position(|c| c.name == bucket) {
            Some(idx) => &mut self.containers[idx],
            None => {
                self.containers.push(MemoryContainer {
                    name: bucket.to_string(),
                    objects: Vec::new(),
                });
                self.containers.last_mut().unwrap()
            }
        };
        container.objects.push(MemoryObject {
            name: key.to_string(),
            last_modified: last_modified.to_string(),
            data: data.into(),
        });
    }

    fn container(&self, name: &str) -> Result<&MemoryContainer, StoreError> {
        self.containers
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| StoreError::ContainerNotFound(name.to_string()))
    }
}

impl ObjectStore for MemoryStore {
    fn probe(&self, container: &str) -> Result<(), StoreError> {
        self.container(container).map(|_| ())
    }

    fn list_containers(&self) -> Result<Vec<ContainerInfo>, StoreError> {
        Ok(self
            .containers
            .iter()
            .map(|c| ContainerInfo {
                name: c.name.clone(),
            })
            .collect())
    }

    fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, StoreError> {
        Ok(self
            .container(container)?
            .objects
            .iter()
            .map(|o| ObjectInfo {
                name: o.name.clone(),
                size: o.data.len() as u64,
                last_modified: o.last_modified.clone(),
            })
            .collect())
    }

    fn get_object(&self, container: &str, key: &str) -> Result<ChunkIter, StoreError> {
        let object = self
            .container(container)?
            .objects
            .iter()
            .find(|o| o.name == key)
            .ok_or_else(|| StoreError::ObjectNotFound(container.to_string(), key.to_string()))?;

        let chunk_size = self.chunk_size.max(1);
        let mut data = object.data.clone();
        let mut chunks = Vec::new();
        while !data.is_empty() {
            chunks.push(data.split_to(chunk_size.min(data.len())));
        }
        Ok(Box::new(chunks.into_iter().map(Ok)))
    }
}
