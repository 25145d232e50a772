//! Background enumeration of store containers and objects.
//!
//! Runs on a dedicated worker thread and communicates with the consumer
//! only through the bounded job channel. Whatever happens inside the
//! worker, the end-of-stream sentinel goes out exactly once so the
//! consumer is guaranteed to terminate.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use chrono::DateTime;
use tracing::{debug, error};

use crate::change::{self, ChangeDecision};
use crate::queue::{JobDescriptor, JobSender};
use crate::store::ObjectStore;

/// Include/exclude filtering over container names.
#[derive(Debug, Clone, Default)]
pub struct BucketFilter {
    /// Only these buckets are eligible when set; unset means all buckets.
    pub include: Option<Vec<String>>,

    /// These buckets are never eligible.
    pub exclude: Option<Vec<String>>,
}

impl BucketFilter {
    pub fn allows(&self, name: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.iter().any(|b| b == name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.iter().any(|b| b == name) {
                return false;
            }
        }
        true
    }
}

/// Parse a provider-supplied `last_modified` timestamp into UTC epoch
/// seconds. RFC 3339 covers the S3-style listings, RFC 2822 the
/// HTTP-header-style ones.
pub fn parse_last_modified(raw: &str) -> Result<i64> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .with_context(|| format!("unparseable last_modified timestamp: {raw}"))?;
    Ok(parsed.timestamp())
}

/// Walks every eligible container and publishes one job per object that
/// change detection lets through.
pub struct Enumerator {
    store: Arc<dyn ObjectStore>,
    filter: BucketFilter,
    last_run: i64,
    accurate: bool,
}

impl Enumerator {
    pub fn new(store: Arc<dyn ObjectStore>, filter: BucketFilter, last_run: i64, accurate: bool) -> Self {
        Self {
            store,
            filter,
            last_run,
            accurate,
        }
    }

    /// Spawn the enumeration worker. The returned handle must be joined at
    /// job teardown.
    pub fn spawn(self, jobs: JobSender) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("object-enumerator".to_string())
            .spawn(move || self.run(jobs))
    }

    fn run(self, jobs: JobSender) {
        // Errors stay inside the worker: already-queued jobs must drain and
        // the sentinel must go out, or the consumer blocks forever.
        if let Err(err) = self.iterate_containers(&jobs) {
            error!("enumeration stopped early: {err:#}");
        }
        jobs.finish();
    }

    fn iterate_containers(&self, jobs: &JobSender) -> Result<()> {
        for container in self.store.list_containers()? {
            if !self.filter.allows(&container.name) {
                continue;
            }
            debug!("backing up bucket \"{}\"", container.name);

            for object in self.store.list_objects(&container.name)? {
                let mod_time = parse_last_modified(&object.last_modified)?;

                match change::decide(mod_time, self.last_run, self.accurate) {
                    ChangeDecision::Skip => {
                        debug!("{}/{} not changed, skipped", container.name, object.name);
                        continue;
                    }
                    ChangeDecision::Enqueue => {
                        debug!("{}/{} changed or new, backing up", container.name, object.name);
                    }
                    ChangeDecision::EnqueueUnchanged => {
                        debug!(
                            "{}/{} not changed, acknowledged as still present",
                            container.name, object.name
                        );
                    }
                }

                let job = JobDescriptor {
                    bucket: container.name.clone(),
                    key: object.name,
                    size: object.size,
                    mod_time,
                    payload: None,
                };
                if jobs.send(job).is_err() {
                    // Consumer tore the job down; nothing left to publish.
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{self, QueueEntry};
    use crate::store::memory::MemoryStore;
    use crate::store::{ChunkIter, ContainerInfo, ObjectInfo, StoreError};
    use std::time::Duration;

    const YESTERDAY: &str = "2024-05-01T12:00:00Z";
    const TODAY: &str = "2024-05-02T09:30:00Z";

    fn start_of_today() -> i64 {
        parse_last_modified("2024-05-02T00:00:00Z").unwrap()
    }

    fn drain(store: MemoryStore, filter: BucketFilter, accurate: bool) -> Vec<JobDescriptor> {
        let (tx, rx) = queue::bounded(16);
        let enumerator = Enumerator::new(Arc::new(store), filter, start_of_today(), accurate);
        let worker = enumerator.spawn(tx).unwrap();

        let mut received = Vec::new();
        loop {
            match rx.next_blocking(Duration::from_millis(2)) {
                QueueEntry::Job(job) => received.push(job),
                QueueEntry::Done => break,
            }
        }
        worker.join().unwrap();
        received
    }

    #[test]
    fn test_filter_defaults_to_all_buckets() {
        let filter = BucketFilter::default();
        assert!(filter.allows("anything"));
    }

    #[test]
    fn test_filter_include_and_exclude() {
        let filter = BucketFilter {
            include: Some(vec!["b1".to_string(), "b2".to_string()]),
            exclude: Some(vec!["b2".to_string()]),
        };
        assert!(filter.allows("b1"));
        assert!(!filter.allows("b2"));
        assert!(!filter.allows("b3"));
    }

    #[test]
    fn test_parse_last_modified_formats() {
        assert_eq!(parse_last_modified("1970-01-01T00:00:00Z").unwrap(), 0);
        assert_eq!(
            parse_last_modified("2024-05-02T00:00:00+02:00").unwrap(),
            parse_last_modified("2024-05-01T22:00:00Z").unwrap()
        );
        assert_eq!(
            parse_last_modified("Thu, 01 Jan 1970 00:00:00 +0000").unwrap(),
            0
        );
        assert!(parse_last_modified("not a timestamp").is_err());
    }

    #[test]
    fn test_only_changed_objects_are_enqueued() {
        let mut store = MemoryStore::new();
        store.put_object("b1", "x", YESTERDAY, "old");
        store.put_object("b1", "y", TODAY, "new");

        let jobs = drain(store, BucketFilter::default(), false);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].key, "y");
        assert_eq!(jobs[0].size, 3);
        assert_eq!(jobs[0].mod_time, parse_last_modified(TODAY).unwrap());
        assert!(jobs[0].payload.is_none());
    }

    #[test]
    fn test_accurate_mode_acknowledges_unchanged_objects() {
        let mut store = MemoryStore::new();
        store.put_object("b1", "x", YESTERDAY, "old");
        store.put_object("b1", "y", TODAY, "new");

        let jobs = drain(store, BucketFilter::default(), true);
        let keys: Vec<_> = jobs.iter().map(|j| j.key.as_str()).collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_excluded_bucket_never_reaches_the_channel() {
        let mut store = MemoryStore::new();
        store.put_object("b1", "a", TODAY, "data");
        store.put_object("b2", "b", TODAY, "data");

        let filter = BucketFilter {
            include: None,
            exclude: Some(vec!["b2".to_string()]),
        };
        let jobs = drain(store, filter, false);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].bucket, "b1");
    }

    /// Store whose second container fails to list, mid-enumeration.
    struct FailingStore {
        inner: MemoryStore,
    }

    impl ObjectStore for FailingStore {
        fn probe(&self, container: &str) -> Result<(), StoreError> {
            self.inner.probe(container)
        }

        fn list_containers(&self) -> Result<Vec<ContainerInfo>, StoreError> {
            self.inner.list_containers()
        }

        fn list_objects(&self, container: &str) -> Result<Vec<ObjectInfo>, StoreError> {
            if container == "broken" {
                return Err(StoreError::Transport("listing timed out".to_string()));
            }
            self.inner.list_objects(container)
        }

        fn get_object(&self, container: &str, key: &str) -> Result<ChunkIter, StoreError> {
            self.inner.get_object(container, key)
        }
    }

    #[test]
    fn test_worker_failure_still_delivers_sentinel() {
        let mut inner = MemoryStore::new();
        inner.put_object("b1", "a", TODAY, "data");
        inner.put_object("broken", "b", TODAY, "data");
        inner.put_object("b3", "c", TODAY, "data");

        let (tx, rx) = queue::bounded(16);
        let enumerator = Enumerator::new(
            Arc::new(FailingStore { inner }),
            BucketFilter::default(),
            start_of_today(),
            false,
        );
        let worker = enumerator.spawn(tx).unwrap();

        let mut received = Vec::new();
        loop {
            match rx.next_blocking(Duration::from_millis(2)) {
                QueueEntry::Job(job) => received.push(job.key),
                QueueEntry::Done => break,
            }
        }
        worker.join().unwrap();
        // Jobs queued before the failure still drained.
        assert_eq!(received, vec!["a"]);
    }

    #[test]
    fn test_worker_exits_when_consumer_drops_receiver() {
        let mut store = MemoryStore::new();
        for i in 0..32 {
            store.put_object("b1", &format!("k{i}"), TODAY, "data");
        }

        let (tx, rx) = queue::bounded(2);
        let enumerator = Enumerator::new(
            Arc::new(store),
            BucketFilter::default(),
            start_of_today(),
            false,
        );
        let worker = enumerator.spawn(tx).unwrap();

        // Tear the consumer down while the producer is stalled on a full
        // channel; the worker must notice and finish.
        std::thread::sleep(Duration::from_millis(50));
        drop(rx);
        worker.join().unwrap();
    }
}
