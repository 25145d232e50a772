//! Consumer-side backup driver.
//!
//! Executes synchronously inside the host's per-file callbacks: pulls job
//! descriptors from the bounded channel, hands the host a stat record and
//! destination path per object, and streams object bytes on demand through
//! a [`StreamAdapter`]. The enumeration worker is spawned at job start and
//! always joined at teardown, even when the host aborts mid-stream.

use std::io::Read;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::PluginOptions;
use crate::enumerate::{BucketFilter, Enumerator};
use crate::path;
use crate::queue::{self, JobDescriptor, JobReceiver, QueueEntry};
use crate::store::{self, ObjectStore, StoreError};
use crate::stream::StreamAdapter;
use crate::utils::errors::{PluginError, Result};

/// Container name used for the credential probe. It must not exist; the
/// not-found response is what proves the credentials are usable.
const PROBE_CONTAINER: &str = "probe123XXXverifyXXX123probe";

/// Interval between channel polls while waiting for the worker.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Stat record for one object. The store exposes a single timestamp, so it
/// fills all three time fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
}

/// Everything the host needs to save one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    /// Flattened backup path (`OBJSTORE:/bucket/key`).
    pub path: String,
    pub stat: StatRecord,
}

/// Outcome of asking for the next file.
#[derive(Debug, PartialEq, Eq)]
pub enum FileStatus {
    /// A job is ready; save it.
    Save(SaveRecord),

    /// The sentinel arrived; the host should treat this as "no more
    /// files", not as an error.
    Done,
}

/// Per-file completion status reported back to the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobProgress {
    /// More files may follow; keep asking.
    More,

    /// The job stream is drained.
    Complete,
}

/// Job-wide bookkeeping: fixed at job start, except for the save counter.
#[derive(Debug, Clone)]
pub struct BackupCursor {
    /// Timestamp of the last successful backup, UTC epoch seconds.
    pub last_run: i64,

    pub accurate: bool,

    /// Incremented once per save record handed to the host.
    pub objects_backed_up: u64,
}

pub struct BackupDriver {
    store: Arc<dyn ObjectStore>,
    options: PluginOptions,
    cursor: Option<BackupCursor>,
    jobs: Option<JobReceiver>,
    worker: Option<JoinHandle<()>>,
    current: Option<JobDescriptor>,
    reader: Option<StreamAdapter>,
}

impl std::fmt::Debug for BackupDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupDriver").finish_non_exhaustive()
    }
}

impl BackupDriver {
    /// Validate credentials against `store` and build a driver.
    ///
    /// The probe asks for a container that must not exist: a not-found
    /// response proves credentials and transport work. Anything else,
    /// including the probe container somehow existing, is fatal before any
    /// enumeration starts.
    pub fn connect(store: Arc<dyn ObjectStore>, options: PluginOptions) -> Result<Self> {
        info!("connecting to {}:{}", options.host, options.port);
        match store.probe(PROBE_CONTAINER) {
            Err(StoreError::ContainerNotFound(_)) => {}
            Err(err) => {
                return Err(PluginError::Credentials(format!(
                    "{}:{}: {err}",
                    options.host, options.port
                )));
            }
            Ok(()) => {
                return Err(PluginError::Credentials(format!(
                    "{}:{}: probe container unexpectedly exists",
                    options.host, options.port
                )));
            }
        }

        Ok(Self {
            store,
            options,
            cursor: None,
            jobs: None,
            worker: None,
            current: None,
            reader: None,
        })
    }

    /// Start a backup job: fix the cursor, open the bounded channel and
    /// spawn the enumeration worker.
    ///
    /// `since` is the timestamp of the last successful backup in UTC epoch
    /// seconds; `accurate` tells the enumerator to acknowledge unchanged
    /// objects instead of dropping them.
    pub fn start_job(&mut self, since: i64, accurate: bool) -> Result<()> {
        self.shutdown();
        info!("last successful backup: ts {since}");

        let (tx, rx) = queue::bounded(self.options.queue_size);
        let filter = BucketFilter {
            include: self.options.buckets_include.clone(),
            exclude: self.options.buckets_exclude.clone(),
        };
        let enumerator = Enumerator::new(Arc::clone(&self.store), filter, since, accurate);
        self.worker = Some(enumerator.spawn(tx)?);
        self.jobs = Some(rx);
        self.cursor = Some(BackupCursor {
            last_run: since,
            accurate,
            objects_backed_up: 0,
        });
        Ok(())
    }

    /// Pull the next job, blocking on short poll cycles while the worker
    /// catches up.
    pub fn start_backup_file(&mut self) -> Result<FileStatus> {
        let jobs = self.jobs.as_ref().ok_or(PluginError::NoCurrentJob)?;
        match jobs.next_blocking(POLL_INTERVAL) {
            QueueEntry::Job(job) => {
                let record = save_record(&job);
                info!("backup file: {}", record.path);
                if let Some(cursor) = self.cursor.as_mut() {
                    cursor.objects_backed_up += 1;
                }
                self.current = Some(job);
                Ok(FileStatus::Save(record))
            }
            QueueEntry::Done => {
                self.finish_job();
                Ok(FileStatus::Done)
            }
        }
    }

    /// Open the in-flight object for reading. A fetch failure is scoped to
    /// this object; the job keeps going.
    pub fn open_current(&mut self) -> Result<()> {
        let job = self.current.as_ref().ok_or(PluginError::NoCurrentJob)?;
        let reader = match &job.payload {
            Some(payload) => StreamAdapter::from_buffer(payload.clone()),
            None => {
                let chunks = self
                    .store
                    .get_object(&job.bucket, &job.key)
                    .map_err(|err| store::normalize_fetch_error(&job.bucket, &job.key, err));
                match chunks {
                    Ok(chunks) => StreamAdapter::new(chunks),
                    Err(err) => {
                        error!("cannot open {}/{}: {err}", job.bucket, job.key);
                        return Err(PluginError::Store(err));
                    }
                }
            }
        };
        self.reader = Some(reader);
        Ok(())
    }

    /// Deliver the next bytes of the open object in the caller's chunk
    /// size; `Ok(0)` means end-of-data.
    pub fn read_current(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or(PluginError::NoCurrentJob)?;
        match reader.read(buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                if let Some(job) = &self.current {
                    error!("cannot read from {}/{}: {err}", job.bucket, job.key);
                }
                Err(PluginError::Io(err))
            }
        }
    }

    /// Drop the per-object read state.
    pub fn close_current(&mut self) {
        self.reader = None;
    }

    /// After each file the host asks whether more may follow.
    pub fn end_backup_file(&self) -> JobProgress {
        if self.current.is_some() {
            JobProgress::More
        } else {
            JobProgress::Complete
        }
    }

    pub fn cursor(&self) -> Option<&BackupCursor> {
        self.cursor.as_ref()
    }

    /// Abort-path teardown, usable at any point including mid-stream.
    /// Dropping the receiver unblocks a producer stalled on a full channel,
    /// so the join cannot deadlock.
    pub fn shutdown(&mut self) {
        self.jobs = None;
        self.current = None;
        self.reader = None;
        self.join_worker();
    }

    /// Called once the sentinel arrives: report final counts, then release
    /// the channel and worker.
    fn finish_job(&mut self) {
        if let Some(cursor) = &self.cursor {
            if cursor.objects_backed_up > 0 {
                info!("backup completed with {} objects", cursor.objects_backed_up);
            } else {
                info!("no objects to backup");
            }
        }
        self.current = None;
        self.reader = None;
        self.jobs = None;
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            debug!("joining enumeration worker");
            if worker.join().is_err() {
                error!("enumeration worker panicked");
            }
        }
    }
}

impl Drop for BackupDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn save_record(job: &JobDescriptor) -> SaveRecord {
    SaveRecord {
        path: path::encode_object_path(&job.bucket, &job.key),
        stat: StatRecord {
            size: job.size,
            atime: job.mod_time,
            mtime: job.mod_time,
            ctime: job.mod_time,
        },
    }
}
