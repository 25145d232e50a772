//! Bounded job channel between the enumeration worker and the backup
//! driver.
//!
//! Fixed-capacity FIFO: the sender blocks once the channel is full, which
//! throttles enumeration to the consumer's I/O rate. The receiver never
//! blocks outright; it polls with short sleeps so the host's own timeout
//! and cancellation machinery stays effective.

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};
use std::time::Duration;

use bytes::Bytes;

/// One backup-eligible object, enqueued by the enumerator and consumed
/// exactly once by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub bucket: String,
    pub key: String,

    /// Object size in bytes.
    pub size: u64,

    /// Modification time, UTC epoch seconds.
    pub mod_time: i64,

    /// Pre-fetched body; normally `None`, fetched lazily on open.
    pub payload: Option<Bytes>,
}

/// Channel entry: a job, or the end-of-stream sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEntry {
    Job(JobDescriptor),

    /// Enqueued exactly once; no jobs ever follow it.
    Done,
}

/// The consumer side vanished before enumeration finished.
#[derive(Debug, PartialEq, Eq)]
pub struct ChannelClosed;

/// Create a fixed-capacity job channel.
pub fn bounded(capacity: usize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (JobSender { tx }, JobReceiver { rx })
}

/// Producer handle held by the enumeration worker.
pub struct JobSender {
    tx: SyncSender<QueueEntry>,
}

impl JobSender {
    /// Enqueue a job, blocking while the channel is full. Errors only when
    /// the consumer has been torn down.
    pub fn send(&self, job: JobDescriptor) -> Result<(), ChannelClosed> {
        self.tx.send(QueueEntry::Job(job)).map_err(|_| ChannelClosed)
    }

    /// Enqueue the end-of-stream sentinel, consuming the sender. A missing
    /// consumer is not an error here: teardown already happened.
    pub fn finish(self) {
        let _ = self.tx.send(QueueEntry::Done);
    }
}

/// Consumer handle polled by the driver inside host callbacks.
pub struct JobReceiver {
    rx: Receiver<QueueEntry>,
}

impl JobReceiver {
    /// Non-blocking poll. `None` means nothing is queued right now.
    pub fn try_next(&self) -> Option<QueueEntry> {
        match self.rx.try_recv() {
            Ok(entry) => Some(entry),
            Err(TryRecvError::Empty) => None,
            // A dead producer can no longer send its sentinel; report
            // end-of-stream so the consumer cannot hang.
            Err(TryRecvError::Disconnected) => Some(QueueEntry::Done),
        }
    }

    /// Poll-and-sleep until an entry arrives.
    pub fn next_blocking(&self, poll_interval: Duration) -> QueueEntry {
        loop {
            if let Some(entry) = self.try_next() {
                return entry;
            }
            std::thread::sleep(poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn job(key: &str) -> JobDescriptor {
        JobDescriptor {
            bucket: "b1".to_string(),
            key: key.to_string(),
            size: 1,
            mod_time: 0,
            payload: None,
        }
    }

    #[test]
    fn test_fifo_order_then_sentinel() {
        let (tx, rx) = bounded(8);
        for key in ["a", "b", "c"] {
            tx.send(job(key)).unwrap();
        }
        tx.finish();

        let poll = Duration::from_millis(1);
        for key in ["a", "b", "c"] {
            match rx.next_blocking(poll) {
                QueueEntry::Job(j) => assert_eq!(j.key, key),
                QueueEntry::Done => panic!("sentinel before all jobs"),
            }
        }
        assert_eq!(rx.next_blocking(poll), QueueEntry::Done);
    }

    #[test]
    fn test_full_channel_blocks_producer() {
        let (tx, rx) = bounded(2);
        let sent = Arc::new(AtomicUsize::new(0));
        let producer_sent = Arc::clone(&sent);

        let producer = thread::spawn(move || {
            for key in ["a", "b", "c", "d", "e"] {
                tx.send(job(key)).unwrap();
                producer_sent.fetch_add(1, Ordering::SeqCst);
            }
            tx.finish();
        });

        // Give the producer time to fill the channel and stall.
        thread::sleep(Duration::from_millis(100));
        assert!(sent.load(Ordering::SeqCst) <= 3);

        let poll = Duration::from_millis(1);
        let mut received = Vec::new();
        loop {
            match rx.next_blocking(poll) {
                QueueEntry::Job(j) => received.push(j.key),
                QueueEntry::Done => break,
            }
        }
        producer.join().unwrap();
        assert_eq!(received, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_dropped_producer_reads_as_done() {
        let (tx, rx) = bounded(2);
        tx.send(job("a")).unwrap();
        drop(tx);

        let poll = Duration::from_millis(1);
        assert!(matches!(rx.next_blocking(poll), QueueEntry::Job(_)));
        assert_eq!(rx.next_blocking(poll), QueueEntry::Done);
    }

    #[test]
    fn test_send_after_consumer_gone_errors() {
        let (tx, rx) = bounded(2);
        drop(rx);
        assert_eq!(tx.send(job("a")), Err(ChannelClosed));
    }
}
