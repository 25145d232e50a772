//! Timestamp-based change detection against the last successful run.

/// Outcome of comparing an object's modification time with the last run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    /// New or modified since the last run; a full read is required.
    Enqueue,
    /// Unchanged, but accurate mode needs it acknowledged as still present
    /// so the host can tell "unchanged" apart from "deleted".
    EnqueueUnchanged,
    /// Unchanged and accurate mode is off; publish nothing.
    Skip,
}

/// Decide what to do with an object given its modification time and the
/// timestamp of the last successful run, both in UTC epoch seconds.
pub fn decide(mod_time: i64, last_run: i64, accurate: bool) -> ChangeDecision {
    if last_run > mod_time {
        // Present on the last backup and untouched since; its bytes never
        // need to move again.
        if accurate {
            ChangeDecision::EnqueueUnchanged
        } else {
            ChangeDecision::Skip
        }
    } else {
        ChangeDecision::Enqueue
    }
}
