//! Background durability writer
//!
//! Owns the single worker thread that turns write jobs into durable files.
//! Jobs arrive over an unbounded crossbeam channel and are committed one at
//! a time, strictly in sequence order. Every job is written; none are
//! skipped or coalesced, so the on-disk file always steps through the same
//! history the caller produced.
//!
//! Each commit uses the write-fsync-rename pattern:
//!
//! 1. Write the full container record to a hidden sibling temp file
//! 2. fsync the temp file
//! 3. Atomic rename over the target path
//! 4. fsync the parent directory (unix)
//!
//! The target path is therefore always fully absent, fully the previous
//! record, or fully the new record. A failed job leaves the previous valid
//! file in place and is reported through the job handle and the registered
//! error observer; the worker moves on to the next job. A sequence
//! regression in the queue is fatal: the worker poisons the engine and
//! stops.

use crate::codec::DocumentSet;
use crate::container::Container;
use crate::error::{Result, StoreError};
use crossbeam::channel::{Receiver, Sender};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Callback invoked with every asynchronously-failed write job.
pub type ErrorObserver = Arc<dyn Fn(u64, &StoreError) + Send + Sync>;

/// One enqueued durable write.
pub(crate) struct WriteJob {
    pub seq: u64,
    pub snapshot: Arc<DocumentSet>,
    pub done: Sender<Result<()>>,
}

/// Handle to one enqueued write job.
///
/// Resolves exactly once with the job's durable outcome; a second `wait`
/// reports `EngineClosed`.
pub struct JobHandle {
    seq: u64,
    done: Receiver<Result<()>>,
}

impl JobHandle {
    pub(crate) fn new(seq: u64, done: Receiver<Result<()>>) -> Self {
        JobHandle { seq, done }
    }

    /// Sequence number assigned to this write.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Block until the job has been durably committed (or failed).
    pub fn wait(&self) -> Result<()> {
        match self.done.recv() {
            Ok(result) => result,
            Err(_) => Err(StoreError::EngineClosed),
        }
    }
}

/// State owned by the background worker thread.
pub(crate) struct DurabilityWriter {
    pub rx: Receiver<WriteJob>,
    pub target: PathBuf,
    pub container: Container,
    pub observer: Option<ErrorObserver>,
    /// Set on fatal failure; the engine fails writes fast once set.
    pub poisoned: Arc<AtomicBool>,
    /// Set by `close`; queued jobs past this instant are dropped.
    pub drain_deadline: Arc<parking_lot::Mutex<Option<Instant>>>,
}

impl DurabilityWriter {
    /// Consume jobs until the channel disconnects.
    pub(crate) fn run(self) {
        let mut last_seq: u64 = 0;

        while let Ok(job) = self.rx.recv() {
            if self.past_deadline() {
                let err = StoreError::DroppedOnClose(job.seq);
                warn!(seq = job.seq, "dropping queued write past drain deadline");
                self.report(job.seq, &err);
                let _ = job.done.send(Err(err));
                continue;
            }

            if job.seq <= last_seq {
                let err = StoreError::Fatal(format!(
                    "write queue out of order: seq {} after {}",
                    job.seq, last_seq
                ));
                error!(seq = job.seq, last_seq, "fatal: write queue corruption");
                self.poisoned.store(true, Ordering::SeqCst);
                self.report(job.seq, &err);
                let _ = job.done.send(Err(err));
                break;
            }
            last_seq = job.seq;

            let result = self.commit(&job.snapshot);
            match &result {
                Ok(()) => debug!(seq = job.seq, "write job committed"),
                Err(e) => {
                    warn!(seq = job.seq, error = %e, "write job failed");
                    self.report(job.seq, e);
                }
            }
            let _ = job.done.send(result);
        }

        debug!("durability writer stopped");
    }

    /// Build the container record and atomically replace the target file.
    fn commit(&self, snapshot: &DocumentSet) -> Result<()> {
        let record = self.container.build_record(snapshot)?;
        let tmp = temp_path(&self.target);

        {
            let mut file = File::create(&tmp)?;
            file.write_all(&record)?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&tmp, &self.target) {
            // Don't leave the temp file behind on a failed rename
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        sync_parent_dir(&self.target)?;
        Ok(())
    }

    fn past_deadline(&self) -> bool {
        matches!(*self.drain_deadline.lock(), Some(deadline) if Instant::now() > deadline)
    }

    fn report(&self, seq: u64, err: &StoreError) {
        if let Some(observer) = &self.observer {
            observer(seq, err);
        }
    }
}

/// Hidden sibling temp file for the write-fsync-rename pattern.
fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    target.with_file_name(format!(".{}.tmp", name))
}

#[cfg(unix)]
fn sync_parent_dir(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            File::open(parent)?.sync_all()?;
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_target: &Path) -> Result<()> {
    Ok(())
}
