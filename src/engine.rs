//! Storage engine orchestration
//!
//! The engine ties the pipeline together: `read` serves an immutable
//! in-memory snapshot without touching disk, `write` publishes a new
//! snapshot synchronously and hands durability to the background writer,
//! and `open` hydrates the snapshot from the container file.
//!
//! One engine instance per file path is a caller precondition: two engines
//! on the same path race on the atomic rename and the result is undefined
//! at the file level. No advisory locking is attempted.

use crate::cipher::EncryptionConfig;
use crate::codec::{DocumentSet, JsonCodec};
use crate::compression::CompressionConfig;
use crate::container::Container;
use crate::error::{Result, StoreError};
use crate::writer::{DurabilityWriter, ErrorObserver, JobHandle, WriteJob};
use crossbeam::channel::{bounded, unbounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Engine configuration
///
/// Construction requires an explicit [`EncryptionConfig`]: there is no
/// default that silently writes plaintext to disk. Builder-style setters
/// cover the rest.
///
/// # Examples
///
/// ```no_run
/// use sealstore::{CompressionConfig, EncryptionConfig, Engine, EngineOptions};
///
/// # fn main() -> sealstore::Result<()> {
/// let key = EncryptionConfig::generate_key();
/// let engine = Engine::open(
///     "data.seal",
///     EngineOptions::new(EncryptionConfig::new(key))
///         .compression(CompressionConfig::zstd(5))
///         .sync_writes(true),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EngineOptions {
    pub(crate) compression: CompressionConfig,
    pub(crate) encryption: EncryptionConfig,
    pub(crate) strict_hydration: bool,
    pub(crate) sync_writes: bool,
    pub(crate) read_only: bool,
    pub(crate) drain_timeout: Option<Duration>,
    pub(crate) observer: Option<ErrorObserver>,
}

impl EngineOptions {
    /// Create options with an explicit encryption choice
    /// ([`EncryptionConfig::new`] or [`EncryptionConfig::disabled`]).
    pub fn new(encryption: EncryptionConfig) -> Self {
        EngineOptions {
            compression: CompressionConfig::default(),
            encryption,
            strict_hydration: true,
            sync_writes: false,
            read_only: false,
            drain_timeout: None,
            observer: None,
        }
    }

    /// Set the compression method and level
    pub fn compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    /// Strict hydration (default) fails `open` on a corrupt or
    /// unauthenticated file; lenient mode starts empty and reports the
    /// error through the observer.
    pub fn strict_hydration(mut self, strict: bool) -> Self {
        self.strict_hydration = strict;
        self
    }

    /// Make `write` block until the job is durable on disk
    pub fn sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Open read-only: no writer thread, `write` fails, the file must exist
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Bound how long `close` keeps committing queued jobs; jobs still
    /// queued past the deadline fail with `DroppedOnClose`.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = Some(timeout);
        self
    }

    /// Register a callback for asynchronously-failed write jobs
    pub fn observer(mut self, observer: ErrorObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn container(&self) -> Result<Container> {
        Container::new(
            Box::new(JsonCodec),
            self.compression.clone(),
            self.encryption.cipher(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Closing,
    Closed,
}

/// Encrypted, compressed document store with asynchronous durable writes.
///
/// `read` never blocks on I/O; `write` publishes the new document set to
/// readers immediately and returns once the durable write is enqueued
/// (or committed, with `sync_writes`). Writes observed by `read` on the
/// same handle always include the caller's own completed `write` calls,
/// whether or not they have reached disk yet.
pub struct Engine {
    path: PathBuf,
    /// Caller-context pipeline, used for hydration and `reload` only.
    container: Container,
    snapshot: RwLock<Arc<DocumentSet>>,
    state: Mutex<State>,
    next_seq: AtomicU64,
    poisoned: Arc<AtomicBool>,
    drain_deadline: Arc<Mutex<Option<Instant>>>,
    /// Serializes seq assignment, snapshot publication, and enqueue so the
    /// queue order always matches the publication order.
    write_lock: Mutex<()>,
    tx: Option<Sender<WriteJob>>,
    worker: Option<thread::JoinHandle<()>>,
    sync_writes: bool,
    read_only: bool,
    drain_timeout: Option<Duration>,
}

impl Engine {
    /// Open (or create) a store at `path`.
    ///
    /// If the file exists, it is hydrated synchronously through the full
    /// read pipeline. An absent path starts empty in writable mode; in
    /// read-only mode it is an error. Writable mode creates missing parent
    /// directories and spawns the background writer.
    pub fn open<P: AsRef<Path>>(path: P, options: EngineOptions) -> Result<Engine> {
        options.compression.validate()?;
        let path = path.as_ref().to_path_buf();

        if options.read_only && !path.exists() {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("read-only open of missing file {}", path.display()),
            )));
        }
        if !options.read_only {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        let container = options.container()?;
        let documents = match hydrate(&path, &container) {
            Ok(documents) => documents,
            Err(e) if !options.strict_hydration => {
                warn!(path = %path.display(), error = %e, "lenient hydration: starting empty");
                if let Some(observer) = &options.observer {
                    observer(0, &e);
                }
                DocumentSet::new()
            }
            Err(e) => return Err(e),
        };
        debug!(path = %path.display(), documents = documents.len(), "store hydrated");

        let poisoned = Arc::new(AtomicBool::new(false));
        let drain_deadline = Arc::new(Mutex::new(None));

        let (tx, worker) = if options.read_only {
            (None, None)
        } else {
            let (tx, rx) = unbounded();
            let writer = DurabilityWriter {
                rx,
                target: path.clone(),
                container: options.container()?,
                observer: options.observer.clone(),
                poisoned: poisoned.clone(),
                drain_deadline: drain_deadline.clone(),
            };
            let worker = thread::Builder::new()
                .name("sealstore-writer".to_string())
                .spawn(move || writer.run())?;
            (Some(tx), Some(worker))
        };

        Ok(Engine {
            path,
            container,
            snapshot: RwLock::new(Arc::new(documents)),
            state: Mutex::new(State::Open),
            next_seq: AtomicU64::new(1),
            poisoned,
            drain_deadline,
            write_lock: Mutex::new(()),
            tx,
            worker,
            sync_writes: options.sync_writes,
            read_only: options.read_only,
            drain_timeout: options.drain_timeout,
        })
    }

    /// Current document set. Never touches disk; O(1) handoff of the
    /// published snapshot.
    pub fn read(&self) -> Arc<DocumentSet> {
        self.snapshot.read().clone()
    }

    /// Replace the document set.
    ///
    /// The new snapshot is visible to `read` before this returns; the
    /// durable write happens on the background thread. Without
    /// `sync_writes`, a disk failure after enqueue is reported through the
    /// returned [`JobHandle`] and the error observer, never lost silently.
    pub fn write(&self, documents: DocumentSet) -> Result<JobHandle> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        if self.poisoned.load(Ordering::SeqCst) || *self.state.lock() != State::Open {
            return Err(StoreError::EngineClosed);
        }
        let tx = self.tx.as_ref().ok_or(StoreError::EngineClosed)?;

        let (done_tx, done_rx) = bounded(1);
        let seq;
        {
            let _ordering = self.write_lock.lock();
            seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            let snapshot = Arc::new(documents);
            *self.snapshot.write() = snapshot.clone();
            tx.send(WriteJob {
                seq,
                snapshot,
                done: done_tx,
            })
            .map_err(|_| StoreError::EngineClosed)?;
        }

        let handle = JobHandle::new(seq, done_rx);
        if self.sync_writes {
            handle.wait()?;
        }
        Ok(handle)
    }

    /// Re-run hydration from disk, replacing the in-memory snapshot.
    ///
    /// For callers that suspect disk and memory have diverged (e.g. after
    /// an external restore of the file). Not ordered with respect to
    /// in-flight write jobs.
    pub fn reload(&self) -> Result<()> {
        let documents = hydrate(&self.path, &self.container)?;
        *self.snapshot.write() = Arc::new(documents);
        Ok(())
    }

    /// Stop accepting writes, drain the queue, and release the worker.
    ///
    /// Blocks until every enqueued job has completed or failed, bounded by
    /// the configured drain timeout. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == State::Closed {
                return Ok(());
            }
            *state = State::Closing;
        }

        if let Some(timeout) = self.drain_timeout {
            *self.drain_deadline.lock() = Some(Instant::now() + timeout);
        }

        // Dropping the sender disconnects the channel once the queue drains.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| StoreError::Fatal("writer thread panicked".to_string()))?;
        }

        *self.state.lock() = State::Closed;
        debug!(path = %self.path.display(), "store closed");
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Synchronous read pipeline: file -> open -> decompress -> decode.
///
/// An absent path and an empty file both hydrate to the empty set.
fn hydrate(path: &Path, container: &Container) -> Result<DocumentSet> {
    if !path.exists() {
        return Ok(DocumentSet::new());
    }
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Ok(DocumentSet::new());
    }
    container.parse_record(&bytes)
}
