//! Asynchronous audit trail of proxied exchanges.
//!
//! [`AuditLogger::submit`] hands an [`AuditEntry`] to a bounded queue and
//! returns immediately; when the queue is full the entry is dropped and
//! counted. A dispatcher task drains the queue and spawns one writer per
//! entry while holding a permit from a semaphore sized `max_writers`, so at
//! most that many entries are being serialised and appended at once.
//! Serialisation runs concurrently; the append itself happens under the
//! file lock as a single `line + '\n'` write, so entries never interleave.
//!
//! Without a configured file the logger is disabled and `submit` is a
//! no-op.

pub mod entry;
pub mod recorder;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify, Semaphore};

use crate::config::model::LoggingConfig;
use crate::error::{AuditError, GatewayError};
pub use entry::AuditEntry;
pub use recorder::record;

#[derive(Debug, Default)]
struct AuditStats {
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStatsSnapshot {
    pub written: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Writer-side state, shared by the dispatcher and writer tasks.
struct Sink {
    file: Mutex<tokio::fs::File>,
    stats: AuditStats,
    /// Accepted but not yet written.
    pending: AtomicUsize,
    idle: Notify,
}

impl Sink {
    async fn write(&self, entry: AuditEntry) {
        match serde_json::to_string(&entry) {
            Ok(mut line) => {
                line.push('\n');
                let result = {
                    let mut file = self.file.lock().await;
                    match file.write_all(line.as_bytes()).await {
                        Ok(()) => file.flush().await,
                        Err(e) => Err(e),
                    }
                };
                match result {
                    Ok(()) => {
                        self.stats.written.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(service = %entry.service, path = %entry.path, "audit entry written");
                    }
                    Err(e) => {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(error = %e, service = %entry.service, "audit write failed");
                    }
                }
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, service = %entry.service, "audit entry serialisation failed");
            }
        }
        self.complete_one();
    }

    fn complete_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

struct Shared {
    tx: mpsc::Sender<AuditEntry>,
    path: PathBuf,
    max_body_capture: usize,
    sink: Arc<Sink>,
}

#[derive(Clone, Default)]
pub struct AuditLogger {
    shared: Option<Arc<Shared>>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

impl AuditLogger {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open the log file and start the writer pool.
    ///
    /// Returns a disabled logger when no file is configured. Must be
    /// called from within a Tokio runtime.
    pub fn start(config: &LoggingConfig) -> Result<Self, GatewayError> {
        let Some(path) = config.file.clone() else {
            tracing::info!("audit logging disabled (no logging.file configured)");
            return Ok(Self::disabled());
        };

        let file = open_append(&path).map_err(|source| GatewayError::AuditLogOpen {
            path: path.clone(),
            source,
        })?;

        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let sink = Arc::new(Sink {
            file: Mutex::new(tokio::fs::File::from_std(file)),
            stats: AuditStats::default(),
            pending: AtomicUsize::new(0),
            idle: Notify::new(),
        });
        let writers = Arc::new(Semaphore::new(config.max_writers.max(1)));

        tokio::spawn(dispatch(rx, Arc::clone(&sink), writers));

        tracing::info!(
            path = %path.display(),
            max_writers = config.max_writers,
            queue_capacity = config.queue_capacity,
            "audit logging started"
        );

        Ok(Self {
            shared: Some(Arc::new(Shared {
                tx,
                path,
                max_body_capture: config.max_body_capture,
                sink,
            })),
        })
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.shared.is_some()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.shared.as_ref().map(|s| s.path.as_path())
    }

    #[must_use]
    pub fn max_body_capture(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.max_body_capture)
    }

    /// Queue an entry without waiting. Returns whether it was accepted.
    pub fn submit(&self, entry: AuditEntry) -> bool {
        let Some(shared) = &self.shared else {
            return false;
        };

        // Count before sending so flush() never observes a queued entry as done.
        shared.sink.pending.fetch_add(1, Ordering::AcqRel);
        match shared.tx.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(entry) | TrySendError::Closed(entry)) => {
                shared.sink.complete_one();
                let dropped = shared.sink.stats.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    service = %entry.service,
                    path = %entry.path,
                    dropped,
                    "audit queue full, entry dropped"
                );
                false
            }
        }
    }

    /// Wait until every accepted entry has been written (or has failed).
    pub async fn flush(&self) {
        let Some(shared) = &self.shared else {
            return;
        };
        loop {
            let idle = shared.sink.idle.notified();
            if shared.sink.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Raw contents of the audit log.
    pub async fn read_all(&self) -> Result<String, AuditError> {
        let shared = self.shared.as_ref().ok_or(AuditError::Unavailable)?;
        Ok(tokio::fs::read_to_string(&shared.path).await?)
    }

    #[must_use]
    pub fn stats(&self) -> AuditStatsSnapshot {
        self.shared
            .as_ref()
            .map(|s| AuditStatsSnapshot {
                written: s.sink.stats.written.load(Ordering::Relaxed),
                dropped: s.sink.stats.dropped.load(Ordering::Relaxed),
                failed: s.sink.stats.failed.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }
}

fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

async fn dispatch(mut rx: mpsc::Receiver<AuditEntry>, sink: Arc<Sink>, writers: Arc<Semaphore>) {
    while let Some(entry) = rx.recv().await {
        let Ok(permit) = Arc::clone(&writers).acquire_owned().await else {
            break;
        };
        let sink = Arc::clone(&sink);
        tokio::spawn(async move {
            sink.write(entry).await;
            drop(permit);
        });
    }
    tracing::debug!("audit dispatcher stopped");
}
