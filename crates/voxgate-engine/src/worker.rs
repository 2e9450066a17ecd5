use crate::engine_trait::RecognitionEngine;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use voxgate_core::{EngineError, Transcript};

struct Job {
    audio: Arc<[u8]>,
    language: Option<String>,
    reply: oneshot::Sender<Result<Transcript, EngineError>>,
}

#[derive(Debug, Default)]
struct WorkerStats {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time counters for one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    pub name: String,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    /// Jobs accepted but not finished yet, including the one running.
    pub pending: u64,
}

/// One engine instance pinned to its own OS thread.
///
/// Jobs are served strictly in submission order, one at a time. Submitting is
/// async and never blocks the caller's runtime thread.
pub struct EngineWorker {
    name: String,
    language: Option<String>,
    jobs: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    stats: Arc<WorkerStats>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl EngineWorker {
    /// Move an initialized engine onto a new worker thread.
    pub fn spawn(
        name: &str,
        language: Option<String>,
        engine: Box<dyn RecognitionEngine>,
    ) -> Result<Self, EngineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(WorkerStats::default());
        let thread_stats = Arc::clone(&stats);
        let thread_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(format!("engine-{name}"))
            .spawn(move || run(thread_name, engine, rx, thread_stats))
            .map_err(|e| {
                EngineError::InitializationFailed(format!(
                    "failed to spawn worker thread for '{name}': {e}"
                ))
            })?;

        Ok(Self {
            name: name.to_string(),
            language,
            jobs: Mutex::new(Some(tx)),
            stats,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Default language hint applied when a request carries none.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Queue audio for recognition and wait for the result.
    ///
    /// If the returned future is dropped, the job still runs to completion on
    /// the worker and its result is discarded.
    pub async fn submit(
        &self,
        audio: Arc<[u8]>,
        language: Option<String>,
    ) -> Result<Transcript, EngineError> {
        let sender = self
            .jobs
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .ok_or_else(|| EngineError::WorkerUnavailable(self.name.clone()))?;

        let (reply, result_rx) = oneshot::channel();
        let job = Job {
            audio,
            language: language.or_else(|| self.language.clone()),
            reply,
        };
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        if sender.send(job).is_err() {
            self.stats.submitted.fetch_sub(1, Ordering::Relaxed);
            return Err(EngineError::WorkerUnavailable(self.name.clone()));
        }

        result_rx
            .await
            .map_err(|_| EngineError::WorkerUnavailable(self.name.clone()))?
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        let submitted = self.stats.submitted.load(Ordering::Relaxed);
        let completed = self.stats.completed.load(Ordering::Relaxed);
        let failed = self.stats.failed.load(Ordering::Relaxed);
        WorkerStatsSnapshot {
            name: self.name.clone(),
            submitted,
            completed,
            failed,
            pending: submitted.saturating_sub(completed + failed),
        }
    }

    /// Stop accepting jobs. The thread finishes what is already queued and
    /// exits; the returned handle can be joined to wait for that.
    pub fn close(&self) -> Option<JoinHandle<()>> {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.take();
        }
        self.thread.lock().ok().and_then(|mut t| t.take())
    }
}

fn run(
    name: String,
    mut engine: Box<dyn RecognitionEngine>,
    mut rx: mpsc::UnboundedReceiver<Job>,
    stats: Arc<WorkerStats>,
) {
    tracing::debug!(engine = %name, "worker started");

    while let Some(job) = rx.blocking_recv() {
        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            engine.transcribe(&job.audio, job.language.as_deref())
        }))
        .unwrap_or_else(|_| Err(EngineError::Panicked(name.clone())));

        match &outcome {
            Ok(transcript) => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    engine = %name,
                    bytes = job.audio.len(),
                    chars = transcript.text.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "recognition finished"
                );
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(engine = %name, "recognition failed: {e}");
            }
        }

        if job.reply.send(outcome).is_err() {
            tracing::debug!(engine = %name, "submitter went away, result discarded");
        }
    }

    tracing::debug!(engine = %name, "job channel closed, worker exiting");
}
