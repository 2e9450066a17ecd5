use crate::ensemble::{self, EngineOutcome};
use crate::registry::EngineRegistry;
use crate::worker::{EngineWorker, WorkerStatsSnapshot};
use futures::future::join_all;
use std::thread::JoinHandle;
use voxgate_core::{ChunkRequest, EngineConfig, EngineError, EnsembleConfig, EnsembleResponse};

/// Hands chunks to the engine workers and merges what comes back.
///
/// Every engine has exactly one worker, so calls against the same engine are
/// serialized while different engines run side by side.
pub struct InferenceScheduler {
    workers: Vec<EngineWorker>,
    ensemble: EnsembleConfig,
}

impl InferenceScheduler {
    pub fn new(workers: Vec<EngineWorker>, ensemble: EnsembleConfig) -> Self {
        Self { workers, ensemble }
    }

    /// Create, initialize and start every configured engine.
    ///
    /// Blocks while models load. Engines that fail are logged and skipped; an
    /// error is returned only when none could be started.
    pub fn load(
        configs: &[EngineConfig],
        registry: &EngineRegistry,
        ensemble: EnsembleConfig,
    ) -> Result<Self, EngineError> {
        let mut workers = Vec::new();
        let mut last_error = None;

        for config in configs {
            match load_worker(config, registry) {
                Ok(worker) => {
                    tracing::info!(
                        engine = %config.name,
                        kind = %config.kind(),
                        language = ?config.language,
                        "engine loaded"
                    );
                    workers.push(worker);
                }
                Err(e) => {
                    tracing::error!(engine = %config.name, "failed to load engine: {e}");
                    last_error = Some(e);
                }
            }
        }

        if workers.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                EngineError::InitializationFailed("no engines configured".to_string())
            }));
        }

        Ok(Self::new(workers, ensemble))
    }

    pub fn engine_count(&self) -> usize {
        self.workers.len()
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name()).collect()
    }

    pub fn is_ensemble(&self) -> bool {
        self.workers.len() > 1
    }

    /// Run the chunk through every engine concurrently and wait for all of them.
    pub async fn transcribe(
        &self,
        request: &ChunkRequest,
    ) -> Result<EnsembleResponse, EngineError> {
        let submissions = self.workers.iter().map(|worker| async move {
            let result = worker
                .submit(request.audio.clone(), request.language.clone())
                .await;
            EngineOutcome {
                engine: worker.name().to_string(),
                result,
            }
        });
        let outcomes = join_all(submissions).await;

        ensemble::aggregate(outcomes, request.speaker.clone(), &self.ensemble)
    }

    pub fn stats(&self) -> Vec<WorkerStatsSnapshot> {
        self.workers.iter().map(|w| w.stats()).collect()
    }

    /// Stop every worker from taking new jobs. Join the returned handles to
    /// wait for queued work to drain.
    pub fn close(&self) -> Vec<JoinHandle<()>> {
        self.workers.iter().filter_map(|w| w.close()).collect()
    }
}

fn load_worker(
    config: &EngineConfig,
    registry: &EngineRegistry,
) -> Result<EngineWorker, EngineError> {
    let engine = registry.build(config)?;
    EngineWorker::spawn(&config.name, config.language.clone(), engine)
}
