use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use voxgate_core::{EngineConfig, EngineError, EnsembleConfig, SessionConfig};
use voxgate_engine::{EngineRegistry, InferenceScheduler};

/// The engine set, filled in once after startup loading finishes.
///
/// Sessions read it without locking; until it is set every cycle answers with
/// an `engine_unavailable` error.
pub type SharedScheduler = Arc<OnceLock<InferenceScheduler>>;

/// State shared by every request handler and session.
#[derive(Clone)]
pub struct AppState {
    pub engines: SharedScheduler,
    pub session: SessionConfig,
    next_session_id: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            engines: Arc::new(OnceLock::new()),
            session,
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Start with an already loaded engine set.
    pub fn with_engines(session: SessionConfig, scheduler: InferenceScheduler) -> Self {
        let state = Self::new(session);
        // freshly created, so the slot is empty
        let _ = state.engines.set(scheduler);
        state
    }

    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn model_loaded(&self) -> bool {
        self.engines.get().is_some()
    }

    /// Load the configured engines off the async runtime and publish them.
    ///
    /// On failure the slot stays empty and the server keeps answering with
    /// `engine_unavailable`.
    pub async fn load_engines(
        &self,
        configs: Vec<EngineConfig>,
        registry: EngineRegistry,
        ensemble: EnsembleConfig,
    ) -> Result<(), EngineError> {
        let loaded = tokio::task::spawn_blocking(move || {
            InferenceScheduler::load(&configs, &registry, ensemble)
        })
        .await
        .map_err(|e| EngineError::InitializationFailed(format!("engine loader crashed: {e}")))??;

        let names = loaded.engine_names().join(", ");
        if self.engines.set(loaded).is_err() {
            return Err(EngineError::InitializationFailed(
                "engines were already loaded".to_string(),
            ));
        }
        tracing::info!(engines = %names, "engines ready");
        Ok(())
    }

    /// Stop the workers and wait for queued jobs to finish.
    pub async fn shutdown_engines(&self) {
        let Some(scheduler) = self.engines.get() else {
            return;
        };
        let handles = scheduler.close();
        let joined = tokio::task::spawn_blocking(move || {
            handles
                .into_iter()
                .map(JoinHandle::join)
                .filter(Result::is_err)
                .count()
        })
        .await;

        match joined {
            Ok(0) => tracing::info!("engine workers stopped"),
            Ok(n) => tracing::warn!("{n} engine worker(s) exited abnormally"),
            Err(e) => tracing::warn!("failed to join engine workers: {e}"),
        }
    }
}
