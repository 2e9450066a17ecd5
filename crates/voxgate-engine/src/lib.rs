pub mod engine_trait;
pub mod ensemble;
pub mod null_engine;
pub mod registry;
pub mod scheduler;
#[cfg(feature = "whisper")]
pub mod whisper_engine;
pub mod worker;

pub use engine_trait::RecognitionEngine;
pub use ensemble::{aggregate, EngineOutcome};
pub use null_engine::NullEngine;
pub use registry::{EngineFactory, EngineRegistry};
pub use scheduler::InferenceScheduler;
#[cfg(feature = "whisper")]
pub use whisper_engine::WhisperEngine;
pub use worker::{EngineWorker, WorkerStatsSnapshot};
