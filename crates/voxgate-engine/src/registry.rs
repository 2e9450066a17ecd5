use crate::engine_trait::RecognitionEngine;
use crate::null_engine::NullEngine;
use std::collections::BTreeMap;
use voxgate_core::{EngineConfig, EngineError};

pub type EngineFactory = fn() -> Box<dyn RecognitionEngine>;

/// Engine kinds this build can construct, keyed by the `kind` of an `[[engine]]` entry.
pub struct EngineRegistry {
    factories: BTreeMap<String, EngineFactory>,
}

impl EngineRegistry {
    /// A registry holding the built-in kinds.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: BTreeMap::new(),
        };
        registry.register("null", || Box::new(NullEngine::new()));
        #[cfg(feature = "whisper")]
        registry.register("whisper", || {
            Box::new(crate::whisper_engine::WhisperEngine::new())
        });
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register(&mut self, kind: &str, factory: EngineFactory) {
        if self.factories.insert(kind.to_string(), factory).is_some() {
            tracing::debug!(kind, "engine factory replaced");
        }
    }

    pub fn create(&self, kind: &str) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        self.factories
            .get(kind)
            .map(|factory| factory())
            .ok_or_else(|| EngineError::EngineNotFound(kind.to_string()))
    }

    /// Construct and initialize the engine described by one config entry.
    ///
    /// Blocks for as long as the engine takes to load its model.
    pub fn build(&self, config: &EngineConfig) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        let mut engine = self.create(config.kind())?;
        engine.initialize(config.extra.clone()).map_err(|e| match e {
            EngineError::InitializationFailed(msg) => {
                EngineError::InitializationFailed(format!("{}: {msg}", config.name))
            }
            other => other,
        })?;
        Ok(engine)
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
