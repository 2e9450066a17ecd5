use crate::engine_trait::RecognitionEngine;
use voxgate_core::{EngineError, Transcript};

/// Engine that recognizes nothing and reports how much audio it was given.
pub struct NullEngine {
    call_count: usize,
}

impl NullEngine {
    pub fn new() -> Self {
        Self { call_count: 0 }
    }

    pub fn call_count(&self) -> usize {
        self.call_count
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionEngine for NullEngine {
    fn name(&self) -> &str {
        "null"
    }

    fn initialize(&mut self, _config: toml::Value) -> Result<(), EngineError> {
        Ok(())
    }

    fn transcribe(
        &mut self,
        audio: &[u8],
        _language_hint: Option<&str>,
    ) -> Result<Transcript, EngineError> {
        self.call_count += 1;
        tracing::trace!("NullEngine call #{}, {} bytes", self.call_count, audio.len());
        Ok(Transcript::text(format!("[null] {} bytes", audio.len())))
    }
}
