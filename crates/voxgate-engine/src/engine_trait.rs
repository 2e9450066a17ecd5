use voxgate_core::{EngineError, Transcript};

/// A blocking speech recognition backend.
///
/// Engines are driven from a single dedicated worker thread, so implementations
/// only need to be `Send`: `transcribe` is never called concurrently on the same
/// instance.
pub trait RecognitionEngine: Send {
    /// Registry name of the backend (e.g. `"null"`, `"whisper"`).
    fn name(&self) -> &str;
    /// One-time setup with engine-specific TOML configuration. May load a model.
    fn initialize(&mut self, config: toml::Value) -> Result<(), EngineError>;
    /// Recognize one chunk of audio. Blocks until the engine is done.
    fn transcribe(
        &mut self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<Transcript, EngineError>;
}
