use crate::engine_trait::RecognitionEngine;
use voxgate_core::{EngineError, Transcript};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// whisper.cpp backend. Audio is expected as 16-bit little-endian mono PCM at 16 kHz.
pub struct WhisperEngine {
    context: Option<WhisperContext>,
    beam_size: i32,
    threads: i32,
}

impl WhisperEngine {
    pub fn new() -> Self {
        Self {
            context: None,
            beam_size: 5,
            threads: default_threads(),
        }
    }
}

impl Default for WhisperEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn default_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(1)
}

fn pcm16le_to_f32(audio: &[u8]) -> Vec<f32> {
    audio
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect()
}

/// An optional integer setting that must fit whisper.cpp's `int` and be at least 1.
fn positive_setting(config: &toml::Value, key: &str) -> Result<Option<i32>, EngineError> {
    let Some(raw) = config.get(key).and_then(|v| v.as_integer()) else {
        return Ok(None);
    };
    match i32::try_from(raw) {
        Ok(value) if value >= 1 => Ok(Some(value)),
        _ => Err(EngineError::InitializationFailed(format!(
            "'{key}' must be between 1 and {}, got {raw}",
            i32::MAX
        ))),
    }
}

impl RecognitionEngine for WhisperEngine {
    fn name(&self) -> &str {
        "whisper"
    }

    fn initialize(&mut self, config: toml::Value) -> Result<(), EngineError> {
        let model_path = config
            .get("model_path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                EngineError::InitializationFailed(
                    "missing 'model_path' in whisper config".to_string(),
                )
            })?;

        if let Some(beam) = positive_setting(&config, "beam_size")? {
            self.beam_size = beam;
        }
        if let Some(threads) = positive_setting(&config, "threads")? {
            self.threads = threads;
        }

        let context =
            WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
                .map_err(|e| {
                    EngineError::InitializationFailed(format!(
                        "failed to load whisper model from {model_path}: {e}"
                    ))
                })?;
        self.context = Some(context);

        tracing::info!(
            model_path = %model_path,
            beam_size = self.beam_size,
            threads = self.threads,
            "WhisperEngine initialized"
        );
        Ok(())
    }

    fn transcribe(
        &mut self,
        audio: &[u8],
        language_hint: Option<&str>,
    ) -> Result<Transcript, EngineError> {
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| EngineError::ProcessingFailed("model not loaded".to_string()))?;

        let samples = pcm16le_to_f32(audio);
        if samples.is_empty() {
            return Ok(Transcript::default());
        }

        let mut state = context
            .create_state()
            .map_err(|e| EngineError::ProcessingFailed(format!("failed to create state: {e}")))?;

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: self.beam_size,
            patience: -1.0,
        });
        params.set_language(Some(language_hint.unwrap_or("auto")));
        params.set_n_threads(self.threads);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_print_special(false);

        state
            .full(params, &samples)
            .map_err(|e| EngineError::ProcessingFailed(format!("whisper full() failed: {e}")))?;

        let segments = state
            .full_n_segments()
            .map_err(|e| EngineError::ProcessingFailed(e.to_string()))?;
        let mut pieces = Vec::new();
        for i in 0..segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| EngineError::ProcessingFailed(e.to_string()))?;
            let text = text.trim();
            if !text.is_empty() {
                pieces.push(text.to_string());
            }
        }

        let language = state
            .full_lang_id_from_state()
            .ok()
            .and_then(whisper_rs::get_lang_str)
            .map(str::to_string);

        Ok(Transcript {
            text: pieces.join(" "),
            language,
            confidence: None,
        })
    }
}
