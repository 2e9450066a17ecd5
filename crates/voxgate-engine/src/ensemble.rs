//! Merging per-engine outcomes into a single response.

use serde_json::Value;
use std::collections::BTreeMap;
use voxgate_core::{
    EngineError, EngineResult, EnsembleConfig, EnsembleResponse, FinalTextPolicy, Transcript,
};

/// Result of one engine for one chunk, tagged with the engine's configured name.
#[derive(Debug)]
pub struct EngineOutcome {
    pub engine: String,
    pub result: Result<Transcript, EngineError>,
}

/// Fold engine outcomes, given in configuration order, into one response.
///
/// Failed engines are left out of the per-engine mapping. Only when every
/// engine failed is an error returned; with a single engine that is the
/// engine's own error.
pub fn aggregate(
    outcomes: Vec<EngineOutcome>,
    speaker: Value,
    config: &EnsembleConfig,
) -> Result<EnsembleResponse, EngineError> {
    let mut succeeded: Vec<(String, Transcript)> = Vec::new();
    let mut failed: Vec<(String, EngineError)> = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(mut transcript) => {
                transcript.text = transcript.text.trim().to_string();
                succeeded.push((outcome.engine, transcript));
            }
            Err(e) => {
                tracing::warn!(engine = %outcome.engine, "engine left out of response: {e}");
                failed.push((outcome.engine, e));
            }
        }
    }

    if succeeded.is_empty() {
        if failed.len() == 1 {
            if let Some((_, e)) = failed.pop() {
                return Err(e);
            }
        }
        let detail = failed
            .iter()
            .map(|(name, e)| format!("{name}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(EngineError::ProcessingFailed(format!(
            "all engines failed ({detail})"
        )));
    }

    let chosen = choose_final(&succeeded, config.final_text);

    let reported: Vec<f32> = succeeded
        .iter()
        .filter_map(|(_, t)| t.confidence)
        .collect();
    let confidence = if reported.is_empty() {
        config.placeholder_confidence
    } else {
        reported.iter().sum::<f32>() / reported.len() as f32
    };

    let language = chosen
        .and_then(|i| succeeded[i].1.language.clone())
        .or_else(|| succeeded.iter().find_map(|(_, t)| t.language.clone()));

    let final_text = chosen
        .map(|i| succeeded[i].1.text.clone())
        .unwrap_or_default();

    let engines: BTreeMap<String, EngineResult> = succeeded
        .into_iter()
        .map(|(name, t)| {
            let result = EngineResult {
                text: t.text,
                language: t.language,
                confidence: t.confidence.unwrap_or(config.placeholder_confidence),
            };
            (name, result)
        })
        .collect();

    Ok(EnsembleResponse {
        final_text,
        speaker,
        language,
        confidence,
        events: Vec::new(),
        engines,
    })
}

/// Index of the transcript supplying `finalText`, if any engine heard something.
fn choose_final(succeeded: &[(String, Transcript)], policy: FinalTextPolicy) -> Option<usize> {
    let candidates = succeeded
        .iter()
        .enumerate()
        .filter(|(_, (_, t))| !t.text.is_empty());

    match policy {
        FinalTextPolicy::FirstConfigured => candidates.map(|(i, _)| i).next(),
        FinalTextPolicy::Longest => {
            let mut best: Option<(usize, usize)> = None;
            for (i, (_, t)) in candidates {
                let len = t.text.chars().count();
                if best.map_or(true, |(_, best_len)| len > best_len) {
                    best = Some((i, len));
                }
            }
            best.map(|(i, _)| i)
        }
        FinalTextPolicy::HighestConfidence => {
            let mut best: Option<(usize, f32)> = None;
            for (i, (_, t)) in candidates {
                let score = t.confidence.unwrap_or(-1.0);
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((i, score));
                }
            }
            best.map(|(i, _)| i)
        }
    }
}
