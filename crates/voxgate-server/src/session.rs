//! Per-connection protocol loop.
//!
//! Each cycle reads one metadata text frame and one binary audio frame, runs
//! the audio through the engines and answers with at most one frame. Cycles
//! never overlap within a session.

use crate::error::SessionError;
use crate::state::SharedScheduler;
use crate::transport::{FrameTransport, InboundFrame};
use std::sync::Arc;
use std::time::{Duration, Instant};
use voxgate_core::{ChunkRequest, ClientMetadata, ErrorCode, ServerFrame, SessionConfig};

const ENGINE_UNAVAILABLE_MESSAGE: &str = "Model not loaded on server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    AwaitingMetadata,
    AwaitingAudio,
    Dispatched,
    Closed,
}

pub struct Session<T: FrameTransport> {
    id: u64,
    transport: T,
    engines: SharedScheduler,
    config: SessionConfig,
    state: SessionState,
    last_activity: Instant,
    /// A frame that arrived while inference was running; consumed by the next read.
    pending: Option<InboundFrame>,
}

impl<T: FrameTransport> Session<T> {
    pub fn new(id: u64, transport: T, engines: SharedScheduler, config: SessionConfig) -> Self {
        Self {
            id,
            transport,
            engines,
            config,
            state: SessionState::Open,
            last_activity: Instant::now(),
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve cycles until the client goes away.
    ///
    /// A client disconnect ends the session with `Ok`. Any other failure is
    /// reported to the client on a best-effort basis and returned.
    pub async fn run(mut self) -> Result<(), SessionError> {
        tracing::info!(session = self.id, "client connected");

        let outcome = loop {
            match self.cycle().await {
                Ok(()) => {}
                Err(SessionError::Disconnected) => {
                    tracing::info!(
                        session = self.id,
                        state = ?self.state,
                        idle_ms = self.last_activity.elapsed().as_millis() as u64,
                        "client disconnected"
                    );
                    break Ok(());
                }
                Err(e) => {
                    tracing::error!(session = self.id, state = ?self.state, "in-stream error: {e}");
                    self.send_best_effort(ServerFrame::error(
                        ErrorCode::InternalError,
                        e.to_string(),
                    ))
                    .await;
                    break Err(e);
                }
            }
        };

        self.state = SessionState::Closed;
        outcome
    }

    async fn cycle(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::AwaitingMetadata;
        let frame = match self.next_frame(Some(self.config.metadata_timeout())).await? {
            Some(frame) => frame,
            None => {
                tracing::trace!(session = self.id, "metadata wait expired, re-arming");
                return Ok(());
            }
        };

        let metadata = match frame {
            InboundFrame::Text(text) => match ClientMetadata::parse(&text) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(session = self.id, "malformed metadata: {e}");
                    return self
                        .send_frame(&ServerFrame::error(
                            ErrorCode::MalformedMetadata,
                            e.to_string(),
                        ))
                        .await;
                }
            },
            InboundFrame::Binary(data) => {
                tracing::warn!(
                    session = self.id,
                    bytes = data.len(),
                    "audio frame received while awaiting metadata"
                );
                return self
                    .send_frame(&ServerFrame::error(
                        ErrorCode::UnexpectedFrame,
                        "expected a metadata text frame before audio",
                    ))
                    .await;
            }
        };

        self.state = SessionState::AwaitingAudio;
        let audio_timeout = self.config.audio_timeout();
        let audio = match self.next_frame(audio_timeout).await? {
            Some(InboundFrame::Binary(audio)) => audio,
            Some(InboundFrame::Text(_)) => {
                tracing::warn!(session = self.id, "text frame received while awaiting audio");
                return self
                    .send_frame(&ServerFrame::error(
                        ErrorCode::UnexpectedFrame,
                        "expected a binary audio frame after metadata",
                    ))
                    .await;
            }
            None => {
                let waited = audio_timeout.unwrap_or_default();
                tracing::warn!(session = self.id, "audio wait expired after {waited:?}");
                return self
                    .send_frame(&ServerFrame::error(
                        ErrorCode::AudioTimeout,
                        format!("no audio received within {} ms", waited.as_millis()),
                    ))
                    .await;
            }
        };

        let engines = Arc::clone(&self.engines);
        let Some(scheduler) = engines.get() else {
            return self
                .send_frame(&ServerFrame::error(
                    ErrorCode::EngineUnavailable,
                    ENGINE_UNAVAILABLE_MESSAGE,
                ))
                .await;
        };

        let request = ChunkRequest::new(metadata.speaker(), metadata.language.clone(), audio);
        tracing::debug!(session = self.id, bytes = request.audio.len(), "dispatching chunk");
        self.state = SessionState::Dispatched;

        let inference = scheduler.transcribe(&request);
        tokio::pin!(inference);
        let result = loop {
            if self.pending.is_some() {
                break inference.await;
            }
            tokio::select! {
                result = &mut inference => break result,
                frame = self.transport.recv() => {
                    // a disconnect abandons the job; the worker finishes it and drops the result
                    let frame = frame?;
                    self.last_activity = Instant::now();
                    self.pending = Some(frame);
                }
            }
        };

        match result {
            Ok(response) if response.has_text() => {
                tracing::debug!(
                    session = self.id,
                    elapsed_ms = request.received_at.elapsed().as_millis() as u64,
                    "sending transcript"
                );
                self.send_frame(&ServerFrame::result(response, scheduler.engine_count()))
                    .await
            }
            Ok(_) => {
                tracing::debug!(session = self.id, "empty transcript, nothing sent");
                Ok(())
            }
            Err(e) => {
                if e.is_per_call() {
                    tracing::warn!(session = self.id, "recognition failed: {e}");
                } else {
                    tracing::error!(session = self.id, "recognition failed: {e}");
                }
                self.send_frame(&ServerFrame::error(ErrorCode::EngineFailure, e.to_string()))
                    .await
            }
        }
    }

    /// Next inbound frame, or `None` if `limit` elapsed first.
    async fn next_frame(
        &mut self,
        limit: Option<Duration>,
    ) -> Result<Option<InboundFrame>, SessionError> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        let frame = match limit {
            Some(limit) => match tokio::time::timeout(limit, self.transport.recv()).await {
                Ok(frame) => frame?,
                Err(_) => return Ok(None),
            },
            None => self.transport.recv().await?,
        };
        self.last_activity = Instant::now();
        Ok(Some(frame))
    }

    async fn send_frame(&mut self, frame: &ServerFrame) -> Result<(), SessionError> {
        let text = frame.to_json()?;
        self.transport.send_text(text).await
    }

    /// Send a frame on a connection that may already be unusable, ignoring failure.
    async fn send_best_effort(&mut self, frame: ServerFrame) {
        let Ok(text) = frame.to_json() else {
            return;
        };
        if let Err(e) = self.transport.send_text(text).await {
            tracing::debug!(session = self.id, "error frame not delivered: {e}");
        }
    }
}
