use crate::error::SessionError;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};

/// A data frame received from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Bidirectional frame channel a session runs over.
///
/// `recv` must be cancel-safe: sessions race it against timers and inference,
/// and a dropped `recv` future must not lose a frame.
#[async_trait]
pub trait FrameTransport: Send {
    /// Wait for the next data frame. Returns [`SessionError::Disconnected`] once
    /// the peer has gone away, whether or not it sent a close frame.
    async fn recv(&mut self) -> Result<InboundFrame, SessionError>;

    async fn send_text(&mut self, text: String) -> Result<(), SessionError>;
}

#[async_trait]
impl FrameTransport for WebSocket {
    async fn recv(&mut self) -> Result<InboundFrame, SessionError> {
        loop {
            match WebSocket::recv(self).await {
                None | Some(Ok(Message::Close(_))) => return Err(SessionError::Disconnected),
                Some(Ok(Message::Text(text))) => return Ok(InboundFrame::Text(text)),
                Some(Ok(Message::Binary(data))) => return Ok(InboundFrame::Binary(data)),
                // pings are answered by the websocket layer
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                // abrupt drops (reset without a close frame) end the connection like a close
                Some(Err(e)) => {
                    tracing::debug!("websocket receive failed, treating as disconnect: {e}");
                    return Err(SessionError::Disconnected);
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), SessionError> {
        WebSocket::send(self, Message::Text(text))
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }
}
