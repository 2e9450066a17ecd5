use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client disconnected")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
