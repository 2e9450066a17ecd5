pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

pub use config::{AppConfig, EngineConfig, EnsembleConfig, FinalTextPolicy, SessionConfig};
pub use error::{ConfigError, EngineError};
pub use protocol::{ClientMetadata, ErrorCode, MetadataError, ServerFrame};
pub use types::{default_speaker, ChunkRequest, EngineResult, EnsembleResponse, Transcript};
