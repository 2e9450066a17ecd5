use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine initialization failed: {0}")]
    InitializationFailed(String),

    #[error("recognition failed: {0}")]
    ProcessingFailed(String),

    #[error("engine not found: {0}")]
    EngineNotFound(String),

    #[error("engine worker '{0}' is no longer running")]
    WorkerUnavailable(String),

    #[error("engine '{0}' panicked during recognition")]
    Panicked(String),
}

impl EngineError {
    /// Whether the error came from a single recognition call rather than from
    /// the worker machinery itself.
    pub fn is_per_call(&self) -> bool {
        matches!(
            self,
            EngineError::ProcessingFailed(_) | EngineError::Panicked(_)
        )
    }
}
