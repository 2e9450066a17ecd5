use crate::error::ConfigError;
use crate::protocol::RESERVED_DATA_KEYS;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub ensemble: EnsembleConfig,

    #[serde(default)]
    pub engine: Vec<EngineConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            ws_path: default_ws_path(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// How long to wait for a metadata frame before silently re-arming.
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,

    /// Bound on the audio wait once metadata has arrived. Absent means unbounded.
    #[serde(default)]
    pub audio_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_ms: default_metadata_timeout_ms(),
            audio_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn audio_timeout(&self) -> Option<Duration> {
        self.audio_timeout_ms.map(Duration::from_millis)
    }
}

/// How the ensemble picks the single `finalText` out of several engine outputs.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinalTextPolicy {
    #[default]
    FirstConfigured,
    Longest,
    HighestConfidence,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub final_text: FinalTextPolicy,

    /// Reported when no engine produced a confidence of its own.
    #[serde(default = "default_placeholder_confidence")]
    pub placeholder_confidence: f32,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            final_text: FinalTextPolicy::default(),
            placeholder_confidence: default_placeholder_confidence(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Name the engine's result is reported under.
    pub name: String,

    /// Registry key; defaults to `name`.
    #[serde(default)]
    pub kind: Option<String>,

    /// Language hint used when the client does not send one.
    #[serde(default)]
    pub language: Option<String>,

    #[serde(flatten)]
    pub extra: toml::Value,
}

impl EngineConfig {
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_ws_path() -> String {
    "/ws/stt".to_string()
}

fn default_metadata_timeout_ms() -> u64 {
    10_000
}

fn default_placeholder_confidence() -> f32 {
    0.95
}

/// Replace every `${VAR}` with the value of that environment variable.
///
/// All missing variables are reported together, in order of appearance.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Invalid(format!("bad interpolation pattern: {e}")))?;

    let mut missing: Vec<String> = Vec::new();
    let interpolated = pattern.replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        std::env::var(name).unwrap_or_else(|_| {
            if !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
            String::new()
        })
    });

    if !missing.is_empty() {
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }
    Ok(interpolated.into_owned())
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.ws_path must start with '/', got '{}'",
                self.server.ws_path
            )));
        }
        if self.session.metadata_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "session.metadata_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.ensemble.placeholder_confidence) {
            return Err(ConfigError::Invalid(format!(
                "ensemble.placeholder_confidence must be within [0, 1], got {}",
                self.ensemble.placeholder_confidence
            )));
        }

        let mut seen = HashSet::new();
        for engine in &self.engine {
            if engine.name.trim().is_empty() {
                return Err(ConfigError::Invalid("engine name must not be empty".to_string()));
            }
            if RESERVED_DATA_KEYS.contains(&engine.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "engine name '{}' collides with a response field",
                    engine.name
                )));
            }
            if !seen.insert(engine.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "engine name '{}' is configured more than once",
                    engine.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parse_valid_toml() {
        let toml_str = r#"
[general]
log_level = "debug"

[server]
host = "127.0.0.1"
port = 9000
ws_path = "/stream"

[session]
metadata_timeout_ms = 2500
audio_timeout_ms = 30000

[ensemble]
final_text = "longest"
placeholder_confidence = 0.5

[[engine]]
name = "fasterWhisper"
kind = "whisper"
language = "ko"
model_path = "./models/ggml-tiny.bin"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.server.ws_path, "/stream");
        assert_eq!(config.session.metadata_timeout(), Duration::from_millis(2500));
        assert_eq!(config.session.audio_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.ensemble.final_text, FinalTextPolicy::Longest);
        assert_eq!(config.ensemble.placeholder_confidence, 0.5);
        assert_eq!(config.engine.len(), 1);
        assert_eq!(config.engine[0].name, "fasterWhisper");
        assert_eq!(config.engine[0].kind(), "whisper");
        assert_eq!(config.engine[0].language.as_deref(), Some("ko"));
    }

    #[test]
    fn test_config_default_values() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.ws_path, "/ws/stt");
        assert_eq!(config.session.metadata_timeout(), Duration::from_secs(10));
        assert!(config.session.audio_timeout().is_none());
        assert_eq!(config.ensemble.final_text, FinalTextPolicy::FirstConfigured);
        assert_eq!(config.ensemble.placeholder_confidence, 0.95);
        assert!(config.engine.is_empty());
    }

    #[test]
    fn test_config_engine_kind_defaults_to_name() {
        let config = AppConfig::from_toml_str(
            r#"
[[engine]]
name = "null"
"#,
        )
        .unwrap();
        assert_eq!(config.engine[0].kind(), "null");
        assert!(config.engine[0].language.is_none());
    }

    #[test]
    fn test_config_engine_extra_fields() {
        let config = AppConfig::from_toml_str(
            r#"
[[engine]]
name = "primary"
kind = "whisper"
model_path = "./models/ggml-base.bin"
"#,
        )
        .unwrap();
        let extra = &config.engine[0].extra;
        assert_eq!(
            extra.get("model_path").and_then(|v| v.as_str()),
            Some("./models/ggml-base.bin")
        );
    }

    #[test]
    fn test_config_env_var_interpolation() {
        std::env::set_var("VOXGATE_TEST_LEVEL", "trace");
        let toml_str = r#"
[general]
log_level = "${VOXGATE_TEST_LEVEL}"
"#;
        let config = AppConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "trace");
        std::env::remove_var("VOXGATE_TEST_LEVEL");
    }

    #[test]
    fn test_config_missing_env_var_error() {
        let toml_str = r#"
[general]
log_level = "${DEFINITELY_DOES_NOT_EXIST_12345}"
"#;
        let err = AppConfig::from_toml_str(toml_str).unwrap_err();
        assert!(err.to_string().contains("DEFINITELY_DOES_NOT_EXIST_12345"));
    }

    #[test]
    fn test_config_reports_every_missing_env_var() {
        let toml_str = r#"
[server]
host = "${VOXGATE_MISSING_HOST_98765}"
ws_path = "/${VOXGATE_MISSING_PATH_98765}"

[general]
log_level = "${VOXGATE_MISSING_HOST_98765}"
"#;
        match AppConfig::from_toml_str(toml_str) {
            Err(ConfigError::EnvVarNotFound(names)) => {
                assert_eq!(names, "VOXGATE_MISSING_HOST_98765, VOXGATE_MISSING_PATH_98765");
            }
            other => panic!("expected EnvVarNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let result = AppConfig::from_toml_str("this is not valid toml [[[");
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_config_unknown_policy_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
[ensemble]
final_text = "loudest"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_config_rejects_duplicate_engine_names() {
        let result = AppConfig::from_toml_str(
            r#"
[[engine]]
name = "a"
kind = "null"

[[engine]]
name = "a"
kind = "null"
"#,
        );
        match result {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("more than once")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_config_rejects_reserved_engine_name() {
        let result = AppConfig::from_toml_str(
            r#"
[[engine]]
name = "finalText"
kind = "null"
"#,
        );
        match result {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("finalText")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_config_rejects_zero_metadata_timeout() {
        let result = AppConfig::from_toml_str(
            r#"
[session]
metadata_timeout_ms = 0
"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_rejects_out_of_range_placeholder() {
        let result = AppConfig::from_toml_str(
            r#"
[ensemble]
placeholder_confidence = 1.5
"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_rejects_relative_ws_path() {
        let result = AppConfig::from_toml_str(
            r#"
[server]
ws_path = "ws/stt"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = std::env::temp_dir().join("voxgate_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            r#"
[general]
log_level = "warn"

[server]
port = 8123
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.server.port, 8123);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_config_load_from_file_not_found() {
        let result = AppConfig::load_from_file(Path::new("/nonexistent/path.toml"));
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("failed to read config file"));
    }
}
