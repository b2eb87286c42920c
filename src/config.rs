use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::suggest::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, DisabledSuggestions, GeminiClient, SuggestionService,
};

pub const DEFAULT_ENDPOINT: &str = "wss://compiler.skillshikshya.com/ws/compiler/";
const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;

/// User configuration from `~/.config/runpad/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// WebSocket URL of the execution service.
    pub endpoint: String,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay_ms: u64,
    pub suggestions: SuggestionsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionsConfig {
    pub enabled: bool,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            suggestions: SuggestionsConfig::default(),
        }
    }
}

impl Default for SuggestionsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Apply `RUNPAD_ENDPOINT` and `GEMINI_API_KEY` overrides.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = var("RUNPAD_ENDPOINT").filter(|v| !v.is_empty()) {
            self.endpoint = endpoint;
        }
        if let Some(key) = var("GEMINI_API_KEY").filter(|v| !v.is_empty()) {
            self.suggestions.api_key = Some(key);
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// The suggestion service this configuration describes. Without an API
    /// key, or with suggestions turned off, every request resolves to the
    /// fallback text.
    pub fn suggestion_service(&self) -> Arc<dyn SuggestionService> {
        match (&self.suggestions.api_key, self.suggestions.enabled) {
            (Some(key), true) => Arc::new(
                GeminiClient::new(key.clone())
                    .with_base_url(self.suggestions.base_url.clone())
                    .with_model(self.suggestions.model.clone()),
            ),
            _ => {
                debug!("Suggestions disabled");
                Arc::new(DisabledSuggestions)
            }
        }
    }
}

/// `~/.config/runpad/config.toml`, or the platform equivalent.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("runpad").join("config.toml"))
}

/// Load configuration from `path`, or from the default location.
///
/// A missing default file falls back to defaults; a missing explicit file is
/// an error.
pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => match default_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Config::default()),
        },
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("invalid config {}", path.display()))?;
    debug!(path = %path.display(), "Loaded config");
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "reconnect_delay_ms = 500\n\n[suggestions]\nmodel = \"gemini-1.5-flash\"\n",
        )
        .unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.reconnect_delay(), Duration::from_millis(500));
        assert_eq!(config.suggestions.model, "gemini-1.5-flash");
        assert!(config.suggestions.enabled);
        assert_eq!(config.suggestions.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "endpoint = [").unwrap();
        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = [
            ("RUNPAD_ENDPOINT", "ws://localhost:9000/ws/"),
            ("GEMINI_API_KEY", "secret"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(ToString::to_string));
        assert_eq!(config.endpoint, "ws://localhost:9000/ws/");
        assert_eq!(config.suggestions.api_key.as_deref(), Some("secret"));

        // Empty values are ignored.
        let mut config = Config::default();
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config, Config::default());
    }
}
