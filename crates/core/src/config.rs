use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

/// Per-session defaults. Everything here can be overridden when a session
/// starts; validation happens at session start, not only at process boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDefaults {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_pause_delay_ms")]
    pub pause_delay_ms: u64,
    #[serde(default = "default_transcript_window")]
    pub transcript_window: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_steps() -> u32 {
    5
}

fn default_pause_delay_ms() -> u64 {
    3000
}

fn default_transcript_window() -> usize {
    20
}

fn default_retry_delay_ms() -> u64 {
    2000
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_steps: default_max_steps(),
            pause_delay_ms: default_pause_delay_ms(),
            transcript_window: default_transcript_window(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserConfig {
    #[serde(default)]
    pub headed: bool,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    /// Explicit browser binary; auto-discovered when absent.
    #[serde(default)]
    pub binary: Option<String>,
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    800
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headed: false,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            binary: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Map a model name to the provider expected to serve it.
pub fn provider_for_model(model: &str) -> Option<&'static str> {
    if model.starts_with("anthropic/") || model.starts_with("claude-") {
        Some("anthropic")
    } else if model.starts_with("gemini/") || model.starts_with("gemini-") {
        Some("gemini")
    } else {
        None
    }
}

pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".personalens")
        .join("config.json")
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Check everything a session needs before it starts: a credential for
    /// the configured model's provider plus sane loop/browser parameters.
    pub fn validate(&self) -> Result<()> {
        let model = self.session.model.trim();
        if model.is_empty() {
            return Err(Error::Config("session.model is empty".to_string()));
        }
        let provider = provider_for_model(model).ok_or_else(|| {
            Error::Config(format!(
                "cannot infer provider for model '{model}' (expected a gemini-* or claude-* model)"
            ))
        })?;
        match self.providers.get(provider) {
            Some(p) if !p.api_key.trim().is_empty() => {}
            _ => {
                return Err(Error::Config(format!(
                    "providers.{provider}.apiKey is not configured"
                )))
            }
        }
        if self.session.max_steps == 0 {
            return Err(Error::Config("session.maxSteps must be at least 1".to_string()));
        }
        if self.session.transcript_window == 0 {
            return Err(Error::Config(
                "session.transcriptWindow must be at least 1".to_string(),
            ));
        }
        if self.browser.viewport_width == 0 || self.browser.viewport_height == 0 {
            return Err(Error::Config("browser viewport must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.providers.insert(
            "gemini".to_string(),
            ProviderConfig {
                api_key: "test-key".to_string(),
                api_base: None,
            },
        );
        config
    }

    #[test]
    fn defaults_parse_from_empty_object() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.session.max_steps, 5);
        assert_eq!(config.session.pause_delay_ms, 3000);
        assert_eq!(config.browser.viewport_width, 1280);
        assert_eq!(config.transport.port, 8080);
    }

    #[test]
    fn provider_inference() {
        assert_eq!(provider_for_model("gemini-2.5-flash"), Some("gemini"));
        assert_eq!(provider_for_model("claude-sonnet-4-20250514"), Some("anthropic"));
        assert_eq!(provider_for_model("anthropic/claude-3"), Some("anthropic"));
        assert_eq!(provider_for_model("gpt-4o"), None);
    }

    #[test]
    fn validate_requires_credential() {
        let config = Config::default();
        assert!(config.validate().is_err());
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_steps() {
        let mut config = configured();
        config.session.max_steps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn camel_case_wire_format() {
        let json = r#"{
            "providers": {"gemini": {"apiKey": "k"}},
            "session": {"maxSteps": 8, "pauseDelayMs": 1000}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.session.max_steps, 8);
        assert_eq!(config.session.pause_delay_ms, 1000);
        assert_eq!(config.providers["gemini"].api_key, "k");
    }
}
