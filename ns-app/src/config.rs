//! Notesmith configuration loader.
//!
//! TOML file first, then environment overrides, then validation.

use ns_llm::{AssistantConfig, Provider};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotesmithConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub openai: EndpointConfig,
    #[serde(default)]
    pub anthropic: EndpointConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds; unset means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_secs: None,
        }
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct KeysConfig {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl std::fmt::Debug for KeysConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("KeysConfig")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Where synthesized speech is written before playback.
    #[serde(default = "default_audio_output_path")]
    pub output_path: PathBuf,
    /// Program run on the written file, e.g. `["afplay"]` or `["mpv", "--no-video"]`.
    #[serde(default)]
    pub player_command: Vec<String>,
}

fn default_audio_output_path() -> PathBuf {
    std::env::temp_dir().join("notesmith-speech.mp3")
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_path: default_audio_output_path(),
            player_command: Vec::new(),
        }
    }
}

impl NotesmithConfig {
    /// Loads the file if present; a missing default file falls back to defaults.
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(default_config_path);

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::parse(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides(|key| std::env::var(key).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("NOTESMITH_PROVIDER") {
            self.general.provider = v;
        }
        if let Some(v) = get("NOTESMITH_MODEL") {
            self.general.model = v;
        }
        if let Some(v) = get("NOTESMITH_MAX_TOKENS") {
            match v.trim().parse() {
                Ok(n) => self.general.max_tokens = n,
                Err(e) => tracing::warn!(value = %v, %e, "ignoring invalid NOTESMITH_MAX_TOKENS"),
            }
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.keys.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.openai.base_url = Some(v);
        }
        if let Some(v) = get("ANTHROPIC_API_KEY") {
            self.keys.anthropic_api_key = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let provider = self.provider()?;
        self.assistant_config().validate(provider)?;
        Ok(())
    }

    pub fn provider(&self) -> anyhow::Result<Provider> {
        Ok(self.general.provider.parse::<Provider>()?)
    }

    pub fn assistant_config(&self) -> AssistantConfig {
        let mut cfg = AssistantConfig::new(
            self.keys.openai_api_key.clone().unwrap_or_default(),
            self.general.model.clone(),
            self.general.max_tokens,
        );
        if let Some(url) = self.openai.base_url.clone() {
            cfg = cfg.with_base_url(url);
        }
        if let Some(key) = self.keys.anthropic_api_key.clone() {
            cfg = cfg.with_anthropic_key(key);
        }
        if let Some(url) = self.anthropic.base_url.clone() {
            cfg = cfg.with_anthropic_base_url(url);
        }
        if let Some(secs) = self.general.timeout_secs.filter(|s| *s > 0) {
            cfg = cfg.with_timeout(Duration::from_secs(secs));
        }
        cfg
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".notesmith").join("config.toml")
}
