//! Configuration management for code-mentor
//!
//! Stores settings in ~/.config/code-mentor/config.json. The API key is
//! never written there: it comes from the `OPENAI_API_KEY` environment
//! variable or the system keychain, through a [`CredentialProvider`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_ENDPOINT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 2000;
const DEFAULT_ENDPOINT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_ANALYZER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEBOUNCE_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Invalid endpoint URL '{url}': {source}")]
    InvalidEndpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Temperature must be between 0 and 2, got {0}")]
    InvalidTemperature(f32),
    #[error("Failed to write config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Language named in prompts and used as the code fence tag
    pub language: String,
    /// Quiet period before a change-triggered analysis runs
    pub debounce_ms: u64,
    pub analyzer: AnalyzerConfig,
    pub endpoint: EndpointConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "Python".to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            analyzer: AnalyzerConfig::default(),
            endpoint: EndpointConfig::default(),
        }
    }
}

/// How to launch the external structural analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub program: String,
    /// Script passed as the only argument; omit for a standalone binary
    pub script: Option<PathBuf>,
    /// 0 disables the limit
    pub timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            script: Some(PathBuf::from("models/analyzer.py")),
            timeout_secs: DEFAULT_ANALYZER_TIMEOUT_SECS,
        }
    }
}

impl AnalyzerConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Chat completion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ENDPOINT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_ENDPOINT_TIMEOUT_SECS,
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("code-mentor"))
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load config from a specific file, falling back to defaults.
    ///
    /// A file that fails to parse is moved aside to `config.json.corrupt`.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                warn!(
                    path = %path.display(),
                    error = %err,
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    warn!(error = %e, "failed to set config directory permissions");
                }
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        write_config_atomic(path, &content)?;
        Ok(())
    }

    /// Reject settings the endpoint would refuse anyway
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.endpoint.url).map_err(|source| ConfigError::InvalidEndpoint {
            url: self.endpoint.url.clone(),
            source,
        })?;
        if !(0.0..=2.0).contains(&self.endpoint.temperature) {
            return Err(ConfigError::InvalidTemperature(self.endpoint.temperature));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/code-mentor/config.json".to_string())
    }
}

/// Source of the endpoint credential.
///
/// Consulted when a suggestion service is built and whenever its
/// configuration is refreshed, never on every request.
pub trait CredentialProvider: Send + Sync {
    fn api_key(&self) -> Option<String>;
}

/// Environment variable first, then the system keychain
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvKeyringCredentials;

impl CredentialProvider for EnvKeyringCredentials {
    fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }

        match crate::keyring::get_api_key() {
            Ok(key) => key,
            Err(err) => {
                crate::keyring::warn_keychain_error_once(&err);
                None
            }
        }
    }
}

/// A fixed key, e.g. from `--api-key`
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Option<String>);

impl CredentialProvider for StaticCredentials {
    fn api_key(&self) -> Option<String> {
        self.0.clone()
    }
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    use std::fs::OpenOptions;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            warn!(error = %e, "failed to set temp config file permissions");
        }
    }

    file.write_all(content.as_bytes())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}
