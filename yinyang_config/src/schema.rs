use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use yinyang_conversation::{ConversationConfig, DEFAULT_EXCHANGE_TIMEOUT, DiagnosticMessages};
use yinyang_core::util::DEFAULT_CODING_PREAMBLE;
use yinyang_core::{CredentialPolicy, SessionSettings, StorageKeys};
use yinyang_providers::{
    DEFAULT_ENDPOINT, DEFAULT_PROBE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEMPERATURE,
    GatewayConfig,
};

const CONFIG_DIR: &str = "yinyang";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub credential: CredentialPolicy,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub messages: DiagnosticMessages,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GatewaySection {
    #[serde(default = "GatewaySection::default_endpoint")]
    pub endpoint: String,
    #[serde(default = "GatewaySection::default_temperature")]
    pub temperature: f32,
    #[serde(default = "GatewaySection::default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "GatewaySection::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            endpoint: Self::default_endpoint(),
            temperature: Self::default_temperature(),
            probe_timeout_secs: Self::default_probe_timeout_secs(),
            request_timeout_secs: Self::default_request_timeout_secs(),
        }
    }
}

impl GatewaySection {
    fn default_endpoint() -> String {
        DEFAULT_ENDPOINT.to_string()
    }

    const fn default_temperature() -> f32 {
        DEFAULT_TEMPERATURE
    }

    const fn default_probe_timeout_secs() -> u64 {
        DEFAULT_PROBE_TIMEOUT.as_secs()
    }

    const fn default_request_timeout_secs() -> u64 {
        DEFAULT_REQUEST_TIMEOUT.as_secs()
    }

    #[must_use]
    pub fn to_gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            endpoint: self.endpoint.clone(),
            temperature: self.temperature,
            probe_timeout: Duration::from_secs(self.probe_timeout_secs.max(1)),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SessionSection {
    /// Models offered to the user; empty accepts any identifier.
    #[serde(default = "SessionSection::default_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub defaults: SessionSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
    #[serde(default = "SessionSection::default_coding_preamble")]
    pub coding_preamble: String,
    /// Longest wait for one reply, whatever the gateway timeout says.
    #[serde(default = "SessionSection::default_exchange_timeout_secs")]
    pub exchange_timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            models: Self::default_models(),
            defaults: SessionSettings::default(),
            history_limit: None,
            coding_preamble: Self::default_coding_preamble(),
            exchange_timeout_secs: Self::default_exchange_timeout_secs(),
        }
    }
}

impl SessionSection {
    fn default_models() -> Vec<String> {
        vec!["deepseek-chat".to_string(), "deepseek-reasoner".to_string()]
    }

    fn default_coding_preamble() -> String {
        DEFAULT_CODING_PREAMBLE.to_string()
    }

    const fn default_exchange_timeout_secs() -> u64 {
        DEFAULT_EXCHANGE_TIMEOUT.as_secs()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct StorageSection {
    /// SQLite file; relative paths resolve against the config directory.
    #[serde(default = "StorageSection::default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub keys: StorageKeys,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database: Self::default_database(),
            keys: StorageKeys::default(),
        }
    }
}

impl StorageSection {
    fn default_database() -> PathBuf {
        PathBuf::from("yinyang.db")
    }
}

impl Config {
    /// Directory holding the config file and, by default, the database.
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Cannot find home directory"))?
            .join(CONFIG_DIR))
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Load `~/yinyang/config.json`.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!(
                "Config file not found at: {}. Please run 'yinyang init' to create config.",
                config_path.display()
            );
        }

        Self::from_path(&config_path)
    }

    /// Load the config file, or fall back to built-in defaults when absent.
    pub fn load_or_default() -> anyhow::Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::from_path(&config_path)
        } else {
            info!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;

        config
            .session
            .defaults
            .validate(&config.session.models)
            .map_err(|e| anyhow::anyhow!("Invalid session defaults: {e}"))?;

        Ok(config)
    }

    pub fn ensure_config_dir() -> anyhow::Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        std::fs::create_dir_all(&config_dir)?;
        Ok(config_dir)
    }

    /// Write the default config as a template. Refuses to overwrite.
    pub fn create_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::ensure_config_dir()?.join(CONFIG_FILE);
        Self::write_template(&config_path)?;
        Ok(config_path)
    }

    pub fn write_template(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "Config file already exists at: {}. Please edit it directly.",
                path.display()
            );
        }

        let template = serde_json::to_string_pretty(&Self::default())?;
        std::fs::write(path, template)?;
        info!("Created config file at: {}", path.display());
        Ok(())
    }

    /// Database path, resolved against `base` when relative.
    #[must_use]
    pub fn database_path(&self, base: &Path) -> PathBuf {
        if self.storage.database.is_absolute() {
            self.storage.database.clone()
        } else {
            base.join(&self.storage.database)
        }
    }

    #[must_use]
    pub fn conversation_config(&self) -> ConversationConfig {
        ConversationConfig::default()
            .with_defaults(self.session.defaults.clone())
            .with_models(self.session.models.clone())
            .with_history_limit(self.session.history_limit)
            .with_coding_preamble(self.session.coding_preamble.clone())
            .with_exchange_timeout(Duration::from_secs(self.session.exchange_timeout_secs.max(1)))
            .with_keys(self.storage.keys.clone())
            .with_diagnostics(self.messages.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{"gateway": {"request_timeout_secs": 5}, "session": {"history_limit": 12}}"#,
        )
        .expect("write config");

        let config = Config::from_path(&path).expect("load config");

        assert_eq!(config.gateway.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(
            config.gateway.to_gateway_config().request_timeout,
            Duration::from_secs(5)
        );
        assert_eq!(config.session.history_limit, Some(12));
        assert_eq!(config.session.defaults, SessionSettings::default());
        assert_eq!(config.credential, CredentialPolicy::default());
        assert_eq!(config.storage.keys, StorageKeys::default());
        assert_eq!(
            config.conversation_config().exchange_timeout,
            DEFAULT_EXCHANGE_TIMEOUT
        );
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn template_round_trips_and_is_not_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);

        Config::write_template(&path).expect("write template");
        let loaded = Config::from_path(&path).expect("load template");

        assert_eq!(loaded, Config::default());
        assert!(Config::write_template(&path).is_err());
    }

    #[test]
    #[expect(clippy::expect_used, reason = "Test failure should panic with context")]
    fn rejects_defaults_outside_model_list() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{"session": {"models": ["a"], "defaults": {"model": "b"}}}"#,
        )
        .expect("write config");

        assert!(Config::from_path(&path).is_err());
    }

    #[test]
    fn relative_database_resolves_against_base() {
        let config = Config::default();
        let base = Path::new("/tmp/yy");

        assert_eq!(config.database_path(base), base.join("yinyang.db"));
    }
}
