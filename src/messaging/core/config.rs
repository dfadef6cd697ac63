//! Configuration for the messaging client.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::messaging::core::errors::{MessagingError, MessagingResult};

/// Top-level configuration for the messaging client.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// How the transport is chosen.
    pub transport: TransportMode,
    /// Remote API settings.
    pub remote: RemoteConfig,
    /// Local fallback store settings.
    pub fallback: FallbackConfig,
}

impl MessagingConfig {
    /// Create a config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a config from a JSON file without validating it, so overrides can
    /// still be applied. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn read(path: impl AsRef<Path>) -> MessagingResult<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load and validate a config from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> MessagingResult<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the transport mode.
    #[must_use]
    pub const fn with_transport(mut self, mode: TransportMode) -> Self {
        self.transport = mode;
        self
    }

    /// Set the remote API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.remote.base_url = Some(base_url.into());
        self
    }

    /// Set the bearer token sent to the remote API.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.remote.bearer_token = Some(token.into());
        self
    }

    /// Set the directory holding the fallback store.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback.data_dir = dir.into();
        self
    }

    /// Set the fallback store write policy.
    #[must_use]
    pub const fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.fallback.write_policy = policy;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> MessagingResult<()> {
        if self.transport.uses_remote() {
            let base_url = self.remote.base_url.as_deref().ok_or_else(|| {
                MessagingError::InvalidConfig(format!(
                    "remote.base_url is required for transport mode {}",
                    self.transport.as_str()
                ))
            })?;
            let parsed = Url::parse(base_url)?;
            if parsed.cannot_be_a_base() {
                return Err(MessagingError::InvalidConfig(
                    "remote.base_url must be a hierarchical URL".to_string(),
                ));
            }
        }

        if self.remote.request_timeout.is_zero() {
            return Err(MessagingError::InvalidConfig(
                "remote.request_timeout must be > 0".to_string(),
            ));
        }

        if self.remote.connect_timeout.is_zero() {
            return Err(MessagingError::InvalidConfig(
                "remote.connect_timeout must be > 0".to_string(),
            ));
        }

        let key = self.fallback.storage_key.trim();
        if key.is_empty() {
            return Err(MessagingError::InvalidConfig(
                "fallback.storage_key must not be empty".to_string(),
            ));
        }
        if !key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.')
        {
            return Err(MessagingError::InvalidConfig(format!(
                "fallback.storage_key {key:?} may only contain [A-Za-z0-9_.-]"
            )));
        }

        Ok(())
    }
}

/// How the message transport is selected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    /// Remote API only; a missing endpoint is an error.
    Remote,
    /// Local fallback store only.
    Local,
    /// Try the remote API per call, fall back on HTTP 404.
    #[default]
    Fallback,
    /// Probe the remote API once at start-up and stick with the result.
    Probe,
}

impl TransportMode {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Fallback => "fallback",
            Self::Probe => "probe",
        }
    }

    /// Whether this mode needs a remote base URL.
    #[must_use]
    pub const fn uses_remote(self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl std::str::FromStr for TransportMode {
    type Err = MessagingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            "fallback" => Ok(Self::Fallback),
            "probe" => Ok(Self::Probe),
            other => Err(MessagingError::InvalidConfig(format!(
                "unknown transport mode: {other}"
            ))),
        }
    }
}

/// Remote API settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the REST API, e.g. `https://shop.example/api/`.
    pub base_url: Option<String>,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// Bearer token provided by the auth collaborator.
    pub bearer_token: Option<String>,
    /// User agent header.
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout: Duration::from_secs(15),
            connect_timeout: Duration::from_secs(5),
            bearer_token: None,
            user_agent: format!("storefront-chat/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// How the fallback store resolves concurrent writers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Overwrite whatever is persisted.
    #[default]
    LastWriteWins,
    /// Reject saves whose loaded revision is stale, then reload and retry.
    Revision,
}

/// Local fallback store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Directory holding the persisted document.
    pub data_dir: PathBuf,
    /// Fixed key naming the persisted document.
    pub storage_key: String,
    /// Concurrency policy on save.
    pub write_policy: WritePolicy,
    /// Reload-and-retry attempts under [`WritePolicy::Revision`].
    pub max_conflict_retries: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("storefront-chat"),
            storage_key: "chat_conversations".to_string(),
            write_policy: WritePolicy::LastWriteWins,
            max_conflict_retries: 3,
        }
    }
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_needs_a_base_url() {
        let config = MessagingConfig::default();
        assert_eq!(config.transport, TransportMode::Fallback);
        assert!(matches!(
            config.validate(),
            Err(MessagingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn local_mode_validates_without_remote() {
        let config = MessagingConfig::new().with_transport(TransportMode::Local);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = MessagingConfig::new()
            .with_base_url("http://127.0.0.1:8080/api/")
            .with_bearer_token("t0k")
            .with_data_dir("/tmp/chat")
            .with_write_policy(WritePolicy::Revision);

        assert!(config.validate().is_ok());
        assert_eq!(config.remote.bearer_token.as_deref(), Some("t0k"));
        assert_eq!(config.fallback.data_dir, PathBuf::from("/tmp/chat"));
        assert_eq!(config.fallback.write_policy, WritePolicy::Revision);
    }

    #[test]
    fn rejects_unsafe_storage_key() {
        let mut config = MessagingConfig::new().with_transport(TransportMode::Local);
        config.fallback.storage_key = "../escape".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config: MessagingConfig =
            serde_json::from_str(r#"{"transport":"local","remote":{"request_timeout":30}}"#)
                .unwrap();
        assert_eq!(config.transport, TransportMode::Local);
        assert_eq!(config.remote.request_timeout, Duration::from_secs(30));
        assert_eq!(config.fallback.storage_key, "chat_conversations");
    }

    #[test]
    fn load_reads_and_validates_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.json");
        fs::write(&path, r#"{"transport":"remote"}"#).unwrap();

        assert!(MessagingConfig::read(&path).is_ok());
        assert!(MessagingConfig::load(&path).is_err());

        fs::write(&path, r#"{"remote":{"base_url":"https://shop.test/api/"}}"#).unwrap();
        let config = MessagingConfig::load(&path).unwrap();
        assert_eq!(config.transport, TransportMode::Fallback);
    }

    #[test]
    fn parses_transport_mode() {
        assert_eq!("Probe".parse::<TransportMode>().unwrap(), TransportMode::Probe);
        assert!("carrier-pigeon".parse::<TransportMode>().is_err());
    }
}
