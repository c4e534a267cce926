//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [backend]                # hosted project URL and public key
//! [auth]                   # session time budgets, data directory
//! [cache]                  # TTL defaults and sweeping
//! [logging]                # file logging
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpsConfig {
    /// Backend connection.
    pub backend: Option<BackendConfig>,

    /// Session lifecycle settings.
    pub auth: Option<AuthConfig>,

    /// Data cache settings.
    pub cache: Option<CacheConfig>,

    /// Log file settings.
    pub logging: Option<LoggingConfig>,
}

impl CorpsConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections replace each other wholesale.
    pub fn merge(&mut self, other: CorpsConfig) {
        if other.backend.is_some() {
            self.backend = other.backend;
        }
        if other.auth.is_some() {
            self.auth = other.auth;
        }
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// `[backend]`, or its defaults.
    pub fn backend(&self) -> BackendConfig {
        self.backend.clone().unwrap_or_default()
    }

    /// `[auth]`, or its defaults.
    pub fn auth(&self) -> AuthConfig {
        self.auth.clone().unwrap_or_default()
    }

    /// `[cache]`, or its defaults.
    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    /// `[logging]`, or its defaults.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Hosted backend connection.
///
/// ```toml
/// [backend]
/// url = "https://project.example.co"
/// request_timeout_secs = 30
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL.
    pub url: Option<String>,
    /// Public anon key. Prefer the `CORPS_BACKEND_ANON_KEY` env var.
    pub anon_key: Option<String>,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Project URL, or an error naming the missing field.
    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingField {
                field: "url".to_string(),
                context: "[backend]".to_string(),
            })
    }

    pub fn has_plaintext_anon_key(&self) -> bool {
        self.anon_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Session lifecycle settings.
///
/// ```toml
/// [auth]
/// bootstrap_timeout_secs = 15
/// login_timeout_secs = 10
/// sign_out_timeout_secs = 10
/// data_dir = "/var/lib/corps"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Budget for the startup session check.
    pub bootstrap_timeout_secs: u64,
    /// Budget for each stage of a login.
    pub login_timeout_secs: u64,
    /// Budget for the backend sign-out call.
    pub sign_out_timeout_secs: u64,
    /// Where the persisted user and session live. Defaults to the platform
    /// data directory.
    pub data_dir: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bootstrap_timeout_secs: 15,
            login_timeout_secs: 10,
            sign_out_timeout_secs: 10,
            data_dir: None,
        }
    }
}

impl AuthConfig {
    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn sign_out_timeout(&self) -> Duration {
        Duration::from_secs(self.sign_out_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Data cache settings.
///
/// ```toml
/// [cache]
/// default_ttl_secs = 900
/// sweep_interval_secs = 600
/// sweep_enabled = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub sweep_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 900,
            sweep_interval_secs: 600,
            sweep_enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log file settings. Console logging is controlled from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether JSON log files are written.
    pub file_enabled: bool,
    /// Directory for log files. Defaults to `logs/` in the config dir.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_enabled: true,
            dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = CorpsConfig::from_toml("").unwrap();
        assert_eq!(config, CorpsConfig::new());
        assert_eq!(config.auth().bootstrap_timeout(), Duration::from_secs(15));
        assert_eq!(config.auth().login_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache().default_ttl(), Duration::from_secs(900));
        assert_eq!(config.cache().sweep_interval(), Duration::from_secs(600));
        assert!(config.cache().sweep_enabled);
        assert!(config.logging().file_enabled);
    }

    #[test]
    fn test_parse_full_config() {
        let config = CorpsConfig::from_toml(
            r#"
[backend]
url = "https://project.example.co"
request_timeout_secs = 5

[auth]
login_timeout_secs = 20
data_dir = "/tmp/corps"

[cache]
sweep_enabled = false
"#,
        )
        .unwrap();

        let backend = config.backend();
        assert_eq!(backend.require_url().unwrap(), "https://project.example.co");
        assert_eq!(backend.request_timeout(), Duration::from_secs(5));
        assert!(!backend.has_plaintext_anon_key());

        let auth = config.auth();
        assert_eq!(auth.login_timeout_secs, 20);
        // Unset fields keep their defaults
        assert_eq!(auth.bootstrap_timeout_secs, 15);
        assert_eq!(auth.data_dir, Some(PathBuf::from("/tmp/corps")));

        assert!(!config.cache().sweep_enabled);
        assert_eq!(config.cache().default_ttl_secs, 900);
    }

    #[test]
    fn test_require_url() {
        let err = BackendConfig::default().require_url().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));

        let empty = BackendConfig {
            url: Some(String::new()),
            ..Default::default()
        };
        assert!(empty.require_url().is_err());
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = CorpsConfig::from_toml(
            r#"
[backend]
url = "https://base.example.co"

[cache]
default_ttl_secs = 60
"#,
        )
        .unwrap();
        let over = CorpsConfig::from_toml(
            r#"
[backend]
url = "https://override.example.co"
"#,
        )
        .unwrap();

        base.merge(over);
        assert_eq!(
            base.backend().url.as_deref(),
            Some("https://override.example.co")
        );
        assert_eq!(base.cache().default_ttl_secs, 60);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = CorpsConfig::new();
        config.backend = Some(BackendConfig {
            url: Some("https://project.example.co".into()),
            ..Default::default()
        });
        config.auth = Some(AuthConfig::default());

        let text = config.to_toml().unwrap();
        assert!(text.contains("[backend]"));
        assert_eq!(CorpsConfig::from_toml(&text).unwrap(), config);
    }
}
