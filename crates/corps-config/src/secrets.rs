//! Backend anon key resolution.
//!
//! Resolution order:
//! 1. Environment variable `CORPS_BACKEND_ANON_KEY`
//! 2. Config file (with warning at load time)

/// Environment variable holding the backend anon key.
pub const ANON_KEY_ENV: &str = "CORPS_BACKEND_ANON_KEY";

/// Result of secret resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve the backend anon key: env var first, then the config value.
pub fn resolve_anon_key(config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_from(std::env::var(ANON_KEY_ENV).ok(), config_value)
}

fn resolve_from(env_value: Option<String>, config_value: Option<&str>) -> Option<ResolvedSecret> {
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(ANON_KEY_ENV.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}
