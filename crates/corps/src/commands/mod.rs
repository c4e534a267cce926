//! CLI command handlers.

pub mod config;
pub mod login;
pub mod logout;
pub mod status;
pub mod whoami;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use corps_auth::{FileStore, HostedBackend, SessionConfig, SessionManager, UserRecord};
use corps_cache::{CacheConfig, SweepHandle, TtlCache};
use corps_config::{ConfigError, LoadedConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Discovered configuration.
    pub loaded: LoadedConfig,
}

impl Context {
    /// Directory holding the persisted session files.
    pub fn data_dir(&self) -> Result<PathBuf> {
        self.loaded
            .config
            .auth()
            .data_dir
            .or_else(corps_config::default_data_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))
    }

    /// Wire up the backend, session, and cache from configuration.
    pub fn connect(&self) -> Result<Portal> {
        let config = &self.loaded.config;
        let backend_config = config.backend();

        let url = backend_config.require_url()?;
        let anon_key = corps_config::resolve_anon_key(backend_config.anon_key.as_deref())
            .ok_or_else(|| ConfigError::AnonKeyNotFound {
                env_var: corps_config::ANON_KEY_ENV.to_string(),
            })?;
        tracing::debug!(source = %anon_key.source, "Resolved backend anon key");

        let data_dir = self.data_dir()?;
        let store = Arc::new(FileStore::new(&data_dir));

        let backend = HostedBackend::builder()
            .base_url(url)
            .anon_key(anon_key.value)
            .timeout(backend_config.request_timeout())
            .store(store.clone())
            .build()
            .context("Failed to create backend client")?;

        let auth = config.auth();
        let session = SessionManager::start(
            Arc::new(backend),
            store,
            SessionConfig::new()
                .with_bootstrap_budget(auth.bootstrap_timeout())
                .with_login_budget(auth.login_timeout())
                .with_sign_out_budget(auth.sign_out_timeout()),
        );

        let cache_config = config.cache();
        let cache = TtlCache::new(
            CacheConfig::new()
                .with_default_ttl(cache_config.default_ttl())
                .with_sweep_task(cache_config.sweep_enabled)
                .with_sweep_interval(cache_config.sweep_interval()),
        );
        let sweeper = cache.spawn_sweeper();

        Ok(Portal {
            session,
            cache,
            data_dir,
            backend_url: url.to_string(),
            _sweeper: sweeper,
        })
    }
}

/// Running application services for one command.
pub struct Portal {
    pub session: SessionManager,
    pub cache: TtlCache,
    pub data_dir: PathBuf,
    pub backend_url: String,
    _sweeper: Option<SweepHandle>,
}

/// JSON shape of a user in command output.
#[derive(Debug, Serialize)]
pub struct UserOutput<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platoon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub squad: Option<u32>,
}

impl<'a> From<&'a UserRecord> for UserOutput<'a> {
    fn from(user: &'a UserRecord) -> Self {
        Self {
            id: &user.id,
            name: &user.display_name,
            role: user.role.as_str(),
            platoon: user.platoon.as_deref(),
            squad: user.squad,
        }
    }
}

/// One-line human description of a user.
pub fn describe_user(user: &UserRecord) -> String {
    match (&user.platoon, user.squad) {
        (Some(platoon), Some(squad)) => format!(
            "{} ({}, platoon {}, squad {})",
            user.display_name, user.role, platoon, squad
        ),
        _ => format!("{} ({})", user.display_name, user.role),
    }
}
