//! Configuration system for the corps portal.
//!
//! Provides TOML-based configuration with:
//! - Backend connection settings (`[backend]`)
//! - Session time budgets and data directory (`[auth]`)
//! - Cache TTL and sweep settings (`[cache]`)
//! - Config file layering (user config dir + project-local overrides)
//! - Anon key resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, default_data_dir, load_config, load_config_file,
    load_config_with_options, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ANON_KEY_ENV, ResolvedSecret, SecretSource, resolve_anon_key};
pub use types::*;
