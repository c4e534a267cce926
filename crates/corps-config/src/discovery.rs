//! Finding the config files and stacking them into one [`CorpsConfig`].
//!
//! Two files are read, and a section in the second replaces the same section
//! in the first:
//! 1. `config.toml` in the user config directory
//! 2. `corps.toml` in the project directory (the working directory by default)
//!
//! Command-line flags are applied by the binary on top of the result.

use std::path::{Path, PathBuf};

use crate::{ConfigError, CorpsConfig, Result};

const PROJECT_CONFIG_FILE: &str = "corps.toml";
const USER_CONFIG_FILE: &str = "config.toml";

/// Directory name under the platform config and data roots.
const APP_NAME: &str = "corps";

/// Points the user config directory somewhere else, e.g. in tests.
const CONFIG_DIR_ENV: &str = "CORPS_CONFIG_DIR";

/// A config file that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// False when the file is absent or failed to parse.
    pub loaded: bool,
}

/// The merged config plus a record of how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: CorpsConfig,
    /// Every file checked, user layer first.
    pub sources: Vec<ConfigSource>,
    /// Where `config.toml` lives or would be created.
    pub config_dir: Option<PathBuf>,
    /// Problems worth surfacing to the user; none of them stop loading.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that actually contributed to the config.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|s| s.loaded.then_some(s.path.as_path()))
            .collect()
    }
}

/// Discover and merge config using the default user config directory.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Discover and merge config.
///
/// A `config_dir` given here wins over `CORPS_CONFIG_DIR` and the platform
/// directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let config_dir = config_dir.map(Path::to_path_buf).or_else(user_config_dir);
    let project_file = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));

    let layers = config_dir
        .iter()
        .map(|dir| dir.join(USER_CONFIG_FILE))
        .chain(std::iter::once(project_file));

    let mut config = CorpsConfig::new();
    let mut warnings = Vec::new();
    let sources = layers
        .map(|path| {
            let loaded = merge_file(&mut config, &path, &mut warnings);
            ConfigSource { path, loaded }
        })
        .collect();

    if config
        .backend
        .as_ref()
        .is_some_and(|b| b.has_plaintext_anon_key())
    {
        warnings.push(format!(
            "[backend] anon_key is stored in plain text; set {} instead",
            crate::ANON_KEY_ENV
        ));
    }

    Ok(LoadedConfig {
        config,
        sources,
        config_dir,
        warnings,
    })
}

/// Parse a single config file.
pub fn load_config_file(path: &Path) -> Result<CorpsConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.display().to_string(),
        source,
    })?;
    CorpsConfig::from_toml(&text)
}

/// Write `config` to `path`, creating missing directories on the way.
pub fn save_config(config: &CorpsConfig, path: &Path) -> Result<()> {
    let write_err = |at: &Path, source| ConfigError::WriteFile {
        path: at.display().to_string(),
        source,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
    }
    std::fs::write(path, config.to_toml()?).map_err(|e| write_err(path, e))
}

/// `config.toml` inside [`user_config_dir`].
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// `$CORPS_CONFIG_DIR` when set and non-empty, else `<platform config>/corps`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

/// `<platform data>/corps`, home of the persisted session files.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

/// Merge `path` into `config` if it exists. A file that fails to parse is
/// skipped with a warning.
fn merge_file(config: &mut CorpsConfig, path: &Path, warnings: &mut Vec<String>) -> bool {
    if !path.is_file() {
        return false;
    }
    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            true
        }
        Err(e) => {
            warnings.push(format!("Skipping {}: {}", path.display(), e));
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
