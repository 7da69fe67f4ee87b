use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{Config, ProviderConfig};

/// Resolve a user-supplied path, expanding ~ to the home directory.
pub fn resolve_path(path: &str) -> PathBuf {
    if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home.join(path.strip_prefix("~/").unwrap_or(""));
        }
    }
    PathBuf::from(path)
}

const LOCAL_CONFIG: &str = "mentor.json";

/// Config path under a home directory: `<home>/.mentor/config.json`.
fn home_config(home: &Path) -> PathBuf {
    home.join(".mentor").join("config.json")
}

/// Pick the config file for a working directory and home directory.
///
/// `mentor.json` in `cwd` wins, then `~/.mentor/config.json`. When neither
/// exists the home location is returned so a later save lands there.
pub fn locate_config(cwd: &Path, home: Option<&Path>) -> PathBuf {
    let local = cwd.join(LOCAL_CONFIG);
    if local.is_file() {
        return local;
    }
    match home {
        Some(home) => home_config(home),
        None => local,
    }
}

/// [`locate_config`] for the process's working directory and home.
pub fn find_config_path() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    locate_config(&cwd, dirs::home_dir().as_deref())
}

/// Load configuration from a JSON file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config '{}'", path.display()))?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Save configuration to a JSON file.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let contents = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create config directory '{}'",
                parent.to_string_lossy()
            )
        })?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config '{}'", path.display()))?;
    Ok(())
}

/// Resolve an API key from config, falling back to an environment variable.
/// Only the process environment is consulted; `.env` files are not read.
pub fn resolve_api_key(provider_cfg: &Option<ProviderConfig>, env_var: &str) -> Option<String> {
    provider_cfg
        .as_ref()
        .and_then(|c| c.api_key.clone())
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
}
