//! CLI configuration loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cajita_core::{ClientConfig, LoginCredentials, Secret, StrategyConfig};
use directories::ProjectDirs;

/// Default location of `config.toml`.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("cajita.toml"))
}

/// Load the configuration file (if present), apply environment overrides,
/// and validate.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let config = if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        ClientConfig::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))?
    } else {
        tracing::debug!("No config file at {:?}; using defaults", path);
        ClientConfig::default()
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    config
        .validate()
        .with_context(|| format!("Invalid configuration (loaded from {:?})", path))?;
    Ok(config)
}

/// Apply `CAJITA_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(mut config: ClientConfig, lookup: F) -> ClientConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("CAJITA_API_BASE_URL") {
        config.api_base_url = url;
    }
    if let Some(url) = lookup("CAJITA_DEV_BASE_URL") {
        config.dev_base_url = url;
    }
    if let Some(flag) = lookup("CAJITA_DEV_MODE") {
        config.dev_mode = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Some(secret) = lookup("CAJITA_CLIENT_SECRET") {
        config.strategies.push(StrategyConfig::ClientCredentials {
            client_secret: Secret::new(secret),
        });
    }
    if let (Some(email), Some(password)) = (lookup("CAJITA_EMAIL"), lookup("CAJITA_PASSWORD")) {
        config.strategies.insert(
            0,
            StrategyConfig::Password {
                credentials: vec![LoginCredentials::new(email, password)],
            },
        );
    }
    config
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "lacajita", "cajita")
}
