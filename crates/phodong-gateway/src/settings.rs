//! Gateway configuration and the API credential.
//!
//! | Source | Key | Default |
//! |--------|-----|---------|
//! | PHODONG_APP_NAME | app_name | PHODONG |
//! | PHODONG_BIND_ADDR | bind_addr | 127.0.0.1:8000 |
//! | PHODONG_MODEL | model | gemini-2.5-flash |
//! | PHODONG_API_BASE | api_base | Gemini v1beta |
//! | PHODONG_MAX_SCENES | max_scenes | 4 |
//! | PHODONG_SECRETS_PATH | secrets_path | config/secrets.toml |
//! | PHODONG_SESSION_IDLE_SECS | session_idle_secs | 3600 |
//!
//! File values come from `PHODONG_CONFIG` (default `config/phodong.toml`) when it exists;
//! environment wins over the file.

use phodong_core::{DEFAULT_API_BASE, DEFAULT_MAX_SCENES, DEFAULT_MODEL};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const API_KEY_NAME: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub app_name: String,
    pub bind_addr: String,
    pub model: String,
    pub api_base: String,
    pub max_scenes: usize,
    pub secrets_path: String,
    /// Sessions untouched for this long are evicted.
    pub session_idle_secs: u64,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("PHODONG_CONFIG").unwrap_or_else(|_| "config/phodong.toml".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "PHODONG")?
            .set_default("bind_addr", "127.0.0.1:8000")?
            .set_default("model", DEFAULT_MODEL)?
            .set_default("api_base", DEFAULT_API_BASE)?
            .set_default("max_scenes", DEFAULT_MAX_SCENES as i64)?
            .set_default("secrets_path", "config/secrets.toml")?
            .set_default("session_idle_secs", 3600_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        builder
            .add_source(
                config::Environment::with_prefix("PHODONG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// Managed secrets file (TOML), e.g. `GOOGLE_API_KEY = "..."`.
#[derive(Debug, Default, Deserialize)]
struct Secrets {
    #[serde(rename = "GOOGLE_API_KEY", default)]
    google_api_key: Option<String>,
}

/// Resolve the API key: secrets file first, `GOOGLE_API_KEY` environment variable second.
pub fn resolve_api_key(secrets_path: &Path) -> Option<String> {
    secrets_file_key(secrets_path).or_else(|| env_opt_string(API_KEY_NAME))
}

fn secrets_file_key(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("Secrets file {} unreadable: {}", path.display(), e);
            return None;
        }
    };
    match toml::from_str::<Secrets>(&content) {
        Ok(secrets) => secrets
            .google_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()),
        Err(e) => {
            tracing::warn!("Secrets file {} is not valid TOML: {}", path.display(), e);
            None
        }
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
