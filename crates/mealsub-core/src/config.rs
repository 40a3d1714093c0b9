use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Minimum lead time before the next delivery for a pause request.
pub const DEFAULT_PAUSE_CUTOFF_MINUTES: i64 = 120;
/// Minimum lead time before a same-day delivery for a skip request.
pub const DEFAULT_SKIP_CUTOFF_MINUTES: i64 = 120;

/// Top-level config (mealsub.toml + MEALSUB_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MealsubConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth: AuthConfig::default(),
        }
    }
}

/// Shared-secret check in front of the upstream-resolved caller headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub token: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::Token,
            token: Some("change-me".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// `Authorization: Bearer <token>` must match `auth.token`.
    Token,
    /// Trust the upstream proxy entirely.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Customer self-service lead times. The engine takes these as plain numbers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    #[serde(default = "default_pause_cutoff")]
    pub pause_cutoff_minutes: i64,
    #[serde(default = "default_skip_cutoff")]
    pub skip_cutoff_minutes: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            pause_cutoff_minutes: DEFAULT_PAUSE_CUTOFF_MINUTES,
            skip_cutoff_minutes: DEFAULT_SKIP_CUTOFF_MINUTES,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_pause_cutoff() -> i64 {
    DEFAULT_PAUSE_CUTOFF_MINUTES
}
fn default_skip_cutoff() -> i64 {
    DEFAULT_SKIP_CUTOFF_MINUTES
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.mealsub/mealsub.db", home)
}

impl MealsubConfig {
    /// Load config from a TOML file with MEALSUB_* env var overrides.
    ///
    /// Uses the explicit path when given, else `~/.mealsub/mealsub.toml`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: MealsubConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MEALSUB_").split("__"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.mealsub/mealsub.toml", home)
}
