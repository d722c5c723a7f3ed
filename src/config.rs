//! Layered configuration.
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed `RELAY_`, nested with `__`
//!    (e.g. `RELAY_AUTH__DEV_MODE=true`)
//! 2. The TOML file passed with `--config`, or `./relay.toml` when present
//! 3. Built-in defaults

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::{AgentRecord, ModelRecord, ProviderRecord, UserId};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "relay.toml";

const ENV_PREFIX: &str = "RELAY_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub generation: GenerationSettings,
    pub hub: HubSettings,
    pub logging: LoggingSettings,
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// How requests are attributed to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Attribute every request to `dev_user_id` without checking anything.
    pub dev_mode: bool,
    pub dev_user_id: UserId,
    /// Header carrying the user id set by the fronting auth layer.
    pub user_header: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            dev_mode: false,
            dev_user_id: UserId(1),
            user_header: "x-user-id".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub history_limit: usize,
    pub timeout_secs: u64,
    pub health_check_timeout_secs: u64,
    /// HTTP client timeout used by the connectors.
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            history_limit: 20,
            timeout_secs: 120,
            health_check_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl GenerationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Bounded outbound queue per connection.
    pub connection_queue: usize,
    /// Bounded command queue into the hub loop.
    pub command_queue: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            connection_queue: 256,
            command_queue: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

/// Records loaded into the in-memory store at start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub providers: Vec<ProviderRecord>,
    pub models: Vec<ModelRecord>,
    pub agents: Vec<AgentRecord>,
    pub chats: Vec<SeedChat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedChat {
    pub user_id: UserId,
    #[serde(default = "default_chat_title")]
    pub title: String,
}

fn default_chat_title() -> String {
    "New Chat".to_string()
}

impl AppConfig {
    /// Assemble every configuration source without extracting it.
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match config_path {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
                }
            }
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration from all sources.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(config_path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let generation = &self.generation;
        if generation.history_limit == 0 {
            return Err(ConfigError::Invalid("generation.history_limit must be > 0".into()));
        }
        if generation.timeout_secs == 0 || generation.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("generation timeouts must be > 0".into()));
        }
        if generation.health_check_timeout_secs == 0
            || generation.health_check_timeout_secs >= generation.timeout_secs
        {
            return Err(ConfigError::Invalid(
                "generation.health_check_timeout_secs must be > 0 and shorter than timeout_secs".into(),
            ));
        }
        if self.hub.connection_queue == 0 || self.hub.command_queue == 0 {
            return Err(ConfigError::Invalid("hub queue sizes must be > 0".into()));
        }
        if self.auth.user_header.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.user_header must not be empty".into()));
        }
        Ok(())
    }
}
