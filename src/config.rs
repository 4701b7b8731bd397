use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::scm::Driver;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Environment variable consulted when the config file carries no token.
pub const TOKEN_ENV: &str = "SCM_TOKEN";

/// Top-level configuration loaded from .scm.toml.
///
/// All sections are optional; an empty file addresses public github.com
/// anonymously.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Which provider driver to use
    #[serde(default = "default_driver")]
    pub driver: Driver,
    /// API root. Defaults to the driver's public instance when unset.
    pub server: Option<String>,
    /// Access token. If None, falls back to the SCM_TOKEN env var.
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            driver: default_driver(),
            server: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Shared secret for verifying deliveries. None disables verification.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_driver() -> Driver {
    Driver::Github
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("scm-unify/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    /// Load configuration from .scm.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(".scm.toml");
        let mut config = if path.exists() {
            Self::load_from(path)?
        } else {
            Config::default()
        };

        if config.client.token.is_none() {
            if let Ok(token) = std::env::var(TOKEN_ENV) {
                config.client.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the access token: config file value takes precedence,
    /// falls back to the SCM_TOKEN env var.
    pub fn token(&self) -> Option<String> {
        self.client
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV).ok())
    }

    /// The configured server, or the driver's public instance.
    pub fn server(&self) -> String {
        match &self.client.server {
            Some(server) => server.clone(),
            None => match self.client.driver {
                Driver::Github => "https://api.github.com".to_string(),
                Driver::Gitea => "https://gitea.com".to_string(),
            },
        }
    }
}
