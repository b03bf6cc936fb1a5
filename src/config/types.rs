//! Core configuration types and loading.

use super::auth::AuthConfig;
use super::defaults::{
    default_data_dir, default_port, default_reconnect_delay, default_registration_timeout,
    default_signal_character,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Settings shared by every connection.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Authorization provider settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Networks to connect to.
    #[serde(default, rename = "server")]
    pub servers: Vec<ServerConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// The master identity in effect for a server.
    pub fn master_for<'a>(&'a self, server: &'a ServerConfig) -> Option<&'a str> {
        server
            .master
            .as_deref()
            .or(self.general.master.as_deref())
    }
}

/// `[general]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Prefix marking a chat line as a command invocation.
    #[serde(default = "default_signal_character")]
    pub signal_character: String,
    /// Bare nick of the bot master.
    #[serde(default)]
    pub master: Option<String>,
    /// Directory for extension stores and transcripts.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Extension ids that are never loaded.
    #[serde(default)]
    pub plugin_blacklist: Vec<String>,
}

impl GeneralConfig {
    /// The signal character; validation guarantees exactly one char.
    pub fn signal(&self) -> char {
        self.signal_character.chars().next().unwrap_or('+')
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.plugin_blacklist.iter().any(|b| b.eq_ignore_ascii_case(id))
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            signal_character: default_signal_character(),
            master: None,
            data_dir: default_data_dir(),
            plugin_blacklist: Vec::new(),
        }
    }
}

/// One `[[server]]` block.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Optional label; defaults to `host:port`.
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: bool,
    pub nick: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub realname: Option<String>,
    /// Connection password sent with PASS.
    #[serde(default)]
    pub password: Option<String>,
    /// Overrides `general.master` for this network.
    #[serde(default)]
    pub master: Option<String>,
    /// Channels joined after registration.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout_secs: u64,
}

impl ServerConfig {
    /// Identifier passed to extensions as the server context.
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port))
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nick)
    }

    pub fn realname(&self) -> &str {
        self.realname.as_deref().unwrap_or("slirc bot")
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }
}
