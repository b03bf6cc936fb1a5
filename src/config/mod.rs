//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, GeneralConfig, ServerConfig)
//! - [`auth`]: Authorization provider configuration (AuthConfig, ProviderKind, IdentityQuery)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: semantic checks run at startup

mod auth;
mod defaults;
mod types;
pub mod validation;

pub use auth::{AuthConfig, IdentityQuery, ProviderKind};
pub use types::{Config, ConfigError, GeneralConfig, ServerConfig};
