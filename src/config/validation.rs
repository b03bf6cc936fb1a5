//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use crate::casemap::is_channel;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("general.signal_character must be exactly one non-whitespace character, got {0:?}")]
    InvalidSignalCharacter(String),
    #[error("at least one [[server]] block is required")]
    NoServers,
    #[error("server #{0}: host is required")]
    MissingHost(usize),
    #[error("server #{0}: nick is required")]
    MissingNick(usize),
    #[error("server #{index}: nick {nick:?} contains whitespace")]
    InvalidNick { index: usize, nick: String },
    #[error("server #{index}: {channel:?} is not a channel name")]
    InvalidChannel { index: usize, channel: String },
    #[error("auth.pending_timeout_secs must be greater than zero")]
    ZeroPendingTimeout,
    #[error("auth.max_pending_per_identity must be greater than zero")]
    ZeroPendingLimit,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let signal = &config.general.signal_character;
    let mut chars = signal.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if !c.is_whitespace() => {}
        _ => errors.push(ValidationError::InvalidSignalCharacter(signal.clone())),
    }

    if config.servers.is_empty() {
        errors.push(ValidationError::NoServers);
    }

    for (index, server) in config.servers.iter().enumerate() {
        if server.host.trim().is_empty() {
            errors.push(ValidationError::MissingHost(index));
        }
        if server.nick.is_empty() {
            errors.push(ValidationError::MissingNick(index));
        } else if server.nick.chars().any(char::is_whitespace) {
            errors.push(ValidationError::InvalidNick {
                index,
                nick: server.nick.clone(),
            });
        }
        for channel in &server.channels {
            if !is_channel(channel) || channel.contains([' ', ',']) {
                errors.push(ValidationError::InvalidChannel {
                    index,
                    channel: channel.clone(),
                });
            }
        }
    }

    if config.auth.pending_timeout_secs == 0 {
        errors.push(ValidationError::ZeroPendingTimeout);
    }
    if config.auth.max_pending_per_identity == 0 {
        errors.push(ValidationError::ZeroPendingLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
