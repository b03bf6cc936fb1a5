//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// General Defaults
// =============================================================================

pub fn default_signal_character() -> String {
    "+".to_string()
}

pub fn default_data_dir() -> String {
    "data".to_string()
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_port() -> u16 {
    6667
}

pub fn default_reconnect_delay() -> u64 {
    10
}

pub fn default_registration_timeout() -> u64 {
    60
}

// =============================================================================
// Authorization Defaults
// =============================================================================

pub fn default_nickserv() -> String {
    "NickServ".to_string()
}

pub fn default_chanserv() -> String {
    "ChanServ".to_string()
}

pub fn default_pending_timeout() -> u64 {
    120
}

pub fn default_max_pending() -> usize {
    16
}

pub fn default_denial_message() -> String {
    "You are not authorized to execute this command.".to_string()
}
