//! Authorization provider configuration.

use super::defaults::{
    default_chanserv, default_denial_message, default_max_pending, default_nickserv,
    default_pending_timeout,
};
use serde::Deserialize;
use std::time::Duration;

/// Which authorization provider the loader installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Deferred confirmation through NickServ/ChanServ.
    #[default]
    Nickserv,
    /// Self-contained accounts kept in the provider's own store.
    Local,
    /// No provider; only the master fallback applies.
    None,
}

impl ProviderKind {
    /// Extension id of the provider, if any.
    pub fn extension_id(self) -> Option<&'static str> {
        match self {
            Self::Nickserv => Some("authnickserv"),
            Self::Local => Some("authlocal"),
            Self::None => None,
        }
    }
}

/// Which NickServ command confirms an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityQuery {
    /// `ACC nick`, answered with `nick ACC <level>`.
    #[default]
    Acc,
    /// `STATUS nick`, answered with `STATUS nick <level>`.
    Status,
}

/// Authorization settings (`[auth]` table).
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Nick of the identity service.
    #[serde(default = "default_nickserv")]
    pub nickserv: String,
    /// Nick of the channel service.
    #[serde(default = "default_chanserv")]
    pub chanserv: String,
    #[serde(default)]
    pub query: IdentityQuery,
    /// Seconds a pending invocation may wait for confirmation before it is denied.
    #[serde(default = "default_pending_timeout")]
    pub pending_timeout_secs: u64,
    /// Maximum pending invocations per identity; excess requests are denied.
    #[serde(default = "default_max_pending")]
    pub max_pending_per_identity: usize,
    /// Text sent (prefixed with the requester's nick) when a command is denied.
    #[serde(default = "default_denial_message")]
    pub denial_message: String,
}

impl AuthConfig {
    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            nickserv: default_nickserv(),
            chanserv: default_chanserv(),
            query: IdentityQuery::default(),
            pending_timeout_secs: default_pending_timeout(),
            max_pending_per_identity: default_max_pending(),
            denial_message: default_denial_message(),
        }
    }
}
