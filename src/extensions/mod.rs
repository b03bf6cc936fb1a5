//! Built-in extensions and the loader that constructs them.
//!
//! The core never discovers extensions itself: the loader builds one fresh
//! set of instances per connection and the router registers them in the
//! order given. The configured authorization provider comes first so it is
//! the one the registry designates.

mod help;
mod hello;
mod irc;
mod logger;
mod seen;

pub use help::Help;
pub use hello::Hello;
pub use irc::Irc;
pub use logger::Logger;
pub use seen::Seen;

use crate::auth::{LocalAuthProvider, NickServProvider};
use crate::config::{Config, ServerConfig};
use crate::error::LoadError;
use crate::extension::{Extension, StoreManager};
use std::sync::Arc;
use tracing::{info, warn};

/// Ids of the ordinary built-in extensions, in load order.
pub const BUILTIN_IDS: &[&str] = &["hello", "help", "irc", "seen", "logger"];

/// Constructs built-in extensions for a connection.
pub struct BuiltinLoader {
    config: Arc<Config>,
    stores: Arc<StoreManager>,
}

impl BuiltinLoader {
    pub fn new(config: Arc<Config>, stores: Arc<StoreManager>) -> Self {
        Self { config, stores }
    }

    /// Build every non-blacklisted extension for `server`.
    ///
    /// Failures are logged and the extension is left out.
    pub fn load(&self, server: &ServerConfig) -> Vec<Box<dyn Extension>> {
        let provider = self.config.auth.provider.extension_id();
        let mut loaded = Vec::new();
        for id in provider.into_iter().chain(BUILTIN_IDS.iter().copied()) {
            match self.construct(id, server) {
                Ok(extension) => loaded.push(extension),
                Err(LoadError::Blacklisted(id)) if Some(id.as_str()) == provider => {
                    warn!(extension = %id, "Authorization provider is blacklisted")
                }
                Err(LoadError::Blacklisted(id)) => info!(extension = %id, "Skipping blacklisted extension"),
                Err(e) => warn!(extension = %id, error = %e, code = e.error_code(), "Failed to load extension"),
            }
        }
        loaded
    }

    fn construct(&self, id: &str, server: &ServerConfig) -> Result<Box<dyn Extension>, LoadError> {
        if self.config.general.is_blacklisted(id) {
            return Err(LoadError::Blacklisted(id.to_string()));
        }
        let master = self.config.master_for(server).map(str::to_string);
        let extension: Box<dyn Extension> = match id {
            "authnickserv" => Box::new(NickServProvider::new(&self.config.auth, master)),
            "authlocal" => Box::new(LocalAuthProvider::new(&self.stores, master)?),
            "hello" => Box::new(Hello),
            "help" => Box::new(Help::default()),
            "irc" => Box::new(Irc::default()),
            "seen" => Box::new(Seen::new(&self.stores)?),
            "logger" => Box::new(Logger::new(
                &self.stores,
                &self.config.general.data_path(),
                &server.label(),
            )?),
            other => {
                return Err(LoadError::Construct {
                    id: other.to_string(),
                    reason: "no such built-in extension".to_string(),
                });
            }
        };
        Ok(extension)
    }
}
