//! Capability registry.
//!
//! Holds the loaded extensions of one connection in registration order, the
//! command name -> handler map, and the designated authorization provider.

use crate::auth::AuthProvider;
use crate::error::{HookResult, LoadError, ReplyResult};
use crate::extension::{Catalog, CoreHandle, Extension, Invocation};
use crate::rank::Rank;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A registered command. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: String,
    pub extension_id: String,
    pub rank: Rank,
    /// Index into the registry's extension list.
    extension: usize,
}

#[cfg(test)]
impl CommandDescriptor {
    pub(crate) fn for_tests(name: &str, rank: Rank) -> Self {
        Self {
            name: name.to_string(),
            extension_id: "test".to_string(),
            rank,
            extension: 0,
        }
    }
}

/// Loaded extensions and their commands.
pub struct Registry {
    extensions: Vec<Box<dyn Extension>>,
    commands: HashMap<String, CommandDescriptor>,
    provider: Option<usize>,
    core: CoreHandle,
    catalog: Arc<RwLock<Catalog>>,
}

impl Registry {
    /// `catalog` must be the catalog `core` reads from.
    pub fn new(core: CoreHandle, catalog: Arc<RwLock<Catalog>>) -> Self {
        Self {
            extensions: Vec::new(),
            commands: HashMap::new(),
            provider: None,
            core,
            catalog,
        }
    }

    /// Validate and register an extension.
    ///
    /// A command whose name is already taken is skipped with a warning; the
    /// extension itself still loads. The first extension exposing a provider
    /// becomes the authorization provider.
    pub fn register(&mut self, mut extension: Box<dyn Extension>) -> Result<(), LoadError> {
        let id = extension.id().to_string();
        if !is_valid_id(&id) {
            return Err(LoadError::InvalidId(id));
        }
        if self.extensions.iter().any(|e| e.id() == id) {
            return Err(LoadError::DuplicateId(id));
        }

        if extension.privileged() {
            extension.attach_core(self.core.clone());
        }

        let index = self.extensions.len();
        let mut active = Vec::new();
        for spec in extension.commands() {
            let name = spec.name.to_ascii_lowercase();
            if let Some(existing) = self.commands.get(&name) {
                warn!(
                    command = %name,
                    extension = %id,
                    registered_by = %existing.extension_id,
                    "Command name collision, skipping"
                );
                continue;
            }
            self.commands.insert(
                name.clone(),
                CommandDescriptor {
                    name,
                    extension_id: id.clone(),
                    rank: spec.rank,
                    extension: index,
                },
            );
            active.push(spec);
        }

        if extension.as_provider().is_some() {
            if self.provider.is_none() {
                self.provider = Some(index);
                info!(extension = %id, "Authorization provider registered");
            } else {
                info!(extension = %id, "Additional authorization provider ignored");
            }
        }

        debug!(extension = %id, commands = active.len(), "Extension registered");
        self.catalog.write().add(&id, active);
        self.extensions.push(extension);
        Ok(())
    }

    pub fn lookup(&self, command: &str) -> Option<&CommandDescriptor> {
        self.commands.get(command)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    pub fn command_count(&self) -> usize {
        self.commands.len()
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider
            .and_then(|i| self.extensions.get(i))
            .map(|e| e.id())
    }

    pub fn provider_mut(&mut self) -> Option<&mut dyn AuthProvider> {
        let index = self.provider?;
        self.extensions.get_mut(index)?.as_provider()
    }

    /// Run a command's handler.
    pub fn call(&mut self, descriptor: &CommandDescriptor, invocation: &Invocation) -> ReplyResult {
        match self.extensions.get_mut(descriptor.extension) {
            Some(extension) => extension.call(&descriptor.name, invocation),
            None => Ok(None),
        }
    }

    /// Invoke a hook on every extension in registration order.
    ///
    /// A failing hook is logged and does not stop the fan-out.
    pub fn fan_out<F>(&mut self, hook: &'static str, mut f: F)
    where
        F: FnMut(&mut dyn Extension) -> HookResult,
    {
        for extension in &mut self.extensions {
            if let Err(e) = f(extension.as_mut()) {
                warn!(
                    extension = %extension.id(),
                    hook,
                    error = %e,
                    code = e.error_code(),
                    "Extension hook failed"
                );
            }
        }
    }

    /// Fan a chat line out to every `on_privmsg` hook, collecting replies.
    pub fn fan_privmsg(&mut self, sender: &str, target: &str, text: &str) -> Vec<String> {
        let mut replies = Vec::new();
        for extension in &mut self.extensions {
            match extension.on_privmsg(sender, target, text) {
                Ok(Some(reply)) if !reply.trim().is_empty() => replies.push(reply),
                Ok(_) => {}
                Err(e) => warn!(
                    extension = %extension.id(),
                    hook = "on_privmsg",
                    error = %e,
                    code = e.error_code(),
                    "Extension hook failed"
                ),
            }
        }
        replies
    }
}

/// Extension ids are non-empty, lowercase ASCII alphanumerics or `_`.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
