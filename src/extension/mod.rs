//! Extension contract.
//!
//! An extension is a per-connection handler with a unique lowercase id.
//! Every hook is optional and defaults to a no-op. Commands are declared
//! explicitly through [`Extension::commands`] and dispatched by name through
//! [`Extension::call`].
//!
//! Extensions that need core services (sending arbitrary protocol
//! operations, reading the command catalog) declare themselves
//! [`Extension::privileged`] and receive a [`CoreHandle`] at registration.

mod store;

pub use store::{Store, StoreManager};

use crate::auth::AuthProvider;
use crate::casemap::{bare_nick, is_channel};
use crate::error::{HookResult, ReplyResult};
use crate::members::Membership;
use crate::protocol::Outbound;
use crate::rank::Rank;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A command an extension handles, with its minimum rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub rank: Rank,
    /// One-line usage text shown by `help`.
    pub help: &'static str,
}

impl CommandSpec {
    pub const fn new(name: &'static str, rank: Rank, help: &'static str) -> Self {
        Self { name, rank, help }
    }
}

/// One parsed command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Label of the server connection the command arrived on.
    pub server: String,
    /// Original destination: a channel, or the bot's nick in a private exchange.
    pub target: String,
    /// Full sender identity (`nick!user@host`).
    pub sender: String,
    /// Lowercased command name.
    pub command: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Bare nick of the sender.
    pub fn nick(&self) -> &str {
        bare_nick(&self.sender)
    }

    /// The channel the command was issued in, if not private.
    pub fn channel(&self) -> Option<&str> {
        is_channel(&self.target).then_some(self.target.as_str())
    }

    pub fn is_private(&self) -> bool {
        self.channel().is_none()
    }

    /// Where replies go: the channel, or the sender for private exchanges.
    pub fn reply_to(&self) -> &str {
        self.channel().unwrap_or_else(|| self.nick())
    }

    /// Arguments joined back into one string.
    pub fn rest(&self) -> String {
        self.args.join(" ")
    }
}

/// Active commands per extension, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub extension: String,
    pub commands: Vec<CommandSpec>,
}

impl Catalog {
    pub fn add(&mut self, extension: &str, commands: Vec<CommandSpec>) {
        self.entries.push(CatalogEntry {
            extension: extension.to_string(),
            commands,
        });
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn extension(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.extension.eq_ignore_ascii_case(id))
    }

    /// Find an active command and the extension that owns it.
    pub fn command(&self, name: &str) -> Option<(&str, &CommandSpec)> {
        self.entries.iter().find_map(|entry| {
            entry
                .commands
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .map(|c| (entry.extension.as_str(), c))
        })
    }
}

/// Narrow capability handed to privileged extensions.
///
/// Operations are queued and flushed by the router after the current event
/// has been processed.
#[derive(Debug, Clone)]
pub struct CoreHandle {
    outbound: mpsc::UnboundedSender<Outbound>,
    catalog: Arc<RwLock<Catalog>>,
    nick: Arc<RwLock<String>>,
}

impl CoreHandle {
    pub fn new(
        outbound: mpsc::UnboundedSender<Outbound>,
        catalog: Arc<RwLock<Catalog>>,
        nick: Arc<RwLock<String>>,
    ) -> Self {
        Self {
            outbound,
            catalog,
            nick,
        }
    }

    pub fn send(&self, op: Outbound) {
        // The receiver lives as long as the router; a send can only fail
        // while the connection is being torn down.
        let _ = self.outbound.send(op);
    }

    pub fn join(&self, channel: &str, key: Option<&str>) {
        self.send(Outbound::Join {
            channel: channel.to_string(),
            key: key.map(str::to_string),
        });
    }

    pub fn part(&self, channel: &str, message: Option<&str>) {
        self.send(Outbound::Part {
            channel: channel.to_string(),
            message: message.map(str::to_string),
        });
    }

    pub fn change_nick(&self, nick: &str) {
        self.send(Outbound::Nick(nick.to_string()));
    }

    /// The bot's current nick on this connection.
    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    pub fn catalog(&self) -> Catalog {
        self.catalog.read().clone()
    }
}

/// The contract every extension satisfies.
#[allow(unused_variables)]
pub trait Extension: Send {
    /// Unique lowercase identifier.
    fn id(&self) -> &str;

    /// Commands this extension handles.
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }

    /// Run the handler for `command`. Returned text is sent to the
    /// invocation's reply target.
    fn call(&mut self, command: &str, invocation: &Invocation) -> ReplyResult {
        Ok(None)
    }

    /// Whether this extension needs a [`CoreHandle`].
    fn privileged(&self) -> bool {
        false
    }

    fn attach_core(&mut self, core: CoreHandle) {}

    /// The authorization provider capability, if this extension has one.
    fn as_provider(&mut self) -> Option<&mut dyn AuthProvider> {
        None
    }

    fn on_connect(&mut self) -> HookResult {
        Ok(())
    }

    fn on_disconnect(&mut self) -> HookResult {
        Ok(())
    }

    /// The bot is shutting down.
    fn on_quit(&mut self) -> HookResult {
        Ok(())
    }

    /// A chat line. Returned text is sent back to where the line came from.
    fn on_privmsg(&mut self, sender: &str, target: &str, text: &str) -> ReplyResult {
        Ok(None)
    }

    fn on_useraction(&mut self, sender: &str, target: &str, text: &str) -> HookResult {
        Ok(())
    }

    fn on_notice(&mut self, sender: &str, target: &str, text: &str) -> HookResult {
        Ok(())
    }

    /// The bot joined `channel`.
    fn on_join(&mut self, channel: &str) -> HookResult {
        Ok(())
    }

    /// The bot left `channel`.
    fn on_part(&mut self, channel: &str) -> HookResult {
        Ok(())
    }

    fn on_userjoin(&mut self, who: &str, channel: &str) -> HookResult {
        Ok(())
    }

    fn on_userpart(&mut self, who: &str, channel: &str, message: &str) -> HookResult {
        Ok(())
    }

    fn on_userkicked(
        &mut self,
        kicker: &str,
        channel: &str,
        target: &str,
        reason: &str,
    ) -> HookResult {
        Ok(())
    }

    /// The bot was kicked from `channel`.
    fn on_kicked(&mut self, kicker: &str, channel: &str, reason: &str) -> HookResult {
        Ok(())
    }

    fn on_userrenamed(&mut self, old: &str, new: &str) -> HookResult {
        Ok(())
    }

    fn on_userquit(&mut self, who: &str, message: &str) -> HookResult {
        Ok(())
    }

    /// A completed member-list snapshot.
    fn on_names(&mut self, channel: &str, members: &Membership) -> HookResult {
        Ok(())
    }

    fn on_motd(&mut self, motd: &str) -> HookResult {
        Ok(())
    }

    fn on_modechanged(&mut self, who: &str, target: &str, modes: &[String]) -> HookResult {
        Ok(())
    }

    fn on_topicchanged(&mut self, who: Option<&str>, channel: &str, topic: &str) -> HookResult {
        Ok(())
    }

    fn on_unhandled(&mut self, code: &str, args: &[String]) -> HookResult {
        Ok(())
    }
}
