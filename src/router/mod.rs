//! Message router.
//!
//! One router per server connection. Each inbound [`Event`] is processed to
//! completion (hook fan-out, command extraction, authorization bookkeeping)
//! and yields the protocol operations to send, in order.

mod extract;

pub use extract::{CommandLine, extract};

use crate::auth::{AuthEffect, AuthEngine, AuthProvider};
use crate::casemap::{bare_nick, irc_eq, is_channel};
use crate::config::{Config, ServerConfig};
use crate::extension::{Catalog, CoreHandle, Extension, Invocation};
use crate::members::MemberListTracker;
use crate::protocol::{Event, Outbound};
use crate::registry::Registry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Per-connection router settings.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Server label passed to handlers.
    pub server: String,
    pub nick: String,
    pub signal: char,
    pub master: Option<String>,
    pub denial_message: String,
}

impl RouterSettings {
    pub fn from_config(config: &Config, server: &ServerConfig) -> Self {
        Self {
            server: server.label(),
            nick: server.nick.clone(),
            signal: config.general.signal(),
            master: config.master_for(server).map(str::to_string),
            denial_message: config.auth.denial_message.clone(),
        }
    }
}

pub struct Router {
    server: String,
    signal: char,
    nick: Arc<RwLock<String>>,
    registry: Registry,
    engine: AuthEngine,
    members: MemberListTracker,
    motd: Vec<String>,
    core_rx: mpsc::UnboundedReceiver<Outbound>,
}

impl Router {
    /// Build the per-connection core and register `extensions` in order.
    ///
    /// Rejected extensions are logged and skipped.
    pub fn new(settings: RouterSettings, extensions: Vec<Box<dyn Extension>>) -> Self {
        let (core_tx, core_rx) = mpsc::unbounded_channel();
        let catalog = Arc::new(RwLock::new(Catalog::default()));
        let nick = Arc::new(RwLock::new(settings.nick));
        let core = CoreHandle::new(core_tx, Arc::clone(&catalog), Arc::clone(&nick));

        let mut registry = Registry::new(core, catalog);
        for extension in extensions {
            let id = extension.id().to_string();
            if let Err(e) = registry.register(extension) {
                warn!(extension = %id, error = %e, code = e.error_code(), "Extension rejected");
            }
        }
        info!(
            server = %settings.server,
            extensions = registry.len(),
            commands = registry.command_count(),
            provider = registry.provider_id().unwrap_or("none"),
            "Router ready"
        );

        Self {
            server: settings.server,
            signal: settings.signal,
            nick,
            registry,
            engine: AuthEngine::new(settings.master, settings.denial_message),
            members: MemberListTracker::new(),
            motd: Vec::new(),
            core_rx,
        }
    }

    pub fn nick(&self) -> String {
        self.nick.read().clone()
    }

    pub fn set_nick(&self, nick: &str) {
        *self.nick.write() = nick.to_string();
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn is_me(&self, who: &str) -> bool {
        irc_eq(bare_nick(who), &self.nick.read())
    }

    /// Process one inbound event.
    pub fn handle(&mut self, event: Event) -> Vec<Outbound> {
        let mut out = Vec::new();
        match event {
            Event::Connected => self.registry.fan_out("on_connect", |e| e.on_connect()),
            Event::Disconnected { reason } => {
                info!(server = %self.server, reason = %reason, "Disconnected");
                self.members.clear();
                self.motd.clear();
                self.provider_event(&mut out, |p| p.on_disconnect());
                self.registry.fan_out("on_disconnect", |e| e.on_disconnect());
            }
            Event::Message {
                sender,
                target,
                text,
            } => self.chat(&sender, &target, &text, &mut out),
            Event::Action {
                sender,
                target,
                text,
            } => self
                .registry
                .fan_out("on_useraction", |e| e.on_useraction(&sender, &target, &text)),
            Event::Notice {
                sender,
                target,
                text,
            } => {
                self.registry
                    .fan_out("on_notice", |e| e.on_notice(&sender, &target, &text));
                self.provider_event(&mut out, |p| p.on_notice(&sender, &target, &text));
            }
            Event::Join { who, channel } => {
                if self.is_me(&who) {
                    self.registry.fan_out("on_join", |e| e.on_join(&channel));
                } else {
                    self.registry
                        .fan_out("on_userjoin", |e| e.on_userjoin(&who, &channel));
                }
            }
            Event::Part {
                who,
                channel,
                message,
            } => {
                if self.is_me(&who) {
                    self.registry.fan_out("on_part", |e| e.on_part(&channel));
                } else {
                    self.registry
                        .fan_out("on_userpart", |e| e.on_userpart(&who, &channel, &message));
                }
            }
            Event::NickChange { old, new } => {
                if self.is_me(&old) {
                    info!(old = %bare_nick(&old), new = %new, "Bot nick changed");
                    self.set_nick(&new);
                } else {
                    self.provider_event(&mut out, |p| p.on_user_renamed(&old, &new));
                }
                self.registry
                    .fan_out("on_userrenamed", |e| e.on_userrenamed(&old, &new));
            }
            Event::Mode { who, target, modes } => self
                .registry
                .fan_out("on_modechanged", |e| e.on_modechanged(&who, &target, &modes)),
            Event::Kick {
                kicker,
                channel,
                target,
                reason,
            } => {
                if self.is_me(&target) {
                    warn!(channel = %channel, kicker = %kicker, reason = %reason, "Kicked");
                    self.registry
                        .fan_out("on_kicked", |e| e.on_kicked(&kicker, &channel, &reason));
                } else {
                    self.registry.fan_out("on_userkicked", |e| {
                        e.on_userkicked(&kicker, &channel, &target, &reason)
                    });
                }
            }
            Event::Quit { who, message } => {
                self.provider_event(&mut out, |p| p.on_user_quit(&who));
                self.registry
                    .fan_out("on_userquit", |e| e.on_userquit(&who, &message));
            }
            Event::NamesFragment { channel, names } => self.members.accumulate(&channel, &names),
            Event::NamesComplete { channel } => {
                let members = self.members.finalize(&channel);
                self.registry
                    .fan_out("on_names", |e| e.on_names(&channel, &members));
                self.provider_event(&mut out, |p| p.on_names(&channel, &members));
            }
            Event::Topic {
                who,
                channel,
                topic,
            } => self.registry.fan_out("on_topicchanged", |e| {
                e.on_topicchanged(who.as_deref(), &channel, &topic)
            }),
            Event::MotdStart => self.motd.clear(),
            Event::MotdLine(line) => self.motd.push(line),
            Event::MotdEnd => {
                let motd = std::mem::take(&mut self.motd).join("\n");
                self.registry.fan_out("on_motd", |e| e.on_motd(&motd));
            }
            Event::Ping(_) => {}
            Event::ServerError(message) => warn!(server = %self.server, message = %message, "Server error"),
            Event::Unhandled { code, args } => self
                .registry
                .fan_out("on_unhandled", |e| e.on_unhandled(&code, &args)),
        }
        self.drain_core(&mut out);
        out
    }

    /// Deny pending invocations that have waited too long.
    pub fn expire(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        self.provider_event(&mut out, |p| p.expire(now));
        out
    }

    /// Fan out `on_quit` before the connection is closed for good.
    pub fn shutdown(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        self.registry.fan_out("on_quit", |e| e.on_quit());
        self.drain_core(&mut out);
        out
    }

    fn chat(&mut self, sender: &str, target: &str, text: &str, out: &mut Vec<Outbound>) {
        let reply_to = if is_channel(target) {
            target
        } else {
            bare_nick(sender)
        };
        for reply in self.registry.fan_privmsg(sender, target, text) {
            out.push(Outbound::privmsg(reply_to, reply));
        }

        if self.is_me(sender) {
            return;
        }
        let nick = self.nick();
        let Some(line) = extract(text, target, &nick, self.signal) else {
            return;
        };
        let Some(descriptor) = self.registry.lookup(&line.name).cloned() else {
            debug!(command = %line.name, "Unknown command ignored");
            return;
        };
        let invocation = Invocation {
            server: self.server.clone(),
            target: target.to_string(),
            sender: sender.to_string(),
            command: line.name,
            args: line.args,
        };
        self.engine
            .dispatch(&mut self.registry, &nick, &descriptor, invocation, out);
    }

    fn provider_event<F>(&mut self, out: &mut Vec<Outbound>, f: F)
    where
        F: FnOnce(&mut dyn AuthProvider) -> Vec<AuthEffect>,
    {
        let Some(provider) = self.registry.provider_mut() else {
            return;
        };
        let effects = f(provider);
        if effects.is_empty() {
            return;
        }
        let nick = self.nick();
        self.engine.apply(&mut self.registry, &nick, effects, out);
    }

    fn drain_core(&mut self, out: &mut Vec<Outbound>) {
        while let Ok(op) = self.core_rx.try_recv() {
            out.push(op);
        }
    }
}
