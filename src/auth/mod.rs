//! Authorization engine.
//!
//! Decides, for every command invocation, whether it executes now, waits
//! for an external confirmation, or is denied. The engine is stateless
//! apart from configuration; deferred state lives in the provider, which is
//! itself an extension owned by the [`Registry`].
//!
//! Providers never call back into the registry. Each provider operation
//! returns a list of [`AuthEffect`]s that the engine applies afterwards.

mod local;
mod nickserv;
mod queue;

pub use local::LocalAuthProvider;
pub use nickserv::NickServProvider;
pub use queue::PendingQueues;

use crate::extension::Invocation;
use crate::members::Membership;
use crate::protocol::Outbound;
use crate::rank::Rank;
use crate::registry::{CommandDescriptor, Registry};
use crate::telemetry::spans;
use std::time::Instant;
use tracing::{debug, info, warn};

/// An invocation parked until its requester's rank is confirmed.
#[derive(Debug, Clone)]
pub struct PendingInvocation {
    /// Rank still to be checked once the current queue resolves.
    pub continuation: Option<Rank>,
    pub descriptor: CommandDescriptor,
    pub invocation: Invocation,
    pub queued_at: Instant,
}

impl PendingInvocation {
    pub fn new(
        continuation: Option<Rank>,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Self {
        Self {
            continuation,
            descriptor,
            invocation,
            queued_at: Instant::now(),
        }
    }

    /// Clear the continuation after moving to the continuation's queue.
    pub fn promoted(mut self) -> Self {
        self.continuation = None;
        self
    }
}

/// Outcome of a provider operation, applied by [`AuthEngine::apply`].
#[derive(Debug, Clone)]
pub enum AuthEffect {
    /// Run the handler and deliver its reply.
    Execute {
        descriptor: CommandDescriptor,
        invocation: Invocation,
    },
    /// Refuse and tell the requester.
    Deny { invocation: Invocation },
    /// Send a protocol operation (confirmation queries).
    Send(Outbound),
}

impl AuthEffect {
    pub fn execute(pending: PendingInvocation) -> Self {
        Self::Execute {
            descriptor: pending.descriptor,
            invocation: pending.invocation,
        }
    }

    pub fn deny(pending: PendingInvocation) -> Self {
        Self::Deny {
            invocation: pending.invocation,
        }
    }
}

fn deny(invocation: Invocation) -> Vec<AuthEffect> {
    vec![AuthEffect::Deny { invocation }]
}

/// Authorization above the master fallback.
///
/// Every `authorize_*` method not overridden denies.
#[allow(unused_variables)]
pub trait AuthProvider {
    fn authorize_authenticated(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        deny(invocation)
    }

    fn authorize_voice(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        deny(invocation)
    }

    fn authorize_half_op(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        deny(invocation)
    }

    fn authorize_op(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        deny(invocation)
    }

    fn authorize_owner(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        deny(invocation)
    }

    fn authorize_master(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        deny(invocation)
    }

    /// Route to the `authorize_*` method for the descriptor's rank.
    fn authorize(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        match descriptor.rank {
            Rank::None => vec![AuthEffect::Execute {
                descriptor,
                invocation,
            }],
            Rank::Authenticated => self.authorize_authenticated(descriptor, invocation),
            Rank::Voice => self.authorize_voice(descriptor, invocation),
            Rank::HalfOp => self.authorize_half_op(descriptor, invocation),
            Rank::Op => self.authorize_op(descriptor, invocation),
            Rank::Owner => self.authorize_owner(descriptor, invocation),
            Rank::Master => self.authorize_master(descriptor, invocation),
        }
    }

    fn on_notice(&mut self, sender: &str, target: &str, text: &str) -> Vec<AuthEffect> {
        Vec::new()
    }

    fn on_names(&mut self, channel: &str, members: &Membership) -> Vec<AuthEffect> {
        Vec::new()
    }

    fn on_user_renamed(&mut self, old: &str, new: &str) -> Vec<AuthEffect> {
        Vec::new()
    }

    fn on_user_quit(&mut self, who: &str) -> Vec<AuthEffect> {
        Vec::new()
    }

    /// The connection is gone; everything pending must be resolved.
    fn on_disconnect(&mut self) -> Vec<AuthEffect> {
        Vec::new()
    }

    /// Deny whatever has waited too long.
    fn expire(&mut self, now: Instant) -> Vec<AuthEffect> {
        Vec::new()
    }
}

/// Per-connection authorization decisions.
#[derive(Debug, Clone)]
pub struct AuthEngine {
    master: Option<String>,
    denial_message: String,
}

impl AuthEngine {
    pub fn new(master: Option<String>, denial_message: impl Into<String>) -> Self {
        Self {
            master,
            denial_message: denial_message.into(),
        }
    }

    /// Decide what happens to a fresh invocation.
    pub fn request(
        &self,
        registry: &mut Registry,
        descriptor: &CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        if descriptor.rank == Rank::None {
            return vec![AuthEffect::Execute {
                descriptor: descriptor.clone(),
                invocation,
            }];
        }

        if let Some(provider) = registry.provider_mut() {
            return provider.authorize(descriptor.clone(), invocation);
        }

        match descriptor.rank {
            Rank::Master if self.is_master(invocation.nick()) => vec![AuthEffect::Execute {
                descriptor: descriptor.clone(),
                invocation,
            }],
            Rank::Master => {
                debug!(
                    command = %descriptor.name,
                    nick = %invocation.nick(),
                    "Master command from non-master ignored"
                );
                Vec::new()
            }
            _ => deny(invocation),
        }
    }

    /// Bare nick compared case-sensitively against the configured master.
    pub fn is_master(&self, nick: &str) -> bool {
        self.master.as_deref() == Some(nick)
    }

    /// Apply provider effects: run handlers, notify denials, send queries.
    pub fn apply(
        &self,
        registry: &mut Registry,
        bot_nick: &str,
        effects: Vec<AuthEffect>,
        out: &mut Vec<Outbound>,
    ) {
        for effect in effects {
            match effect {
                AuthEffect::Execute {
                    descriptor,
                    invocation,
                } => self.execute(registry, bot_nick, &descriptor, &invocation, out),
                AuthEffect::Deny { invocation } => {
                    info!(
                        command = %invocation.command,
                        nick = %invocation.nick(),
                        target = %invocation.target,
                        "Command denied"
                    );
                    out.push(Outbound::privmsg(
                        invocation.reply_to(),
                        format!("{}: {}", invocation.nick(), self.denial_message),
                    ));
                }
                AuthEffect::Send(op) => out.push(op),
            }
        }
    }

    /// Run the handler, send its reply, and re-fan the reply as bot-authored.
    pub fn execute(
        &self,
        registry: &mut Registry,
        bot_nick: &str,
        descriptor: &CommandDescriptor,
        invocation: &Invocation,
        out: &mut Vec<Outbound>,
    ) {
        let span = spans::command(&descriptor.name, invocation.nick(), invocation.channel());
        let _enter = span.enter();

        match registry.call(descriptor, invocation) {
            Ok(Some(reply)) if !reply.trim().is_empty() => {
                let reply_to = invocation.reply_to();
                out.push(Outbound::privmsg(reply_to, reply.as_str()));
                // Replies to the echo are dropped.
                registry.fan_privmsg(bot_nick, reply_to, &reply);
            }
            Ok(_) => {}
            Err(e) => warn!(
                extension = %descriptor.extension_id,
                command = %descriptor.name,
                error = %e,
                code = e.error_code(),
                "Command handler failed"
            ),
        }
    }

    /// Authorize and apply in one step.
    pub fn dispatch(
        &self,
        registry: &mut Registry,
        bot_nick: &str,
        descriptor: &CommandDescriptor,
        invocation: Invocation,
        out: &mut Vec<Outbound>,
    ) {
        let effects = self.request(registry, descriptor, invocation);
        self.apply(registry, bot_nick, effects, out);
    }
}
