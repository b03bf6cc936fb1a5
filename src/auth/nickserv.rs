//! NickServ/ChanServ authorization provider.
//!
//! Every ranked invocation first waits in the identity's `authenticated`
//! queue until NickServ confirms the nick is identified. Channel tiers then
//! wait for a fresh member list of the invoking channel, and owner waits for
//! the ChanServ founder flag. Members whose prefix falls short are escalated
//! to the ChanServ check rather than denied outright.
//!
//! One identity query is in flight per identity, one member-list query per
//! channel, and one flags query per channel and identity.

use super::{AuthEffect, AuthProvider, PendingInvocation, PendingQueues};
use crate::casemap::{bare_nick, identity_key, irc_eq, irc_to_lower};
use crate::config::{AuthConfig, IdentityQuery};
use crate::extension::{Extension, Invocation};
use crate::members::Membership;
use crate::protocol::Outbound;
use crate::rank::Rank;
use crate::registry::CommandDescriptor;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// NickServ level for a nick identified to its account.
const IDENTIFIED_LEVEL: &str = "3";
/// ChanServ flag marking the channel founder.
const FOUNDER_FLAG: char = 'F';

pub struct NickServProvider {
    nickserv: String,
    chanserv: String,
    query: IdentityQuery,
    master: Option<String>,
    timeout: Duration,
    max_pending: usize,
    queues: PendingQueues,
    identity_queries: HashMap<String, Instant>,
    names_queries: HashMap<String, Instant>,
    flags_queries: HashMap<(String, String), Instant>,
}

impl NickServProvider {
    pub fn new(auth: &AuthConfig, master: Option<String>) -> Self {
        Self {
            nickserv: auth.nickserv.clone(),
            chanserv: auth.chanserv.clone(),
            query: auth.query,
            master,
            timeout: auth.pending_timeout(),
            max_pending: auth.max_pending_per_identity,
            queues: PendingQueues::new(),
            identity_queries: HashMap::new(),
            names_queries: HashMap::new(),
            flags_queries: HashMap::new(),
        }
    }

    /// Invocations currently parked.
    pub fn pending(&self) -> usize {
        self.queues.len()
    }

    pub fn pending_for(&self, nick: &str) -> usize {
        self.queues.len_for(&identity_key(nick))
    }

    /// Park an invocation behind identity confirmation.
    fn enqueue(
        &mut self,
        continuation: Option<Rank>,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        let key = identity_key(&invocation.sender);
        if self.queues.len_for(&key) >= self.max_pending {
            warn!(
                nick = %invocation.nick(),
                limit = self.max_pending,
                "Pending invocation limit reached"
            );
            return vec![AuthEffect::Deny { invocation }];
        }

        let nick = invocation.nick().to_string();
        self.queues.push(
            &key,
            Rank::Authenticated,
            PendingInvocation::new(continuation, descriptor, invocation),
        );

        let mut effects = Vec::new();
        if !self.identity_queries.contains_key(&key) {
            self.identity_queries.insert(key, Instant::now());
            let text = match self.query {
                IdentityQuery::Acc => format!("ACC {nick}"),
                IdentityQuery::Status => format!("STATUS {nick}"),
            };
            effects.push(AuthEffect::Send(Outbound::privmsg(&self.nickserv, text)));
        }
        effects
    }

    fn request_names(&mut self, channel: &str, effects: &mut Vec<AuthEffect>) {
        let key = irc_to_lower(channel);
        if !self.names_queries.contains_key(&key) {
            self.names_queries.insert(key, Instant::now());
            effects.push(AuthEffect::Send(Outbound::raw(format!("NAMES {channel}"))));
        }
    }

    fn request_flags(&mut self, channel: &str, nick: &str, effects: &mut Vec<AuthEffect>) {
        let key = (irc_to_lower(channel), identity_key(nick));
        if !self.flags_queries.contains_key(&key) {
            self.flags_queries.insert(key, Instant::now());
            effects.push(AuthEffect::Send(Outbound::privmsg(
                &self.chanserv,
                format!("FLAGS {channel} {nick}"),
            )));
        }
    }

    /// Move a pending entry to the owner queue and ask ChanServ.
    fn escalate(&mut self, key: &str, pending: PendingInvocation, effects: &mut Vec<AuthEffect>) {
        let nick = pending.invocation.nick().to_string();
        let channel = pending.invocation.target.clone();
        debug!(nick = %nick, channel = %channel, "Escalating to founder check");
        self.queues.push(key, Rank::Owner, pending);
        self.request_flags(&channel, &nick, effects);
    }

    /// NickServ answered for `nick`.
    fn identity_confirmed(&mut self, nick: &str, identified: bool) -> Vec<AuthEffect> {
        let key = identity_key(nick);
        self.identity_queries.remove(&key);
        if !identified {
            info!(nick = %nick, "Identity not confirmed");
            return self.purge(&key);
        }

        let mut effects = Vec::new();
        for pending in self.queues.take(&key, Rank::Authenticated) {
            let Some(rank) = pending.continuation else {
                effects.push(AuthEffect::execute(pending));
                continue;
            };
            let Some(channel) = pending.invocation.channel().map(str::to_string) else {
                debug!(nick = %nick, rank = %rank, "Channel rank requested outside a channel");
                effects.push(AuthEffect::deny(pending));
                continue;
            };
            if rank.is_membership_tier() {
                self.queues.push(&key, rank, pending.promoted());
                self.request_names(&channel, &mut effects);
            } else if rank == Rank::Owner {
                self.escalate(&key, pending.promoted(), &mut effects);
            } else {
                effects.push(AuthEffect::deny(pending));
            }
        }
        effects
    }

    /// A fresh member list for `channel` arrived.
    fn member_list(&mut self, channel: &str, members: &Membership) -> Vec<AuthEffect> {
        let channel_key = irc_to_lower(channel);
        self.names_queries.remove(&channel_key);
        let held: HashMap<String, Rank> = members
            .iter()
            .map(|(nick, rank)| (irc_to_lower(nick), *rank))
            .collect();

        let mut effects = Vec::new();
        for key in self.queues.identities() {
            let rank_held = held.get(&key).copied().unwrap_or(Rank::None);
            for tier in Rank::ALL.into_iter().filter(|r| r.is_membership_tier()) {
                let entries = self
                    .queues
                    .take_where(&key, tier, |p| in_channel(p, &channel_key));
                for pending in entries {
                    if tier <= rank_held {
                        effects.push(AuthEffect::execute(pending));
                    } else {
                        self.escalate(&key, pending, &mut effects);
                    }
                }
            }
            if rank_held >= Rank::Owner {
                let owned = self
                    .queues
                    .take_where(&key, Rank::Owner, |p| in_channel(p, &channel_key));
                effects.extend(owned.into_iter().map(AuthEffect::execute));
            }
        }
        effects
    }

    fn chanserv_reply(&mut self, text: &str) -> Vec<AuthEffect> {
        let text = text.replace('\x02', "");
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.as_slice() {
            ["Flags", "for", nick, "in", channel, "are", flags, ..] => {
                self.resolve_owner(channel, nick, flags.contains(FOUNDER_FLAG))
            }
            [nick, "was", "not", "found", "on", "the", "access", "list", "of", channel, ..] => {
                self.resolve_owner(channel.trim_end_matches('.'), nick, false)
            }
            [channel, "is", "not", "registered."] | [channel, "is", "not", "registered"] => {
                self.unregistered(channel)
            }
            _ => Vec::new(),
        }
    }

    fn resolve_owner(&mut self, channel: &str, nick: &str, founder: bool) -> Vec<AuthEffect> {
        let key = identity_key(nick);
        let channel_key = irc_to_lower(channel);
        self.flags_queries.remove(&(channel_key.clone(), key.clone()));
        debug!(nick = %nick, channel = %channel, founder, "Founder check answered");
        self.queues
            .take_where(&key, Rank::Owner, |p| in_channel(p, &channel_key))
            .into_iter()
            .map(|p| {
                if founder {
                    AuthEffect::execute(p)
                } else {
                    AuthEffect::deny(p)
                }
            })
            .collect()
    }

    fn unregistered(&mut self, channel: &str) -> Vec<AuthEffect> {
        let channel_key = irc_to_lower(channel);
        self.flags_queries.retain(|(c, _), _| *c != channel_key);
        let mut effects = Vec::new();
        for key in self.queues.identities() {
            let entries = self
                .queues
                .take_where(&key, Rank::Owner, |p| in_channel(p, &channel_key));
            effects.extend(entries.into_iter().map(AuthEffect::deny));
        }
        effects
    }

    /// Deny and forget everything pending for one identity.
    fn purge(&mut self, key: &str) -> Vec<AuthEffect> {
        self.identity_queries.remove(key);
        self.flags_queries.retain(|(_, nick), _| nick != key);
        self.queues
            .drain_identity(key)
            .into_iter()
            .map(AuthEffect::deny)
            .collect()
    }
}

fn in_channel(pending: &PendingInvocation, channel_key: &str) -> bool {
    irc_to_lower(&pending.invocation.target) == channel_key
}

/// Parse `nick ACC level` or `STATUS nick level`.
fn parse_identity(text: &str) -> Option<(&str, bool)> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [nick, "ACC", level, ..] | ["STATUS", nick, level, ..] => {
            Some((*nick, *level == IDENTIFIED_LEVEL))
        }
        _ => None,
    }
}

impl Extension for NickServProvider {
    fn id(&self) -> &str {
        "authnickserv"
    }

    fn as_provider(&mut self) -> Option<&mut dyn AuthProvider> {
        Some(self)
    }
}

impl AuthProvider for NickServProvider {
    fn authorize_authenticated(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.enqueue(None, descriptor, invocation)
    }

    fn authorize_voice(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.enqueue(Some(Rank::Voice), descriptor, invocation)
    }

    fn authorize_half_op(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.enqueue(Some(Rank::HalfOp), descriptor, invocation)
    }

    fn authorize_op(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.enqueue(Some(Rank::Op), descriptor, invocation)
    }

    fn authorize_owner(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.enqueue(Some(Rank::Owner), descriptor, invocation)
    }

    /// The bare nick must be the master's; NickServ must then confirm it.
    fn authorize_master(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        if self.master.as_deref() == Some(invocation.nick()) {
            self.enqueue(None, descriptor, invocation)
        } else {
            vec![AuthEffect::Deny { invocation }]
        }
    }

    fn on_notice(&mut self, sender: &str, _target: &str, text: &str) -> Vec<AuthEffect> {
        let source = bare_nick(sender);
        if irc_eq(source, &self.nickserv) {
            match parse_identity(text) {
                Some((nick, identified)) => self.identity_confirmed(nick, identified),
                None => Vec::new(),
            }
        } else if irc_eq(source, &self.chanserv) {
            self.chanserv_reply(text)
        } else {
            Vec::new()
        }
    }

    fn on_names(&mut self, channel: &str, members: &Membership) -> Vec<AuthEffect> {
        self.member_list(channel, members)
    }

    fn on_user_renamed(&mut self, old: &str, _new: &str) -> Vec<AuthEffect> {
        let key = identity_key(old);
        if self.queues.len_for(&key) > 0 {
            info!(nick = %old, "Nick changed with pending invocations");
        }
        self.purge(&key)
    }

    fn on_user_quit(&mut self, who: &str) -> Vec<AuthEffect> {
        self.purge(&identity_key(who))
    }

    fn on_disconnect(&mut self) -> Vec<AuthEffect> {
        self.identity_queries.clear();
        self.names_queries.clear();
        self.flags_queries.clear();
        self.queues
            .drain_all()
            .into_iter()
            .map(AuthEffect::deny)
            .collect()
    }

    fn expire(&mut self, now: Instant) -> Vec<AuthEffect> {
        let timeout = self.timeout;
        let live = |started: &Instant| now.saturating_duration_since(*started) < timeout;
        self.identity_queries.retain(|_, t| live(t));
        self.names_queries.retain(|_, t| live(t));
        self.flags_queries.retain(|_, t| live(t));

        let expired = self.queues.expire(now, timeout);
        if !expired.is_empty() {
            info!(count = expired.len(), "Pending invocations expired");
        }
        expired.into_iter().map(AuthEffect::deny).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> NickServProvider {
        NickServProvider::new(&AuthConfig::default(), Some("alice".into()))
    }

    fn request(
        provider: &mut NickServProvider,
        sender: &str,
        target: &str,
        command: &str,
        rank: Rank,
    ) -> Vec<AuthEffect> {
        let invocation = Invocation {
            server: "test".into(),
            target: target.into(),
            sender: sender.into(),
            command: command.into(),
            args: Vec::new(),
        };
        provider.authorize(CommandDescriptor::for_tests(command, rank), invocation)
    }

    fn executed(effects: &[AuthEffect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                AuthEffect::Execute { invocation, .. } => Some(invocation.command.as_str()),
                _ => None,
            })
            .collect()
    }

    fn denied(effects: &[AuthEffect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|e| match e {
                AuthEffect::Deny { invocation } => Some(invocation.command.as_str()),
                _ => None,
            })
            .collect()
    }

    fn sent(effects: &[AuthEffect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                AuthEffect::Send(op) => op.to_lines().into_iter().next(),
                _ => None,
            })
            .collect()
    }

    fn notice(provider: &mut NickServProvider, from: &str, text: &str) -> Vec<AuthEffect> {
        AuthProvider::on_notice(provider, from, "Bot", text)
    }

    fn names(
        provider: &mut NickServProvider,
        channel: &str,
        entries: &[(&str, Rank)],
    ) -> Vec<AuthEffect> {
        let members: Membership = entries.iter().map(|(n, r)| (n.to_string(), *r)).collect();
        AuthProvider::on_names(provider, channel, &members)
    }

    #[test]
    fn identity_query_is_deduplicated() {
        let mut p = provider();
        let first = request(&mut p, "bob!b@h", "#test", "a", Rank::Authenticated);
        let second = request(&mut p, "bob!b@h", "#test", "b", Rank::Authenticated);
        assert_eq!(sent(&first), ["PRIVMSG NickServ :ACC bob"]);
        assert!(second.is_empty());
        assert_eq!(p.pending_for("bob"), 2);

        let effects = notice(&mut p, "NickServ!s@services", "bob ACC 3");
        assert_eq!(executed(&effects), ["a", "b"]);
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn status_query_form() {
        let auth = AuthConfig {
            query: IdentityQuery::Status,
            ..AuthConfig::default()
        };
        let mut p = NickServProvider::new(&auth, None);
        let effects = request(&mut p, "bob!b@h", "#test", "a", Rank::Authenticated);
        assert_eq!(sent(&effects), ["PRIVMSG NickServ :STATUS bob"]);
        let effects = notice(&mut p, "NickServ", "STATUS bob 3");
        assert_eq!(executed(&effects), ["a"]);
    }

    #[test]
    fn unidentified_purges_every_tier() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#test", "auth", Rank::Authenticated);
        request(&mut p, "bob!b@h", "#test", "op", Rank::Op);
        notice(&mut p, "NickServ", "bob ACC 3");
        assert_eq!(p.pending_for("bob"), 1);

        request(&mut p, "bob!b@h", "#test", "voice", Rank::Voice);
        let effects = notice(&mut p, "NickServ", "bob ACC 1");
        let mut gone = denied(&effects);
        gone.sort();
        assert_eq!(gone, ["op", "voice"]);
        assert_eq!(p.pending_for("bob"), 0);
    }

    #[test]
    fn member_list_executes_within_held_rank_and_escalates_rest() {
        let mut p = provider();
        request(&mut p, "A!a@h", "#c", "a_op", Rank::Op);
        request(&mut p, "B!b@h", "#c", "b_voice", Rank::Voice);
        request(&mut p, "B!b@h", "#c", "b_op", Rank::Op);
        let mut effects = notice(&mut p, "NickServ", "A ACC 3");
        effects.extend(notice(&mut p, "NickServ", "B ACC 3"));
        assert_eq!(sent(&effects), ["NAMES #c"]);

        let effects = names(&mut p, "#c", &[("A", Rank::Op), ("B", Rank::Voice)]);
        let mut ran = executed(&effects);
        ran.sort();
        assert_eq!(ran, ["a_op", "b_voice"]);
        assert_eq!(sent(&effects), ["PRIVMSG ChanServ :FLAGS #c B"]);
        assert_eq!(p.pending_for("B"), 1);

        let effects = notice(&mut p, "ChanServ", "Flags for \x02B\x02 in \x02#c\x02 are \x02+AFRefiorstv\x02.");
        assert_eq!(executed(&effects), ["b_op"]);
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn held_rank_covers_every_lower_tier() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#c", "voice", Rank::Voice);
        request(&mut p, "bob!b@h", "#c", "half", Rank::HalfOp);
        request(&mut p, "bob!b@h", "#c", "op", Rank::Op);
        notice(&mut p, "NickServ", "bob ACC 3");

        let effects = names(&mut p, "#c", &[("bob", Rank::Op)]);
        let mut ran = executed(&effects);
        ran.sort();
        assert_eq!(ran, ["half", "op", "voice"]);
        assert!(sent(&effects).is_empty());
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn member_list_is_scoped_to_its_channel() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#other", "voice", Rank::Voice);
        notice(&mut p, "NickServ", "bob ACC 3");
        let effects = names(&mut p, "#c", &[("bob", Rank::Op)]);
        assert!(effects.is_empty());
        assert_eq!(p.pending_for("bob"), 1);
    }

    #[test]
    fn tilde_prefix_resolves_owner() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#c", "own", Rank::Owner);
        let effects = notice(&mut p, "NickServ", "bob ACC 3");
        assert_eq!(sent(&effects), ["PRIVMSG ChanServ :FLAGS #c bob"]);
        let effects = names(&mut p, "#c", &[("bob", Rank::Owner)]);
        assert_eq!(executed(&effects), ["own"]);
    }

    #[test]
    fn op_prefix_never_grants_owner() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#c", "own", Rank::Owner);
        notice(&mut p, "NickServ", "bob ACC 3");
        assert!(names(&mut p, "#c", &[("bob", Rank::Op)]).is_empty());
        let effects = notice(&mut p, "ChanServ", "bob was not found on the access list of #c.");
        assert_eq!(denied(&effects), ["own"]);
    }

    #[test]
    fn unregistered_channel_denies_owner_entries() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#c", "own", Rank::Owner);
        request(&mut p, "carol!c@h", "#c", "own2", Rank::Owner);
        notice(&mut p, "NickServ", "bob ACC 3");
        notice(&mut p, "NickServ", "carol ACC 3");
        let effects = notice(&mut p, "ChanServ", "\x02#c\x02 is not registered.");
        let mut gone = denied(&effects);
        gone.sort();
        assert_eq!(gone, ["own", "own2"]);
    }

    #[test]
    fn private_channel_rank_is_denied() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "Bot", "op", Rank::Op);
        let effects = notice(&mut p, "NickServ", "bob ACC 3");
        assert_eq!(denied(&effects), ["op"]);
    }

    #[test]
    fn master_requires_name_and_identity() {
        let mut p = provider();
        let effects = request(&mut p, "mallory!m@h", "#c", "m", Rank::Master);
        assert_eq!(denied(&effects), ["m"]);
        let effects = request(&mut p, "Alice!a@h", "#c", "m", Rank::Master);
        assert_eq!(denied(&effects), ["m"]);

        request(&mut p, "alice!a@h", "#c", "m", Rank::Master);
        let effects = notice(&mut p, "NickServ", "alice ACC 3");
        assert_eq!(executed(&effects), ["m"]);
    }

    #[test]
    fn rename_quit_and_disconnect_purge() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#c", "a", Rank::Authenticated);
        assert_eq!(denied(&p.on_user_renamed("bob", "bobby")), ["a"]);

        let effects = request(&mut p, "bob!b@h", "#c", "b", Rank::Authenticated);
        assert_eq!(sent(&effects).len(), 1, "purge clears the in-flight marker");
        assert_eq!(denied(&p.on_user_quit("bob!b@h")), ["b"]);

        request(&mut p, "carol!c@h", "#c", "c", Rank::Voice);
        assert_eq!(denied(&AuthProvider::on_disconnect(&mut p)), ["c"]);
        assert_eq!(p.pending(), 0);
    }

    #[test]
    fn pending_limit_and_expiry() {
        let auth = AuthConfig {
            max_pending_per_identity: 2,
            pending_timeout_secs: 30,
            ..AuthConfig::default()
        };
        let mut p = NickServProvider::new(&auth, None);
        request(&mut p, "bob!b@h", "#c", "a", Rank::Authenticated);
        request(&mut p, "bob!b@h", "#c", "b", Rank::Authenticated);
        let effects = request(&mut p, "bob!b@h", "#c", "c", Rank::Authenticated);
        assert_eq!(denied(&effects), ["c"]);

        let later = Instant::now() + Duration::from_secs(31);
        assert_eq!(denied(&p.expire(later)), ["a", "b"]);
        let effects = request(&mut p, "bob!b@h", "#c", "d", Rank::Authenticated);
        assert_eq!(sent(&effects), ["PRIVMSG NickServ :ACC bob"]);
    }

    #[test]
    fn ignores_notices_from_others() {
        let mut p = provider();
        request(&mut p, "bob!b@h", "#c", "a", Rank::Authenticated);
        assert!(notice(&mut p, "mallory!m@h", "bob ACC 3").is_empty());
        assert_eq!(p.pending_for("bob"), 1);
    }
}
