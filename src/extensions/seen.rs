//! Last-activity tracking.

use crate::casemap::{bare_nick, identity_key, irc_eq, is_channel};
use crate::error::{HookResult, ReplyResult, StoreError};
use crate::extension::{CommandSpec, Extension, Invocation, Store, StoreManager};
use crate::rank::Rank;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Sighting {
    nick: String,
    activity: String,
    /// Unix seconds.
    at: i64,
}

pub struct Seen {
    sightings: Store,
}

impl Seen {
    pub fn new(stores: &StoreManager) -> Result<Self, StoreError> {
        Ok(Self {
            sightings: stores.open("seen", "sightings")?,
        })
    }

    fn record(&self, who: &str, activity: String) -> HookResult {
        let nick = bare_nick(who);
        let sighting = Sighting {
            nick: nick.to_string(),
            activity,
            at: Utc::now().timestamp(),
        };
        self.sightings.set(&identity_key(nick), &sighting)?;
        Ok(())
    }

    fn lookup(&self, requester: &str, nick: &str) -> Result<String, StoreError> {
        if irc_eq(requester, nick) {
            return Ok(format!("{requester}: that's you."));
        }
        Ok(match self.sightings.get::<Sighting>(&identity_key(nick))? {
            Some(s) => format!(
                "{} was last seen {} {} ago.",
                s.nick,
                s.activity,
                format_elapsed(Utc::now().timestamp() - s.at)
            ),
            None => format!("I have not seen {nick}."),
        })
    }
}

/// Render elapsed seconds as the two most significant units.
fn format_elapsed(secs: i64) -> String {
    let secs = secs.max(0);
    let units = [
        (secs / 86_400, "day"),
        (secs % 86_400 / 3_600, "hour"),
        (secs % 3_600 / 60, "minute"),
        (secs % 60, "second"),
    ];
    let parts: Vec<String> = units
        .iter()
        .skip_while(|(n, _)| *n == 0)
        .take(2)
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{n} {unit}{}", if *n == 1 { "" } else { "s" }))
        .collect();
    if parts.is_empty() {
        "0 seconds".to_string()
    } else {
        parts.join(", ")
    }
}

impl Extension for Seen {
    fn id(&self) -> &str {
        "seen"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("seen", Rank::None, "seen NICK")]
    }

    fn call(&mut self, _command: &str, invocation: &Invocation) -> ReplyResult {
        match invocation.args.as_slice() {
            [nick] => Ok(Some(self.lookup(invocation.nick(), nick)?)),
            _ => Ok(Some("Usage: seen NICK".into())),
        }
    }

    fn on_privmsg(&mut self, sender: &str, target: &str, text: &str) -> ReplyResult {
        if is_channel(target) {
            self.record(sender, format!("saying \"{text}\" in {target}"))?;
        }
        Ok(None)
    }

    fn on_useraction(&mut self, sender: &str, target: &str, text: &str) -> HookResult {
        if is_channel(target) {
            return self.record(sender, format!("doing \"{text}\" in {target}"));
        }
        Ok(())
    }

    fn on_userjoin(&mut self, who: &str, channel: &str) -> HookResult {
        self.record(who, format!("joining {channel}"))
    }

    fn on_userpart(&mut self, who: &str, channel: &str, _message: &str) -> HookResult {
        self.record(who, format!("leaving {channel}"))
    }

    fn on_userkicked(
        &mut self,
        _kicker: &str,
        channel: &str,
        target: &str,
        _reason: &str,
    ) -> HookResult {
        self.record(target, format!("being kicked from {channel}"))
    }

    fn on_userrenamed(&mut self, old: &str, new: &str) -> HookResult {
        self.record(old, format!("changing nick to {new}"))?;
        self.record(new, format!("changing nick from {}", bare_nick(old)))
    }

    fn on_userquit(&mut self, who: &str, message: &str) -> HookResult {
        self.record(who, format!("quitting ({message})"))
    }
}
