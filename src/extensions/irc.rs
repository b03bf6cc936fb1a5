//! Channel and nick management commands.

use crate::casemap::is_channel;
use crate::error::ReplyResult;
use crate::extension::{CommandSpec, CoreHandle, Extension, Invocation};
use crate::rank::Rank;

#[derive(Default)]
pub struct Irc {
    core: Option<CoreHandle>,
}

impl Extension for Irc {
    fn id(&self) -> &str {
        "irc"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("nick", Rank::Master, "nick NEWNICK"),
            CommandSpec::new("join", Rank::Master, "join #CHANNEL [KEY]"),
            CommandSpec::new("part", Rank::Op, "part [#CHANNEL]"),
        ]
    }

    fn privileged(&self) -> bool {
        true
    }

    fn attach_core(&mut self, core: CoreHandle) {
        self.core = Some(core);
    }

    fn call(&mut self, command: &str, invocation: &Invocation) -> ReplyResult {
        let Some(core) = &self.core else {
            return Ok(None);
        };
        match (command, invocation.args.as_slice()) {
            ("nick", [nick]) => {
                core.change_nick(nick);
                Ok(None)
            }
            ("nick", _) => Ok(Some("Usage: nick NEWNICK".into())),
            ("join", [channel, rest @ ..]) if is_channel(channel) && rest.len() <= 1 => {
                core.join(channel, rest.first().map(String::as_str));
                Ok(None)
            }
            ("join", _) => Ok(Some("Usage: join #CHANNEL [KEY]".into())),
            ("part", []) => match invocation.channel() {
                Some(channel) => {
                    core.part(channel, None);
                    Ok(None)
                }
                None => Ok(Some("Usage: part #CHANNEL".into())),
            },
            ("part", [channel]) if is_channel(channel) => {
                core.part(channel, None);
                Ok(None)
            }
            ("part", _) => Ok(Some("Usage: part [#CHANNEL]".into())),
            _ => Ok(None),
        }
    }
}
