//! Command extraction from chat lines.

use crate::casemap::irc_eq;

/// A command name (lowercased) and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub name: String,
    pub args: Vec<String>,
}

/// Try to read a command out of a chat line. First matching rule wins:
///
/// 1. `!cmd args` when `!` is the signal character
/// 2. `BotNick: cmd args` (also `BotNick,` and bare `BotNick`)
/// 3. `cmd args` in a private exchange with the bot
pub fn extract(text: &str, target: &str, nick: &str, signal: char) -> Option<CommandLine> {
    if let Some(rest) = text.strip_prefix(signal) {
        return command_line(rest.split_whitespace());
    }

    let mut tokens = text.split_whitespace();
    let first = tokens.next()?;
    let addressee = first.trim_end_matches([':', ',']);
    if !addressee.is_empty() && irc_eq(addressee, nick) {
        return command_line(tokens);
    }

    if irc_eq(target, nick) {
        return command_line(text.split_whitespace());
    }
    None
}

fn command_line<'a>(mut tokens: impl Iterator<Item = &'a str>) -> Option<CommandLine> {
    let name = tokens.next()?.to_lowercase();
    Some(CommandLine {
        name,
        args: tokens.map(str::to_string).collect(),
    })
}
