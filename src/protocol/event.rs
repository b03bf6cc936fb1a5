//! Inbound protocol events.
//!
//! Translates parsed [`Message`]s into the event vocabulary the router
//! consumes. Translation is stateless; the router tracks anything that spans
//! several lines (member lists, MOTD).

use super::Message;

const CTCP_DELIM: char = '\x01';

/// An inbound event from one server connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Registration completed (`001`).
    Connected,
    /// The connection was lost or closed.
    Disconnected { reason: String },
    Message { sender: String, target: String, text: String },
    Action { sender: String, target: String, text: String },
    Notice { sender: String, target: String, text: String },
    Join { who: String, channel: String },
    Part { who: String, channel: String, message: String },
    NickChange { old: String, new: String },
    Mode { who: String, target: String, modes: Vec<String> },
    Kick { kicker: String, channel: String, target: String, reason: String },
    Quit { who: String, message: String },
    /// One `353` reply; entries still carry their prefix characters.
    NamesFragment { channel: String, names: Vec<String> },
    /// `366`, end of a member list.
    NamesComplete { channel: String },
    Topic { who: Option<String>, channel: String, topic: String },
    MotdStart,
    MotdLine(String),
    MotdEnd,
    Ping(String),
    /// `ERROR` from the server; the connection is about to close.
    ServerError(String),
    Unhandled { code: String, args: Vec<String> },
}

impl From<Message> for Event {
    fn from(msg: Message) -> Self {
        let sender = msg.source().to_string();
        match msg.command.as_str() {
            "001" => Event::Connected,
            "PING" => Event::Ping(msg.param(0).to_string()),
            "ERROR" => Event::ServerError(msg.param(0).to_string()),
            "PRIVMSG" => {
                let target = msg.param(0).to_string();
                let text = msg.param(1);
                match parse_action(text) {
                    Some(action) => Event::Action {
                        sender,
                        target,
                        text: action.to_string(),
                    },
                    None => Event::Message {
                        sender,
                        target,
                        text: text.to_string(),
                    },
                }
            }
            "NOTICE" => Event::Notice {
                sender,
                target: msg.param(0).to_string(),
                text: msg.param(1).to_string(),
            },
            "JOIN" => Event::Join {
                who: sender,
                channel: msg.param(0).to_string(),
            },
            "PART" => Event::Part {
                who: sender,
                channel: msg.param(0).to_string(),
                message: msg.param(1).to_string(),
            },
            "NICK" => Event::NickChange {
                old: sender,
                new: msg.param(0).to_string(),
            },
            "MODE" => {
                let mut params = msg.params.into_iter();
                let target = params.next().unwrap_or_default();
                Event::Mode {
                    who: sender,
                    target,
                    modes: params.collect(),
                }
            }
            "KICK" => Event::Kick {
                kicker: sender,
                channel: msg.param(0).to_string(),
                target: msg.param(1).to_string(),
                reason: msg.param(2).to_string(),
            },
            "QUIT" => Event::Quit {
                who: sender,
                message: msg.param(0).to_string(),
            },
            "TOPIC" => Event::Topic {
                who: Some(sender),
                channel: msg.param(0).to_string(),
                topic: msg.param(1).to_string(),
            },
            "332" => Event::Topic {
                who: None,
                channel: msg.param(1).to_string(),
                topic: msg.param(2).to_string(),
            },
            "353" => Event::NamesFragment {
                channel: msg.param(2).to_string(),
                names: msg
                    .param(3)
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            },
            "366" => Event::NamesComplete {
                channel: msg.param(1).to_string(),
            },
            "375" => Event::MotdStart,
            "372" => {
                let line = msg.param(1);
                Event::MotdLine(line.strip_prefix("- ").unwrap_or(line).to_string())
            }
            "376" | "422" => Event::MotdEnd,
            _ => Event::Unhandled {
                code: msg.command,
                args: msg.params,
            },
        }
    }
}

/// Extract the body of a CTCP ACTION, if `text` is one.
fn parse_action(text: &str) -> Option<&str> {
    let body = text.strip_prefix(CTCP_DELIM)?.strip_prefix("ACTION")?;
    let body = body.strip_suffix(CTCP_DELIM).unwrap_or(body);
    Some(body.strip_prefix(' ').unwrap_or(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(line: &str) -> Event {
        Event::from(line.parse::<Message>().unwrap())
    }

    #[test]
    fn privmsg_and_action() {
        assert_eq!(
            event(":alice!a@h PRIVMSG #test :!hello foo"),
            Event::Message {
                sender: "alice!a@h".into(),
                target: "#test".into(),
                text: "!hello foo".into(),
            }
        );
        assert_eq!(
            event(":alice!a@h PRIVMSG #test :\x01ACTION waves\x01"),
            Event::Action {
                sender: "alice!a@h".into(),
                target: "#test".into(),
                text: "waves".into(),
            }
        );
    }

    #[test]
    fn member_list_replies() {
        assert_eq!(
            event(":srv 353 BotNick @ #test :@alice +bob carol"),
            Event::NamesFragment {
                channel: "#test".into(),
                names: vec!["@alice".into(), "+bob".into(), "carol".into()],
            }
        );
        assert_eq!(
            event(":srv 366 BotNick #test :End of /NAMES list."),
            Event::NamesComplete { channel: "#test".into() }
        );
    }

    #[test]
    fn kick_and_mode() {
        assert_eq!(
            event(":op!o@h KICK #test bob :spam"),
            Event::Kick {
                kicker: "op!o@h".into(),
                channel: "#test".into(),
                target: "bob".into(),
                reason: "spam".into(),
            }
        );
        assert_eq!(
            event(":op!o@h MODE #test +o bob"),
            Event::Mode {
                who: "op!o@h".into(),
                target: "#test".into(),
                modes: vec!["+o".into(), "bob".into()],
            }
        );
    }

    #[test]
    fn unknown_numeric_is_unhandled() {
        assert_eq!(
            event(":srv 005 BotNick PREFIX=(ov)@+ :are supported"),
            Event::Unhandled {
                code: "005".into(),
                args: vec!["BotNick".into(), "PREFIX=(ov)@+".into(), "are supported".into()],
            }
        );
    }

    #[test]
    fn motd_lines_drop_dash_prefix() {
        assert_eq!(event(":srv 372 BotNick :- Welcome!"), Event::MotdLine("Welcome!".into()));
        assert_eq!(event(":srv 376 BotNick :End"), Event::MotdEnd);
    }
}
