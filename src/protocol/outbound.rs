//! Outbound operations produced by the core and by extensions.

use super::Message;

/// A protocol operation the bot wants performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Privmsg { target: String, text: String },
    Notice { target: String, text: String },
    Join { channel: String, key: Option<String> },
    Part { channel: String, message: Option<String> },
    Nick(String),
    Quit(Option<String>),
    Pong(String),
    Pass(String),
    User { username: String, realname: String },
    /// A pre-formatted line, used for service queries (e.g. `NAMES #chan`).
    Raw(String),
}

impl Outbound {
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Privmsg {
            target: target.into(),
            text: text.into(),
        }
    }

    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Notice {
            target: target.into(),
            text: text.into(),
        }
    }

    pub fn raw(line: impl Into<String>) -> Self {
        Self::Raw(line.into())
    }

    /// Encode into wire lines (without CRLF).
    ///
    /// Message text is split into one line per non-empty text line, and
    /// every other parameter is cut at the first line break.
    pub fn to_lines(&self) -> Vec<String> {
        match self {
            Self::Privmsg { target, text } => text_lines("PRIVMSG", target, text),
            Self::Notice { target, text } => text_lines("NOTICE", target, text),
            Self::Join { channel, key } => {
                let mut params = vec![single_line(channel)];
                if let Some(key) = key {
                    params.push(single_line(key));
                }
                vec![Message::new("JOIN", params).to_string()]
            }
            Self::Part { channel, message } => {
                let mut params = vec![single_line(channel)];
                if let Some(message) = message {
                    params.push(single_line(message));
                }
                vec![Message::new("PART", params).to_string()]
            }
            Self::Nick(nick) => vec![Message::new("NICK", vec![single_line(nick)]).to_string()],
            Self::Quit(message) => {
                let params = message.iter().map(|m| single_line(m)).collect();
                vec![Message::new("QUIT", params).to_string()]
            }
            Self::Pong(token) => vec![Message::new("PONG", vec![single_line(token)]).to_string()],
            Self::Pass(password) => {
                vec![Message::new("PASS", vec![single_line(password)]).to_string()]
            }
            Self::User { username, realname } => vec![
                Message::new(
                    "USER",
                    vec![
                        single_line(username),
                        "0".to_string(),
                        "*".to_string(),
                        single_line(realname),
                    ],
                )
                .to_string(),
            ],
            Self::Raw(line) => vec![single_line(line)],
        }
    }
}

fn single_line(s: &str) -> String {
    s.split(['\r', '\n']).next().unwrap_or("").to_string()
}

fn text_lines(command: &str, target: &str, text: &str) -> Vec<String> {
    text.split(['\r', '\n'])
        .filter(|line| !line.trim().is_empty())
        .map(|line| Message::new(command, vec![single_line(target), line.to_string()]).to_string())
        .collect()
}
