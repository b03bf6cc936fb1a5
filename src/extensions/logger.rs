//! Channel transcripts.
//!
//! One append-only file per channel under `<data_dir>/logs/<server>/`.
//! Events without a channel (quits, nick changes) go to `server.log`.
//! Logging can be switched off per channel; the switch is persisted per
//! server.

use crate::casemap::{bare_nick, irc_to_lower, is_channel};
use crate::error::{HookResult, ReplyResult, StoreError};
use crate::extension::{CommandSpec, Extension, Invocation, Store, StoreManager};
use crate::rank::Rank;
use chrono::Local;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const SERVER_LOG: &str = "server";

pub struct Logger {
    dir: PathBuf,
    server: String,
    settings: Store,
    disabled: HashSet<String>,
}

impl Logger {
    pub fn new(stores: &StoreManager, data_dir: &Path, server: &str) -> Result<Self, StoreError> {
        let settings = stores.open("logger", "disabled")?;
        let prefix = format!("{server} ");
        let disabled = settings
            .keys()?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        Ok(Self {
            dir: data_dir.join("logs").join(sanitize(server)),
            server: server.to_string(),
            settings,
            disabled,
        })
    }

    /// Store key of the switch for `channel` on this server.
    fn setting_key(&self, channel: &str) -> String {
        format!("{} {channel}", self.server)
    }

    /// Path of the transcript for `channel`.
    pub fn transcript(&self, channel: &str) -> PathBuf {
        self.dir.join(format!("{}.log", sanitize(&irc_to_lower(channel))))
    }

    fn write(&self, channel: &str, line: &str) -> HookResult {
        if self.disabled.contains(&irc_to_lower(channel)) {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.transcript(channel))?;
        writeln!(file, "[{}] {}", Local::now().format("%Y-%m-%d %H:%M:%S"), line)?;
        Ok(())
    }

    fn set_enabled(&mut self, invocation: &Invocation, enabled: bool) -> ReplyResult {
        let channel = match invocation.args.as_slice() {
            [channel] if is_channel(channel) => channel.as_str(),
            [] => match invocation.channel() {
                Some(channel) => channel,
                None => return Ok(Some(format!("Usage: {} #CHANNEL", invocation.command))),
            },
            _ => return Ok(Some(format!("Usage: {} [#CHANNEL]", invocation.command))),
        };
        let key = irc_to_lower(channel);
        if enabled {
            self.settings.remove(&self.setting_key(&key))?;
            self.disabled.remove(&key);
            Ok(Some(format!("Logging enabled for {channel}.")))
        } else {
            self.settings.set(&self.setting_key(&key), &true)?;
            self.disabled.insert(key);
            Ok(Some(format!("Logging disabled for {channel}.")))
        }
    }
}

/// Keep file names to a safe character set.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '#' | '&' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

impl Extension for Logger {
    fn id(&self) -> &str {
        "logger"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("disable_logging", Rank::Op, "disable_logging [#CHANNEL]"),
            CommandSpec::new("enable_logging", Rank::Op, "enable_logging [#CHANNEL]"),
        ]
    }

    fn call(&mut self, command: &str, invocation: &Invocation) -> ReplyResult {
        match command {
            "disable_logging" => self.set_enabled(invocation, false),
            "enable_logging" => self.set_enabled(invocation, true),
            _ => Ok(None),
        }
    }

    fn on_privmsg(&mut self, sender: &str, target: &str, text: &str) -> ReplyResult {
        if is_channel(target) {
            self.write(target, &format!("<{}> {}", bare_nick(sender), text))?;
        }
        Ok(None)
    }

    fn on_useraction(&mut self, sender: &str, target: &str, text: &str) -> HookResult {
        if is_channel(target) {
            return self.write(target, &format!("* {} {}", bare_nick(sender), text));
        }
        Ok(())
    }

    fn on_userjoin(&mut self, who: &str, channel: &str) -> HookResult {
        self.write(channel, &format!("--> {who} joined {channel}"))
    }

    fn on_userpart(&mut self, who: &str, channel: &str, message: &str) -> HookResult {
        self.write(channel, &format!("<-- {who} left {channel} ({message})"))
    }

    fn on_userkicked(
        &mut self,
        kicker: &str,
        channel: &str,
        target: &str,
        reason: &str,
    ) -> HookResult {
        self.write(
            channel,
            &format!("<-- {target} was kicked by {} ({reason})", bare_nick(kicker)),
        )
    }

    fn on_userrenamed(&mut self, old: &str, new: &str) -> HookResult {
        self.write(SERVER_LOG, &format!("--- {} is now known as {new}", bare_nick(old)))
    }

    fn on_userquit(&mut self, who: &str, message: &str) -> HookResult {
        self.write(SERVER_LOG, &format!("<-- {who} quit ({message})"))
    }

    fn on_topicchanged(&mut self, who: Option<&str>, channel: &str, topic: &str) -> HookResult {
        match who {
            Some(who) => self.write(
                channel,
                &format!("--- {} set the topic to: {topic}", bare_nick(who)),
            ),
            None => self.write(channel, &format!("--- Topic: {topic}")),
        }
    }

    fn on_modechanged(&mut self, who: &str, target: &str, modes: &[String]) -> HookResult {
        if is_channel(target) {
            return self.write(
                target,
                &format!("--- {} sets mode {}", bare_nick(who), modes.join(" ")),
            );
        }
        Ok(())
    }
}
