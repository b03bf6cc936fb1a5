//! In-process bot for authorization and routing tests.
//!
//! Builds a router from the built-in loader against a temporary data
//! directory and feeds it events directly, returning the encoded lines it
//! would send.

use slirc_bot::config::Config;
use slirc_bot::extension::{Extension, StoreManager};
use slirc_bot::extensions::BuiltinLoader;
use slirc_bot::{Event, Message, Router, RouterSettings};
use std::sync::Arc;
use tempfile::TempDir;

#[allow(dead_code)]
pub const BOT_NICK: &str = "BotNick";

#[allow(dead_code)]
pub struct TestBot {
    pub router: Router,
    pub stores: Arc<StoreManager>,
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestBot {
    /// A bot loaded with the built-ins, configured by the given TOML.
    ///
    /// A `[[server]]` block for `BotNick` and the data directory are added.
    pub fn new(extra_toml: &str) -> Self {
        Self::with_extensions(extra_toml, |_| Vec::new())
    }

    /// Like [`TestBot::new`], appending extra extensions after the built-ins.
    pub fn with_extensions<F>(extra_toml: &str, extra: F) -> Self
    where
        F: FnOnce(&Arc<StoreManager>) -> Vec<Box<dyn Extension>>,
    {
        let dir = tempfile::tempdir().expect("tempdir");
        let text = format!(
            "{extra_toml}\n[[server]]\nname = \"test\"\nhost = \"127.0.0.1\"\nnick = \"{BOT_NICK}\"\n"
        );
        let mut config: Config = toml::from_str(&text).expect("config");
        config.general.data_dir = dir.path().display().to_string();

        let config = Arc::new(config);
        let stores = Arc::new(StoreManager::new(config.general.data_path()));
        let server = config.servers[0].clone();
        let loader = BuiltinLoader::new(Arc::clone(&config), Arc::clone(&stores));

        let mut extensions = loader.load(&server);
        extensions.extend(extra(&stores));
        let router = Router::new(RouterSettings::from_config(&config, &server), extensions);
        Self {
            router,
            stores,
            _dir: dir,
        }
    }

    /// Feed one raw server line, returning the lines the bot sends.
    pub fn line(&mut self, line: &str) -> Vec<String> {
        let message: Message = line.parse().expect("valid line");
        self.event(Event::from(message))
    }

    pub fn event(&mut self, event: Event) -> Vec<String> {
        self.router
            .handle(event)
            .iter()
            .flat_map(|op| op.to_lines())
            .collect()
    }

    /// `nick` says `text` in `target`.
    pub fn say(&mut self, nick: &str, target: &str, text: &str) -> Vec<String> {
        self.line(&format!(":{nick}!{nick}@example.org PRIVMSG {target} :{text}"))
    }

    pub fn nickserv(&mut self, text: &str) -> Vec<String> {
        self.line(&format!(":NickServ!NickServ@services. NOTICE {BOT_NICK} :{text}"))
    }

    pub fn chanserv(&mut self, text: &str) -> Vec<String> {
        self.line(&format!(":ChanServ!ChanServ@services. NOTICE {BOT_NICK} :{text}"))
    }

    /// Deliver a complete member list in one fragment.
    pub fn names(&mut self, channel: &str, names: &[&str]) -> Vec<String> {
        let mut out = self.line(&format!(
            ":irc.example.org 353 {BOT_NICK} = {channel} :{}",
            names.join(" ")
        ));
        out.extend(self.line(&format!(
            ":irc.example.org 366 {BOT_NICK} {channel} :End of /NAMES list."
        )));
        out
    }
}
