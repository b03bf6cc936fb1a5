//! Authorization flows through a fully loaded router.
//!
//! Each test drives the router with raw server lines and checks the lines
//! the bot sends back.

mod common;

use common::TestBot;
use common::bot::BOT_NICK;
use slirc_bot::error::ReplyResult;
use slirc_bot::{CommandSpec, Event, Extension, Invocation, Rank};
use std::time::{Duration, Instant};

const DENIED: &str = "You are not authorized to execute this command.";

fn denial(target: &str, nick: &str) -> String {
    format!("PRIVMSG {target} :{nick}: {DENIED}")
}

const NO_PROVIDER: &str = "[general]\nmaster = \"alice\"\n[auth]\nprovider = \"none\"\n";
const NICKSERV: &str = "[general]\nmaster = \"alice\"\n";

#[test]
fn unranked_command_runs_immediately() {
    let mut bot = TestBot::new(NICKSERV);
    assert_eq!(
        bot.say("bob", "#test", "+hello"),
        ["PRIVMSG #test :Hello, bob!"]
    );
    assert_eq!(
        bot.say("bob", "#test", &format!("{BOT_NICK}: hello")),
        ["PRIVMSG #test :Hello, bob!"]
    );
    assert_eq!(bot.say("bob", BOT_NICK, "hello"), ["PRIVMSG bob :Hello, bob!"]);
}

#[test]
fn master_fallback_without_provider() {
    let mut bot = TestBot::new(NO_PROVIDER);
    assert_eq!(bot.say("alice", "#test", "+join #new"), ["JOIN #new"]);
    assert!(bot.say("mallory", "#test", "+join #evil").is_empty());
    assert!(
        bot.say("Alice", "#test", "+join #evil").is_empty(),
        "master match is case-sensitive"
    );
}

#[test]
fn channel_rank_without_provider_is_denied() {
    let mut bot = TestBot::new(NO_PROVIDER);
    assert_eq!(bot.say("alice", "#test", "+part"), [denial("#test", "alice")]);
}

#[test]
fn op_confirmed_by_member_list() {
    let mut bot = TestBot::new(NICKSERV);
    assert_eq!(
        bot.say("bob", "#test", "+part"),
        ["PRIVMSG NickServ :ACC bob"]
    );
    assert_eq!(bot.nickserv("bob ACC 3"), ["NAMES #test"]);
    assert_eq!(bot.names("#test", &["alice", "@bob", "+carol"]), ["PART #test"]);
}

#[test]
fn identity_query_sent_once_per_identity() {
    let mut bot = TestBot::new(NICKSERV);
    assert_eq!(bot.say("bob", "#test", "+part"), ["PRIVMSG NickServ :ACC bob"]);
    assert!(bot.say("Bob", "#test", "+part").is_empty());
    assert_eq!(bot.nickserv("bob ACC 3"), ["NAMES #test"]);
    assert_eq!(bot.names("#test", &["@Bob"]), ["PART #test", "PART #test"]);
}

#[test]
fn insufficient_prefix_escalates_then_denies() {
    let mut bot = TestBot::new(NICKSERV);
    bot.say("bob", "#test", "+part");
    bot.nickserv("bob ACC 3");
    assert_eq!(
        bot.names("#test", &["+bob"]),
        ["PRIVMSG ChanServ :FLAGS #test bob"]
    );
    assert_eq!(
        bot.chanserv("bob was not found on the access list of #test."),
        [denial("#test", "bob")]
    );
}

#[test]
fn founder_flag_grants_escalated_request() {
    let mut bot = TestBot::new(NICKSERV);
    bot.say("bob", "#test", "+part");
    bot.nickserv("bob ACC 3");
    bot.names("#test", &["bob"]);
    assert_eq!(
        bot.chanserv("Flags for \x02bob\x02 in \x02#test\x02 are \x02+AFRefiorstv\x02."),
        ["PART #test"]
    );
}

#[test]
fn unidentified_nick_is_purged() {
    let mut bot = TestBot::new(NICKSERV);
    bot.say("bob", "#test", "+part");
    assert_eq!(bot.nickserv("bob ACC 0"), [denial("#test", "bob")]);
    assert!(bot.names("#test", &["@bob"]).is_empty());
}

#[test]
fn master_confirmed_by_nickserv() {
    let mut bot = TestBot::new(NICKSERV);
    assert_eq!(
        bot.say("alice", "#test", "+join #new"),
        ["PRIVMSG NickServ :ACC alice"]
    );
    assert_eq!(bot.nickserv("alice ACC 3"), ["JOIN #new"]);
    assert_eq!(bot.say("mallory", "#test", "+join #new"), [denial("#test", "mallory")]);
}

#[test]
fn rename_and_quit_deny_pending() {
    let mut bot = TestBot::new(NICKSERV);
    bot.say("bob", "#test", "+part");
    assert_eq!(bot.line(":bob!bob@example.org NICK bobby"), [denial("#test", "bob")]);

    bot.say("carol", "#test", "+part");
    assert_eq!(
        bot.line(":carol!carol@example.org QUIT :gone"),
        [denial("#test", "carol")]
    );
    assert!(bot.nickserv("carol ACC 3").is_empty());
}

#[test]
fn disconnect_denies_everything_pending() {
    let mut bot = TestBot::new(NICKSERV);
    bot.say("bob", "#test", "+part");
    bot.say("carol", "#other", "+part");
    let mut out = bot.event(Event::Disconnected {
        reason: "reset".into(),
    });
    out.sort();
    assert_eq!(out, [denial("#other", "carol"), denial("#test", "bob")]);
}

#[test]
fn stale_requests_expire() {
    let mut bot = TestBot::new(NICKSERV);
    bot.say("bob", "#test", "+part");
    let lines: Vec<String> = bot
        .router
        .expire(Instant::now() + Duration::from_secs(121))
        .iter()
        .flat_map(|op| op.to_lines())
        .collect();
    assert_eq!(lines, [denial("#test", "bob")]);
    assert!(bot.nickserv("bob ACC 3").is_empty());
}

#[test]
fn local_accounts_grant_their_rank() {
    let mut bot = TestBot::new("[general]\nmaster = \"alice\"\n[auth]\nprovider = \"local\"\n");
    assert_eq!(
        bot.say("alice", BOT_NICK, "register hunter2"),
        ["PRIVMSG alice :Registered and authenticated with rank master."]
    );
    assert_eq!(bot.say("alice", "#test", "+join #new"), ["JOIN #new"]);

    assert_eq!(bot.say("bob", "#test", "+part"), [denial("#test", "bob")]);
    bot.say("bob", BOT_NICK, "register letmein");
    assert_eq!(bot.say("bob", "#test", "+part"), [denial("#test", "bob")]);
    assert_eq!(
        bot.say("alice", "#test", "+assign_rank bob op"),
        ["PRIVMSG #test :bob now has rank op."]
    );
    assert_eq!(bot.say("bob", "#test", "+part"), ["PART #test"]);

    bot.line(":bob!bob@example.org NICK bobby");
    bot.line(":bobby!bob@example.org NICK bob");
    assert_eq!(bot.say("bob", "#test", "+part"), [denial("#test", "bob")]);
}

struct Tiers;

impl Extension for Tiers {
    fn id(&self) -> &str {
        "tiers"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("cheer", Rank::Voice, "cheer"),
            CommandSpec::new("topicbump", Rank::HalfOp, "topicbump"),
        ]
    }

    fn call(&mut self, command: &str, _invocation: &Invocation) -> ReplyResult {
        Ok(Some(format!("ran {command}")))
    }
}

#[test]
fn op_prefix_grants_lower_tiers() {
    let mut bot = TestBot::with_extensions(NICKSERV, |_| vec![Box::new(Tiers)]);
    bot.say("bob", "#test", "+cheer");
    bot.say("bob", "#test", "+topicbump");
    bot.say("bob", "#test", "+part");
    assert_eq!(bot.nickserv("bob ACC 3"), ["NAMES #test"]);

    let mut out = bot.names("#test", &["@bob"]);
    out.sort();
    assert_eq!(
        out,
        ["PART #test", "PRIVMSG #test :ran cheer", "PRIVMSG #test :ran topicbump"]
    );
}

#[test]
fn voice_prefix_stops_at_voice() {
    let mut bot = TestBot::with_extensions(NICKSERV, |_| vec![Box::new(Tiers)]);
    bot.say("bob", "#test", "+cheer");
    bot.say("bob", "#test", "+topicbump");
    bot.nickserv("bob ACC 3");
    assert_eq!(
        bot.names("#test", &["+bob"]),
        ["PRIVMSG #test :ran cheer", "PRIVMSG ChanServ :FLAGS #test bob"]
    );
}

struct Shadow;

impl Extension for Shadow {
    fn id(&self) -> &str {
        "shadow"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("hello", Rank::None, "hello"),
            CommandSpec::new("whisper", Rank::None, "whisper"),
        ]
    }

    fn call(&mut self, command: &str, _invocation: &Invocation) -> ReplyResult {
        Ok(Some(format!("shadow {command}")))
    }
}

#[test]
fn first_registration_of_a_command_wins() {
    let mut bot = TestBot::with_extensions(NICKSERV, |_| vec![Box::new(Shadow)]);
    let hello = bot.router.registry().lookup("hello").expect("hello registered");
    assert_eq!(hello.extension_id, "hello");
    assert_eq!(bot.say("bob", "#test", "+hello"), ["PRIVMSG #test :Hello, bob!"]);
    assert_eq!(bot.say("bob", "#test", "+whisper"), ["PRIVMSG #test :shadow whisper"]);
}

#[test]
fn second_provider_is_not_consulted() {
    let mut bot = TestBot::with_extensions(NICKSERV, |stores| {
        let local = slirc_bot::auth::LocalAuthProvider::new(stores, None).expect("store");
        vec![Box::new(local)]
    });
    assert_eq!(bot.router.registry().provider_id(), Some("authnickserv"));
    assert_eq!(bot.say("bob", "#test", "+part"), ["PRIVMSG NickServ :ACC bob"]);
}
