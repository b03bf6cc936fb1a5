//! Self-contained account provider.
//!
//! Accounts (password hash and rank) live in the provider's own store.
//! Authentication is per connection and ends when the user parts, is
//! kicked, changes nick or quits. Decisions are synchronous.

use super::{AuthEffect, AuthProvider};
use crate::casemap::identity_key;
use crate::error::{HookError, HookResult, ReplyResult, StoreError};
use crate::extension::{CommandSpec, CoreHandle, Extension, Invocation, Store, StoreManager};
use crate::protocol::Outbound;
use crate::rank::Rank;
use crate::registry::CommandDescriptor;
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

const GENERATED_PASSWORD_LEN: usize = 12;
/// Settings key holding the identity key of the master the accounts were built for.
const MASTER_KEY: &str = "master";

const COMMANDS: &[CommandSpec] = &[
    CommandSpec::new("register", Rank::None, "register PASSWORD (private)"),
    CommandSpec::new("authenticate", Rank::None, "authenticate PASSWORD (private)"),
    CommandSpec::new("deauthenticate", Rank::Authenticated, "deauthenticate"),
    CommandSpec::new("change_password", Rank::Authenticated, "change_password NEW (private)"),
    CommandSpec::new("assign_rank", Rank::Master, "assign_rank NICK RANK"),
    CommandSpec::new("reset_password", Rank::Master, "reset_password NICK"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Account {
    password_hash: String,
    rank: Rank,
}

pub struct LocalAuthProvider {
    accounts: Store,
    master: Option<String>,
    authenticated: HashSet<String>,
    core: Option<CoreHandle>,
}

impl LocalAuthProvider {
    pub fn new(stores: &StoreManager, master: Option<String>) -> Result<Self, StoreError> {
        let provider = Self {
            accounts: stores.open("authlocal", "accounts")?,
            master,
            authenticated: HashSet::new(),
            core: None,
        };
        provider.sync_master(&stores.open("authlocal", "settings")?)?;
        Ok(provider)
    }

    /// Demote the previous master's account when the configured master
    /// changed, and promote the new master's account if it exists.
    fn sync_master(&self, settings: &Store) -> Result<(), StoreError> {
        let previous: Option<String> = settings.get(MASTER_KEY)?;
        let current = self.master.as_deref().map(identity_key);
        if previous == current {
            return Ok(());
        }

        if let Some(old) = &previous
            && let Some(mut account) = self.account(old)?
            && account.rank == Rank::Master
        {
            account.rank = Rank::Authenticated;
            self.accounts.set(old, &account)?;
            info!(nick = %old, "Previous master demoted");
        }

        match &current {
            Some(new) => {
                if let Some(mut account) = self.account(new)? {
                    account.rank = Rank::Master;
                    self.accounts.set(new, &account)?;
                    info!(nick = %new, "Master account promoted");
                }
                settings.set(MASTER_KEY, new)?;
            }
            None => {
                settings.remove(MASTER_KEY)?;
            }
        }
        Ok(())
    }

    pub fn is_authenticated(&self, nick: &str) -> bool {
        self.authenticated.contains(&identity_key(nick))
    }

    fn account(&self, key: &str) -> Result<Option<Account>, StoreError> {
        self.accounts.get(key)
    }

    /// Authenticated with a stored rank at or above `required`.
    fn granted(&self, invocation: &Invocation, required: Rank) -> bool {
        let key = identity_key(&invocation.sender);
        if !self.authenticated.contains(&key) {
            return false;
        }
        match self.account(&key) {
            Ok(Some(account)) => account.rank >= required,
            Ok(None) => false,
            Err(e) => {
                warn!(nick = %invocation.nick(), error = %e, "Account lookup failed");
                false
            }
        }
    }

    fn decide(
        &self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
        required: Rank,
    ) -> Vec<AuthEffect> {
        if self.granted(&invocation, required) {
            vec![AuthEffect::Execute {
                descriptor,
                invocation,
            }]
        } else {
            vec![AuthEffect::Deny { invocation }]
        }
    }

    fn register(&mut self, invocation: &Invocation) -> ReplyResult {
        let [password] = invocation.args.as_slice() else {
            return Ok(Some("Usage: register PASSWORD".into()));
        };
        let key = identity_key(&invocation.sender);
        if self.account(&key)?.is_some() {
            return Ok(Some("You are already registered.".into()));
        }
        let rank = if self.master.as_deref() == Some(invocation.nick()) {
            Rank::Master
        } else {
            Rank::Authenticated
        };
        let account = Account {
            password_hash: hash_password(password)?,
            rank,
        };
        self.accounts.set(&key, &account)?;
        self.authenticated.insert(key);
        info!(nick = %invocation.nick(), rank = %rank, "Account registered");
        Ok(Some(format!("Registered and authenticated with rank {rank}.")))
    }

    fn authenticate(&mut self, invocation: &Invocation) -> ReplyResult {
        let [password] = invocation.args.as_slice() else {
            return Ok(Some("Usage: authenticate PASSWORD".into()));
        };
        let key = identity_key(&invocation.sender);
        let Some(account) = self.account(&key)? else {
            return Ok(Some("You are not registered.".into()));
        };
        if !verify_password(password, &account.password_hash) {
            warn!(nick = %invocation.nick(), "Failed authentication attempt");
            return Ok(Some("Invalid password.".into()));
        }
        self.authenticated.insert(key);
        Ok(Some(format!("Authenticated with rank {}.", account.rank)))
    }

    fn change_password(&mut self, invocation: &Invocation) -> ReplyResult {
        let [password] = invocation.args.as_slice() else {
            return Ok(Some("Usage: change_password NEW".into()));
        };
        let key = identity_key(&invocation.sender);
        let Some(mut account) = self.account(&key)? else {
            return Ok(Some("You are not registered.".into()));
        };
        account.password_hash = hash_password(password)?;
        self.accounts.set(&key, &account)?;
        Ok(Some("Password changed.".into()))
    }

    fn assign_rank(&mut self, invocation: &Invocation) -> ReplyResult {
        let [nick, rank] = invocation.args.as_slice() else {
            return Ok(Some("Usage: assign_rank NICK RANK".into()));
        };
        let rank: Rank = match rank.parse() {
            Ok(Rank::None) | Err(_) => {
                return Ok(Some(format!("Unknown rank: {rank}")));
            }
            Ok(rank) => rank,
        };
        let key = identity_key(nick);
        let Some(mut account) = self.account(&key)? else {
            return Ok(Some(format!("{nick} is not registered.")));
        };
        account.rank = rank;
        self.accounts.set(&key, &account)?;
        info!(nick = %nick, rank = %rank, by = %invocation.nick(), "Rank assigned");
        Ok(Some(format!("{nick} now has rank {rank}.")))
    }

    fn reset_password(&mut self, invocation: &Invocation) -> ReplyResult {
        let [nick] = invocation.args.as_slice() else {
            return Ok(Some("Usage: reset_password NICK".into()));
        };
        let key = identity_key(nick);
        let Some(mut account) = self.account(&key)? else {
            return Ok(Some(format!("{nick} is not registered.")));
        };
        let password = generate_password();
        account.password_hash = hash_password(&password)?;
        self.accounts.set(&key, &account)?;
        self.authenticated.remove(&key);
        if let Some(core) = &self.core {
            core.send(Outbound::privmsg(
                nick.as_str(),
                format!("Your password has been reset to: {password}"),
            ));
        }
        Ok(Some(format!("Password for {nick} reset and sent privately.")))
    }

    fn forget(&mut self, who: &str) {
        self.authenticated.remove(&identity_key(who));
    }
}

fn hash_password(password: &str) -> Result<String, HookError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| HookError::Failed(format!("password hashing failed: {e}")))?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

impl Extension for LocalAuthProvider {
    fn id(&self) -> &str {
        "authlocal"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        COMMANDS.to_vec()
    }

    fn call(&mut self, command: &str, invocation: &Invocation) -> ReplyResult {
        let needs_private = matches!(command, "register" | "authenticate" | "change_password");
        if needs_private && !invocation.is_private() {
            return Ok(Some(format!(
                "{}: use {command} in a private message.",
                invocation.nick()
            )));
        }
        match command {
            "register" => self.register(invocation),
            "authenticate" => self.authenticate(invocation),
            "deauthenticate" => {
                self.forget(&invocation.sender);
                Ok(Some("Deauthenticated.".into()))
            }
            "change_password" => self.change_password(invocation),
            "assign_rank" => self.assign_rank(invocation),
            "reset_password" => self.reset_password(invocation),
            _ => Ok(None),
        }
    }

    fn privileged(&self) -> bool {
        true
    }

    fn attach_core(&mut self, core: CoreHandle) {
        self.core = Some(core);
    }

    fn as_provider(&mut self) -> Option<&mut dyn AuthProvider> {
        Some(self)
    }

    fn on_disconnect(&mut self) -> HookResult {
        self.authenticated.clear();
        Ok(())
    }

    fn on_userpart(&mut self, who: &str, _channel: &str, _message: &str) -> HookResult {
        self.forget(who);
        Ok(())
    }

    fn on_userkicked(
        &mut self,
        _kicker: &str,
        _channel: &str,
        target: &str,
        _reason: &str,
    ) -> HookResult {
        self.forget(target);
        Ok(())
    }

    fn on_userrenamed(&mut self, old: &str, _new: &str) -> HookResult {
        self.forget(old);
        Ok(())
    }

    fn on_userquit(&mut self, who: &str, _message: &str) -> HookResult {
        self.forget(who);
        Ok(())
    }
}

impl AuthProvider for LocalAuthProvider {
    fn authorize_authenticated(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.decide(descriptor, invocation, Rank::Authenticated)
    }

    fn authorize_voice(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.decide(descriptor, invocation, Rank::Voice)
    }

    fn authorize_half_op(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.decide(descriptor, invocation, Rank::HalfOp)
    }

    fn authorize_op(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.decide(descriptor, invocation, Rank::Op)
    }

    fn authorize_owner(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.decide(descriptor, invocation, Rank::Owner)
    }

    fn authorize_master(
        &mut self,
        descriptor: CommandDescriptor,
        invocation: Invocation,
    ) -> Vec<AuthEffect> {
        self.decide(descriptor, invocation, Rank::Master)
    }
}
