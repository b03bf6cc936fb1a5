//! IRC case-mapping and identity helpers.
//!
//! Uses the `rfc1459` mapping, where `[]\~` are the uppercase forms of `{}|^`.

/// Convert a single character to IRC lowercase.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => (c as u8 + 32) as char,
        _ => c,
    }
}

/// Convert a string to IRC lowercase.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Compare two names case-insensitively under IRC rules.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.chars()
            .zip(b.chars())
            .all(|(ca, cb)| irc_lower_char(ca) == irc_lower_char(cb))
}

/// Strip the network-specific suffix (`!user@host`) from an identity.
pub fn bare_nick(identity: &str) -> &str {
    identity.split('!').next().unwrap_or(identity)
}

/// Folded key for per-identity state.
pub fn identity_key(identity: &str) -> String {
    irc_to_lower(bare_nick(identity))
}

/// True if the target names a channel rather than a user.
pub fn is_channel(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}
