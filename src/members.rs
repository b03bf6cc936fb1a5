//! Member-list tracker.
//!
//! Servers fragment large member lists across several `353` replies. The
//! tracker accumulates fragments per channel and hands out the completed
//! snapshot exactly once on `366`. Snapshots are never cached: ranks can
//! change between two checks, so every check starts from a fresh query.

use crate::casemap::irc_to_lower;
use crate::rank::Rank;
use std::collections::HashMap;

/// Completed member list of one channel: nick -> highest held prefix rank.
///
/// Members without a prefix map to [`Rank::None`].
pub type Membership = HashMap<String, Rank>;

/// Accumulates fragmented member lists, keyed by folded channel name.
#[derive(Debug, Default)]
pub struct MemberListTracker {
    in_progress: HashMap<String, Membership>,
}

impl MemberListTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one reply's worth of prefixed nicks to the channel's snapshot.
    pub fn accumulate<S: AsRef<str>>(&mut self, channel: &str, names: &[S]) {
        let snapshot = self.in_progress.entry(irc_to_lower(channel)).or_default();
        for entry in names {
            if let Some((nick, rank)) = parse_member(entry.as_ref()) {
                let held = snapshot.entry(nick.to_string()).or_insert(rank);
                if rank > *held {
                    *held = rank;
                }
            }
        }
    }

    /// Deliver the completed snapshot and clear in-progress state.
    ///
    /// A second call without new fragments returns an empty mapping.
    pub fn finalize(&mut self, channel: &str) -> Membership {
        self.in_progress
            .remove(&irc_to_lower(channel))
            .unwrap_or_default()
    }

    /// Drop every in-progress snapshot (connection loss).
    pub fn clear(&mut self) {
        self.in_progress.clear();
    }

    /// Number of channels with an unfinished member list.
    pub fn pending_channels(&self) -> usize {
        self.in_progress.len()
    }
}

/// Split a `353` entry into nick and highest prefix rank.
///
/// Handles multi-prefix entries (`@+alice`) and userhost-in-names entries
/// (`@alice!a@host`).
fn parse_member(entry: &str) -> Option<(&str, Rank)> {
    let nick_start = entry
        .char_indices()
        .find(|(_, c)| Rank::from_prefix(*c).is_none())
        .map(|(i, _)| i)?;
    let rank = entry[..nick_start]
        .chars()
        .filter_map(Rank::from_prefix)
        .max()
        .unwrap_or(Rank::None);
    let nick = entry[nick_start..].split('!').next().unwrap_or("");
    if nick.is_empty() {
        None
    } else {
        Some((nick, rank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_fragments_until_finalized() {
        let mut tracker = MemberListTracker::new();
        tracker.accumulate("#test", &["@alice", "+bob"]);
        tracker.accumulate("#TEST", &["carol", "%dave"]);
        assert_eq!(tracker.pending_channels(), 1);

        let snapshot = tracker.finalize("#test");
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot["alice"], Rank::Op);
        assert_eq!(snapshot["bob"], Rank::Voice);
        assert_eq!(snapshot["carol"], Rank::None);
        assert_eq!(snapshot["dave"], Rank::HalfOp);
    }

    #[test]
    fn second_finalize_is_empty() {
        let mut tracker = MemberListTracker::new();
        tracker.accumulate("#test", &["@alice"]);
        assert_eq!(tracker.finalize("#test").len(), 1);
        assert!(tracker.finalize("#test").is_empty());
    }

    #[test]
    fn keeps_highest_prefix() {
        let mut tracker = MemberListTracker::new();
        tracker.accumulate("#test", &["+@alice", "~bob!b@host"]);
        tracker.accumulate("#test", &["+alice"]);
        let snapshot = tracker.finalize("#test");
        assert_eq!(snapshot["alice"], Rank::Op);
        assert_eq!(snapshot["bob"], Rank::Owner);
    }

    #[test]
    fn channels_are_independent() {
        let mut tracker = MemberListTracker::new();
        tracker.accumulate("#a", &["@alice"]);
        tracker.accumulate("#b", &["bob"]);
        let a = tracker.finalize("#a");
        assert!(a.contains_key("alice"));
        assert!(!a.contains_key("bob"));
        assert_eq!(tracker.pending_channels(), 1);
    }

    #[test]
    fn ignores_bare_prefixes() {
        assert_eq!(parse_member("@"), None);
        assert_eq!(parse_member("@+alice"), Some(("alice", Rank::Op)));
    }
}
