//! Privilege ranks.
//!
//! Ranks form a total order; holding a rank implies holding every rank
//! below it. The derived `Ord` follows declaration order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ordered privilege tier, `None` through `Master`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rank {
    #[default]
    None,
    Authenticated,
    Voice,
    HalfOp,
    Op,
    Owner,
    Master,
}

/// Returned when a rank name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown rank: {0}")]
pub struct UnknownRank(pub String);

impl Rank {
    /// All ranks in ascending order.
    pub const ALL: [Rank; 7] = [
        Rank::None,
        Rank::Authenticated,
        Rank::Voice,
        Rank::HalfOp,
        Rank::Op,
        Rank::Owner,
        Rank::Master,
    ];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Authenticated => "authenticated",
            Self::Voice => "voice",
            Self::HalfOp => "half-op",
            Self::Op => "op",
            Self::Owner => "owner",
            Self::Master => "master",
        }
    }

    /// Map a channel membership prefix character to the rank it confers.
    ///
    /// `&` (admin) sits above op but does not confer ownership.
    pub fn from_prefix(c: char) -> Option<Rank> {
        match c {
            '~' => Some(Self::Owner),
            '&' | '@' => Some(Self::Op),
            '%' => Some(Self::HalfOp),
            '+' => Some(Self::Voice),
            _ => None,
        }
    }

    /// True for the tiers decided by channel membership prefixes.
    pub fn is_membership_tier(self) -> bool {
        matches!(self, Self::Voice | Self::HalfOp | Self::Op)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = UnknownRank;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "authenticated" | "auth" => Ok(Self::Authenticated),
            "voice" => Ok(Self::Voice),
            "half-op" | "halfop" | "hop" => Ok(Self::HalfOp),
            "op" => Ok(Self::Op),
            "owner" => Ok(Self::Owner),
            "master" => Ok(Self::Master),
            _ => Err(UnknownRank(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_totally_ordered() {
        for pair in Rank::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn higher_rank_implies_lower() {
        let held = Rank::Op;
        assert!(Rank::ALL.iter().filter(|r| **r <= held).count() == 5);
        assert!(held >= Rank::Voice);
        assert!(held < Rank::Owner);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("half-op".parse::<Rank>().unwrap(), Rank::HalfOp);
        assert_eq!("hop".parse::<Rank>().unwrap(), Rank::HalfOp);
        assert_eq!("MASTER".parse::<Rank>().unwrap(), Rank::Master);
        assert!("admin".parse::<Rank>().is_err());
        for rank in Rank::ALL {
            assert_eq!(rank.to_string().parse::<Rank>().unwrap(), rank);
        }
    }

    #[test]
    fn prefix_mapping() {
        assert_eq!(Rank::from_prefix('+'), Some(Rank::Voice));
        assert_eq!(Rank::from_prefix('%'), Some(Rank::HalfOp));
        assert_eq!(Rank::from_prefix('@'), Some(Rank::Op));
        assert_eq!(Rank::from_prefix('&'), Some(Rank::Op));
        assert_eq!(Rank::from_prefix('~'), Some(Rank::Owner));
        assert_eq!(Rank::from_prefix('a'), None);
    }

    #[test]
    fn membership_tiers_are_the_prefix_ranks() {
        let tiers: Vec<Rank> = Rank::ALL.into_iter().filter(|r| r.is_membership_tier()).collect();
        assert_eq!(tiers, [Rank::Voice, Rank::HalfOp, Rank::Op]);
    }
}
