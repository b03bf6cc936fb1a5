//! slirc-bot - Straylight IRC bot.
//!
//! An extension host that routes chat lines to command handlers and
//! enforces a seven-tier rank hierarchy, deferring higher tiers until
//! NickServ/ChanServ confirm them.

pub mod auth;
pub mod casemap;
pub mod config;
pub mod error;
pub mod extension;
pub mod extensions;
pub mod members;
pub mod network;
pub mod protocol;
pub mod rank;
pub mod registry;
pub mod router;
pub mod telemetry;

pub use auth::{AuthEffect, AuthEngine, AuthProvider};
pub use config::Config;
pub use extension::{CommandSpec, CoreHandle, Extension, Invocation};
pub use members::{MemberListTracker, Membership};
pub use protocol::{Event, Message, Outbound};
pub use rank::Rank;
pub use registry::{CommandDescriptor, Registry};
pub use router::{Router, RouterSettings};
