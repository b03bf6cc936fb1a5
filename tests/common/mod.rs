//! Integration test common infrastructure.
//!
//! Provides an in-process bot driven event by event, and a fake IRC
//! network the real connection loop can talk to.

pub mod bot;
pub mod network;

#[allow(unused_imports)]
pub use bot::TestBot;
#[allow(unused_imports)]
pub use network::{BotPeer, FakeNetwork};
