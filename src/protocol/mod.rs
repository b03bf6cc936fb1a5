//! Protocol boundary.
//!
//! The wire protocol itself belongs to the network layer; this module only
//! defines the vocabulary crossing that boundary:
//! - [`message`]: raw line parsing and encoding
//! - [`event`]: inbound events consumed by the router
//! - [`outbound`]: operations produced by the core and extensions

mod event;
mod message;
mod outbound;

pub use event::Event;
pub use message::Message;
pub use outbound::Outbound;
