//! Network layer: server connections and their event loops.

mod connection;
mod stream;

pub use connection::{MAX_LINE_LENGTH, run};
pub use stream::{BotStream, connect};
