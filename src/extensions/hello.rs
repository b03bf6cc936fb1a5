use crate::error::ReplyResult;
use crate::extension::{CommandSpec, Extension, Invocation};
use crate::rank::Rank;

/// Greets whoever asks.
pub struct Hello;

impl Extension for Hello {
    fn id(&self) -> &str {
        "hello"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![CommandSpec::new("hello", Rank::None, "hello: say hello")]
    }

    fn call(&mut self, _command: &str, invocation: &Invocation) -> ReplyResult {
        Ok(Some(format!("Hello, {}!", invocation.nick())))
    }
}
