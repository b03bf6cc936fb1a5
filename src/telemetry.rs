//! Span constructors for bot observability.

/// Standardized spans shared by the network layer and the engine.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for one server connection.
    pub fn connection(server: &str, address: &str) -> Span {
        info_span!("connection", server = %server, address = %address)
    }

    /// Create a span for a command execution.
    pub fn command(name: &str, source: &str, target: Option<&str>) -> Span {
        if let Some(target) = target {
            info_span!("command", name = %name, source = %source, target = %target)
        } else {
            info_span!("command", name = %name, source = %source)
        }
    }
}
