//! Standardized span constructors for client observability.

pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for one server connection.
    pub fn connection(host: &str, port: u16, nick: &str) -> Span {
        info_span!("connection", host = %host, port = port, nick = %nick)
    }

    /// Create a span for a channel join attempt.
    pub fn join(channel: &str) -> Span {
        info_span!("join", channel = %channel)
    }

    /// Create a span for a reply-correlated query such as PART or WHO.
    pub fn query(kind: &str, target: &str) -> Span {
        info_span!("query", kind = %kind, target = %target)
    }
}
