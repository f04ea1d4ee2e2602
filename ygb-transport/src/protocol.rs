//! Envelope types shared by both sides of the transport.
//!
//! Request: `{ type, id, data }`. Response: `{ id, data: Ok(ret) | Err(err) }`.
//! Event: `{ type, data }` with no id and no response.

use std::fmt;

/// Sequence number of a request, unique per [`Requester`](crate::Requester).
pub type RequestId = u64;

/// A request payload. `kind` is the wire-level `type` tag.
pub trait Message: Send + 'static {
    fn kind(&self) -> &'static str;
}

/// A broadcast payload. `kind` selects the listener callbacks.
pub trait EventMessage: Send + 'static {
    fn kind(&self) -> &'static str;
}

/// Client -> server envelope.
#[derive(Debug)]
pub struct RequestPacket<Q> {
    pub id: RequestId,
    pub kind: &'static str,
    pub data: Q,
}

impl<Q: Message> RequestPacket<Q> {
    pub fn new(id: RequestId, data: Q) -> Self {
        Self {
            id,
            kind: data.kind(),
            data,
        }
    }
}

/// Server -> client envelope. Exactly one per request, same `id`.
#[derive(Debug)]
pub struct ResponsePacket<R> {
    pub id: RequestId,
    pub data: Result<R, RemoteError>,
}

/// Why a request did not produce a return value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The handler answered with an error.
    Rejected(String),
    /// The handler panicked; carries the panic message.
    Panicked(String),
    /// The other side hung up before answering.
    Disconnected,
}

impl RemoteError {
    /// The diagnostic text, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            RemoteError::Rejected(msg) | RemoteError::Panicked(msg) => msg,
            RemoteError::Disconnected => "peer disconnected",
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Rejected(msg) => write!(f, "{}", msg),
            RemoteError::Panicked(msg) => write!(f, "handler panicked: {}", msg),
            RemoteError::Disconnected => write!(f, "peer disconnected"),
        }
    }
}

impl std::error::Error for RemoteError {}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;

    impl Message for Ping {
        fn kind(&self) -> &'static str {
            "ping"
        }
    }

    #[test]
    fn packet_takes_kind_from_payload() {
        let packet = RequestPacket::new(7, Ping);
        assert_eq!(packet.id, 7);
        assert_eq!(packet.kind, "ping");
    }

    #[test]
    fn remote_error_display() {
        assert_eq!(RemoteError::Rejected("no cart".into()).to_string(), "no cart");
        assert_eq!(
            RemoteError::Panicked("boom".into()).to_string(),
            "handler panicked: boom"
        );
        assert_eq!(RemoteError::Disconnected.message(), "peer disconnected");
    }
}
