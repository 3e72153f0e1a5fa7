// Venue transport: duplex text channel + JSON codec
pub mod channel;
pub mod codec;
pub mod ws;

use std::future::Future;

pub use channel::{ChannelTransport, VenueEndpoint};
pub use codec::{
    decode, encode, ContractUpdate, ErrorClass, Inbound, OutboundMessage, VenueMessage,
    VenueRequest,
};
pub use ws::WsTransport;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("malformed venue message: {0}")]
    Decode(String),
}

/// Persistent duplex message channel to the venue
///
/// Frames are JSON text; encoding lives in [`codec`]. `recv` yields `None`
/// once the peer closes the connection, and must be cancel safe since the
/// runtime polls it inside `select!`.
pub trait Transport {
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn send(&mut self, frame: String) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn recv(&mut self) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    fn is_open(&self) -> bool;
}
