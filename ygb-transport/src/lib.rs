//! Message-passing transport between the emulator controller and executor.
//!
//! Two primitives share one set of envelopes:
//! - duplex RPC: [`Requester`] (client side) and [`Responser`] (server side)
//! - one-way broadcast: [`Emitter`] (server side) and [`Listener`] (client side)
//!
//! Both run over `crossbeam_channel` pairs. Payloads are moved through the
//! channel, so binary buffers change owner at the moment of sending.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{EventCallback, Listener, Requester};
pub use protocol::{EventMessage, Message, RemoteError, RequestId, RequestPacket, ResponsePacket};
pub use server::{Emitter, Handled, Handler, Responser};

/// Create a connected RPC pair over two unbounded channels.
pub fn duplex<Q: Message, R: 'static>() -> (Requester<Q, R>, Responser<Q, R>) {
    let (request_tx, request_rx) = crossbeam_channel::unbounded();
    let (response_tx, response_rx) = crossbeam_channel::unbounded();
    (
        Requester::new(request_tx, response_rx),
        Responser::new(request_rx, response_tx),
    )
}

/// Create a connected broadcast pair over one unbounded channel.
pub fn broadcast<V: EventMessage>() -> (Emitter<V>, Listener<V>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (Emitter::new(tx), Listener::new(rx))
}
