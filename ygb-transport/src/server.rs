//! Server side of the transport: answers requests and emits broadcasts.

use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, error, warn};

use crate::protocol::{EventMessage, Message, RemoteError, RequestId, RequestPacket, ResponsePacket};

/// What a handler produced for one request.
pub enum Handled<R> {
    /// Answer now.
    Ready(Result<R, String>),
    /// Answer later through this receiver. Dropping the sender without
    /// replying rejects the request.
    Deferred(Receiver<Result<R, String>>),
}

impl<R> From<Result<R, String>> for Handled<R> {
    fn from(result: Result<R, String>) -> Self {
        Handled::Ready(result)
    }
}

/// Answers requests of type `Q` with replies of type `R`.
///
/// The request type is an enum and implementations `match` it exhaustively,
/// so every request kind has a handler.
pub trait Handler<Q, R> {
    fn handle(&mut self, request: Q) -> Handled<R>;
}

impl<Q, R, F> Handler<Q, R> for F
where
    F: FnMut(Q) -> Handled<R>,
{
    fn handle(&mut self, request: Q) -> Handled<R> {
        self(request)
    }
}

/// Receives request packets and sends exactly one response per packet.
pub struct Responser<Q, R> {
    rx: Receiver<RequestPacket<Q>>,
    tx: Sender<ResponsePacket<R>>,
    deferred: Vec<(RequestId, Receiver<Result<R, String>>)>,
}

impl<Q: Message, R> Responser<Q, R> {
    pub fn new(rx: Receiver<RequestPacket<Q>>, tx: Sender<ResponsePacket<R>>) -> Self {
        Self {
            rx,
            tx,
            deferred: Vec::new(),
        }
    }

    /// Incoming request channel, for use in a `select!`.
    pub fn requests(&self) -> &Receiver<RequestPacket<Q>> {
        &self.rx
    }

    /// Run the handler for one packet and send (or defer) its response.
    /// A panicking handler is answered with `RemoteError::Panicked`.
    pub fn respond<H: Handler<Q, R>>(&mut self, packet: RequestPacket<Q>, handler: &mut H) {
        let RequestPacket { id, kind, data } = packet;
        debug!(target: "transport", "handling request {} ({})", id, kind);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(data)));
        match outcome {
            Ok(Handled::Ready(result)) => self.send(id, result.map_err(RemoteError::Rejected)),
            Ok(Handled::Deferred(reply_rx)) => self.deferred.push((id, reply_rx)),
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(target: "transport", "handler for {} panicked: {}", kind, msg);
                self.send(id, Err(RemoteError::Panicked(msg)));
            }
        }
    }

    /// Handle up to `max` requests that have already arrived.
    ///
    /// Returns the number handled, or `Disconnected` once the client side is
    /// gone and the queue is empty.
    pub fn serve_pending<H: Handler<Q, R>>(
        &mut self,
        handler: &mut H,
        max: usize,
    ) -> Result<usize, RemoteError> {
        let mut handled = 0;
        while handled < max {
            match self.rx.try_recv() {
                Ok(packet) => {
                    self.respond(packet, handler);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(RemoteError::Disconnected),
            }
        }
        handled += self.poll_deferred();
        Ok(handled)
    }

    /// Send responses for deferred handlers that have finished. Returns how
    /// many were sent.
    pub fn poll_deferred(&mut self) -> usize {
        if self.deferred.is_empty() {
            return 0;
        }
        let mut finished = Vec::new();
        self.deferred.retain(|(id, reply_rx)| match reply_rx.try_recv() {
            Ok(result) => {
                finished.push((*id, result.map_err(RemoteError::Rejected)));
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                finished.push((*id, Err(RemoteError::Rejected("handler dropped reply".into()))));
                false
            }
        });
        let count = finished.len();
        for (id, result) in finished {
            self.send(id, result);
        }
        count
    }

    /// Deferred requests still waiting on their handler.
    pub fn deferred_count(&self) -> usize {
        self.deferred.len()
    }

    fn send(&self, id: RequestId, data: Result<R, RemoteError>) {
        if self.tx.send(ResponsePacket { id, data }).is_err() {
            warn!(target: "transport", "response {} dropped: client gone", id);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Fire-and-forget broadcast sender.
pub struct Emitter<V> {
    tx: Sender<V>,
}

impl<V> Clone for Emitter<V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<V: EventMessage> Emitter<V> {
    pub fn new(tx: Sender<V>) -> Self {
        Self { tx }
    }

    /// Send an event. Returns false when no listener is attached, which is
    /// not an error.
    pub fn emit(&self, event: V) -> bool {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                debug!(target: "transport", "{} event dropped: no listener", kind);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    enum Op {
        Add(i32, i32),
        Explode,
    }

    impl Message for Op {
        fn kind(&self) -> &'static str {
            match self {
                Op::Add(..) => "add",
                Op::Explode => "explode",
            }
        }
    }

    fn calc(op: Op) -> Handled<i32> {
        match op {
            Op::Add(a, b) => Handled::Ready(Ok(a + b)),
            Op::Explode => panic!("kaboom"),
        }
    }

    #[test]
    fn panicking_handler_gets_error_response() {
        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let (resp_tx, resp_rx) = crossbeam_channel::unbounded();
        let mut responser = Responser::new(req_rx, resp_tx);
        let mut handler = calc;

        req_tx.send(RequestPacket::new(0, Op::Explode)).unwrap();
        req_tx.send(RequestPacket::new(1, Op::Add(2, 3))).unwrap();
        assert_eq!(responser.serve_pending(&mut handler, 16), Ok(2));

        let first = resp_rx.try_recv().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.data, Err(RemoteError::Panicked("kaboom".into())));
        let second = resp_rx.try_recv().unwrap();
        assert_eq!(second.data, Ok(5));
    }

    #[test]
    fn dropped_deferred_reply_is_rejected() {
        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let (resp_tx, resp_rx) = crossbeam_channel::unbounded();
        let mut responser: Responser<Op, i32> = Responser::new(req_rx, resp_tx);
        let mut handler = |_op: Op| {
            let (_tx, rx) = crossbeam_channel::bounded::<Result<i32, String>>(1);
            Handled::Deferred(rx)
        };

        req_tx.send(RequestPacket::new(4, Op::Add(1, 1))).unwrap();
        responser.serve_pending(&mut handler, 1).unwrap();
        assert_eq!(responser.deferred_count(), 0);

        let resp = resp_rx.try_recv().unwrap();
        assert_eq!(resp.id, 4);
        assert!(matches!(resp.data, Err(RemoteError::Rejected(_))));
    }

    #[test]
    fn serve_reports_disconnect_once_drained() {
        let (req_tx, req_rx) = crossbeam_channel::unbounded();
        let (resp_tx, _resp_rx) = crossbeam_channel::unbounded();
        let mut responser = Responser::new(req_rx, resp_tx);
        let mut handler = calc;

        req_tx.send(RequestPacket::new(0, Op::Add(1, 2))).unwrap();
        drop(req_tx);
        assert_eq!(responser.serve_pending(&mut handler, 1), Ok(1));
        assert_eq!(
            responser.serve_pending(&mut handler, 1),
            Err(RemoteError::Disconnected)
        );
    }

    #[test]
    fn emit_without_listener_is_not_an_error() {
        #[derive(Debug)]
        struct Ping;
        impl EventMessage for Ping {
            fn kind(&self) -> &'static str {
                "ping"
            }
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let emitter = Emitter::new(tx);
        assert!(emitter.emit(Ping));
        drop(rx);
        assert!(!emitter.emit(Ping));
    }
}
