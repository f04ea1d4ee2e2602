//! Client side of the transport: issues requests and listens for broadcasts.
//!
//! Both types are meant to live on a single (UI) thread. Callbacks are not
//! `Send` and run synchronously inside `dispatch` / `call`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, warn};

use crate::protocol::{EventMessage, Message, RemoteError, RequestId, RequestPacket, ResponsePacket};

type Waiter<R> = Box<dyn FnOnce(Result<R, RemoteError>)>;

/// Issues typed requests and routes each response to the waiter registered
/// under its id.
pub struct Requester<Q, R> {
    tx: Sender<RequestPacket<Q>>,
    rx: Receiver<ResponsePacket<R>>,
    /// Single-use completion callbacks for requests still in flight.
    waiters: HashMap<RequestId, Waiter<R>>,
    next_id: RequestId,
}

impl<Q: Message, R: 'static> Requester<Q, R> {
    pub fn new(tx: Sender<RequestPacket<Q>>, rx: Receiver<ResponsePacket<R>>) -> Self {
        Self {
            tx,
            rx,
            waiters: HashMap::new(),
            next_id: 0,
        }
    }

    /// Send a request without waiting. `on_reply` runs exactly once: from
    /// `dispatch`/`call` when the response arrives, or immediately if the
    /// server side is already gone.
    pub fn request<F>(&mut self, data: Q, on_reply: F) -> RequestId
    where
        F: FnOnce(Result<R, RemoteError>) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let packet = RequestPacket::new(id, data);
        let kind = packet.kind;
        if self.tx.send(packet).is_err() {
            warn!(target: "transport", "request {} ({}) dropped: peer disconnected", id, kind);
            on_reply(Err(RemoteError::Disconnected));
            return id;
        }
        debug!(target: "transport", "request {} ({}) sent", id, kind);
        self.waiters.insert(id, Box::new(on_reply));
        id
    }

    /// Send a request and block until its own response arrives. Responses to
    /// other outstanding requests that arrive meanwhile are delivered to
    /// their waiters as usual.
    pub fn call(&mut self, data: Q) -> Result<R, RemoteError> {
        let slot: Rc<RefCell<Option<Result<R, RemoteError>>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        self.request(data, move |reply| {
            *sink.borrow_mut() = Some(reply);
        });

        loop {
            if let Some(reply) = slot.borrow_mut().take() {
                return reply;
            }
            match self.rx.recv() {
                Ok(response) => self.deliver(response),
                Err(_) => {
                    self.fail_pending();
                    return slot
                        .borrow_mut()
                        .take()
                        .unwrap_or(Err(RemoteError::Disconnected));
                }
            }
        }
    }

    /// Deliver every response that has already arrived. Returns how many
    /// were delivered.
    pub fn dispatch(&mut self) -> usize {
        let mut delivered = 0;
        loop {
            match self.rx.try_recv() {
                Ok(response) => {
                    self.deliver(response);
                    delivered += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.fail_pending();
                    break;
                }
            }
        }
        delivered
    }

    /// Number of requests still waiting for a response.
    pub fn pending(&self) -> usize {
        self.waiters.len()
    }

    fn deliver(&mut self, response: ResponsePacket<R>) {
        match self.waiters.remove(&response.id) {
            Some(waiter) => waiter(response.data),
            None => warn!(target: "transport", "response for unknown request {}", response.id),
        }
    }

    /// Resolve every outstanding waiter with `Disconnected`, oldest first.
    fn fail_pending(&mut self) {
        if self.waiters.is_empty() {
            return;
        }
        let mut orphaned: Vec<_> = self.waiters.drain().collect();
        orphaned.sort_by_key(|(id, _)| *id);
        warn!(target: "transport", "peer disconnected with {} request(s) in flight", orphaned.len());
        for (_, waiter) in orphaned {
            waiter(Err(RemoteError::Disconnected));
        }
    }
}

/// Broadcast callback. Identity (for duplicate suppression and `off`) is the
/// `Rc` allocation, so keep a clone of the `Rc` to unregister later.
pub type EventCallback<V> = Rc<dyn Fn(&V)>;

/// Receives broadcast events and fans them out to registered callbacks.
pub struct Listener<V> {
    rx: Receiver<V>,
    callbacks: HashMap<&'static str, Vec<EventCallback<V>>>,
}

impl<V: EventMessage> Listener<V> {
    pub fn new(rx: Receiver<V>) -> Self {
        Self {
            rx,
            callbacks: HashMap::new(),
        }
    }

    /// Register `callback` for events of `kind`. Returns false if that exact
    /// callback was already registered for the kind.
    pub fn on(&mut self, kind: &'static str, callback: EventCallback<V>) -> bool {
        let entry = self.callbacks.entry(kind).or_default();
        if entry.iter().any(|cb| same_callback(cb, &callback)) {
            return false;
        }
        entry.push(callback);
        true
    }

    /// Unregister a callback. Returns false if it was not registered.
    pub fn off(&mut self, kind: &'static str, callback: &EventCallback<V>) -> bool {
        let Some(entry) = self.callbacks.get_mut(kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|cb| !same_callback(cb, callback));
        entry.len() != before
    }

    /// Drain arrived events, invoking callbacks in registration order.
    /// Returns the number of events received.
    pub fn dispatch(&self) -> usize {
        let mut received = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.deliver(&event);
            received += 1;
        }
        received
    }

    /// Run the callbacks registered for this event's kind.
    pub fn deliver(&self, event: &V) {
        if let Some(callbacks) = self.callbacks.get(event.kind()) {
            for callback in callbacks {
                callback(event);
            }
        }
    }
}

fn same_callback<V>(a: &EventCallback<V>, b: &EventCallback<V>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const u8, Rc::as_ptr(b) as *const u8)
}
