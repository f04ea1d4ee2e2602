#![allow(dead_code)]
//! Test harness utilities for ygb-transport integration tests.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use ygb_transport::{EventMessage, Handled, Message, Responser};

/// Requests understood by the test server.
#[derive(Debug)]
pub enum Calc {
    Echo(u32),
    /// Held until a matching `Release` arrives.
    Hold(u32),
    /// Answer the held request for this value with `value * 10`.
    Release(u32),
    Fail(&'static str),
}

impl Message for Calc {
    fn kind(&self) -> &'static str {
        match self {
            Calc::Echo(_) => "echo",
            Calc::Hold(_) => "hold",
            Calc::Release(_) => "release",
            Calc::Fail(_) => "fail",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Log(String),
    Count(u64),
}

impl EventMessage for Note {
    fn kind(&self) -> &'static str {
        match self {
            Note::Log(_) => "log",
            Note::Count(_) => "count",
        }
    }
}

/// Server-side handler state for [`Calc`].
#[derive(Default)]
pub struct CalcServer {
    held: Vec<(u32, Sender<Result<u32, String>>)>,
}

impl CalcServer {
    pub fn handle(&mut self, request: Calc) -> Handled<u32> {
        match request {
            Calc::Echo(v) => Handled::Ready(Ok(v)),
            Calc::Hold(v) => {
                let (tx, rx) = crossbeam_channel::bounded(1);
                self.held.push((v, tx));
                Handled::Deferred(rx)
            }
            Calc::Release(v) => match self.held.iter().position(|(held, _)| *held == v) {
                Some(idx) => {
                    let (_, tx) = self.held.remove(idx);
                    let _ = tx.send(Ok(v * 10));
                    Handled::Ready(Ok(v))
                }
                None => Handled::Ready(Err(format!("{} is not held", v))),
            },
            Calc::Fail(msg) => Handled::Ready(Err(msg.to_string())),
        }
    }
}

/// Serve requests on a background thread until the client hangs up.
pub fn spawn_server(mut responser: Responser<Calc, u32>) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut server = CalcServer::default();
        let mut handler = |req: Calc| server.handle(req);
        let mut total = 0;
        loop {
            match responser.serve_pending(&mut handler, 64) {
                Ok(n) => total += n,
                Err(_) => return total,
            }
            thread::sleep(Duration::from_millis(1));
        }
    })
}

/// Call `step` until it returns true or the timeout elapses.
pub fn drive_until(timeout: Duration, mut step: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if step() {
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("Timed out after {:?}", timeout);
}
