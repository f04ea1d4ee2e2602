#![allow(dead_code)]
//! Test harness utilities for ygb-core integration tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use ygb_core::{link, CoreUpcalls, EmuCore, Executor, ExecutorOptions, StepInput, UpdateInput, UpdateResult};
use ygb_transport::{Listener, RemoteError, Requester};
use ygb_types::{
    Buttons, CartInfo, CpuSnapshot, DrawContext, LogItem, LogLevel, Reply, Request, ServerEvent,
    UpdateBundle,
};

/// Knobs and observations shared between a test and its [`MockCore`].
#[derive(Default)]
pub struct Recorder {
    pub fail_update: bool,
    pub reject_load: bool,
    pub panic_on_load_cart: bool,
    pub budgets: Vec<u64>,
    pub freq_scales: Vec<f64>,
    pub volume: Option<f32>,
    pub last_btns: Buttons,
    pub resets: usize,
    pub save_calls: usize,
    pub has_screen: bool,
    pub has_tiles: bool,
}

pub type SharedRecorder = Arc<Mutex<Recorder>>;

/// Deterministic stand-in for the emulation core. Executes exactly the
/// cycles it is asked for; `step` executes one 4-cycle instruction.
pub struct MockCore {
    upcalls: CoreUpcalls,
    recorder: SharedRecorder,
    cart: Option<CartInfo>,
    /// Core-internal machine state, serialized by `save`.
    total_cycles: u64,
}

impl MockCore {
    pub fn new(freq_scale: f64, volume: f32, upcalls: CoreUpcalls, recorder: SharedRecorder) -> Self {
        {
            let mut p = recorder.lock().unwrap();
            p.freq_scales.push(freq_scale);
            p.volume = Some(volume);
        }
        Self {
            upcalls,
            recorder,
            cart: None,
            total_cycles: 0,
        }
    }

    pub fn upcalls(&self) -> &CoreUpcalls {
        &self.upcalls
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            pc: (self.total_cycles & 0xffff) as u16,
            inst: "NOP".into(),
            ..CpuSnapshot::default()
        }
    }
}

impl EmuCore for MockCore {
    fn update(&mut self, input: UpdateInput) -> UpdateResult {
        let mut p = self.recorder.lock().unwrap();
        p.budgets.push(input.cycles);
        p.last_btns = input.btns;
        if p.fail_update {
            return UpdateResult {
                cycles: 0,
                cpu: self.snapshot(),
                err: Some("illegal opcode 0xdd".into()),
            };
        }
        drop(p);
        self.total_cycles += input.cycles;
        self.upcalls
            .log_batch(vec![LogItem::new(LogLevel::Debug, format!("ran {}", input.cycles))]);
        UpdateResult {
            cycles: input.cycles,
            cpu: self.snapshot(),
            err: None,
        }
    }

    fn step(&mut self, input: StepInput) -> UpdateResult {
        self.update(UpdateInput {
            btns: input.btns,
            cycles: 4,
            timestamp: input.timestamp,
        })
    }

    fn load_cart(&mut self, rom: &[u8], _timestamp: u64) -> Result<CartInfo, String> {
        if self.recorder.lock().unwrap().panic_on_load_cart {
            panic!("cart parser exploded");
        }
        if rom.len() < 0x150 {
            return Err(format!("rom too small: {} bytes", rom.len()));
        }
        let title = String::from_utf8_lossy(&rom[0x134..0x144])
            .trim_end_matches('\0')
            .to_string();
        let info = CartInfo {
            title,
            cart_type: "ROM ONLY".into(),
            rom_size: rom.len() as u32,
            ..CartInfo::default()
        };
        self.cart = Some(info.clone());
        Ok(info)
    }

    fn save(&mut self) -> Option<Vec<u8>> {
        self.recorder.lock().unwrap().save_calls += 1;
        self.cart.as_ref()?;
        Some(self.total_cycles.to_le_bytes().to_vec())
    }

    fn load(&mut self, data: &[u8]) -> bool {
        if self.recorder.lock().unwrap().reject_load || data.len() != 8 {
            return false;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(data);
        self.total_cycles = u64::from_le_bytes(buf);
        true
    }

    fn reset(&mut self) {
        self.recorder.lock().unwrap().resets += 1;
        self.cart = None;
        self.total_cycles = 0;
    }

    fn set_screen_canvas(&mut self, _ctx: Box<dyn DrawContext>) {
        self.recorder.lock().unwrap().has_screen = true;
    }

    fn set_tiles_canvas(&mut self, _ctx: Box<dyn DrawContext>) {
        self.recorder.lock().unwrap().has_tiles = true;
    }

    fn set_volume(&mut self, volume: f32) {
        self.recorder.lock().unwrap().volume = Some(volume);
    }

    fn set_freq_scale(&mut self, scale: f64) {
        self.recorder.lock().unwrap().freq_scales.push(scale);
    }
}

/// A 32 KiB cartridge image with `title` in the header.
pub fn make_rom(title: &str) -> Vec<u8> {
    let mut rom = vec![0u8; 32 * 1024];
    let bytes = title.as_bytes();
    let n = bytes.len().min(16);
    rom[0x134..0x134 + n].copy_from_slice(&bytes[..n]);
    rom
}

/// Executor driven by hand on the test thread: no background loop, no
/// wall-clock ticks. Requests are answered by `poll_requests`, ticks run
/// only when the test asks.
pub struct Harness {
    pub executor: Executor<MockCore>,
    pub recorder: SharedRecorder,
    requester: Requester<Request, Reply>,
    listener: Listener<ServerEvent>,
    events: Rc<RefCell<Vec<ServerEvent>>>,
    pub audio: Receiver<Vec<f32>>,
}

impl Harness {
    pub fn new() -> Self {
        let recorder: SharedRecorder = Arc::default();
        let (client, ports) = link(8);
        let core_recorder = Arc::clone(&recorder);
        let executor = Executor::new(ports, ExecutorOptions::default(), move |scale, volume, up| {
            MockCore::new(scale, volume, up, core_recorder)
        });

        let mut listener = client.listener;
        let events = Rc::new(RefCell::new(Vec::new()));
        for kind in [ServerEvent::LOG, ServerEvent::UPDATE] {
            let events = Rc::clone(&events);
            listener.on(
                kind,
                Rc::new(move |e: &ServerEvent| events.borrow_mut().push(e.clone())),
            );
        }

        Self {
            executor,
            recorder,
            requester: client.requester,
            listener,
            events,
            audio: client.audio,
        }
    }

    /// Send one request, let the executor answer it, return the reply.
    pub fn request(&mut self, request: Request) -> Result<Reply, RemoteError> {
        let slot = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&slot);
        self.requester.request(request, move |reply| {
            *sink.borrow_mut() = Some(reply);
        });
        self.executor.poll_requests().expect("executor ports alive");
        self.requester.dispatch();
        let reply = slot.borrow_mut().take();
        reply.expect("executor answered within one poll")
    }

    /// Broadcasts received since the last call.
    pub fn events(&mut self) -> Vec<ServerEvent> {
        self.listener.dispatch();
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn updates(&mut self) -> Vec<UpdateBundle> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::Update(b) => Some(b),
                ServerEvent::Log(_) => None,
            })
            .collect()
    }

    pub fn logs(&mut self) -> Vec<LogItem> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ServerEvent::Log(items) => Some(items),
                ServerEvent::Update(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn insert_cart(&mut self, title: &str) -> CartInfo {
        match self.request(Request::LoadRom { rom: make_rom(title) }) {
            Ok(Reply::Cart(info)) => info,
            other => panic!("Expected cart info, got {:?}", other),
        }
    }
}

/// Call `step` until it returns true or the timeout elapses.
pub fn drive_until(timeout: Duration, mut step: impl FnMut() -> bool) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if step() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("Timed out after {:?}", timeout);
}
