//! Request handlers and the per-tick advance.
//!
//! Everything here runs on the executor thread. `ServerCore` is the single
//! source of truth for session state, the cycle counter and the input mask.

use std::time::Instant;

use crossbeam_channel::Receiver;
use ygb_transport::{Emitter, Handled, Handler};
use ygb_types::{
    now_millis, Buttons, CartInfo, Control, LogItem, LogLevel, Reply, Request, RomChange,
    ServerEvent, SessionState, Transition, UpdateBundle,
};

use crate::emu::{EmuCore, UpdateInput, UpdateResult};
use crate::logger;
use crate::pacing::{achieved_fps, cycles_per_frame};

pub struct ServerCore<C> {
    core: C,
    emitter: Emitter<ServerEvent>,
    log_rx: Receiver<Vec<LogItem>>,
    serial_rx: Receiver<Vec<u8>>,
    state: SessionState,
    cycles: u64,
    btns: Buttons,
    /// Scale the core is running at.
    freq_scale: f64,
    /// Scale requested since the last tick.
    pending_scale: Option<f64>,
    rom: Option<CartInfo>,
    /// Start of the previous running tick, for FPS.
    last_frame: Option<Instant>,
}

impl<C: EmuCore> ServerCore<C> {
    pub(crate) fn new(
        core: C,
        emitter: Emitter<ServerEvent>,
        log_rx: Receiver<Vec<LogItem>>,
        serial_rx: Receiver<Vec<u8>>,
        freq_scale: f64,
    ) -> Self {
        Self {
            core,
            emitter,
            log_rx,
            serial_rx,
            state: SessionState::Shutdown,
            cycles: 0,
            btns: Buttons::default(),
            freq_scale,
            pending_scale: None,
            rom: None,
            last_frame: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn freq_scale(&self) -> f64 {
        self.freq_scale
    }

    pub fn buttons(&self) -> Buttons {
        self.btns
    }

    pub fn rom(&self) -> Option<&CartInfo> {
        self.rom.as_ref()
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    /// One pacing tick. Advances the core by a frame's cycle budget when
    /// running; otherwise only flushes pending core output.
    pub fn tick(&mut self, now: Instant) {
        if let Some(scale) = self.pending_scale.take() {
            self.freq_scale = scale;
            self.core.set_freq_scale(scale);
            log::debug!(target: "executor", "frequency scale now {}", scale);
        }

        if !self.state.is_running() {
            self.last_frame = None;
            self.flush_logs();
            if let Some(serial) = self.drain_serial() {
                self.emit_update(UpdateBundle {
                    serial: Some(serial),
                    ..UpdateBundle::default()
                });
            }
            return;
        }

        let budget = cycles_per_frame(self.freq_scale);
        let result = self.core.update(UpdateInput {
            btns: self.btns,
            cycles: budget,
            timestamp: now_millis(),
        });
        let fps = self
            .last_frame
            .map(|prev| achieved_fps(result.cycles, now.saturating_duration_since(prev)));
        self.last_frame = Some(now);
        self.advanced(result, fps);
    }

    /// Fold a core advance into the counter and broadcast the bundle.
    fn advanced(&mut self, result: UpdateResult, fps: Option<f64>) {
        self.cycles = self.cycles.saturating_add(result.cycles);
        self.flush_logs();

        let mut bundle = UpdateBundle {
            cycles: Some(self.cycles),
            cpu: Some(result.cpu),
            serial: self.drain_serial(),
            fps,
            ..UpdateBundle::default()
        };
        match result.err {
            None => self.emit_update(bundle),
            Some(err) => {
                self.state = SessionState::Aborted;
                self.last_frame = None;
                bundle.state = Some(SessionState::Aborted);
                bundle.error = Some(err.clone());
                self.emit_update(bundle);
                self.log(LogLevel::Error, err);
            }
        }
    }

    fn dispatch(&mut self, request: Request) -> Result<Reply, String> {
        match request {
            Request::LoadRom { rom } => self.load_rom(rom),
            Request::Ping { msg } => {
                log::debug!(target: "executor", "ping: {}", msg);
                Ok(Reply::Pong(format!("ygb executor {}", env!("CARGO_PKG_VERSION"))))
            }
            Request::SetCanvas(canvas) => {
                let ctx = canvas
                    .context_2d()
                    .ok_or_else(|| "set canvas failed! fail to get context".to_string())?;
                self.core.set_screen_canvas(ctx);
                Ok(Reply::None)
            }
            Request::SetTilesCanvas(canvas) => {
                let ctx = canvas
                    .context_2d()
                    .ok_or_else(|| "set tiles canvas failed! fail to get context".to_string())?;
                self.core.set_tiles_canvas(ctx);
                Ok(Reply::None)
            }
            Request::BtnAction(btns) => {
                self.btns = btns;
                Ok(Reply::None)
            }
            Request::SetFreqScale(scale) => {
                if scale.is_finite() && scale > 0.0 {
                    self.pending_scale = Some(scale);
                } else {
                    self.log(LogLevel::Warn, format!("invalid frequency scale {}, ignored", scale));
                }
                Ok(Reply::None)
            }
            Request::SetVolume(volume) => {
                self.core.set_volume(f32::from(volume.min(100)) * 0.01);
                Ok(Reply::None)
            }
            Request::Start => self.control(Control::Start),
            Request::Pause => self.control(Control::Pause),
            Request::Step => self.step(),
            Request::Shutdown => {
                self.shutdown();
                Ok(Reply::None)
            }
            Request::Save => self.save(),
            Request::Load { data, state } => self.load(&data, state),
        }
    }

    fn load_rom(&mut self, rom: Vec<u8>) -> Result<Reply, String> {
        match self.core.load_cart(&rom, now_millis()) {
            Ok(info) => {
                self.log(LogLevel::Info, format!("cart `{}` inserted", info.title));
                self.rom = Some(info.clone());
                self.emit_update(UpdateBundle {
                    rom: Some(RomChange::Inserted(info.clone())),
                    ..UpdateBundle::default()
                });
                Ok(Reply::Cart(info))
            }
            Err(msg) => {
                self.log(LogLevel::Error, msg.clone());
                Err(msg)
            }
        }
    }

    fn control(&mut self, control: Control) -> Result<Reply, String> {
        match self.state.apply(control) {
            Transition::Move(next) => {
                self.set_state(next);
                Ok(Reply::None)
            }
            Transition::Stay(warning) => {
                self.log(LogLevel::Warn, warning);
                Ok(Reply::None)
            }
            Transition::Reject(reason) => {
                self.log(LogLevel::Warn, reason);
                Err(reason.to_string())
            }
        }
    }

    fn step(&mut self) -> Result<Reply, String> {
        match self.state.apply(Control::Step) {
            Transition::Move(next) => {
                self.set_state(next);
                let result = self.core.update(UpdateInput {
                    btns: self.btns,
                    cycles: 1,
                    timestamp: now_millis(),
                });
                self.advanced(result, None);
            }
            Transition::Stay(warning) | Transition::Reject(warning) => {
                self.log(LogLevel::Warn, warning);
            }
        }
        Ok(Reply::None)
    }

    fn shutdown(&mut self) {
        self.core.reset();
        self.state = SessionState::Shutdown;
        self.cycles = 0;
        self.rom = None;
        self.last_frame = None;
        self.emit_update(UpdateBundle {
            state: Some(SessionState::Shutdown),
            cycles: Some(0),
            rom: Some(RomChange::Ejected),
            ..UpdateBundle::default()
        });
        self.log(LogLevel::Info, "emu has been reset");
    }

    fn save(&mut self) -> Result<Reply, String> {
        if self.rom.is_none() {
            return Err("no cart loaded".to_string());
        }
        match self.core.save() {
            Some(data) => Ok(Reply::Saved {
                data,
                state: self.state,
            }),
            None => Err("core has no state to save".to_string()),
        }
    }

    fn load(&mut self, data: &[u8], state: SessionState) -> Result<Reply, String> {
        if self.core.load(data) {
            self.set_state(state);
            Ok(Reply::None)
        } else {
            self.set_state(SessionState::Aborted);
            let msg = "load failed! core rejected save data".to_string();
            self.log(LogLevel::Error, msg.clone());
            Err(msg)
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if state == self.state {
            return;
        }
        if self.state.is_running() {
            self.last_frame = None;
        }
        log::debug!(target: "executor", "state {} -> {}", self.state, state);
        self.state = state;
        self.emit_update(UpdateBundle::state(state));
    }

    /// Executor-originated log line: broadcast now and mirror to `log`.
    fn log(&self, level: LogLevel, msg: impl Into<String>) {
        let item = LogItem::new(level, msg);
        logger::forward("executor", &item);
        self.emitter.emit(ServerEvent::Log(vec![item]));
    }

    /// Send the core's log output since the last flush as one batch.
    fn flush_logs(&self) {
        let mut batch = Vec::new();
        for entries in self.log_rx.try_iter() {
            batch.extend(entries);
        }
        if !batch.is_empty() {
            self.emitter.emit(ServerEvent::Log(batch));
        }
    }

    fn drain_serial(&self) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();
        for chunk in self.serial_rx.try_iter() {
            bytes.extend(chunk);
        }
        (!bytes.is_empty()).then_some(bytes)
    }

    fn emit_update(&self, bundle: UpdateBundle) {
        self.emitter.emit(ServerEvent::Update(bundle));
    }
}

impl<C: EmuCore> Handler<Request, Reply> for ServerCore<C> {
    fn handle(&mut self, request: Request) -> Handled<Reply> {
        self.dispatch(request).into()
    }
}
