//! Controller: the UI-side client of the executor.
//!
//! Issues RPCs, mirrors broadcasts into [`Stat`], debounces frequency-scale
//! edits and ties saves to the record store. Lives on one thread; call
//! [`Controller::pump`] regularly (e.g. once per UI frame).

mod debounce;
mod stat;

pub use debounce::Debouncer;
pub use stat::Stat;

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::Instant;

use ygb_transport::{Listener, RemoteError, Requester};
use ygb_types::{
    now_millis, Buttons, CanvasHandle, CartInfo, LogItem, LogLevel, Reply, Request, SaveMetadata,
    SaveMode, SaveRecord, ServerEvent, SessionState,
};

use crate::audio::AudioPipe;
use crate::config::Config;
use crate::executor::ClientPorts;
use crate::logger;
use crate::persistence::SaveStore;

pub struct Controller {
    requester: Requester<Request, Reply>,
    listener: Listener<ServerEvent>,
    stat: Rc<RefCell<Stat>>,
    log_filter: Rc<Cell<LogLevel>>,
    fscale: Debouncer<f64>,
    /// Store id of the save last written or loaded.
    save_id: Option<i64>,
}

impl Controller {
    pub fn new(
        requester: Requester<Request, Reply>,
        mut listener: Listener<ServerEvent>,
        config: &Config,
    ) -> Self {
        let stat = Rc::new(RefCell::new(Stat::default()));
        let log_filter = Rc::new(Cell::new(config.log_filter()));

        {
            let stat = Rc::clone(&stat);
            listener.on(
                ServerEvent::UPDATE,
                Rc::new(move |event: &ServerEvent| {
                    if let ServerEvent::Update(bundle) = event {
                        stat.borrow_mut().apply(bundle);
                    }
                }),
            );
        }
        {
            let stat = Rc::clone(&stat);
            let filter = Rc::clone(&log_filter);
            listener.on(
                ServerEvent::LOG,
                Rc::new(move |event: &ServerEvent| {
                    if let ServerEvent::Log(items) = event {
                        let mut stat = stat.borrow_mut();
                        for item in items.iter().filter(|i| filter.get().allows(i.level)) {
                            logger::forward("emu", item);
                            stat.push_log(item.clone());
                        }
                    }
                }),
            );
        }

        Self {
            requester,
            listener,
            stat,
            log_filter,
            fscale: Debouncer::new(config.fscale_debounce()),
            save_id: None,
        }
    }

    /// Build a controller from the ports returned by
    /// [`executor::spawn`](crate::executor::spawn), plus the audio pipe to
    /// hand to the output device.
    pub fn from_ports(ports: ClientPorts, config: &Config) -> (Self, AudioPipe) {
        let pipe = AudioPipe::new(ports.audio, config.ring_capacity());
        (Self::new(ports.requester, ports.listener, config), pipe)
    }

    pub fn stat(&self) -> Ref<'_, Stat> {
        self.stat.borrow()
    }

    /// Register extra broadcast callbacks (e.g. a log view).
    pub fn listener_mut(&mut self) -> &mut Listener<ServerEvent> {
        &mut self.listener
    }

    pub fn log_filter(&self) -> LogLevel {
        self.log_filter.get()
    }

    pub fn set_log_filter(&mut self, level: LogLevel) {
        self.log_filter.set(level);
    }

    pub fn save_id(&self) -> Option<i64> {
        self.save_id
    }

    /// Deliver arrived responses and broadcasts, and send a settled
    /// frequency-scale edit. Returns the number of broadcasts handled.
    pub fn pump(&mut self) -> usize {
        self.pump_at(Instant::now())
    }

    pub fn pump_at(&mut self, now: Instant) -> usize {
        if let Some(scale) = self.fscale.poll(now) {
            self.requester.request(Request::SetFreqScale(scale), |reply| {
                if let Err(e) = reply {
                    log::warn!(target: "controller", "set-fscale failed: {}", e);
                }
            });
        }
        self.requester.dispatch();
        self.listener.dispatch()
    }

    /// Liveness probe. Returns the executor's banner.
    pub fn ping(&mut self, msg: &str) -> Result<String, RemoteError> {
        match self.requester.call(Request::Ping {
            msg: msg.to_string(),
        })? {
            Reply::Pong(banner) => Ok(banner),
            other => Err(unexpected("ping", &other)),
        }
    }

    /// Insert a cartridge. On success the cart becomes the subject of the
    /// next save.
    pub fn open_rom(&mut self, rom: Vec<u8>) -> Result<CartInfo, RemoteError> {
        match self.requester.call(Request::LoadRom { rom }) {
            Ok(Reply::Cart(info)) => {
                self.log(LogLevel::Info, format!("insert rom `{}`", info.title));
                let mut stat = self.stat.borrow_mut();
                stat.rom = Some(info.clone());
                stat.save_metadata = Some(SaveMetadata {
                    cart_title: info.title.clone(),
                    created_at: Some(now_millis()),
                    last_accessed: None,
                });
                self.save_id = None;
                Ok(info)
            }
            Ok(other) => Err(unexpected("load-rom", &other)),
            Err(e) => {
                self.log(LogLevel::Error, e.message().to_string());
                Err(e)
            }
        }
    }

    pub fn set_canvas(&mut self, canvas: CanvasHandle) -> Result<(), RemoteError> {
        let result = self.call_none("set-canvas", Request::SetCanvas(canvas));
        if let Err(e) = &result {
            self.log(LogLevel::Error, e.message().to_string());
        }
        result
    }

    pub fn set_tiles_canvas(&mut self, canvas: CanvasHandle) -> Result<(), RemoteError> {
        let result = self.call_none("tile-canvas", Request::SetTilesCanvas(canvas));
        if let Err(e) = &result {
            self.log(LogLevel::Error, e.message().to_string());
        }
        result
    }

    /// Update the held-button mask. Does not wait for the reply.
    pub fn btn_action(&mut self, btns: Buttons) {
        self.requester.request(Request::BtnAction(btns), |reply| {
            if let Err(e) = reply {
                log::warn!(target: "controller", "btn-action failed: {}", e);
            }
        });
    }

    /// Queue a frequency-scale edit. Only the last edit before a pause of
    /// the configured debounce delay is sent, from [`Controller::pump`].
    pub fn set_freq_scale(&mut self, scale: f64) {
        self.set_freq_scale_at(scale, Instant::now());
    }

    pub fn set_freq_scale_at(&mut self, scale: f64, now: Instant) {
        self.fscale.push(scale, now);
    }

    /// 0..=100
    pub fn set_volume(&mut self, volume: u8) -> Result<(), RemoteError> {
        self.call_none("set-volume", Request::SetVolume(volume.min(100)))
    }

    pub fn start(&mut self) -> Result<(), RemoteError> {
        self.call_none("start", Request::Start)
    }

    pub fn pause(&mut self) -> Result<(), RemoteError> {
        self.call_none("pause", Request::Pause)
    }

    pub fn step(&mut self) -> Result<(), RemoteError> {
        self.call_none("step", Request::Step)
    }

    /// Reset the session. The cart is ejected, so the next save needs a
    /// new `open_rom`.
    pub fn shutdown(&mut self) -> Result<(), RemoteError> {
        self.call_none("shutdown", Request::Shutdown)?;
        let mut stat = self.stat.borrow_mut();
        stat.rom = None;
        stat.save_metadata = None;
        self.save_id = None;
        Ok(())
    }

    /// Snapshot the session into `store`. `Create` always adds a record,
    /// `Overwrite` replaces the one last saved or loaded. Returns the id.
    ///
    /// Refused without an executor round-trip when no cart is open.
    pub fn save(&mut self, store: &SaveStore, mode: SaveMode) -> Result<i64, String> {
        let metadata = {
            let stat = self.stat.borrow();
            stat.rom.as_ref().and(stat.save_metadata.clone())
        };
        let Some(metadata) = metadata else {
            self.log(LogLevel::Warn, "no cart".to_string());
            return Err("no cart".to_string());
        };

        let (data, state) = match self.requester.call(Request::Save) {
            Ok(Reply::Saved { data, state }) => (data, state),
            Ok(other) => return Err(unexpected("save", &other).to_string()),
            Err(e) => {
                self.log(LogLevel::Warn, format!("save failed: {}", e));
                return Err(e.to_string());
            }
        };

        let metadata = SaveMetadata {
            last_accessed: Some(now_millis()),
            ..metadata
        };
        let id = match mode {
            SaveMode::Create => None,
            SaveMode::Overwrite => self.save_id,
        };
        let record = SaveRecord {
            id,
            data,
            state,
            metadata: metadata.clone(),
        };
        let id = store
            .put(&record)
            .map_err(|e| format!("Failed to store save: {}", e))?;

        self.save_id = Some(id);
        self.stat.borrow_mut().save_metadata = Some(metadata);
        Ok(id)
    }

    /// Restore a saved snapshot. The executor adopts the record's session
    /// state, or aborts if the core rejects the data.
    pub fn load(&mut self, record: SaveRecord) -> Result<(), RemoteError> {
        let SaveRecord {
            id,
            data,
            state,
            metadata,
        } = record;
        self.call_none("load", Request::Load { data, state })?;
        self.save_id = id;
        self.stat.borrow_mut().save_metadata = Some(metadata);
        Ok(())
    }

    /// Convenience for UIs: the mirrored session state.
    pub fn state(&self) -> SessionState {
        self.stat.borrow().state
    }

    fn call_none(&mut self, kind: &str, request: Request) -> Result<(), RemoteError> {
        match self.requester.call(request)? {
            Reply::None => Ok(()),
            other => Err(unexpected(kind, &other)),
        }
    }

    /// Controller-originated log line.
    fn log(&self, level: LogLevel, msg: String) {
        let item = LogItem::new(level, msg);
        logger::forward("controller", &item);
        if self.log_filter.get().allows(level) {
            self.stat.borrow_mut().push_log(item);
        }
    }
}

fn unexpected(kind: &str, reply: &Reply) -> RemoteError {
    let name = match reply {
        Reply::None => "none",
        Reply::Cart(_) => "cart",
        Reply::Pong(_) => "pong",
        Reply::Saved { .. } => "saved",
    };
    RemoteError::Rejected(format!("unexpected `{}` reply to {}", name, kind))
}
