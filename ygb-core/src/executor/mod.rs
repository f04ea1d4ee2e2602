//! The executor: a dedicated thread that owns the core, the session state
//! machine and the pacing loop, and serves controller requests in between
//! ticks.

mod handlers;

pub use handlers::ServerCore;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use ygb_transport::{Emitter, Listener, RemoteError, Requester, Responser};
use ygb_types::{Buttons, CartInfo, Reply, Request, ServerEvent, SessionState};

use crate::audio::{audio_channel, AudioSender};
use crate::config::Config;
use crate::emu::{CoreUpcalls, EmuCore};
use crate::pacing::{frame_interval, FramePacer, LoopGuard};
use crate::telemetry::PacingStats;

/// Requests handled per loop turn before the next tick is considered.
const MAX_REQUESTS_PER_TURN: usize = 64;
/// How often pacing statistics go to the debug log.
const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Startup settings for an executor.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub freq_scale: f64,
    /// 0..=100
    pub volume: u8,
    /// Audio chunks queued before new ones are dropped.
    pub audio_channel_depth: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            freq_scale: 1.0,
            volume: ygb_types::DEFAULT_VOLUME,
            audio_channel_depth: 64,
        }
    }
}

impl ExecutorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            freq_scale: config.freq_scale(),
            volume: config.volume(),
            audio_channel_depth: config.audio_channel_depth(),
        }
    }
}

/// Controller-side channel ends.
pub struct ClientPorts {
    pub requester: Requester<Request, Reply>,
    pub listener: Listener<ServerEvent>,
    /// Interleaved stereo chunks from the core.
    pub audio: Receiver<Vec<f32>>,
}

/// Executor-side channel ends.
pub struct ExecutorPorts {
    responser: Responser<Request, Reply>,
    emitter: Emitter<ServerEvent>,
    audio: AudioSender,
}

/// Create the three channels joining a controller and an executor.
pub fn link(audio_channel_depth: usize) -> (ClientPorts, ExecutorPorts) {
    let (requester, responser) = ygb_transport::duplex();
    let (emitter, listener) = ygb_transport::broadcast();
    let (audio_tx, audio_rx) = audio_channel(audio_channel_depth);
    (
        ClientPorts {
            requester,
            listener,
            audio: audio_rx,
        },
        ExecutorPorts {
            responser,
            emitter,
            audio: audio_tx,
        },
    )
}

pub struct Executor<C> {
    responser: Responser<Request, Reply>,
    server: ServerCore<C>,
    pacer: FramePacer,
    stats: PacingStats,
    running: Arc<AtomicBool>,
    last_report: Instant,
}

impl<C: EmuCore> Executor<C> {
    /// Build the core through `make_core(freq_scale, volume, upcalls)` and
    /// wire its upcalls to the executor.
    pub fn new<F>(ports: ExecutorPorts, options: ExecutorOptions, make_core: F) -> Self
    where
        F: FnOnce(f64, f32, CoreUpcalls) -> C,
    {
        let (log_tx, log_rx) = crossbeam_channel::unbounded();
        let (serial_tx, serial_rx) = crossbeam_channel::unbounded();
        let upcalls = CoreUpcalls::new(log_tx, serial_tx, ports.audio);

        let volume = f32::from(options.volume.min(100)) * 0.01;
        let core = make_core(options.freq_scale, volume, upcalls);

        Self {
            responser: ports.responser,
            server: ServerCore::new(core, ports.emitter, log_rx, serial_rx, options.freq_scale),
            pacer: FramePacer::new(frame_interval()),
            stats: PacingStats::new(frame_interval()),
            running: Arc::new(AtomicBool::new(false)),
            last_report: Instant::now(),
        }
    }

    /// Serve requests and tick until the controller hangs up.
    pub fn run(mut self) {
        let Some(_guard) = LoopGuard::acquire(&self.running) else {
            log::error!(target: "executor", "executor loop already running, refusing to start another");
            return;
        };
        log::info!(target: "executor", "executor loop started");

        let requests = self.responser.requests().clone();
        loop {
            let remaining = self.pacer.remaining(Instant::now());

            crossbeam_channel::select! {
                recv(requests) -> result => {
                    match result {
                        Ok(packet) => self.responser.respond(packet, &mut self.server),
                        Err(_) => break,
                    }
                }
                default(remaining) => {}
            }

            // Drain whatever else queued up, bounded so ticks are not starved
            if self.poll_requests().is_err() {
                break;
            }

            let now = Instant::now();
            if self.pacer.is_due(now) {
                self.tick_at(now);
            }
            self.report_pacing();
        }

        log::info!(target: "executor", "controller disconnected, executor loop stopped");
    }

    /// Handle requests that have already arrived. `Err` once the controller
    /// is gone.
    pub fn poll_requests(&mut self) -> Result<usize, RemoteError> {
        self.responser
            .serve_pending(&mut self.server, MAX_REQUESTS_PER_TURN)
    }

    /// Run one pacing tick now.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn tick_at(&mut self, start: Instant) {
        let due = self.pacer.next_due();
        self.server.tick(start);
        let end = Instant::now();
        self.stats.record(due, start, end);
        self.pacer.finish(start, end);
    }

    fn report_pacing(&mut self) {
        if self.last_report.elapsed() < REPORT_INTERVAL {
            return;
        }
        self.last_report = Instant::now();
        let r = self.stats.take_report();
        if r.ticks == 0 {
            return;
        }
        log::debug!(
            target: "executor",
            "ticks={} work avg={:?} max={:?} late max={:?} dropped={} (total {})",
            r.ticks, r.mean_work, r.max_work, r.max_late, r.dropped_frames, r.total_dropped
        );
        if r.dropped_frames > 0 && self.server.state().is_running() {
            log::warn!(target: "executor", "{} frame(s) dropped in the last window", r.dropped_frames);
        }
    }

    pub fn state(&self) -> SessionState {
        self.server.state()
    }

    pub fn cycles(&self) -> u64 {
        self.server.cycles()
    }

    pub fn freq_scale(&self) -> f64 {
        self.server.freq_scale()
    }

    pub fn buttons(&self) -> Buttons {
        self.server.buttons()
    }

    pub fn rom(&self) -> Option<&CartInfo> {
        self.server.rom()
    }

    pub fn core(&self) -> &C {
        self.server.core()
    }

    pub fn core_mut(&mut self) -> &mut C {
        self.server.core_mut()
    }

    /// Set while `run` is looping.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

/// Handle to an executor running on its own thread.
pub struct ExecutorHandle {
    join_handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl ExecutorHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Wait for the thread to exit. It exits once every controller-side
    /// port has been dropped.
    pub fn join(mut self) -> Result<(), String> {
        match self.join_handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| "executor thread panicked".to_string()),
            None => Ok(()),
        }
    }
}

/// Start an executor on a thread named `ygb-executor`. The core is built on
/// that thread, so it need not be `Send`.
pub fn spawn<C, F>(options: ExecutorOptions, make_core: F) -> Result<(ClientPorts, ExecutorHandle), String>
where
    C: EmuCore + 'static,
    F: FnOnce(f64, f32, CoreUpcalls) -> C + Send + 'static,
{
    let (client, ports) = link(options.audio_channel_depth);
    let running = Arc::new(AtomicBool::new(false));
    let thread_running = Arc::clone(&running);

    let join_handle = thread::Builder::new()
        .name("ygb-executor".into())
        .spawn(move || {
            let mut executor = Executor::new(ports, options, make_core);
            executor.running = thread_running;
            executor.run();
        })
        .map_err(|e| format!("Failed to spawn executor thread: {}", e))?;

    Ok((
        client,
        ExecutorHandle {
            join_handle: Some(join_handle),
            running,
        },
    ))
}
