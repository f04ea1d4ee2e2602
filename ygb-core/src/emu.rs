//! Contract between the executor and the opaque emulation core.

use crossbeam_channel::Sender;
use ygb_types::{Buttons, CartInfo, CpuSnapshot, DrawContext, LogItem};

use crate::audio::AudioSender;

/// Input to a multi-cycle advance.
#[derive(Debug, Clone, Copy)]
pub struct UpdateInput {
    pub btns: Buttons,
    /// Cycle budget for this advance.
    pub cycles: u64,
    /// Wall clock, epoch milliseconds.
    pub timestamp: u64,
}

/// Input to a single-instruction advance.
#[derive(Debug, Clone, Copy)]
pub struct StepInput {
    pub btns: Buttons,
    pub timestamp: u64,
}

/// Result of `update` or `step`.
#[derive(Debug, Clone, Default)]
pub struct UpdateResult {
    /// Cycles actually executed by this call.
    pub cycles: u64,
    pub cpu: CpuSnapshot,
    /// Internal fault. The session is aborted when set.
    pub err: Option<String>,
}

/// The emulation engine. Treated as a black box.
pub trait EmuCore {
    fn update(&mut self, input: UpdateInput) -> UpdateResult;
    fn step(&mut self, input: StepInput) -> UpdateResult;
    fn load_cart(&mut self, rom: &[u8], timestamp: u64) -> Result<CartInfo, String>;
    /// Serialized machine state, or `None` if there is nothing to save.
    fn save(&mut self) -> Option<Vec<u8>>;
    /// Restore from `save` output. Returns false if the bytes are rejected.
    fn load(&mut self, data: &[u8]) -> bool;
    fn reset(&mut self);
    fn set_screen_canvas(&mut self, ctx: Box<dyn DrawContext>);
    fn set_tiles_canvas(&mut self, ctx: Box<dyn DrawContext>);
    /// 0.0..=1.0
    fn set_volume(&mut self, volume: f32);
    fn set_freq_scale(&mut self, scale: f64);
}

/// Callbacks the core uses to push data back to the host. Handed to the core
/// factory at construction; cheap to clone.
#[derive(Clone)]
pub struct CoreUpcalls {
    pub(crate) log_tx: Sender<Vec<LogItem>>,
    pub(crate) serial_tx: Sender<Vec<u8>>,
    pub(crate) audio: AudioSender,
}

impl CoreUpcalls {
    pub fn new(
        log_tx: Sender<Vec<LogItem>>,
        serial_tx: Sender<Vec<u8>>,
        audio: AudioSender,
    ) -> Self {
        Self {
            log_tx,
            serial_tx,
            audio,
        }
    }

    pub fn log_batch(&self, entries: Vec<LogItem>) {
        if !entries.is_empty() {
            let _ = self.log_tx.send(entries);
        }
    }

    pub fn serial(&self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            let _ = self.serial_tx.send(bytes);
        }
    }

    /// Non-blocking; the chunk is dropped if the audio side is behind.
    pub fn audio(&self, left: &[f32], right: &[f32]) {
        self.audio.send(left, right);
    }
}
