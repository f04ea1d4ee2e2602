use std::collections::VecDeque;

use ygb_types::{CartInfo, CpuSnapshot, LogItem, RomChange, SaveMetadata, SessionState, UpdateBundle};

/// Log lines kept for display.
const LOG_HISTORY: usize = 512;

/// Controller-side mirror of executor state.
///
/// Updated only from broadcasts, so it may lag the executor. Never
/// authoritative.
#[derive(Debug, Clone, Default)]
pub struct Stat {
    pub state: SessionState,
    pub cycles: u64,
    pub cpu: Option<CpuSnapshot>,
    /// All serial output since the controller started.
    pub serial: Vec<u8>,
    pub rom: Option<CartInfo>,
    pub fps: Option<f64>,
    /// Last core fault reported.
    pub error: Option<String>,
    /// Metadata for the next save; set when a cart is opened or a save
    /// loaded, cleared when the cart is ejected.
    pub save_metadata: Option<SaveMetadata>,
    /// Most recent log lines that passed the filter, oldest first.
    pub logs: VecDeque<LogItem>,
}

impl Stat {
    pub fn apply(&mut self, bundle: &UpdateBundle) {
        if let Some(state) = bundle.state {
            self.state = state;
            if state != SessionState::Running {
                self.fps = None;
            }
        }
        if let Some(cycles) = bundle.cycles {
            self.cycles = cycles;
        }
        if let Some(cpu) = &bundle.cpu {
            self.cpu = Some(cpu.clone());
        }
        if let Some(bytes) = &bundle.serial {
            self.serial.extend_from_slice(bytes);
        }
        match &bundle.rom {
            Some(RomChange::Inserted(info)) => self.rom = Some(info.clone()),
            Some(RomChange::Ejected) => {
                self.rom = None;
                self.save_metadata = None;
            }
            None => {}
        }
        if let Some(fps) = bundle.fps {
            self.fps = Some(fps);
        }
        if let Some(err) = &bundle.error {
            self.error = Some(err.clone());
        }
    }

    pub fn push_log(&mut self, item: LogItem) {
        if self.logs.len() == LOG_HISTORY {
            self.logs.pop_front();
        }
        self.logs.push_back(item);
    }

    /// Serial output as text, invalid UTF-8 replaced.
    pub fn serial_text(&self) -> String {
        String::from_utf8_lossy(&self.serial).into_owned()
    }
}
