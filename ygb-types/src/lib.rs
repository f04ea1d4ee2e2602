//! # ygb-types
//!
//! Shared type definitions for the ygb emulator host.
//! Used by the executor, the controller and the save tooling.

mod canvas;
mod emu;
pub mod event;
mod input;
pub mod request;
mod save;
pub mod session;

pub use canvas::{Canvas, CanvasHandle, DrawContext};
pub use emu::{CartInfo, CpuSnapshot, LogItem, LogLevel};
pub use event::{RomChange, ServerEvent, UpdateBundle};
pub use input::{Button, Buttons};
pub use request::{Reply, Request};
pub use save::{SaveMetadata, SaveMode, SaveRecord};
pub use session::{Control, SessionState, Transition};

/// Nominal CPU clock of the emulated machine.
pub const BASE_FREQ_HZ: u32 = 4_194_304;
/// Nominal visual refresh rate.
pub const VISUAL_FREQ_HZ: f64 = 59.7;
pub const MS_PER_FRAME: f64 = 1000.0 / VISUAL_FREQ_HZ;
/// Cycles in one nominal frame at scale 1.0 (not floored).
pub const CYCLES_PER_FRAME: f64 = BASE_FREQ_HZ as f64 / VISUAL_FREQ_HZ;

pub const DEFAULT_VOLUME: u8 = 50;
pub const BASE_AUDIO_SAMPLE_RATE: u32 = 48_000;

pub const SCREEN_WIDTH: u32 = 160;
pub const SCREEN_HEIGHT: u32 = 144;
pub const TILE_BITMAP_WIDTH: u32 = 128;
pub const TILE_BITMAP_HEIGHT: u32 = 192;

/// Wall clock in epoch milliseconds. Clocks set before 1970 read as 0.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_constants() {
        assert!((MS_PER_FRAME - 16.7504).abs() < 1e-3);
        assert_eq!(CYCLES_PER_FRAME.floor() as u64, 70_256);
    }
}
