//! Data the opaque core hands back to the host.

use serde::{Deserialize, Serialize};

/// Severity of a core or executor log line. Also used as the controller's
/// display filter, where `Off` hides everything.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    #[default]
    Info = 3,
    Debug = 4,
}

impl LogLevel {
    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Off => "Off",
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
        }
    }

    /// Case-insensitive parse of [`LogLevel::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        [
            LogLevel::Off,
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
        ]
        .into_iter()
        .find(|level| level.name().eq_ignore_ascii_case(name))
    }

    /// Whether a line at `level` passes this filter.
    pub fn allows(self, level: LogLevel) -> bool {
        level != LogLevel::Off && level <= self
    }
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogItem {
    pub level: LogLevel,
    pub msg: String,
}

impl LogItem {
    pub fn new(level: LogLevel, msg: impl Into<String>) -> Self {
        Self {
            level,
            msg: msg.into(),
        }
    }
}

/// Register and flag dump taken after a core advance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub ime: bool,
    pub halted: bool,
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub pc: u16,
    pub sp: u16,
    pub zero: bool,
    pub negative: bool,
    pub half_carry: bool,
    pub carry: bool,
    /// Disassembly of the instruction at `pc`.
    pub inst: String,
    /// The three bytes starting at `pc`.
    pub next_bytes: [u8; 3],
}

/// Cartridge header metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartInfo {
    pub title: String,
    pub cart_type: String,
    /// ROM size in bytes.
    pub rom_size: u32,
    /// External RAM size in bytes.
    pub ram_size: u32,
    pub dest: String,
    pub publisher: String,
    pub version: u8,
}
