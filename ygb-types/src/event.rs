//! Executor -> controller broadcasts.

use ygb_transport::EventMessage;

use crate::{CartInfo, CpuSnapshot, LogItem, SessionState};

#[derive(Debug, Clone, PartialEq)]
pub enum RomChange {
    Inserted(CartInfo),
    Ejected,
}

/// Per-tick telemetry. Every field is optional; absent means unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBundle {
    pub state: Option<SessionState>,
    /// Cycle counter since the last reset.
    pub cycles: Option<u64>,
    pub cpu: Option<CpuSnapshot>,
    /// Serial port output since the previous bundle.
    pub serial: Option<Vec<u8>>,
    pub rom: Option<RomChange>,
    pub fps: Option<f64>,
    /// Core fault that aborted the session.
    pub error: Option<String>,
}

impl UpdateBundle {
    pub fn state(state: SessionState) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Log(Vec<LogItem>),
    Update(UpdateBundle),
}

impl ServerEvent {
    pub const LOG: &'static str = "log";
    pub const UPDATE: &'static str = "update";
}

impl EventMessage for ServerEvent {
    fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Log(_) => Self::LOG,
            ServerEvent::Update(_) => Self::UPDATE,
        }
    }
}
