//! Controller -> executor RPC surface.

use ygb_transport::Message;

use crate::{Buttons, CanvasHandle, CartInfo, SessionState};

#[derive(Debug)]
pub enum Request {
    LoadRom { rom: Vec<u8> },
    Ping { msg: String },
    SetCanvas(CanvasHandle),
    SetTilesCanvas(CanvasHandle),
    BtnAction(Buttons),
    SetFreqScale(f64),
    /// 0..=100
    SetVolume(u8),
    Start,
    Pause,
    Step,
    Shutdown,
    Save,
    Load { data: Vec<u8>, state: SessionState },
}

impl Message for Request {
    fn kind(&self) -> &'static str {
        match self {
            Request::LoadRom { .. } => "load-rom",
            Request::Ping { .. } => "ping",
            Request::SetCanvas(_) => "set-canvas",
            Request::SetTilesCanvas(_) => "tile-canvas",
            Request::BtnAction(_) => "btn-action",
            Request::SetFreqScale(_) => "set-fscale",
            Request::SetVolume(_) => "set-volume",
            Request::Start => "start",
            Request::Pause => "pause",
            Request::Step => "step",
            Request::Shutdown => "shutdown",
            Request::Save => "save",
            Request::Load { .. } => "load",
        }
    }
}

/// Successful RPC results.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    None,
    Cart(CartInfo),
    Pong(String),
    Saved { data: Vec<u8>, state: SessionState },
}
