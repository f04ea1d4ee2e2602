//! Headless drawing surface.
//!
//! Stands in for a window canvas: the core draws into it and the host can
//! read back the last frame.

use std::sync::{Arc, Mutex};

use ygb_types::{Canvas, DrawContext};

/// An off-screen RGBA canvas of fixed size. A zero-sized or unaddressably
/// large canvas cannot produce a context.
pub struct FrameCanvas {
    width: u32,
    height: u32,
    frame: Arc<Mutex<Vec<u8>>>,
}

/// Read side of a [`FrameCanvas`].
#[derive(Clone)]
pub struct FrameView {
    width: u32,
    height: u32,
    frame: Arc<Mutex<Vec<u8>>>,
}

impl FrameCanvas {
    pub fn new(width: u32, height: u32) -> (Self, FrameView) {
        let frame = Arc::new(Mutex::new(vec![0; frame_len(width, height).unwrap_or(0)]));
        (
            Self {
                width,
                height,
                frame: Arc::clone(&frame),
            },
            FrameView {
                width,
                height,
                frame,
            },
        )
    }
}

impl Canvas for FrameCanvas {
    fn context_2d(self: Box<Self>) -> Option<Box<dyn DrawContext>> {
        frame_len(self.width, self.height)?;
        Some(Box::new(FrameContext {
            width: self.width,
            height: self.height,
            frame: self.frame,
        }))
    }
}

/// RGBA byte length of a `width` x `height` frame. `None` when the frame is
/// empty or too large to address.
fn frame_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
        .filter(|&len| len > 0)
}

struct FrameContext {
    width: u32,
    height: u32,
    frame: Arc<Mutex<Vec<u8>>>,
}

impl DrawContext for FrameContext {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn put_frame(&mut self, rgba: &[u8]) {
        if let Ok(mut frame) = self.frame.lock() {
            let n = frame.len().min(rgba.len());
            frame[..n].copy_from_slice(&rgba[..n]);
        }
    }
}

impl FrameView {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Copy of the last frame drawn.
    pub fn snapshot(&self) -> Vec<u8> {
        self.frame.lock().map(|f| f.clone()).unwrap_or_default()
    }
}
