//! Drawing surfaces handed to the core.
//!
//! Rendering itself is the core's business; the host only moves the surface
//! across the thread boundary and asks it for a 2D context.

use std::fmt;

/// A 2D drawing context the core renders into.
pub trait DrawContext: Send {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);
    /// Replace the whole surface with an RGBA8 frame of `size()` pixels.
    fn put_frame(&mut self, rgba: &[u8]);
}

/// An owned surface that may or may not yield a usable context.
pub trait Canvas: Send {
    fn context_2d(self: Box<Self>) -> Option<Box<dyn DrawContext>>;
}

/// A canvas in transit inside a request.
pub struct CanvasHandle(Box<dyn Canvas>);

impl CanvasHandle {
    pub fn new(canvas: impl Canvas + 'static) -> Self {
        Self(Box::new(canvas))
    }

    pub fn context_2d(self) -> Option<Box<dyn DrawContext>> {
        self.0.context_2d()
    }
}

impl fmt::Debug for CanvasHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CanvasHandle(..)")
    }
}
