//! Window size provider
//!
//! Viewports never cache pixel sizes. Every operation that needs them asks a
//! [`WindowSize`] for the current framebuffer dimensions, so resizes between
//! frames need no notification.

use serde::{Deserialize, Serialize};

/// Source of the current drawable size in pixels
pub trait WindowSize {
    /// Current `(width, height)` in pixels
    fn window_size(&self) -> (u32, u32);
}

/// Fixed window dimensions, useful for headless rendering and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WindowExtent {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl WindowExtent {
    /// Create an extent
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl WindowSize for WindowExtent {
    fn window_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl WindowSize for (u32, u32) {
    fn window_size(&self) -> (u32, u32) {
        *self
    }
}

impl<T: WindowSize + ?Sized> WindowSize for &T {
    fn window_size(&self) -> (u32, u32) {
        (**self).window_size()
    }
}

#[cfg(feature = "glfw")]
impl WindowSize for glfw::Window {
    /// Framebuffer size, which differs from the window size on HiDPI displays
    fn window_size(&self) -> (u32, u32) {
        let (width, height) = self.get_framebuffer_size();
        (width.max(0).unsigned_abs(), height.max(0).unsigned_abs())
    }
}
