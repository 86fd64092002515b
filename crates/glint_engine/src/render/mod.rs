//! Rendering front end
//!
//! Cameras, viewports and the GPU command surface they drive. Each frame the
//! host asks every [`Viewport`] to clear and render; the viewport activates
//! its pixel region, saves GPU attribute state, pushes its camera's
//! projection and model-view matrices, renders its scene root and restores
//! everything in reverse order.
//!
//! Picking runs the other way: a pixel position enters a viewport, is checked
//! against the viewport's pixel rectangle and handed to the bound camera,
//! which unprojects it into a world-space [`Ray`](crate::foundation::math::Ray).

pub mod camera;
pub mod gpu;
pub mod viewport;
pub mod window;

#[cfg(test)]
mod tests;

pub use camera::{
    Camera, CameraId, CameraRegistry, OrthogonalViewMatrix, PerspectiveViewMatrix, ViewMatrix,
};
pub use gpu::{
    AttributeScope, Capability, ClearMask, CommandRecorder, GpuCommand, GpuCommands, GpuError,
    MatrixMode, MatrixScope, PixelRegion, Primitive, RenderState, ScissorScope, ShadeModel,
};
pub use viewport::Viewport;
pub use window::{WindowExtent, WindowSize};

use thiserror::Error;

use crate::scene::SceneError;

/// Errors from camera and picking operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    /// The point lies outside the viewport's pixel rectangle
    #[error("point ({x}, {y}) does not lie within the viewport")]
    OutOfBounds {
        /// Point x
        x: f32,
        /// Point y
        y: f32,
    },

    /// The viewport has no camera, or its camera was removed
    #[error("viewport has no camera")]
    NoCamera,

    /// A matrix needed for the operation is not invertible
    #[error("camera transform is degenerate")]
    DegenerateTransform,

    /// Scene graph lookup failed
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}
