//! GPU command surface
//!
//! The core never calls a graphics API directly. Everything it needs from the
//! GPU goes through [`GpuCommands`], a small fixed-function style command
//! sink (viewport, scissor, clear, attribute and matrix stacks). Bindings to
//! an actual context implement the trait; [`CommandRecorder`] implements it by
//! logging commands, which is what tests and headless tools use.
//!
//! Shared GPU state is only touched through scoped guards:
//! [`ScissorScope`], [`AttributeScope`] and [`MatrixScope`] restore the state
//! they changed when dropped, including on early return.

use std::ops::{Deref, DerefMut};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::foundation::math::Mat4;
use crate::foundation::rect::Rect;

bitflags! {
    /// Buffers affected by a clear, values match the OpenGL bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        /// Depth buffer
        const DEPTH = 0x0000_0100;
        /// Stencil buffer
        const STENCIL = 0x0000_0400;
        /// Color buffer
        const COLOR = 0x0000_4000;
    }
}

impl Default for ClearMask {
    fn default() -> Self {
        Self::COLOR | Self::DEPTH
    }
}

/// Toggleable pipeline capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Depth (z-buffer) testing
    DepthTest,
    /// Scissor rectangle testing
    ScissorTest,
    /// Rescaling of normals by the inverse model-view scale
    RescaleNormal,
    /// Back face culling
    CullFace,
    /// Alpha blending
    Blend,
}

/// Shading interpolation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadeModel {
    /// One color per primitive
    Flat,
    /// Interpolated colors
    #[default]
    Smooth,
}

/// Matrix stack selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    /// Projection matrix stack
    Projection,
    /// Model-view matrix stack
    ModelView,
}

/// Primitive topology for draw calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Individual points
    Points,
    /// Line segments
    Lines,
    /// Triangle list
    Triangles,
    /// Triangle strip
    TriangleStrip,
}

/// Integer pixel rectangle handed to viewport and scissor commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelRegion {
    /// Left edge in pixels
    pub x: i32,
    /// Bottom edge in pixels
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl PixelRegion {
    /// Build a region from a pixel rectangle
    ///
    /// Uses the normalized extents, so inverted rectangles still give a
    /// non-negative size. Values are truncated toward zero.
    pub fn from_rect(rect: &Rect) -> Self {
        let e = rect.extents();
        Self {
            x: e.left as i32,
            y: e.bottom as i32,
            width: e.width() as i32,
            height: e.height() as i32,
        }
    }
}

/// Per-viewport pipeline state applied inside an [`AttributeScope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderState {
    /// Enable the z-buffer
    pub depth_test: bool,
    /// Shading model
    pub shade_model: ShadeModel,
    /// Rescale normals affected by scene graph scaling
    pub rescale_normal: bool,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            depth_test: true,
            shade_model: ShadeModel::Smooth,
            rescale_normal: true,
        }
    }
}

impl RenderState {
    /// Issue the commands for this state
    pub fn apply(&self, gpu: &mut (impl GpuCommands + ?Sized)) {
        gpu.set_capability(Capability::DepthTest, self.depth_test);
        gpu.set_shade_model(self.shade_model);
        gpu.set_capability(Capability::RescaleNormal, self.rescale_normal);
    }
}

/// Errors reported by a command sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// The clear command was rejected
    #[error("clear failed: {0}")]
    ClearFailed(String),
}

/// Opaque sink for GPU commands
///
/// All methods mirror fixed-function OpenGL entry points. Only `clear` can
/// report failure; everything else is fire-and-forget.
pub trait GpuCommands {
    /// Set the viewport transform region
    fn set_viewport(&mut self, region: PixelRegion);

    /// Enable or disable a capability
    fn set_capability(&mut self, capability: Capability, enabled: bool);

    /// Set the scissor rectangle
    fn set_scissor(&mut self, region: PixelRegion);

    /// Set the color used by color clears
    fn set_clear_color(&mut self, color: [f32; 4]);

    /// Clear the selected buffers
    fn clear(&mut self, mask: ClearMask) -> Result<(), GpuError>;

    /// Save all attribute state
    fn push_attributes(&mut self);

    /// Restore the last saved attribute state
    fn pop_attributes(&mut self);

    /// Select the shading model
    fn set_shade_model(&mut self, model: ShadeModel);

    /// Duplicate the top of a matrix stack
    fn push_matrix(&mut self, mode: MatrixMode);

    /// Discard the top of a matrix stack
    fn pop_matrix(&mut self, mode: MatrixMode);

    /// Replace the top of a matrix stack
    fn load_matrix(&mut self, mode: MatrixMode, matrix: &Mat4);

    /// Post-multiply the top of a matrix stack
    fn multiply_matrix(&mut self, mode: MatrixMode, matrix: &Mat4);

    /// Draw `count` vertices starting at `first` from the bound arrays
    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32);
}

/// Scissor test enabled over a region, disabled again on drop
pub struct ScissorScope<'a, G: GpuCommands + ?Sized> {
    gpu: &'a mut G,
}

impl<'a, G: GpuCommands + ?Sized> ScissorScope<'a, G> {
    /// Enable scissor testing restricted to `region`
    pub fn enable(gpu: &'a mut G, region: PixelRegion) -> Self {
        gpu.set_capability(Capability::ScissorTest, true);
        gpu.set_scissor(region);
        Self { gpu }
    }
}

impl<G: GpuCommands + ?Sized> Deref for ScissorScope<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.gpu
    }
}

impl<G: GpuCommands + ?Sized> DerefMut for ScissorScope<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        self.gpu
    }
}

impl<G: GpuCommands + ?Sized> Drop for ScissorScope<'_, G> {
    fn drop(&mut self) {
        self.gpu.set_capability(Capability::ScissorTest, false);
    }
}

/// Saved attribute state with a [`RenderState`] applied, restored on drop
pub struct AttributeScope<'a, G: GpuCommands + ?Sized> {
    gpu: &'a mut G,
}

impl<'a, G: GpuCommands + ?Sized> AttributeScope<'a, G> {
    /// Save all attributes, then apply `state`
    pub fn push(gpu: &'a mut G, state: &RenderState) -> Self {
        gpu.push_attributes();
        state.apply(&mut *gpu);
        Self { gpu }
    }
}

impl<G: GpuCommands + ?Sized> Deref for AttributeScope<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.gpu
    }
}

impl<G: GpuCommands + ?Sized> DerefMut for AttributeScope<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        self.gpu
    }
}

impl<G: GpuCommands + ?Sized> Drop for AttributeScope<'_, G> {
    fn drop(&mut self) {
        self.gpu.pop_attributes();
    }
}

/// Pushed matrix stack entry, popped on drop
pub struct MatrixScope<'a, G: GpuCommands + ?Sized> {
    gpu: &'a mut G,
    mode: MatrixMode,
}

impl<'a, G: GpuCommands + ?Sized> MatrixScope<'a, G> {
    /// Push the stack and replace the top with `matrix`
    pub fn load(gpu: &'a mut G, mode: MatrixMode, matrix: &Mat4) -> Self {
        gpu.push_matrix(mode);
        gpu.load_matrix(mode, matrix);
        Self { gpu, mode }
    }

    /// Push the stack and post-multiply the top by `matrix`
    pub fn multiply(gpu: &'a mut G, mode: MatrixMode, matrix: &Mat4) -> Self {
        gpu.push_matrix(mode);
        gpu.multiply_matrix(mode, matrix);
        Self { gpu, mode }
    }
}

impl<G: GpuCommands + ?Sized> Deref for MatrixScope<'_, G> {
    type Target = G;

    fn deref(&self) -> &G {
        self.gpu
    }
}

impl<G: GpuCommands + ?Sized> DerefMut for MatrixScope<'_, G> {
    fn deref_mut(&mut self) -> &mut G {
        self.gpu
    }
}

impl<G: GpuCommands + ?Sized> Drop for MatrixScope<'_, G> {
    fn drop(&mut self) {
        self.gpu.pop_matrix(self.mode);
    }
}

/// A command captured by [`CommandRecorder`]
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// `set_viewport`
    SetViewport(PixelRegion),
    /// `set_capability`
    SetCapability(Capability, bool),
    /// `set_scissor`
    SetScissor(PixelRegion),
    /// `set_clear_color`
    SetClearColor([f32; 4]),
    /// `clear`
    Clear(ClearMask),
    /// `push_attributes`
    PushAttributes,
    /// `pop_attributes`
    PopAttributes,
    /// `set_shade_model`
    SetShadeModel(ShadeModel),
    /// `push_matrix`
    PushMatrix(MatrixMode),
    /// `pop_matrix`
    PopMatrix(MatrixMode),
    /// `load_matrix`
    LoadMatrix(MatrixMode, Mat4),
    /// `multiply_matrix`
    MultiplyMatrix(MatrixMode, Mat4),
    /// `draw_arrays`
    DrawArrays {
        /// Topology
        primitive: Primitive,
        /// First vertex
        first: u32,
        /// Vertex count
        count: u32,
    },
}

/// Command sink that records everything it receives
///
/// Tracks attribute and matrix stack depth so callers can check that every
/// push was matched by a pop. Clears can be made to fail to exercise error
/// paths.
#[derive(Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<GpuCommand>,
    attribute_depth: i32,
    projection_depth: i32,
    model_view_depth: i32,
    fail_clears: bool,
}

impl CommandRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands in issue order
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the log empty
    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Make subsequent clears fail (or succeed again)
    pub fn set_fail_clears(&mut self, fail: bool) {
        self.fail_clears = fail;
    }

    /// Current attribute stack depth relative to creation
    pub fn attribute_depth(&self) -> i32 {
        self.attribute_depth
    }

    /// Current matrix stack depth relative to creation
    pub fn matrix_depth(&self, mode: MatrixMode) -> i32 {
        match mode {
            MatrixMode::Projection => self.projection_depth,
            MatrixMode::ModelView => self.model_view_depth,
        }
    }

    /// Whether every push so far has been matched by a pop
    pub fn is_balanced(&self) -> bool {
        self.attribute_depth == 0 && self.projection_depth == 0 && self.model_view_depth == 0
    }

    /// Last value set for a capability, if any
    pub fn capability(&self, capability: Capability) -> Option<bool> {
        self.commands.iter().rev().find_map(|command| match command {
            GpuCommand::SetCapability(c, enabled) if *c == capability => Some(*enabled),
            _ => None,
        })
    }

    fn depth_mut(&mut self, mode: MatrixMode) -> &mut i32 {
        match mode {
            MatrixMode::Projection => &mut self.projection_depth,
            MatrixMode::ModelView => &mut self.model_view_depth,
        }
    }
}

impl GpuCommands for CommandRecorder {
    fn set_viewport(&mut self, region: PixelRegion) {
        self.commands.push(GpuCommand::SetViewport(region));
    }

    fn set_capability(&mut self, capability: Capability, enabled: bool) {
        self.commands.push(GpuCommand::SetCapability(capability, enabled));
    }

    fn set_scissor(&mut self, region: PixelRegion) {
        self.commands.push(GpuCommand::SetScissor(region));
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.commands.push(GpuCommand::SetClearColor(color));
    }

    fn clear(&mut self, mask: ClearMask) -> Result<(), GpuError> {
        if self.fail_clears {
            return Err(GpuError::ClearFailed(format!("{mask:?} rejected")));
        }
        self.commands.push(GpuCommand::Clear(mask));
        Ok(())
    }

    fn push_attributes(&mut self) {
        self.attribute_depth += 1;
        self.commands.push(GpuCommand::PushAttributes);
    }

    fn pop_attributes(&mut self) {
        self.attribute_depth -= 1;
        self.commands.push(GpuCommand::PopAttributes);
    }

    fn set_shade_model(&mut self, model: ShadeModel) {
        self.commands.push(GpuCommand::SetShadeModel(model));
    }

    fn push_matrix(&mut self, mode: MatrixMode) {
        *self.depth_mut(mode) += 1;
        self.commands.push(GpuCommand::PushMatrix(mode));
    }

    fn pop_matrix(&mut self, mode: MatrixMode) {
        *self.depth_mut(mode) -= 1;
        self.commands.push(GpuCommand::PopMatrix(mode));
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: &Mat4) {
        self.commands.push(GpuCommand::LoadMatrix(mode, *matrix));
    }

    fn multiply_matrix(&mut self, mode: MatrixMode, matrix: &Mat4) {
        self.commands.push(GpuCommand::MultiplyMatrix(mode, *matrix));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) {
        self.commands.push(GpuCommand::DrawArrays { primitive, first, count });
    }
}
