//! Per-node render callbacks

use crate::foundation::math::Mat4;
use crate::render::gpu::GpuCommands;

/// Something that issues draw commands for a scene node
///
/// Called during scene traversal with the node's world matrix already
/// multiplied onto the model-view stack. `world` is passed along for
/// renderables that need it directly (lighting, billboards).
pub trait Renderable {
    /// Issue the draw commands for this node
    fn render(&self, gpu: &mut dyn GpuCommands, world: &Mat4);
}

impl<F> Renderable for F
where
    F: Fn(&mut dyn GpuCommands, &Mat4),
{
    fn render(&self, gpu: &mut dyn GpuCommands, world: &Mat4) {
        self(gpu, world);
    }
}
