//! Viewports
//!
//! A [`Viewport`] is a normalized rectangle over the window. Its pixel
//! rectangle is recomputed from the current window size on every call and
//! never cached, so resizes between frames are picked up automatically.
//!
//! Values in the normalized rectangle are usually within `[0, 1]` but are not
//! clamped: a viewport may extend past the window edge or overlap another.

use crate::core::config::ViewportConfig;
use crate::foundation::math::{Mat4, Ray, Vec2};
use crate::foundation::rect::{Rect, ShapeError};
use crate::scene::{NodeId, SceneGraph};

use super::camera::{Camera, CameraId, CameraRegistry};
use super::gpu::{
    AttributeScope, ClearMask, GpuCommands, GpuError, MatrixMode, MatrixScope, PixelRegion,
    RenderState, ScissorScope,
};
use super::window::WindowSize;
use super::ViewError;

/// A region of the window rendered through one camera
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    rect: Rect,
    camera: Option<CameraId>,
    scene_root: Option<NodeId>,
    clear_color: Option<[f32; 4]>,
    render_state: RenderState,
}

impl Viewport {
    /// Create a viewport covering `rect`, a normalized rectangle where
    /// `[[0, 0], [1, 1]]` is the whole window
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            camera: None,
            scene_root: None,
            clear_color: None,
            render_state: RenderState::default(),
        }
    }

    /// Viewport covering the whole window
    pub fn full_window() -> Self {
        Self::new(Rect::new(Vec2::zeros(), Vec2::new(1.0, 1.0)))
    }

    /// Create from untyped `[x, y, width, height]` data
    pub fn try_from_slice(values: &[f32]) -> Result<Self, ShapeError> {
        Ok(Self::new(Rect::try_from_slice(values)?))
    }

    /// Create from configuration; the camera binding is resolved by the caller
    pub fn from_config(config: &ViewportConfig) -> Self {
        Self {
            clear_color: config.clear_color,
            render_state: config.render_state,
            ..Self::new(Rect::from_rows(config.rect))
        }
    }

    /// Normalized rectangle
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Replace the normalized rectangle
    pub fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    /// Normalized x of the origin
    pub fn ratio_x(&self) -> f32 {
        self.rect.x()
    }

    /// Normalized y of the origin
    pub fn ratio_y(&self) -> f32 {
        self.rect.y()
    }

    /// Normalized width
    pub fn ratio_width(&self) -> f32 {
        self.rect.width()
    }

    /// Normalized height
    pub fn ratio_height(&self) -> f32 {
        self.rect.height()
    }

    /// Bind a camera; the viewport does not own it
    pub fn set_camera(&mut self, camera: CameraId) {
        self.camera = Some(camera);
    }

    /// Unbind the camera
    pub fn clear_camera(&mut self) {
        self.camera = None;
    }

    /// Bound camera handle, which may be stale
    pub fn camera(&self) -> Option<CameraId> {
        self.camera
    }

    /// Bind (or unbind) the scene root rendered by this viewport
    pub fn set_scene_root(&mut self, root: Option<NodeId>) {
        self.scene_root = root;
    }

    /// Bound scene root
    pub fn scene_root(&self) -> Option<NodeId> {
        self.scene_root
    }

    /// Color used when clearing, `None` keeps the current clear color
    pub fn set_clear_color(&mut self, color: Option<[f32; 4]>) {
        self.clear_color = color;
    }

    /// Pipeline state applied while rendering
    pub fn render_state(&self) -> &RenderState {
        &self.render_state
    }

    /// Replace the pipeline state applied while rendering
    pub fn set_render_state(&mut self, state: RenderState) {
        self.render_state = state;
    }

    /// Pixel rectangle for the current window size
    pub fn pixel_rect<W: WindowSize + ?Sized>(&self, window: &W) -> Rect {
        let (width, height) = window.window_size();
        self.rect.scale_by_vector(Vec2::new(width as f32, height as f32))
    }

    /// Integer pixel region for GPU commands
    pub fn pixel_region<W: WindowSize + ?Sized>(&self, window: &W) -> PixelRegion {
        PixelRegion::from_rect(&self.pixel_rect(window))
    }

    /// Width over height of the pixel rectangle, `None` when it has no height
    pub fn aspect_ratio<W: WindowSize + ?Sized>(&self, window: &W) -> Option<f32> {
        let extents = self.pixel_rect(window).extents();
        let height = extents.height();
        (height > 0.0).then(|| extents.width() / height)
    }

    /// Set the GPU viewport to this viewport's pixel region
    pub fn activate<W: WindowSize + ?Sized>(&self, window: &W, gpu: &mut dyn GpuCommands) {
        let region = self.pixel_region(window);
        log::trace!("Activating viewport {:?}", region);
        gpu.set_viewport(region);
    }

    /// Clear this viewport's region only
    ///
    /// The scissor test is enabled around the clear and disabled again on
    /// every path, including when the clear itself fails.
    pub fn clear<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        mask: ClearMask,
        gpu: &mut dyn GpuCommands,
    ) -> Result<(), GpuError> {
        let mut scissor = ScissorScope::enable(gpu, self.pixel_region(window));
        if let Some(color) = self.clear_color {
            scissor.set_clear_color(color);
        }
        scissor.clear(mask)
    }

    /// Whether an absolute pixel position lies within this viewport
    pub fn is_point_within_viewport<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        point: Vec2,
    ) -> bool {
        self.pixel_rect(window).contains_point(point)
    }

    /// Convert an absolute pixel position to viewport-relative pixels
    pub fn point_relative_to_viewport<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        point: Vec2,
    ) -> Vec2 {
        self.pixel_rect(window).make_relative(point)
    }

    /// Cast a ray through a point given relative to this viewport's
    /// bottom-left corner
    ///
    /// Fails with [`ViewError::OutOfBounds`] when the point lies outside the
    /// pixel rectangle and [`ViewError::NoCamera`] when no live camera is bound.
    pub fn relative_point_to_ray<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        point: Vec2,
        cameras: &CameraRegistry,
        scene: &SceneGraph,
    ) -> Result<Ray, ViewError> {
        let pixel_rect = self.pixel_rect(window);
        if !pixel_rect.contains_relative_point(point) {
            return Err(ViewError::OutOfBounds { x: point.x, y: point.y });
        }
        let camera = self.resolve_camera(cameras, scene).ok_or(ViewError::NoCamera)?;
        camera.point_to_ray(scene, &pixel_rect, pixel_rect.make_absolute(point))
    }

    /// Cast a ray through an absolute pixel position
    pub fn point_to_ray<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        point: Vec2,
        cameras: &CameraRegistry,
        scene: &SceneGraph,
    ) -> Result<Ray, ViewError> {
        let pixel_rect = self.pixel_rect(window);
        if !pixel_rect.contains_point(point) {
            return Err(ViewError::OutOfBounds { x: point.x, y: point.y });
        }
        let camera = self.resolve_camera(cameras, scene).ok_or(ViewError::NoCamera)?;
        camera.point_to_ray(scene, &pixel_rect, point)
    }

    /// Render the bound scene root through the bound camera
    ///
    /// Does nothing when no live scene root is bound. Without a usable camera
    /// the scene is rendered with whatever matrices are current. Never fails:
    /// problems are logged and the frame degrades.
    pub fn render<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        cameras: &CameraRegistry,
        scene: &SceneGraph,
        gpu: &mut dyn GpuCommands,
    ) {
        let Some(root) = self.live_scene_root(scene) else {
            return;
        };

        self.activate(window, gpu);
        let mut attributes = AttributeScope::push(gpu, &self.render_state);

        match self.camera_matrices(window, cameras, scene) {
            Some((projection, model_view)) => {
                let mut projection =
                    MatrixScope::load(&mut *attributes, MatrixMode::Projection, &projection);
                let mut model_view =
                    MatrixScope::load(&mut *projection, MatrixMode::ModelView, &model_view);
                render_root(scene, root, &mut *model_view);
            }
            None => render_root(scene, root, &mut *attributes),
        }
    }

    /// Orthographic projection mapping pixels of this viewport 1:1, origin
    /// at the bottom-left, depth in `[-1, 1]`
    pub fn overlay_projection<W: WindowSize + ?Sized>(&self, window: &W) -> Mat4 {
        let extents = self.pixel_rect(window).extents();
        let (width, height) = (extents.width().max(1.0), extents.height().max(1.0));

        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / width;
        result[(1, 1)] = 2.0 / height;
        result[(2, 2)] = -1.0;
        result[(0, 3)] = -1.0;
        result[(1, 3)] = -1.0;
        result
    }

    /// Render a subtree as a 2D overlay in viewport pixel space
    ///
    /// Depth testing is disabled, the projection is
    /// [`Viewport::overlay_projection`] and the model-view starts at identity.
    pub fn render_overlay<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        scene: &SceneGraph,
        root: NodeId,
        gpu: &mut dyn GpuCommands,
    ) {
        if !scene.contains(root) {
            log::warn!("Overlay root {:?} no longer exists", root);
            return;
        }

        self.activate(window, gpu);
        let state = RenderState {
            depth_test: false,
            ..self.render_state
        };
        let mut attributes = AttributeScope::push(gpu, &state);
        let overlay = self.overlay_projection(window);
        let mut projection = MatrixScope::load(&mut *attributes, MatrixMode::Projection, &overlay);
        let mut model_view =
            MatrixScope::load(&mut *projection, MatrixMode::ModelView, &Mat4::identity());
        render_root(scene, root, &mut *model_view);
    }

    /// Bound camera, `None` when unbound, removed from the registry, or when
    /// its node is gone from `scene`
    fn resolve_camera<'a>(
        &self,
        cameras: &'a CameraRegistry,
        scene: &SceneGraph,
    ) -> Option<&'a Camera> {
        let id = self.camera?;
        let Some(camera) = cameras.get(id) else {
            log::warn!("Viewport camera {:?} no longer exists", id);
            return None;
        };
        if !scene.contains(camera.node()) {
            log::warn!("Node of viewport camera {:?} no longer exists", id);
            return None;
        }
        Some(camera)
    }

    fn live_scene_root(&self, scene: &SceneGraph) -> Option<NodeId> {
        let root = self.scene_root?;
        if scene.contains(root) {
            Some(root)
        } else {
            log::warn!("Viewport scene root {:?} no longer exists", root);
            None
        }
    }

    /// Projection and model-view for this frame, `None` when there is no
    /// usable camera
    fn camera_matrices<W: WindowSize + ?Sized>(
        &self,
        window: &W,
        cameras: &CameraRegistry,
        scene: &SceneGraph,
    ) -> Option<(Mat4, Mat4)> {
        let camera = self.resolve_camera(cameras, scene)?;
        let Some(aspect) = self.aspect_ratio(window) else {
            log::debug!("Viewport has no height, skipping camera matrices");
            return None;
        };
        match camera.model_view_matrix(scene) {
            Ok(model_view) => Some((camera.projection_matrix(aspect), model_view)),
            Err(e) => {
                log::warn!("Skipping camera matrices: {}", e);
                None
            }
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::full_window()
    }
}

fn render_root(scene: &SceneGraph, root: NodeId, gpu: &mut dyn GpuCommands) {
    if let Err(e) = scene.render(root, gpu) {
        log::warn!("Scene render aborted: {}", e);
    }
}
