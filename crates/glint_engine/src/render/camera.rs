//! # Camera System
//!
//! A [`Camera`] is a transform node in the scene graph plus a pluggable
//! [`ViewMatrix`] strategy producing the projection. The model-view matrix is
//! the inverse of the node's world matrix, so cameras can be parented to any
//! scene node (a turret, a vehicle) and follow it.
//!
//! Cameras live in a [`CameraRegistry`]. Viewports hold a [`CameraId`] rather
//! than the camera itself, so removing a camera leaves viewports with a stale
//! handle that simply resolves to "no camera".
//!
//! ## Conventions
//! OpenGL style: right-handed view space looking down -Z, clip-space depth in
//! [-1, 1], window origin at the bottom-left.

use std::cell::Cell;
use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use super::ViewError;
use crate::foundation::math::{utils, Mat4, Quat, Ray, Vec2, Vec3};
use crate::foundation::rect::Rect;
use crate::scene::{NodeId, SceneGraph};

slotmap::new_key_type! {
    /// Handle to a camera stored in a [`CameraRegistry`]
    pub struct CameraId;
}

/// Projection strategy for a camera
pub trait ViewMatrix: fmt::Debug {
    /// Projection matrix for a viewport with the given width/height ratio
    fn matrix(&self, aspect_ratio: f32) -> Mat4;
}

/// Symmetric perspective frustum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveViewMatrix {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Distance to the near clipping plane (must be > 0)
    pub near_clip: f32,
    /// Distance to the far clipping plane (must be > near)
    pub far_clip: f32,
}

impl PerspectiveViewMatrix {
    /// Create from a vertical field of view in degrees
    pub fn from_degrees(fov_degrees: f32, near_clip: f32, far_clip: f32) -> Self {
        Self {
            fov_y: utils::deg_to_rad(fov_degrees),
            near_clip,
            far_clip,
        }
    }
}

impl Default for PerspectiveViewMatrix {
    fn default() -> Self {
        Self::from_degrees(60.0, 1.0, 100.0)
    }
}

impl ViewMatrix for PerspectiveViewMatrix {
    fn matrix(&self, aspect_ratio: f32) -> Mat4 {
        // P = [f/a  0   0            0          ]
        //     [0    f   0            0          ]
        //     [0    0   (f+n)/(n-f)  2fn/(n-f)  ]
        //     [0    0   -1           0          ]
        // with f = 1/tan(fov/2)
        let focal = 1.0 / (self.fov_y * 0.5).tan();
        let (near, far) = (self.near_clip, self.far_clip);

        let mut result = Mat4::zeros();
        result[(0, 0)] = focal / aspect_ratio;
        result[(1, 1)] = focal;
        result[(2, 2)] = (far + near) / (near - far);
        result[(2, 3)] = 2.0 * far * near / (near - far);
        result[(3, 2)] = -1.0;
        result
    }
}

/// Orthographic box
///
/// `scale` gives the half extents of the visible area; the aspect ratio only
/// widens the horizontal extent so square pixels stay square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrthogonalViewMatrix {
    /// Half extents `(x, y)` of the view volume before aspect correction
    pub scale: Vec2,
    /// Near clipping plane
    pub near_clip: f32,
    /// Far clipping plane
    pub far_clip: f32,
}

impl Default for OrthogonalViewMatrix {
    fn default() -> Self {
        Self {
            scale: Vec2::new(1.0, 1.0),
            near_clip: 1.0,
            far_clip: 200.0,
        }
    }
}

impl ViewMatrix for OrthogonalViewMatrix {
    fn matrix(&self, aspect_ratio: f32) -> Mat4 {
        let half_width = self.scale.x * aspect_ratio;
        let half_height = self.scale.y;
        let (near, far) = (self.near_clip, self.far_clip);

        let mut result = Mat4::identity();
        result[(0, 0)] = 1.0 / half_width;
        result[(1, 1)] = 1.0 / half_height;
        result[(2, 2)] = -2.0 / (far - near);
        result[(2, 3)] = -(far + near) / (far - near);
        result
    }
}

/// A viewpoint in the scene
#[derive(Debug)]
pub struct Camera {
    node: NodeId,
    view_matrix: Box<dyn ViewMatrix>,
    last_aspect: Cell<Option<f32>>,
}

impl Camera {
    /// Create a camera with a fresh root node in `scene`
    pub fn new(scene: &mut SceneGraph, name: &str, view_matrix: impl ViewMatrix + 'static) -> Self {
        let node = scene.create_node(name);
        Self::with_node(node, Box::new(view_matrix))
    }

    /// Create a camera around an existing node
    pub fn with_node(node: NodeId, view_matrix: Box<dyn ViewMatrix>) -> Self {
        Self {
            node,
            view_matrix,
            last_aspect: Cell::new(None),
        }
    }

    /// The camera's transform node
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Current projection strategy
    pub fn view_matrix(&self) -> &dyn ViewMatrix {
        self.view_matrix.as_ref()
    }

    /// Swap the projection strategy
    pub fn set_view_matrix(&mut self, view_matrix: Box<dyn ViewMatrix>) {
        log::debug!("Camera {:?} projection changed to {:?}", self.node, view_matrix);
        self.view_matrix = view_matrix;
    }

    /// Projection matrix for the given aspect ratio
    ///
    /// The aspect is supplied by the viewport every frame; the camera keeps
    /// the last value only to report changes.
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        let previous = self.last_aspect.replace(Some(aspect_ratio));
        if previous.map_or(true, |last| approx::abs_diff_ne!(last, aspect_ratio, epsilon = 0.01)) {
            log::debug!("Camera {:?} aspect ratio now {:.3}", self.node, aspect_ratio);
        }
        self.view_matrix.matrix(aspect_ratio)
    }

    /// Inverse of the camera node's world matrix
    pub fn model_view_matrix(&self, scene: &SceneGraph) -> Result<Mat4, ViewError> {
        scene
            .world_matrix(self.node)?
            .try_inverse()
            .ok_or(ViewError::DegenerateTransform)
    }

    /// Move the camera node (in its parent's space)
    pub fn set_position(&self, scene: &mut SceneGraph, position: Vec3) -> Result<(), ViewError> {
        scene.set_translation(self.node, position)?;
        log::trace!("Camera {:?} position updated to: {:?}", self.node, position);
        Ok(())
    }

    /// Rotate the camera node so it looks at `target` (in its parent's space)
    pub fn look_at(&self, scene: &mut SceneGraph, target: Vec3, up: Vec3) -> Result<(), ViewError> {
        let eye = scene.local_transform(self.node)?.translation;
        let backward = eye - target;
        if backward.norm_squared() <= f32::EPSILON
            || backward.cross(&up).norm_squared() <= f32::EPSILON
        {
            return Err(ViewError::DegenerateTransform);
        }
        // face_towards maps +Z onto the direction; cameras look down -Z
        scene.set_rotation(self.node, Quat::face_towards(&backward, &up))?;
        log::trace!("Camera {:?} look_at updated - target: {:?}, up: {:?}", self.node, target, up);
        Ok(())
    }

    /// Cast a world-space ray through an absolute pixel position
    ///
    /// `pixel_rect` is the viewport's current pixel rectangle. Fails with
    /// [`ViewError::OutOfBounds`] when the point lies outside it.
    pub fn point_to_ray(
        &self,
        scene: &SceneGraph,
        pixel_rect: &Rect,
        point: Vec2,
    ) -> Result<Ray, ViewError> {
        if !pixel_rect.contains_point(point) {
            return Err(ViewError::OutOfBounds { x: point.x, y: point.y });
        }

        let extents = pixel_rect.extents();
        let (width, height) = (extents.width(), extents.height());
        if width <= 0.0 || height <= 0.0 {
            return Err(ViewError::DegenerateTransform);
        }

        let relative = pixel_rect.make_relative(point);
        let ndc_x = relative.x / width * 2.0 - 1.0;
        let ndc_y = relative.y / height * 2.0 - 1.0;

        let projection = self.view_matrix.matrix(width / height);
        let model_view = self.model_view_matrix(scene)?;
        let inverse = (projection * model_view)
            .try_inverse()
            .ok_or(ViewError::DegenerateTransform)?;

        let near = utils::unproject(&inverse, Vec3::new(ndc_x, ndc_y, -1.0))
            .ok_or(ViewError::DegenerateTransform)?;
        let far = utils::unproject(&inverse, Vec3::new(ndc_x, ndc_y, 1.0))
            .ok_or(ViewError::DegenerateTransform)?;

        Ok(Ray::new(near, far - near))
    }
}

/// Owner of every camera, addressed by [`CameraId`]
#[derive(Debug, Default)]
pub struct CameraRegistry {
    cameras: SlotMap<CameraId, Camera>,
}

impl CameraRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            cameras: SlotMap::with_key(),
        }
    }

    /// Store a camera
    pub fn insert(&mut self, camera: Camera) -> CameraId {
        let id = self.cameras.insert(camera);
        log::debug!("Registered camera {:?}", id);
        id
    }

    /// Look up a camera; `None` once it has been removed
    pub fn get(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(id)
    }

    /// Mutable lookup
    pub fn get_mut(&mut self, id: CameraId) -> Option<&mut Camera> {
        self.cameras.get_mut(id)
    }

    /// Whether the handle is still live
    pub fn contains(&self, id: CameraId) -> bool {
        self.cameras.contains_key(id)
    }

    /// Number of cameras
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    /// Destroy a camera and its transform subtree
    pub fn remove(&mut self, id: CameraId, scene: &mut SceneGraph) -> Option<Camera> {
        let camera = self.cameras.remove(id)?;
        if scene.contains(camera.node) {
            if let Err(e) = scene.remove(camera.node) {
                log::warn!("Failed to remove node of camera {:?}: {}", id, e);
            }
        }
        log::debug!("Removed camera {:?}", id);
        Some(camera)
    }

    /// Iterate over all cameras
    pub fn iter(&self) -> impl Iterator<Item = (CameraId, &Camera)> {
        self.cameras.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec4};
    use approx::assert_relative_eq;

    fn camera_at(scene: &mut SceneGraph, position: Vec3) -> Camera {
        let projection = PerspectiveViewMatrix::from_degrees(90.0, 1.0, 100.0);
        let camera = Camera::new(scene, "camera", projection);
        camera.set_position(scene, position).unwrap();
        camera
    }

    #[test]
    fn test_perspective_maps_clip_planes() {
        let view = PerspectiveViewMatrix::from_degrees(90.0, 1.0, 100.0);
        let projection = view.matrix(2.0);

        let near = projection * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert_relative_eq!(near.z / near.w, -1.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);

        // 90 degree fov: f = 1, horizontal squeezed by the aspect
        assert_relative_eq!(projection[(0, 0)], 0.5, epsilon = 1e-6);
        assert_relative_eq!(projection[(1, 1)], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_orthogonal_aspect_widens_horizontal_only() {
        let view = OrthogonalViewMatrix {
            scale: Vec2::new(2.0, 3.0),
            near_clip: 1.0,
            far_clip: 11.0,
        };
        let square = view.matrix(1.0);
        let wide = view.matrix(2.0);

        assert_relative_eq!(square[(0, 0)], 0.5, epsilon = 1e-6);
        assert_relative_eq!(wide[(0, 0)], 0.25, epsilon = 1e-6);
        assert_relative_eq!(square[(1, 1)], wide[(1, 1)], epsilon = 1e-6);

        let near = wide * Vec4::new(0.0, 0.0, -1.0, 1.0);
        assert_relative_eq!(near.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_model_view_is_inverse_world() {
        let mut scene = SceneGraph::new();
        let camera = camera_at(&mut scene, Vec3::new(0.0, 0.0, 10.0));

        let model_view = camera.model_view_matrix(&scene).unwrap();
        let world = scene.world_matrix(camera.node()).unwrap();
        assert_relative_eq!(model_view * world, Mat4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_model_view_of_collapsed_scale_fails() {
        let mut scene = SceneGraph::new();
        let camera = camera_at(&mut scene, Vec3::zeros());
        scene
            .set_transform(
                camera.node(),
                Transform::new(Vec3::zeros(), Quat::identity(), Vec3::zeros()),
            )
            .unwrap();
        assert_eq!(camera.model_view_matrix(&scene), Err(ViewError::DegenerateTransform));
    }

    #[test]
    fn test_center_ray_points_down_view_axis() {
        let mut scene = SceneGraph::new();
        let camera = camera_at(&mut scene, Vec3::new(0.0, 0.0, 10.0));
        let pixel_rect = Rect::new(Vec2::zeros(), Vec2::new(800.0, 600.0));

        let ray = camera.point_to_ray(&scene, &pixel_rect, Vec2::new(400.0, 300.0)).unwrap();
        assert_relative_eq!(ray.direction, Vec3::new(0.0, 0.0, -1.0), epsilon = 1e-5);
        // origin sits on the near plane
        assert_relative_eq!(ray.origin, Vec3::new(0.0, 0.0, 9.0), epsilon = 1e-4);
    }

    #[test]
    fn test_corner_ray_follows_frustum_edge() {
        let mut scene = SceneGraph::new();
        let camera = camera_at(&mut scene, Vec3::zeros());
        let pixel_rect = Rect::new(Vec2::zeros(), Vec2::new(100.0, 100.0));

        // 90 degree fov with square aspect: the top-right corner is at 45 degrees on both axes
        let ray = camera.point_to_ray(&scene, &pixel_rect, Vec2::new(100.0, 100.0)).unwrap();
        let expected = Vec3::new(1.0, 1.0, -1.0).normalize();
        assert_relative_eq!(ray.direction, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_ray_follows_parent_node() {
        let mut scene = SceneGraph::new();
        let rig =
            scene.create_node_with("rig", Transform::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        let camera = camera_at(&mut scene, Vec3::new(0.0, 0.0, 10.0));
        scene.attach(rig, camera.node()).unwrap();

        let pixel_rect = Rect::new(Vec2::zeros(), Vec2::new(64.0, 64.0));
        let ray = camera.point_to_ray(&scene, &pixel_rect, Vec2::new(32.0, 32.0)).unwrap();
        assert_relative_eq!(ray.origin, Vec3::new(5.0, 0.0, 9.0), epsilon = 1e-4);
    }

    #[test]
    fn test_point_outside_pixel_rect_is_rejected() {
        let mut scene = SceneGraph::new();
        let camera = camera_at(&mut scene, Vec3::zeros());
        let pixel_rect = Rect::new(Vec2::new(100.0, 100.0), Vec2::new(50.0, 50.0));

        assert_eq!(
            camera.point_to_ray(&scene, &pixel_rect, Vec2::new(10.0, 120.0)),
            Err(ViewError::OutOfBounds { x: 10.0, y: 120.0 })
        );
    }

    #[test]
    fn test_look_at_turns_view_axis() {
        let mut scene = SceneGraph::new();
        let camera = camera_at(&mut scene, Vec3::new(10.0, 0.0, 0.0));
        camera.look_at(&mut scene, Vec3::zeros(), Vec3::y()).unwrap();

        let world = scene.world_matrix(camera.node()).unwrap();
        let forward = world.transform_vector(&Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(forward, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);

        assert_eq!(
            camera.look_at(&mut scene, Vec3::new(10.0, 0.0, 0.0), Vec3::y()),
            Err(ViewError::DegenerateTransform)
        );
    }

    #[test]
    fn test_registry_remove_destroys_node() {
        let mut scene = SceneGraph::new();
        let mut cameras = CameraRegistry::new();
        let camera = camera_at(&mut scene, Vec3::zeros());
        let node = camera.node();
        let id = cameras.insert(camera);

        assert!(cameras.contains(id));
        assert!(cameras.remove(id, &mut scene).is_some());
        assert!(cameras.get(id).is_none());
        assert!(!scene.contains(node));
        assert!(cameras.remove(id, &mut scene).is_none());
    }
}
