//! # Framework Configuration
//!
//! Serializable description of a window, its cameras and the viewports that
//! split the window between them. [`FrameworkConfig::build`] turns the
//! description into live cameras (registered in a [`CameraRegistry`]) and
//! [`Viewport`]s.
//!
//! ## Example (TOML)
//!
//! ```toml
//! log_level = "info"
//!
//! [window]
//! title = "Split screen"
//! width = 1280
//! height = 720
//!
//! [[cameras]]
//! name = "front"
//! position = [0.0, 0.0, 10.0]
//!
//! [cameras.projection.perspective]
//! fov_degrees = 60.0
//! near = 1.0
//! far = 100.0
//!
//! [[viewports]]
//! rect = [[0.0, 0.0], [1.0, 1.0]]
//! camera = 0
//! ```

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};
use crate::foundation::logging;
use crate::foundation::math::{Vec2, Vec3};
use crate::render::camera::{
    Camera, CameraId, CameraRegistry, OrthogonalViewMatrix, PerspectiveViewMatrix, ViewMatrix,
};
use crate::render::gpu::RenderState;
use crate::render::viewport::Viewport;
use crate::render::window::WindowExtent;
use crate::render::ViewError;
use crate::scene::{NodeId, SceneGraph};

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in pixels
    pub width: u32,
    /// Initial height in pixels
    pub height: u32,
}

impl WindowConfig {
    /// Create a window configuration
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
        }
    }

    /// Initial size as a window size provider
    pub fn extent(&self) -> WindowExtent {
        WindowExtent::new(self.width, self.height)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new("Glint", 1280, 720)
    }
}

/// # Projection Configuration
///
/// Selects and parameterizes a camera's [`ViewMatrix`] strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionConfig {
    /// Perspective frustum
    Perspective {
        /// Vertical field of view in degrees
        fov_degrees: f32,
        /// Near clipping distance
        near: f32,
        /// Far clipping distance
        far: f32,
    },
    /// Orthographic box
    Orthogonal {
        /// Half extents before aspect correction
        scale: [f32; 2],
        /// Near clipping plane
        near: f32,
        /// Far clipping plane
        far: f32,
    },
}

impl ProjectionConfig {
    /// Build the matching projection strategy
    pub fn build(&self) -> Box<dyn ViewMatrix> {
        match *self {
            Self::Perspective { fov_degrees, near, far } => {
                Box::new(PerspectiveViewMatrix::from_degrees(fov_degrees, near, far))
            }
            Self::Orthogonal { scale, near, far } => Box::new(OrthogonalViewMatrix {
                scale: Vec2::from(scale),
                near_clip: near,
                far_clip: far,
            }),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Perspective { fov_degrees, near, far } => {
                if !(fov_degrees > 0.0 && fov_degrees < 180.0) {
                    return Err(ConfigError::Invalid(format!(
                        "field of view must be within (0, 180) degrees, got {fov_degrees}"
                    )));
                }
                if !(near > 0.0 && far > near) {
                    return Err(ConfigError::Invalid(format!(
                        "perspective clip planes need 0 < near < far, got {near}..{far}"
                    )));
                }
            }
            Self::Orthogonal { scale, near, far } => {
                if scale[0] <= 0.0 || scale[1] <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "orthogonal scale must be positive, got {scale:?}"
                    )));
                }
                if far <= near {
                    return Err(ConfigError::Invalid(format!(
                        "orthogonal clip planes need near < far, got {near}..{far}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self::Perspective {
            fov_degrees: 60.0,
            near: 1.0,
            far: 100.0,
        }
    }
}

/// # Camera Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Name of the camera's scene node
    pub name: String,
    /// Position of the camera node
    pub position: [f32; 3],
    /// Point to look at, `None` keeps looking down -Z
    pub target: Option<[f32; 3]>,
    /// Projection strategy
    pub projection: ProjectionConfig,
}

impl CameraConfig {
    /// Create a camera configuration at `position`
    pub fn new(name: impl Into<String>, position: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            position,
            ..Self::default()
        }
    }

    /// Set the look-at target
    pub fn with_target(mut self, target: [f32; 3]) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the projection
    pub fn with_projection(mut self, projection: ProjectionConfig) -> Self {
        self.projection = projection;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.projection.validate()?;
        if let Some(target) = self.target {
            let backward = Vec3::from(self.position) - Vec3::from(target);
            if backward.norm_squared() <= f32::EPSILON {
                return Err(ConfigError::Invalid(format!(
                    "camera '{}' targets its own position",
                    self.name
                )));
            }
            if backward.cross(&Vec3::y()).norm_squared() <= f32::EPSILON {
                return Err(ConfigError::Invalid(format!(
                    "camera '{}' looks straight along the up axis",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Create the camera with a new root node in `scene`
    ///
    /// On failure the node is removed again and `scene` is left unchanged.
    pub fn build(&self, scene: &mut SceneGraph) -> Result<Camera, ConfigError> {
        let node = scene.create_node(self.name.as_str());
        let camera = Camera::with_node(node, self.projection.build());
        if let Err(e) = self.place(&camera, scene) {
            if let Err(remove_error) = scene.remove(node) {
                log::warn!("Failed to remove node of camera '{}': {}", self.name, remove_error);
            }
            return Err(ConfigError::Invalid(format!("camera '{}': {}", self.name, e)));
        }
        Ok(camera)
    }

    fn place(&self, camera: &Camera, scene: &mut SceneGraph) -> Result<(), ViewError> {
        camera.set_position(scene, Vec3::from(self.position))?;
        if let Some(target) = self.target {
            camera.look_at(scene, Vec3::from(target), Vec3::y())?;
        }
        Ok(())
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            name: "camera".to_string(),
            position: [0.0, 0.0, 10.0],
            target: None,
            projection: ProjectionConfig::default(),
        }
    }
}

/// # Viewport Configuration
///
/// `rect` is `[[x, y], [width, height]]` in window-relative units. Values
/// outside `[0, 1]` are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Normalized rectangle
    pub rect: [[f32; 2]; 2],
    /// Clear color, `None` keeps the current one
    pub clear_color: Option<[f32; 4]>,
    /// Pipeline state applied while rendering
    pub render_state: RenderState,
    /// Index into [`FrameworkConfig::cameras`]
    pub camera: Option<usize>,
}

impl ViewportConfig {
    /// Create a viewport configuration over `rect`
    pub fn new(rect: [[f32; 2]; 2]) -> Self {
        Self {
            rect,
            ..Self::default()
        }
    }

    /// Bind a camera by index
    pub fn with_camera(mut self, index: usize) -> Self {
        self.camera = Some(index);
        self
    }

    /// Set the clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = Some(color);
        self
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            rect: [[0.0, 0.0], [1.0, 1.0]],
            clear_color: None,
            render_state: RenderState::default(),
            camera: None,
        }
    }
}

/// # Complete Framework Configuration
///
/// Top-level configuration that applications load from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Window settings
    pub window: WindowConfig,
    /// Cameras, referenced by index from viewports
    pub cameras: Vec<CameraConfig>,
    /// Viewports in render order
    pub viewports: Vec<ViewportConfig>,
}

impl FrameworkConfig {
    /// Two viewports side by side, each with its own perspective camera
    pub fn split_screen() -> Self {
        Self {
            cameras: vec![
                CameraConfig::new("left_camera", [0.0, 0.0, 10.0]),
                CameraConfig::new("right_camera", [10.0, 0.0, 0.0]).with_target([0.0, 0.0, 0.0]),
            ],
            viewports: vec![
                ViewportConfig::new([[0.0, 0.0], [0.5, 1.0]]).with_camera(0),
                ViewportConfig::new([[0.5, 0.0], [0.5, 1.0]]).with_camera(1),
            ],
            ..Self::default()
        }
    }

    /// Initialize logging with this configuration's default level
    pub fn init_logging(&self) {
        logging::init_with_level(&self.log_level);
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window.validate()?;
        for camera in &self.cameras {
            camera.validate()?;
        }
        for (index, viewport) in self.viewports.iter().enumerate() {
            if let Some(camera) = viewport.camera {
                if camera >= self.cameras.len() {
                    return Err(ConfigError::Invalid(format!(
                        "viewport {index} references camera {camera}, but only {} are configured",
                        self.cameras.len()
                    )));
                }
            }
            let [_, [width, height]] = viewport.rect;
            if width == 0.0 || height == 0.0 {
                return Err(ConfigError::Invalid(format!("viewport {index} has an empty rect")));
            }
        }
        Ok(())
    }

    /// Create the configured cameras and viewports
    ///
    /// Cameras are inserted into `cameras` with fresh nodes in `scene`. Every
    /// viewport renders `scene_root`.
    pub fn build(
        &self,
        scene: &mut SceneGraph,
        cameras: &mut CameraRegistry,
        scene_root: Option<NodeId>,
    ) -> Result<Vec<Viewport>, ConfigError> {
        self.validate()?;
        let camera_ids = self.build_cameras(scene, cameras)?;

        let viewports = self
            .viewports
            .iter()
            .map(|config| {
                let mut viewport = Viewport::from_config(config);
                if let Some(id) = config.camera.and_then(|index| camera_ids.get(index)) {
                    viewport.set_camera(*id);
                }
                viewport.set_scene_root(scene_root);
                viewport
            })
            .collect::<Vec<_>>();

        log::info!(
            "Built {} cameras and {} viewports from configuration",
            camera_ids.len(),
            viewports.len()
        );
        Ok(viewports)
    }

    /// Create every configured camera, or none of them
    fn build_cameras(
        &self,
        scene: &mut SceneGraph,
        cameras: &mut CameraRegistry,
    ) -> Result<Vec<CameraId>, ConfigError> {
        let mut camera_ids = Vec::with_capacity(self.cameras.len());
        for config in &self.cameras {
            match config.build(scene) {
                Ok(camera) => camera_ids.push(cameras.insert(camera)),
                Err(e) => {
                    log::warn!("Rolling back {} camera(s): {}", camera_ids.len(), e);
                    for id in camera_ids {
                        cameras.remove(id, scene);
                    }
                    return Err(e);
                }
            }
        }
        Ok(camera_ids)
    }
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            window: WindowConfig::default(),
            cameras: vec![CameraConfig::default()],
            viewports: vec![ViewportConfig::default().with_camera(0)],
        }
    }
}

impl Config for FrameworkConfig {}
