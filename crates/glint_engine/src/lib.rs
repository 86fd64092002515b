//! # Glint Engine
//!
//! Scene graph, camera and viewport core for OpenGL-style 3D rendering.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena of transform nodes with lazily cached world matrices
//! - **Cameras**: Pluggable perspective and orthographic projections
//! - **Viewports**: Normalized window regions that resize with the window
//! - **Picking**: Pixel positions to world-space rays
//! - **Headless**: GPU access goes through a command trait, recordable in tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use glint_engine::prelude::*;
//!
//! let mut scene = SceneGraph::new();
//! let mut cameras = CameraRegistry::new();
//! let world = scene.create_node("world");
//!
//! let camera = Camera::new(&mut scene, "camera", PerspectiveViewMatrix::default());
//! camera.set_position(&mut scene, Vec3::new(0.0, 0.0, 10.0))?;
//! let camera = cameras.insert(camera);
//!
//! let mut viewport = Viewport::full_window();
//! viewport.set_camera(camera);
//! viewport.set_scene_root(Some(world));
//!
//! let window = WindowExtent::new(1280, 720);
//! let mut gpu = CommandRecorder::new();
//! viewport.clear(&window, ClearMask::default(), &mut gpu)?;
//! viewport.render(&window, &cameras, &scene, &mut gpu);
//!
//! let ray = viewport.point_to_ray(&window, Vec2::new(640.0, 360.0), &cameras, &scene)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{
            CameraConfig, FrameworkConfig, ProjectionConfig, ViewportConfig, WindowConfig,
        },
        config::{Config, ConfigError},
        foundation::{
            math::{Mat4, Quat, Ray, Transform, Vec2, Vec3},
            rect::{Rect, ShapeError},
        },
        render::{
            Camera, CameraId, CameraRegistry, ClearMask, CommandRecorder, GpuCommands,
            OrthogonalViewMatrix, PerspectiveViewMatrix, RenderState, ViewError, ViewMatrix,
            Viewport, WindowExtent, WindowSize,
        },
        scene::{NodeId, Renderable, SceneError, SceneGraph},
    };
}
