//! # Core Module
//!
//! Shared configuration types used to describe a window, its viewports and
//! their cameras, and to turn that description into live objects.

pub mod config;

pub use crate::foundation;

pub use config::{
    CameraConfig,
    Config,
    ConfigError,
    FrameworkConfig,
    ProjectionConfig,
    ViewportConfig,
    WindowConfig,
};
