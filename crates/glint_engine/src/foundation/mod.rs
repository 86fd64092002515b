//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Rectangle math for normalized and pixel regions
//! - Logging utilities

pub mod math;
pub mod rect;
pub mod logging;
