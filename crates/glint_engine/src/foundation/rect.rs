//! Rectangle math
//!
//! A rectangle is an `origin` plus a `size`, stored together as a 2x2 block
//! (row 0 = origin, row 1 = size). The same type describes normalized
//! viewport regions (fractions of the window) and pixel regions.
//!
//! `size` may be negative, which describes an inverted rectangle. Every
//! containment and conversion function goes through [`Rect::extents`], which
//! normalizes the corners with min/max, so inverted rectangles behave exactly
//! like their upright equivalents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::math::{Mat2, Vec2};

/// Malformed rectangle or vector dimensions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// The rectangle data did not hold exactly 2x2 values
    #[error("rect must have shape (2,2), got {len} values")]
    RectShape {
        /// Number of values supplied
        len: usize,
    },

    /// The scale vector did not hold exactly 2 values
    #[error("vector must have length 2, got {len}")]
    VectorShape {
        /// Number of values supplied
        len: usize,
    },
}

/// Normalized corner extents of a rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    /// Smallest x
    pub left: f32,
    /// Largest x
    pub right: f32,
    /// Smallest y
    pub bottom: f32,
    /// Largest y
    pub top: f32,
}

impl Extents {
    /// Width of the extents, never negative
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height of the extents, never negative
    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// A 2D rectangle defined by origin and (possibly negative) size
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Origin corner
    pub origin: Vec2,
    /// Size, negative components describe an inverted rectangle
    pub size: Vec2,
}

impl Rect {
    /// Create a rectangle from origin and size
    pub fn new(origin: Vec2, size: Vec2) -> Self {
        Self { origin, size }
    }

    /// Rectangle with zero origin and zero size
    pub fn zero() -> Self {
        Self::default()
    }

    /// Create a rectangle from its bounds
    ///
    /// Produces a negative size when `right < left` or `top < bottom`.
    pub fn from_bounds(left: f32, right: f32, bottom: f32, top: f32) -> Self {
        Self {
            origin: Vec2::new(left, bottom),
            size: Vec2::new(right - left, top - bottom),
        }
    }

    /// Create a rectangle from `[[x, y], [width, height]]`
    pub fn from_rows(rows: [[f32; 2]; 2]) -> Self {
        Self {
            origin: Vec2::new(rows[0][0], rows[0][1]),
            size: Vec2::new(rows[1][0], rows[1][1]),
        }
    }

    /// Create a rectangle from flat `[x, y, width, height]` data
    pub fn try_from_slice(values: &[f32]) -> Result<Self, ShapeError> {
        match *values {
            [x, y, width, height] => Ok(Self::new(Vec2::new(x, y), Vec2::new(width, height))),
            _ => Err(ShapeError::RectShape { len: values.len() }),
        }
    }

    /// The rectangle as a 2x2 block, row 0 = origin, row 1 = size
    pub fn to_matrix(&self) -> Mat2 {
        Mat2::from_rows(&[self.origin.transpose(), self.size.transpose()])
    }

    /// Build a rectangle from a 2x2 block, row 0 = origin, row 1 = size
    pub fn from_matrix(matrix: &Mat2) -> Self {
        Self {
            origin: Vec2::new(matrix[(0, 0)], matrix[(0, 1)]),
            size: Vec2::new(matrix[(1, 0)], matrix[(1, 1)]),
        }
    }

    /// Origin x
    pub fn x(&self) -> f32 {
        self.origin.x
    }

    /// Origin y
    pub fn y(&self) -> f32 {
        self.origin.y
    }

    /// Signed width
    pub fn width(&self) -> f32 {
        self.size.x
    }

    /// Signed height
    pub fn height(&self) -> f32 {
        self.size.y
    }

    /// Normalized `(left, right, bottom, top)` extents
    pub fn extents(&self) -> Extents {
        let (x0, x1) = (self.origin.x, self.origin.x + self.size.x);
        let (y0, y1) = (self.origin.y, self.origin.y + self.size.y);
        Extents {
            left: x0.min(x1),
            right: x0.max(x1),
            bottom: y0.min(y1),
            top: y0.max(y1),
        }
    }

    /// Whether an absolute point lies within the rectangle, bounds inclusive
    pub fn contains_point(&self, point: Vec2) -> bool {
        let e = self.extents();
        point.x >= e.left && point.x <= e.right && point.y >= e.bottom && point.y <= e.top
    }

    /// Whether a point relative to the rectangle's `(left, bottom)` corner lies
    /// within `0..=width` and `0..=height`
    pub fn contains_relative_point(&self, point: Vec2) -> bool {
        let e = self.extents();
        point.x >= 0.0 && point.x <= e.width() && point.y >= 0.0 && point.y <= e.height()
    }

    /// Make an absolute point relative to the `(left, bottom)` corner
    pub fn make_relative(&self, point: Vec2) -> Vec2 {
        let e = self.extents();
        Vec2::new(point.x - e.left, point.y - e.bottom)
    }

    /// Inverse of [`Rect::make_relative`]
    pub fn make_absolute(&self, point: Vec2) -> Vec2 {
        let e = self.extents();
        Vec2::new(point.x + e.left, point.y + e.bottom)
    }

    /// Scale origin and size element-wise by `scale`
    pub fn scale_by_vector(&self, scale: Vec2) -> Self {
        Self {
            origin: self.origin.component_mul(&scale),
            size: self.size.component_mul(&scale),
        }
    }
}

/// Scale untyped rectangle data by an untyped vector
///
/// `rect` must hold 4 values (`[x, y, width, height]`) and `vec` must hold 2.
pub fn scale_by_slice(rect: &[f32], vec: &[f32]) -> Result<Rect, ShapeError> {
    let rect = Rect::try_from_slice(rect)?;
    match *vec {
        [sx, sy] => Ok(rect.scale_by_vector(Vec2::new(sx, sy))),
        _ => Err(ShapeError::VectorShape { len: vec.len() }),
    }
}
