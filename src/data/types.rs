//! Fixed-size numeric aggregates carried by typed values
//!
//! Every aggregate is a newtype over a flat array so it can expose its
//! elements as a numeric slice without reinterpreting memory.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 2D integer vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct V2i(pub [i32; 2]);

impl V2i {
    /// Create from components
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self([x, y])
    }

    /// X component
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.0[0]
    }

    /// Y component
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.0[1]
    }
}

/// 2D float vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct V2f(pub [f32; 2]);

impl V2f {
    /// Create from components
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self([x, y])
    }
}

/// 3D float vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct V3f(pub [f32; 3]);

impl V3f {
    /// Create from components
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self([x, y, z])
    }
}

/// RGB colour
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Color3f(pub [f32; 3]);

impl Color3f {
    /// Create from channels
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self([r, g, b])
    }
}

/// Row-major 4x4 float matrix, identity by default
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct M44f(pub [f32; 16]);

impl M44f {
    /// Identity matrix
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);
}

impl Default for M44f {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Inclusive integer pixel window, stored as `[min.x, min.y, max.x, max.y]`.
///
/// The default box is empty (`min > max`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Box2i(pub [i32; 4]);

impl Box2i {
    /// Create from inclusive corners
    #[must_use]
    pub const fn new(min: V2i, max: V2i) -> Self {
        Self([min.x(), min.y(), max.x(), max.y()])
    }

    /// Create from inclusive coordinates
    #[must_use]
    pub const fn from_coords(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self([min_x, min_y, max_x, max_y])
    }

    /// Lower corner
    #[must_use]
    pub const fn min(&self) -> V2i {
        V2i::new(self.0[0], self.0[1])
    }

    /// Upper corner
    #[must_use]
    pub const fn max(&self) -> V2i {
        V2i::new(self.0[2], self.0[3])
    }

    /// True when the box holds no pixels
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0[0] > self.0[2] || self.0[1] > self.0[3]
    }

    /// Width in pixels, zero when empty
    #[must_use]
    pub fn width(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            span(self.0[0], self.0[2])
        }
    }

    /// Height in pixels, zero when empty
    #[must_use]
    pub fn height(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            span(self.0[1], self.0[3])
        }
    }

    /// Number of pixels covered, saturating at `usize::MAX`
    #[must_use]
    pub fn area(&self) -> usize {
        self.width().saturating_mul(self.height())
    }

    /// Number of pixels covered, `None` when it does not fit in `usize`
    #[must_use]
    pub fn checked_area(&self) -> Option<usize> {
        self.width().checked_mul(self.height())
    }

    /// Whether `other` lies entirely inside this box
    #[must_use]
    pub const fn contains(&self, other: &Self) -> bool {
        !other.is_empty()
            && other.0[0] >= self.0[0]
            && other.0[1] >= self.0[1]
            && other.0[2] <= self.0[2]
            && other.0[3] <= self.0[3]
    }
}

fn span(min: i32, max: i32) -> usize {
    usize::try_from(i64::from(max) - i64::from(min) + 1).unwrap_or(usize::MAX)
}

impl Default for Box2i {
    fn default() -> Self {
        Self([i32::MAX, i32::MAX, i32::MIN, i32::MIN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_dimensions() {
        let window = Box2i::from_coords(0, 0, 63, 31);
        assert_eq!(window.width(), 64);
        assert_eq!(window.height(), 32);
        assert_eq!(window.area(), 2048);
        assert_eq!(window.min(), V2i::new(0, 0));
        assert_eq!(window.max(), V2i::new(63, 31));
    }

    #[test]
    fn test_default_box_is_empty() {
        let empty = Box2i::default();
        assert!(empty.is_empty());
        assert_eq!(empty.area(), 0);
        assert!(!Box2i::from_coords(0, 0, 10, 10).contains(&empty));
    }

    #[test]
    fn test_full_range_box_area_does_not_overflow() {
        let full = Box2i::from_coords(i32::MIN, i32::MIN, i32::MAX, i32::MAX);
        assert_eq!(full.width(), 1usize << 32);
        assert_eq!(full.height(), 1usize << 32);
        assert_eq!(full.checked_area(), None);
        assert_eq!(full.area(), usize::MAX);
        assert_eq!(Box2i::from_coords(0, 0, 3, 1).checked_area(), Some(8));
    }

    #[test]
    fn test_box_contains() {
        let window = Box2i::from_coords(-8, -8, 8, 8);
        assert!(window.contains(&Box2i::from_coords(-8, 0, 0, 8)));
        assert!(!window.contains(&Box2i::from_coords(0, 0, 9, 1)));
    }
}
