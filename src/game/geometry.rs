//! 2D geometry primitives for the arena plane (x, z)

use serde::{Deserialize, Serialize};

/// 2D vector on the arena ground plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub z: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, z: 0.0 };

    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.z * rhs.z
    }

    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    /// Unit vector in the same direction, or `None` for a zero-length vector
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len == 0.0 {
            None
        } else {
            Some(Self::new(self.x / len, self.z / len))
        }
    }

    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.z * factor)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.z - rhs.z)
    }
}

/// Swept circle test: does the segment from `p1` to `p2` pass strictly within
/// `radius` of `center`?
///
/// Projects the center onto the segment, clamps the projection parameter to
/// the segment, and compares the closest-point distance against the radius.
/// A degenerate (near zero-length) segment falls back to a point test at `p1`.
pub fn segment_hits_circle(p1: Vec2, p2: Vec2, center: Vec2, radius: f32) -> bool {
    let seg = p2 - p1;
    let seg_len_sq = seg.length_sq();

    if seg_len_sq <= f32::EPSILON {
        return p1.distance(center) < radius;
    }

    let t = ((center - p1).dot(seg) / seg_len_sq).clamp(0.0, 1.0);
    let closest = p1 + seg.scale(t);
    closest.distance(center) < radius
}
