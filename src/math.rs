//! Vector Math and Bounding Boxes
//!
//! Node and beam state is single precision (`Real = f32`) and uses
//! `nalgebra` vectors. The frame clock lives in `timestep` and is kept in
//! `f64`, so nothing here is used for time accumulation.
//!
//! # Types
//!
//! - `Real`: scalar used for all node/beam quantities
//! - `Vec3`: `nalgebra::Vector3<Real>`
//! - `Aabb`: axis-aligned bounding box with an explicit empty state

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Scalar type of the body model.
pub type Real = f32;

/// 3D vector of the body model.
pub type Vec3 = Vector3<Real>;

/// Below this length a vector has no usable direction.
pub const DIRECTION_EPSILON: Real = 1.0e-6;

/// Normalize `v`, or return `None` when it is too short to have a direction.
#[inline]
#[must_use]
pub fn safe_normalize(v: &Vec3) -> Option<Vec3> {
    let len = v.norm();
    if len > DIRECTION_EPSILON && len.is_finite() {
        Some(v / len)
    } else {
        None
    }
}

// ============================================================================
// Axis-Aligned Bounding Box
// ============================================================================

/// Axis-Aligned Bounding Box.
///
/// An empty box has `min > max` on every axis, intersects nothing and is the
/// identity of [`Aabb::union`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a new box from min and max corners
    #[inline]
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The empty box
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(Real::INFINITY),
            max: Vec3::repeat(Real::NEG_INFINITY),
        }
    }

    /// Create a box from center and half-extents
    #[inline]
    #[must_use]
    pub fn from_center_half(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Smallest box containing every point (empty for no points)
    #[must_use]
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        let mut aabb = Self::empty();
        for p in points {
            aabb.extend(p);
        }
        aabb
    }

    /// True when the box contains no point
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Grow the box to contain `p`
    #[inline]
    pub fn extend(&mut self, p: &Vec3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Check if two boxes intersect (touching counts)
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Aabb) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Check if a point lies inside the box
    #[inline]
    #[must_use]
    pub fn contains(&self, p: &Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Compute union of two boxes
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// The box moved by `offset` (empty stays empty)
    #[inline]
    #[must_use]
    pub fn translated(&self, offset: &Vec3) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// The box grown by `margin` on every side (empty stays empty)
    #[inline]
    #[must_use]
    pub fn inflated(&self, margin: Real) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let m = Vec3::repeat(margin);
        Aabb {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Center of the box
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box_at(x: Real) -> Aabb {
        Aabb::new(Vec3::new(x, 0.0, 0.0), Vec3::new(x + 1.0, 1.0, 1.0))
    }

    #[test]
    fn test_empty_box() {
        let e = Aabb::empty();
        assert!(e.is_empty());
        assert!(!e.intersects(&unit_box_at(0.0)));
        assert_eq!(e.union(&unit_box_at(0.0)), unit_box_at(0.0));
        assert!(e.translated(&Vec3::new(1.0, 2.0, 3.0)).is_empty());
    }

    #[test]
    fn test_intersects_touching_and_separated() {
        assert!(unit_box_at(0.0).intersects(&unit_box_at(1.0)));
        assert!(!unit_box_at(0.0).intersects(&unit_box_at(1.5)));
    }

    #[test]
    fn test_from_points() {
        let pts = [Vec3::new(1.0, -1.0, 0.0), Vec3::new(-2.0, 3.0, 0.5)];
        let b = Aabb::from_points(pts.iter());
        assert_eq!(b.min, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 3.0, 0.5));
        assert!(b.contains(&Vec3::new(0.0, 0.0, 0.25)));
    }

    #[test]
    fn test_translated_and_inflated() {
        let b = unit_box_at(0.0).translated(&Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(b, unit_box_at(2.0));
        let g = b.inflated(0.5);
        assert_eq!(g.min, Vec3::new(1.5, -0.5, -0.5));
        assert_eq!(g.center(), b.center());
    }

    #[test]
    fn test_safe_normalize() {
        assert!(safe_normalize(&Vec3::zeros()).is_none());
        let n = safe_normalize(&Vec3::new(0.0, 3.0, 4.0)).unwrap();
        assert!((n.norm() - 1.0).abs() < 1e-6);
    }
}
