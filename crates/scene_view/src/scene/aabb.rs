//! Axis-aligned bounding boxes
//!
//! The empty box is represented by `min = +MAX`, `max = -MAX`, so inserting
//! into it always yields exactly the inserted extent.

use std::fmt;

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisAlignedBoundingBox {
    min: Vec3,
    max: Vec3,
}

/// Short alias used throughout the crate
pub type Aabb = AxisAlignedBoundingBox;

impl Default for AxisAlignedBoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl AxisAlignedBoundingBox {
    /// The empty box
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::MAX),
            max: Vec3::repeat(-f32::MAX),
        }
    }

    /// Create a box from two corners, in any order
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
        }
    }

    /// Create a box centered at a point with given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self::new(center - extents, center + extents)
    }

    /// Smallest box around every point of an iterator
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut aabb = Self::empty();
        for p in points {
            aabb.insert_point(p);
        }
        aabb
    }

    /// Reset to the empty box
    pub fn clear(&mut self) {
        *self = Self::empty();
    }

    /// True when nothing was ever inserted
    pub fn is_empty(&self) -> bool {
        let size = self.size();
        size.x < 0.0 && size.y < 0.0 && size.z < 0.0
    }

    /// Minimum corner
    pub fn min(&self) -> Vec3 {
        self.min
    }

    /// Maximum corner
    pub fn max(&self) -> Vec3 {
        self.max
    }

    /// `(min + max) / 2`
    pub fn center(&self) -> Vec3 {
        self.min + self.size() * 0.5
    }

    /// Extent vector `max - min`
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Enclosed volume, zero when any axis is inverted
    pub fn volume(&self) -> f32 {
        let s = self.size();
        if s.x < 0.0 || s.y < 0.0 || s.z < 0.0 {
            return 0.0;
        }
        s.x * s.y * s.z
    }

    /// Per-axis half size of the smallest origin-centered box containing this one
    pub fn half_size_from_origin(&self) -> Vec3 {
        self.min.abs().sup(&self.max.abs())
    }

    /// Grow to contain a point
    pub fn insert_point(&mut self, p: Vec3) {
        self.min = self.min.inf(&p);
        self.max = self.max.sup(&p);
    }

    /// Grow to contain a point after transforming it by `transform`
    pub fn insert_transformed_point(&mut self, transform: &Mat4, p: Vec3) {
        let q = transform.transform_point(&Point3::from(p));
        self.insert_point(q.coords);
    }

    /// Merge another box into this one
    pub fn insert(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Merge the axis-aligned bounds of `other` transformed by `transform`
    ///
    /// All eight corners are transformed, so rotation correctly enlarges the
    /// result. An empty `other` leaves this box unchanged.
    pub fn insert_transformed(&mut self, transform: &Mat4, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        for corner in other.corners() {
            self.insert_transformed_point(transform, corner);
        }
    }

    /// Grow to contain a pinhole camera frustum between `near` and `far`
    ///
    /// `t_wc` is the camera-to-world pose; the camera frame follows the vision
    /// convention (+Z forward, image origin at `(0, 0)` pixel).
    #[allow(clippy::too_many_arguments)]
    pub fn insert_frustum(
        &mut self,
        t_wc: &Mat4,
        width: f32,
        height: f32,
        fu: f32,
        fv: f32,
        u0: f32,
        v0: f32,
        near: f32,
        far: f32,
    ) {
        let origin = Vec3::new(t_wc[(0, 3)], t_wc[(1, 3)], t_wc[(2, 3)]);
        let rotation = t_wc.fixed_view::<3, 3>(0, 0).into_owned();

        for (u, v) in [(0.0, 0.0), (width, 0.0), (0.0, height), (width, height)] {
            let ray = rotation * Vec3::new((u - u0) / fu, (v - v0) / fv, 1.0);
            self.insert_point(origin + ray * near);
            self.insert_point(origin + ray * far);
        }
    }

    /// Shrink to the overlap with `other`
    ///
    /// Disjoint boxes produce an inverted extent, which reports as empty only
    /// when every axis is disjoint; callers check `volume()` for overlap.
    pub fn intersect(&mut self, other: &Aabb) {
        self.min = self.min.sup(&other.min);
        self.max = self.max.inf(&other.max);
    }

    /// Check if this box contains a point (inclusive)
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// The eight corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }
}

impl fmt::Display for AxisAlignedBoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}) - ({}, {}, {})",
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::cart_to_matrix;
    use approx::assert_relative_eq;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0))
    }

    #[test]
    fn test_empty_box() {
        let aabb = Aabb::empty();
        assert!(aabb.is_empty());
        assert_eq!(aabb.volume(), 0.0);
        assert!(!aabb.contains_point(Vec3::zeros()));
    }

    #[test]
    fn test_insert_into_empty_is_identity() {
        let a = unit_box();
        let mut merged = Aabb::empty();
        merged.insert(&a);
        assert_eq!(merged, a);
    }

    #[test]
    fn test_insert_self_is_idempotent() {
        let a = unit_box();
        let mut merged = a;
        merged.insert(&a);
        assert_eq!(merged, a);
    }

    #[test]
    fn test_insert_extends_componentwise() {
        let mut a = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        a.insert(&Aabb::new(Vec3::new(-1.0, 0.5, 0.5), Vec3::new(0.5, 0.5, 4.0)));
        assert_eq!(a.min(), Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(a.max(), Vec3::new(1.0, 1.0, 4.0));
    }

    #[test]
    fn test_center_and_size() {
        let a = Aabb::new(Vec3::new(0.0, 2.0, -4.0), Vec3::new(2.0, 6.0, 4.0));
        assert_relative_eq!(a.center(), Vec3::new(1.0, 4.0, 0.0));
        assert_relative_eq!(a.size(), Vec3::new(2.0, 4.0, 8.0));
        assert_relative_eq!(a.volume(), 64.0);
    }

    #[test]
    fn test_insert_transformed_contains_all_corners() {
        let b = unit_box();
        let poses = [
            cart_to_matrix(0.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            cart_to_matrix(5.0, -2.0, 1.0, 0.3, 0.0, 0.0),
            cart_to_matrix(-1.0, 4.0, 2.0, 0.7, -1.2, 2.5),
        ];

        for t in &poses {
            let mut merged = Aabb::empty();
            merged.insert_transformed(t, &b);
            for corner in b.corners() {
                let p = t.transform_point(&Point3::from(corner)).coords;
                // tolerate rounding at the faces
                let grown = Aabb::new(merged.min() - Vec3::repeat(1e-4), merged.max() + Vec3::repeat(1e-4));
                assert!(grown.contains_point(p), "{p:?} outside {merged}");
            }
        }
    }

    #[test]
    fn test_rotation_enlarges_bounds() {
        let b = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let yaw45 = cart_to_matrix(0.0, 0.0, 0.0, 0.0, 0.0, std::f32::consts::FRAC_PI_4);
        let mut merged = Aabb::empty();
        merged.insert_transformed(&yaw45, &b);

        assert_relative_eq!(merged.max().x, 2.0_f32.sqrt(), epsilon = 1e-5);
        assert_relative_eq!(merged.max().z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_insert_transformed_empty_is_noop() {
        let mut a = unit_box();
        a.insert_transformed(&Mat4::new_translation(&Vec3::new(10.0, 0.0, 0.0)), &Aabb::empty());
        assert_eq!(a, unit_box());
    }

    #[test]
    fn test_intersect() {
        let mut a = Aabb::new(Vec3::zeros(), Vec3::new(2.0, 2.0, 2.0));
        a.intersect(&Aabb::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0)));
        assert_eq!(a, Aabb::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 2.0, 2.0)));
        assert_eq!(a.volume(), 1.0);

        let mut unit = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0));
        unit.intersect(&Aabb::new(Vec3::new(5.0, 5.0, 0.0), Vec3::new(6.0, 6.0, 1.0)));
        assert!(!unit.is_empty());
        assert_eq!(unit.volume(), 0.0);
    }

    #[test]
    fn test_half_size_from_origin() {
        let a = Aabb::new(Vec3::new(-3.0, 1.0, -1.0), Vec3::new(2.0, 4.0, 0.5));
        assert_eq!(a.half_size_from_origin(), Vec3::new(3.0, 4.0, 1.0));
    }

    #[test]
    fn test_insert_frustum_identity_pose() {
        let mut a = Aabb::empty();
        a.insert_frustum(&Mat4::identity(), 100.0, 100.0, 50.0, 50.0, 50.0, 50.0, 1.0, 10.0);

        assert_relative_eq!(a.min(), Vec3::new(-10.0, -10.0, 1.0), epsilon = 1e-5);
        assert_relative_eq!(a.max(), Vec3::new(10.0, 10.0, 10.0), epsilon = 1e-5);
    }

    #[test]
    fn test_display() {
        let a = Aabb::new(Vec3::zeros(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(a.to_string(), "(0, 0, 0) - (1, 2, 3)");
    }
}
