//! Bone-space math helpers
//!
//! All matrices follow glam's column-vector convention: a point `p` in a
//! joint's bind space maps to root space as `bind_matrix * p`.

use glam::{Mat4, Quat, Vec3};

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box enclosing `points`, or a zero box when there are none
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let (min, max) = min_max(points);
        Self { min, max }
    }

    /// The eight corners, ordered by (x, y, z) bits of the corner index
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            )
        })
    }

    /// Box enclosing all corners after transforming them by `matrix`
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        Self::from_points(self.corners().map(|c| matrix.transform_point3(c)))
    }
}

/// Component-wise minimum and maximum of a point set
///
/// An empty set yields `(0,0,0), (0,0,0)`.
pub fn min_max<I: IntoIterator<Item = Vec3>>(points: I) -> (Vec3, Vec3) {
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return (Vec3::ZERO, Vec3::ZERO);
    };
    iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)))
}

/// Split an affine matrix into translation and unit rotation (scale is dropped)
pub fn decompose(matrix: &Mat4) -> (Vec3, Quat) {
    let (_scale, rotation, translation) = matrix.to_scale_rotation_translation();
    (translation, rotation.normalize())
}

/// Stored x, y, z of a quaternion under the MD5 hemisphere rule
///
/// Readers rebuild `w = -sqrt(1 - x² - y² - z²)`, so the vector part is
/// negated whenever the computed `w` is positive.
pub fn hemisphere_xyz(q: Quat) -> Vec3 {
    let xyz = Vec3::new(q.x, q.y, q.z);
    if q.w > 0.0 { -xyz } else { xyz }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_max_empty() {
        assert_eq!(min_max(std::iter::empty()), (Vec3::ZERO, Vec3::ZERO));
    }

    #[test]
    fn test_min_max_mixed_signs() {
        let points = [
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-4.0, 5.0, 0.5),
            Vec3::new(2.0, 0.0, -6.0),
        ];
        let (lo, hi) = min_max(points);
        assert_eq!(lo, Vec3::new(-4.0, -2.0, -6.0));
        assert_eq!(hi, Vec3::new(2.0, 5.0, 3.0));
    }

    #[test]
    fn test_hemisphere_positive_w_negates() {
        let q = Quat::from_xyzw(0.5, 0.5, 0.3, 0.6);
        assert_eq!(hemisphere_xyz(q), Vec3::new(-0.5, -0.5, -0.3));
    }

    #[test]
    fn test_hemisphere_negative_w_keeps_sign() {
        let q = Quat::from_xyzw(0.5, 0.5, 0.3, -0.6);
        assert_eq!(hemisphere_xyz(q), Vec3::new(0.5, 0.5, 0.3));
    }

    #[test]
    fn test_decompose_drops_scale() {
        let rotation = Quat::from_rotation_y(0.8);
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(3.0),
            rotation,
            Vec3::new(1.0, 2.0, 3.0),
        );
        let (t, r) = decompose(&m);
        assert!(t.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-5));
        assert!(r.abs_diff_eq(rotation, 1e-5) || r.abs_diff_eq(-rotation, 1e-5));
        assert!((r.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_aabb_corners_cover_box() {
        let aabb = Aabb::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        let corners = aabb.corners();
        assert_eq!(corners[0], aabb.min);
        assert_eq!(corners[7], aabb.max);
        assert_eq!(Aabb::from_points(corners), aabb);
    }

    #[test]
    fn test_aabb_transformed_by_translation() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let moved = aabb.transformed(&Mat4::from_translation(Vec3::new(10.0, 0.0, -1.0)));
        assert_eq!(moved.min, Vec3::new(10.0, 0.0, -1.0));
        assert_eq!(moved.max, Vec3::new(11.0, 1.0, 0.0));
    }
}
