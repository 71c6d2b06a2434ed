//! Vector helpers
//!
//! `glam::Vec3` is the vector type used throughout the crate. This module only adds the
//! epsilon-tolerant comparison the welding predicate relies on.

use glam::Vec3;

/// Tolerance used when comparing attribute components for equality
pub const EPSILON: f32 = 1e-6;

/// Epsilon-tolerant comparisons for [`Vec3`]
pub trait Vec3Ext {
    /// True when every component differs by at most [`EPSILON`]
    fn approx_eq(self, other: Self) -> bool;

    /// True when every component differs by at most `eps`
    fn approx_eq_eps(self, other: Self, eps: f32) -> bool;
}

impl Vec3Ext for Vec3 {
    #[inline]
    fn approx_eq(self, other: Self) -> bool {
        self.approx_eq_eps(other, EPSILON)
    }

    #[inline]
    fn approx_eq_eps(self, other: Self, eps: f32) -> bool {
        let diff = (self - other).abs();
        diff.x <= eps && diff.y <= eps && diff.z <= eps
    }
}

/// Component-wise `|a - b| <= EPSILON` over two equally sized slices
#[inline]
pub(crate) fn components_match(a: &[f32], b: &[f32]) -> bool {
    a.iter().zip(b).all(|(x, y)| (x - y).abs() <= EPSILON)
}
