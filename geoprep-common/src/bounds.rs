//! Bounding volumes
//!
//! The sphere routines are intentionally approximate and their results are relied on
//! downstream, so they must stay exactly as written:
//!
//! - [`compute_bounding_sphere`] centres the sphere on the AABB midpoint, not on the
//!   minimal enclosing sphere.
//! - [`merge_spheres`] unions the two spheres' bounding cubes and takes the largest
//!   half extent as radius.

use glam::Vec3;

use crate::error::GeomResult;
use crate::mesh::Mesh;
use crate::view::AttributeView;

/// Axis-aligned bounding box in mesh-local space
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box around every position in `positions` (zero box when empty)
    pub fn from_positions(positions: &AttributeView<'_>) -> Self {
        if positions.is_empty() {
            return Self::ZERO;
        }

        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(-f32::MAX);
        for i in 0..positions.len() {
            let p = positions.vec3(i);
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extent(&self) -> Vec3 {
        self.size() * 0.5
    }
}

/// Bounding sphere
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    pub const ZERO: Self = Self {
        center: Vec3::ZERO,
        radius: 0.0,
    };

    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Packed `[x, y, z, radius]`
    #[inline]
    pub fn to_array(&self) -> [f32; 4] {
        [self.center.x, self.center.y, self.center.z, self.radius]
    }

    /// Axis-aligned cube enclosing the sphere
    #[inline]
    pub fn bounding_cube(&self) -> Aabb {
        let r = Vec3::splat(self.radius);
        Aabb::new(self.center - r, self.center + r)
    }
}

/// Compute the axis-aligned bounding box of the mesh positions
///
/// An empty mesh yields `min = max = (0, 0, 0)`.
pub fn compute_aabb(mesh: &Mesh) -> GeomResult<Aabb> {
    Ok(Aabb::from_positions(&mesh.positions()?))
}

/// Compute the approximate bounding sphere of the mesh positions
///
/// Centre is the AABB midpoint; radius is the largest distance from any vertex to it.
pub fn compute_bounding_sphere(mesh: &Mesh) -> GeomResult<BoundingSphere> {
    let positions = mesh.positions()?;
    if positions.is_empty() {
        return Ok(BoundingSphere::ZERO);
    }

    let center = Aabb::from_positions(&positions).center();
    let distance_squared = (0..positions.len())
        .map(|i| positions.vec3(i).distance_squared(center))
        .fold(0.0f32, f32::max);

    let sphere = BoundingSphere::new(center, distance_squared.sqrt());
    debug_assert!(sphere.center.is_finite() && sphere.radius.is_finite());
    Ok(sphere)
}

/// Merge two spheres through their bounding cubes
pub fn merge_spheres(a: &BoundingSphere, b: &BoundingSphere) -> BoundingSphere {
    let a = a.bounding_cube();
    let b = b.bounding_cube();
    let union = Aabb::new(a.min.min(b.min), a.max.max(b.max));

    let center = union.center();
    let radius = (union.max - center).max_element();
    BoundingSphere::new(center, radius)
}
