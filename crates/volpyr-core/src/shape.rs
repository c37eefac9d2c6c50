//! Shapes and regions in (Z, Y, X) order
//!
//! All volumetric quantities in volpyr are ordered slowest-to-fastest
//! varying: Z (slice), Y (row), X (column). [`Shape3`] doubles as an
//! extent and as a voxel coordinate; [`Region`] is an axis-aligned box.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A (Z, Y, X) triple of voxel counts or coordinates.
///
/// Serialized as a JSON array `[z, y, x]`, matching the `shape` and
/// `chunks` fields of the store metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u64; 3]", into = "[u64; 3]")]
pub struct Shape3 {
    pub z: u64,
    pub y: u64,
    pub x: u64,
}

impl Shape3 {
    /// Create a shape from its Z, Y and X extents
    pub const fn new(z: u64, y: u64, x: u64) -> Self {
        Self { z, y, x }
    }

    /// Shape with the same extent along every axis
    pub const fn splat(n: u64) -> Self {
        Self { z: n, y: n, x: n }
    }

    /// The origin coordinate `(0, 0, 0)`
    pub const fn zero() -> Self {
        Self::splat(0)
    }

    pub fn to_array(self) -> [u64; 3] {
        [self.z, self.y, self.x]
    }

    /// True if any axis has zero length
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.z == 0 || self.y == 0 || self.x == 0
    }

    /// Number of voxels covered by this shape
    #[inline]
    pub fn num_elements(&self) -> u64 {
        self.z * self.y * self.x
    }

    /// Number of voxels as a `usize`, for buffer allocation
    #[inline]
    pub fn len(&self) -> usize {
        self.num_elements() as usize
    }

    /// Shape after one 2× reduction: `ceil(n / 2)` on every axis
    pub fn halved(&self) -> Self {
        Self::new(self.z.div_ceil(2), self.y.div_ceil(2), self.x.div_ceil(2))
    }

    /// Component-wise ceiling division
    pub fn div_ceil(&self, other: Shape3) -> Self {
        Self::new(
            self.z.div_ceil(other.z),
            self.y.div_ceil(other.y),
            self.x.div_ceil(other.x),
        )
    }

    /// Component-wise floor division
    pub fn div(&self, other: Shape3) -> Self {
        Self::new(self.z / other.z, self.y / other.y, self.x / other.x)
    }

    /// Component-wise product
    pub fn mul(&self, other: Shape3) -> Self {
        Self::new(self.z * other.z, self.y * other.y, self.x * other.x)
    }

    /// Multiply every axis by the same factor
    pub fn scale(&self, factor: u64) -> Self {
        Self::new(self.z * factor, self.y * factor, self.x * factor)
    }

    /// Component-wise sum
    pub fn add(&self, other: Shape3) -> Self {
        Self::new(self.z + other.z, self.y + other.y, self.x + other.x)
    }

    /// Component-wise difference, saturating at zero
    pub fn saturating_sub(&self, other: Shape3) -> Self {
        Self::new(
            self.z.saturating_sub(other.z),
            self.y.saturating_sub(other.y),
            self.x.saturating_sub(other.x),
        )
    }

    /// Component-wise minimum
    pub fn min(&self, other: Shape3) -> Self {
        Self::new(
            self.z.min(other.z),
            self.y.min(other.y),
            self.x.min(other.x),
        )
    }

    /// True if `self <= other` on every axis
    pub fn all_le(&self, other: Shape3) -> bool {
        self.z <= other.z && self.y <= other.y && self.x <= other.x
    }

    /// True if `self < other` on every axis, i.e. `self` is a valid
    /// coordinate inside an array of shape `other`
    pub fn all_lt(&self, other: Shape3) -> bool {
        self.z < other.z && self.y < other.y && self.x < other.x
    }
}

impl From<[u64; 3]> for Shape3 {
    fn from(a: [u64; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

impl From<Shape3> for [u64; 3] {
    fn from(s: Shape3) -> Self {
        s.to_array()
    }
}

impl From<(u64, u64, u64)> for Shape3 {
    fn from((z, y, x): (u64, u64, u64)) -> Self {
        Self::new(z, y, x)
    }
}

impl fmt::Display for Shape3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.z, self.y, self.x)
    }
}

/// An axis-aligned box `[origin, origin + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub origin: Shape3,
    pub size: Shape3,
}

impl Region {
    pub fn new(origin: Shape3, size: Shape3) -> Self {
        Self { origin, size }
    }

    /// The region `[0, shape)`
    pub fn whole(shape: Shape3) -> Self {
        Self::new(Shape3::zero(), shape)
    }

    /// Exclusive end coordinate
    pub fn end(&self) -> Shape3 {
        self.origin.add(self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.size.is_empty()
    }

    /// True if the region lies entirely within `[0, shape)`
    pub fn fits_within(&self, shape: Shape3) -> bool {
        self.end().all_le(shape)
    }

    /// True if `other` lies entirely within this region
    pub fn contains(&self, other: &Region) -> bool {
        self.origin.all_le(other.origin) && other.end().all_le(self.end())
    }

    /// Overlap of two regions, or `None` if they are disjoint
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        let lo = Shape3::new(
            self.origin.z.max(other.origin.z),
            self.origin.y.max(other.origin.y),
            self.origin.x.max(other.origin.x),
        );
        let hi = self.end().min(other.end());
        if lo.all_lt(hi) {
            Some(Region::new(lo, hi.saturating_sub(lo)))
        } else {
            None
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = self.end();
        write!(
            f,
            "[{}..{}, {}..{}, {}..{}]",
            self.origin.z, end.z, self.origin.y, end.y, self.origin.x, end.x
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halved_rounds_up() {
        assert_eq!(Shape3::new(3, 4, 5).halved(), Shape3::new(2, 2, 3));
        assert_eq!(Shape3::new(1, 1, 1).halved(), Shape3::new(1, 1, 1));
        assert_eq!(Shape3::new(600, 1500, 1501).halved(), Shape3::new(300, 750, 751));
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape3::new(38, 94, 95).to_string(), "38x94x95");
        let r = Region::new(Shape3::new(0, 2, 4), Shape3::new(1, 2, 3));
        assert_eq!(r.to_string(), "[0..1, 2..4, 4..7]");
    }

    #[test]
    fn test_intersect() {
        let a = Region::new(Shape3::zero(), Shape3::splat(4));
        let b = Region::new(Shape3::new(2, 3, 1), Shape3::splat(4));
        let i = a.intersect(&b).unwrap();
        assert_eq!(i.origin, Shape3::new(2, 3, 1));
        assert_eq!(i.size, Shape3::new(2, 1, 3));

        let c = Region::new(Shape3::new(4, 0, 0), Shape3::splat(1));
        assert!(a.intersect(&c).is_none());
    }

    #[test]
    fn test_region_end_and_coordinates() {
        let r = Region::new(Shape3::new(1, 2, 3), Shape3::new(4, 5, 6));
        assert_eq!(r.end(), Shape3::new(1, 2, 3).add(Shape3::new(4, 5, 6)));
        assert_eq!(r.end(), Shape3::new(5, 7, 9));
        assert!(Shape3::new(4, 6, 8).all_lt(r.end()));
        assert!(!Shape3::new(4, 7, 8).all_lt(r.end()));
    }

    #[test]
    fn test_fits_within() {
        let shape = Shape3::new(5, 5, 5);
        assert!(Region::new(Shape3::new(4, 0, 0), Shape3::new(1, 5, 5)).fits_within(shape));
        assert!(!Region::new(Shape3::new(4, 0, 0), Shape3::new(2, 5, 5)).fits_within(shape));
    }

    #[test]
    fn test_serde_as_array() {
        let s: Shape3 = serde_json::from_str("[2, 3, 4]").unwrap();
        assert_eq!(s, Shape3::new(2, 3, 4));
        assert_eq!(serde_json::to_string(&s).unwrap(), "[2,3,4]");
    }
}
