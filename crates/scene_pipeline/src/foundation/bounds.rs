//! Axis-aligned bounding boxes and planes used for culling

use crate::foundation::math::{Mat4, Point3, Vec3, Vec4};

/// Axis-Aligned Bounding Box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    /// Create a new box from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }
    
    /// Inverted box (`min = +inf`, `max = -inf`); the identity for [`union`](Self::union)
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }
    
    /// Create a box centered at a point with given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }
    
    /// Smallest box containing every point
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.expand_point(p);
        }
        bbox
    }
    
    /// True once the box contains at least one point
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }
    
    /// True when every component is finite
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }
    
    /// Get the center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
    
    /// Get the extents (half-size) of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
    
    /// Check if this box contains a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }
    
    /// Check if this box intersects another box
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }
    
    /// Grow the box to include a point
    pub fn expand_point(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }
    
    /// Grow the box to include another box
    pub fn union(&mut self, other: &Self) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }
    
    /// The eight corners, ordered by (x, y, z) bit pattern
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
    
    /// Box around the eight corners transformed by an affine matrix
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if !self.is_valid() {
            return *self;
        }
        let corners = self.corners().map(|c| matrix.transform_point(&Point3::from(c)).coords);
        Self::from_points(corners.iter())
    }
    
    /// Box around the eight corners projected into normalized device coordinates
    ///
    /// Every corner must lie in front of the camera (`w > 0`); callers clip
    /// the near extent first.
    pub fn projected(&self, projection: &Mat4) -> Self {
        let corners = self.corners().map(|c| {
            let clip = projection * Vec4::new(c.x, c.y, c.z, 1.0);
            clip.xyz() / clip.w
        });
        Self::from_points(corners.iter())
    }
}

/// Plane defined by normal and distance from origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (normalized)
    pub normal: Vec3,
    /// Distance from origin along the normal
    pub distance: f32,
}

impl Plane {
    /// Create a plane from `ax + by + cz + d = 0` coefficients, normalizing them
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let normal = coefficients.xyz();
        let length = normal.magnitude();
        if length > f32::EPSILON {
            Self { normal: normal / length, distance: coefficients.w / length }
        } else {
            Self { normal, distance: coefficients.w }
        }
    }
    
    /// Calculate signed distance from plane to point
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    #[test]
    fn test_bbox_contains_point() {
        let bbox = BoundingBox::new(Vec3::repeat(-1.0), Vec3::repeat(1.0));
        
        assert!(bbox.contains_point(&Vec3::zeros()));
        assert!(bbox.contains_point(&Vec3::new(0.5, 0.5, 0.5)));
        assert!(!bbox.contains_point(&Vec3::new(2.0, 0.0, 0.0)));
    }
    
    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(Vec3::zeros(), Vec3::repeat(2.0));
        let b = BoundingBox::new(Vec3::repeat(1.0), Vec3::repeat(3.0));
        let c = BoundingBox::new(Vec3::repeat(5.0), Vec3::repeat(7.0));
        
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
    
    #[test]
    fn test_empty_box_is_union_identity() {
        let mut bbox = BoundingBox::empty();
        assert!(!bbox.is_valid());
        
        bbox.union(&BoundingBox::new(Vec3::zeros(), Vec3::repeat(1.0)));
        assert_eq!(bbox, BoundingBox::new(Vec3::zeros(), Vec3::repeat(1.0)));
    }
    
    #[test]
    fn test_transformed_box_covers_rotated_corners() {
        let bbox = BoundingBox::new(Vec3::repeat(-1.0), Vec3::repeat(1.0));
        let rotation = Mat4::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);
        let rotated = bbox.transformed(&rotation);
        
        let half_diagonal = 2.0_f32.sqrt();
        assert_relative_eq!(rotated.max.x, half_diagonal, epsilon = 1e-5);
        assert_relative_eq!(rotated.min.y, -half_diagonal, epsilon = 1e-5);
        assert_relative_eq!(rotated.max.z, 1.0, epsilon = 1e-5);
    }
    
    #[test]
    fn test_plane_signed_distance() {
        let plane = Plane::from_coefficients(Vec4::new(0.0, 2.0, 0.0, -4.0));
        
        assert_relative_eq!(plane.distance_to_point(&Vec3::new(0.0, 5.0, 0.0)), 3.0, epsilon = 1e-6);
        assert_relative_eq!(plane.distance_to_point(&Vec3::zeros()), -2.0, epsilon = 1e-6);
    }
}
