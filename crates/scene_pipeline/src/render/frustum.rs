//! View-space frustum derived from a projection matrix

use crate::foundation::bounds::{BoundingBox, Plane};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// Six-plane view volume in view space, plus its bounding box
#[derive(Debug, Clone, PartialEq)]
pub struct Frustum {
    /// Planes in the order left, right, bottom, top, near, far; normals point inward
    pub planes: [Plane; 6],
    /// Axis-aligned box around the frustum in view space
    pub bounding_box: BoundingBox,
    /// Corners: near face then far face, each ordered (-x,-y), (x,-y), (-x,y), (x,y)
    pub vertices: [Vec3; 8],
}

impl Default for Frustum {
    fn default() -> Self {
        Self::from_projection(&Mat4::perspective(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 1000.0))
    }
}

impl Frustum {
    /// Extract the frustum from a projection matrix
    ///
    /// Planes come from the Gribb-Hartmann row combinations. The bounding box
    /// and corners are reconstructed from the lens parameters encoded in the
    /// matrix, for both perspective and orthographic projections.
    pub fn from_projection(projection: &Mat4) -> Self {
        let m = projection;
        let row = |i: usize| m.row(i).transpose();
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));
        
        let planes = [
            Plane::from_coefficients(r3 + r0),
            Plane::from_coefficients(r3 - r0),
            Plane::from_coefficients(r3 + r1),
            Plane::from_coefficients(r3 - r1),
            Plane::from_coefficients(r3 + r2),
            Plane::from_coefficients(r3 - r2),
        ];
        
        let (m0, m5, m10) = (m[(0, 0)], m[(1, 1)], m[(2, 2)]);
        let (m12, m13, m14) = (m[(0, 3)], m[(1, 3)], m[(2, 3)]);
        
        let vertices = if m.is_affine_projection() {
            let left = (-1.0 - m12) / m0;
            let right = (1.0 - m12) / m0;
            let bottom = (-1.0 - m13) / m5;
            let top = (1.0 - m13) / m5;
            let z_near = (-1.0 - m14) / m10;
            let z_far = (1.0 - m14) / m10;
            
            let mut vertices = [Vec3::zeros(); 8];
            for (i, &z) in [z_near, z_far].iter().enumerate() {
                vertices[i * 4] = Vec3::new(left, bottom, z);
                vertices[i * 4 + 1] = Vec3::new(right, bottom, z);
                vertices[i * 4 + 2] = Vec3::new(left, top, z);
                vertices[i * 4 + 3] = Vec3::new(right, top, z);
            }
            vertices
        } else {
            let aspect = m5 / m0;
            let z_near = -m14 / (m10 - 1.0);
            let z_far = -m14 / (m10 + 1.0);
            
            let mut vertices = [Vec3::zeros(); 8];
            for (i, &z) in [z_near, z_far].iter().enumerate() {
                let half_y = -z / m5;
                let half_x = half_y * aspect;
                vertices[i * 4] = Vec3::new(-half_x, -half_y, z);
                vertices[i * 4 + 1] = Vec3::new(half_x, -half_y, z);
                vertices[i * 4 + 2] = Vec3::new(-half_x, half_y, z);
                vertices[i * 4 + 3] = Vec3::new(half_x, half_y, z);
            }
            vertices
        };
        
        Self {
            planes,
            bounding_box: BoundingBox::from_points(vertices.iter()),
            vertices,
        }
    }
    
    /// Check if a view-space box is inside or intersects the frustum
    pub fn intersects_aabb(&self, aabb: &BoundingBox) -> bool {
        for plane in &self.planes {
            // Corner of the box furthest along the plane normal
            let mut p = aabb.min;
            if plane.normal.x >= 0.0 { p.x = aabb.max.x; }
            if plane.normal.y >= 0.0 { p.y = aabb.max.y; }
            if plane.normal.z >= 0.0 { p.z = aabb.max.z; }
            
            if plane.distance_to_point(&p) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    const EPSILON: f32 = 1e-3;
    
    #[test]
    fn test_perspective_bounding_box() {
        let fov = std::f32::consts::FRAC_PI_2;
        let frustum = Frustum::from_projection(&Mat4::perspective(fov, 2.0, 1.0, 10.0));
        
        // tan(45 deg) = 1, so the far face spans y in [-10, 10] and x in [-20, 20]
        assert_relative_eq!(frustum.bounding_box.max.z, -1.0, epsilon = EPSILON);
        assert_relative_eq!(frustum.bounding_box.min.z, -10.0, epsilon = EPSILON);
        assert_relative_eq!(frustum.bounding_box.max.y, 10.0, epsilon = EPSILON);
        assert_relative_eq!(frustum.bounding_box.min.x, -20.0, epsilon = EPSILON);
    }
    
    #[test]
    fn test_orthographic_bounding_box() {
        let frustum = Frustum::from_projection(&Mat4::orthographic(-2.0, 4.0, -1.0, 3.0, 0.5, 20.0));
        
        assert_relative_eq!(frustum.bounding_box.min, Vec3::new(-2.0, -1.0, -20.0), epsilon = EPSILON);
        assert_relative_eq!(frustum.bounding_box.max, Vec3::new(4.0, 3.0, -0.5), epsilon = EPSILON);
    }
    
    #[test]
    fn test_planes_classify_boxes() {
        let frustum = Frustum::from_projection(&Mat4::perspective(1.0, 1.0, 0.1, 100.0));
        
        let inside = BoundingBox::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::repeat(1.0));
        let behind = BoundingBox::from_center_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::repeat(1.0));
        let beyond_far = BoundingBox::from_center_extents(Vec3::new(0.0, 0.0, -200.0), Vec3::repeat(1.0));
        
        assert!(frustum.intersects_aabb(&inside));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(!frustum.intersects_aabb(&beyond_far));
    }
}
