//! Math utilities and types
//!
//! Provides the fundamental math types used by the transform hierarchy,
//! the camera and the culling code. Matrices follow the column-vector
//! convention of nalgebra and the OpenGL clip space (`z` in `[-1, 1]`,
//! camera looking down `-Z`).

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix3, Matrix4,
    Quaternion,
    Unit,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Position, rotation and scale of a node relative to its parent
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in parent space
    pub position: Vec3,
    
    /// Rotation quaternion
    pub rotation: Quat,
    
    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }
    
    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
    
    /// Convert to a transformation matrix (scale, then rotation, then translation)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
    
    /// Decompose an affine matrix into position, rotation and scale
    ///
    /// A mirrored basis (negative determinant) is folded into a negative
    /// X scale. Degenerate axes keep a zero scale and contribute nothing
    /// to the rotation.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);
        
        let col_x = Vec3::new(matrix[(0, 0)], matrix[(1, 0)], matrix[(2, 0)]);
        let col_y = Vec3::new(matrix[(0, 1)], matrix[(1, 1)], matrix[(2, 1)]);
        let col_z = Vec3::new(matrix[(0, 2)], matrix[(1, 2)], matrix[(2, 2)]);
        
        let mut scale_x = col_x.magnitude();
        let scale_y = col_y.magnitude();
        let scale_z = col_z.magnitude();
        
        let basis = Mat3::from_columns(&[col_x, col_y, col_z]);
        if basis.determinant() < 0.0 {
            scale_x = -scale_x;
        }
        let scale = Vec3::new(scale_x, scale_y, scale_z);
        
        let safe = |v: Vec3, s: f32| if s.abs() > f32::EPSILON { v / s } else { Vec3::zeros() };
        let rotation_matrix = Mat3::from_columns(&[
            safe(col_x, scale_x),
            safe(col_y, scale_y),
            safe(col_z, scale_z),
        ]);
        let rotation = Quat::from_matrix(&rotation_matrix);
        
        Self {
            position,
            rotation,
            scale,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;
    
    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;
    
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Rotation of `angle` radians around an arbitrary axis
    fn rotation_about(axis: &Vec3, angle: f32) -> Mat4;
    
    /// OpenGL-style perspective projection (`fov_y` in radians)
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;
    
    /// OpenGL-style orthographic projection
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;
    
    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;
    
    /// Translation part of an affine matrix
    fn translation_part(&self) -> Vec3;
    
    /// True when the bottom row is `(0, 0, 0, 1)`, i.e. no perspective divide
    fn is_affine_projection(&self) -> bool;
}

impl Mat4Ext for Mat4 {
    fn rotation_about(axis: &Vec3, angle: f32) -> Mat4 {
        match Unit::try_new(*axis, f32::EPSILON) {
            Some(axis) => Mat4::from_axis_angle(&axis, angle),
            None => Mat4::identity(),
        }
    }
    
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, near, far)
    }
    
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }
    
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }
    
    fn translation_part(&self) -> Vec3 {
        Vec3::new(self[(0, 3)], self[(1, 3)], self[(2, 3)])
    }
    
    fn is_affine_projection(&self) -> bool {
        self[(3, 0)] == 0.0 && self[(3, 1)] == 0.0 && self[(3, 2)] == 0.0 && self[(3, 3)] == 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    const EPSILON: f32 = 1e-5;
    
    #[test]
    fn test_transform_matrix_round_trip() {
        let transform = Transform {
            position: Vec3::new(1.0, -2.0, 3.0),
            rotation: Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
            scale: Vec3::new(2.0, 0.5, 1.5),
        };
        
        let decomposed = Transform::from_matrix(&transform.to_matrix());
        
        assert_relative_eq!(decomposed.position, transform.position, epsilon = EPSILON);
        assert_relative_eq!(decomposed.scale, transform.scale, epsilon = EPSILON);
        assert_relative_eq!(decomposed.rotation.angle_to(&transform.rotation), 0.0, epsilon = 1e-3);
    }
    
    #[test]
    fn test_mirrored_matrix_folds_into_negative_x_scale() {
        let matrix = Mat4::new_nonuniform_scaling(&Vec3::new(-1.0, 1.0, 1.0));
        let decomposed = Transform::from_matrix(&matrix);
        
        assert_relative_eq!(decomposed.scale, Vec3::new(-1.0, 1.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(decomposed.to_matrix(), matrix, epsilon = EPSILON);
    }
    
    #[test]
    fn test_rotation_about_zero_axis_is_identity() {
        assert_eq!(Mat4::rotation_about(&Vec3::zeros(), 1.0), Mat4::identity());
    }
    
    #[test]
    fn test_projection_kinds() {
        let persp = Mat4::perspective(1.0, 1.5, 0.1, 100.0);
        let ortho = Mat4::orthographic(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0);
        
        assert!(!persp.is_affine_projection());
        assert!(ortho.is_affine_projection());
    }
}
