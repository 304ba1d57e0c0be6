//! # Camera
//!
//! Camera data attached to a scene node through [`NodeRole::Camera`](crate::scene::NodeRole).
//! The node supplies the world transform; the camera derives its view
//! matrix from it and owns the projection, its inverse and the view-space
//! frustum used for culling.
//!
//! ## Conventions
//! - View space is right-handed with the camera looking down `-Z`.
//! - Clip space follows OpenGL (`z` in `[-1, 1]`).
//! - The projection and frustum are rebuilt on [`CameraData::update`], so
//!   lens changes take effect on the next frame.

use crate::foundation::bounds::BoundingBox;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Point3, Vec2, Vec3, Vec4};
use crate::render::frustum::Frustum;

/// Smallest near distance [`CameraData::fit_clip_planes`] will choose
const MIN_NEAR: f32 = 1e-3;

/// Lens description from which the projection matrix is built
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Perspective projection
    Perspective {
        /// Vertical field of view in degrees
        fov_y: f32,
        /// Width / height
        aspect: f32,
        /// Near plane distance (> 0)
        near: f32,
        /// Far plane distance (> near)
        far: f32,
    },
    /// Orthographic projection
    Orthographic {
        /// Left plane
        left: f32,
        /// Right plane
        right: f32,
        /// Bottom plane
        bottom: f32,
        /// Top plane
        top: f32,
        /// Near plane distance
        near: f32,
        /// Far plane distance
        far: f32,
    },
}

impl Projection {
    /// Build the projection matrix
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Self::Perspective { fov_y, aspect, near, far } => {
                Mat4::perspective(utils::deg_to_rad(fov_y), aspect, near, far)
            }
            Self::Orthographic { left, right, bottom, top, near, far } => {
                Mat4::orthographic(left, right, bottom, top, near, far)
            }
        }
    }
    
    /// Near plane distance
    pub fn near(&self) -> f32 {
        match *self {
            Self::Perspective { near, .. } | Self::Orthographic { near, .. } => near,
        }
    }
    
    /// Far plane distance
    pub fn far(&self) -> f32 {
        match *self {
            Self::Perspective { far, .. } | Self::Orthographic { far, .. } => far,
        }
    }
    
    fn set_clip_planes(&mut self, new_near: f32, new_far: f32) {
        match self {
            Self::Perspective { near, far, .. } | Self::Orthographic { near, far, .. } => {
                *near = new_near;
                *far = new_far;
            }
        }
    }
}

/// World-space ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin
    pub origin: Vec3,
    /// Normalized direction
    pub direction: Vec3,
}

/// Camera state carried by a camera node
#[derive(Debug, Clone)]
pub struct CameraData {
    projection: Projection,
    projection_matrix: Mat4,
    inverse_projection: Mat4,
    view_matrix: Mat4,
    world_matrix: Mat4,
    frustum: Frustum,
    /// View-space box around every shadow-casting object considered last frame
    pub scene_bounds_last_frame: BoundingBox,
}

impl CameraData {
    /// Create a camera from a lens description
    pub fn new(projection: Projection) -> Self {
        let projection_matrix = projection.matrix();
        Self {
            projection,
            inverse_projection: projection_matrix.try_inverse().unwrap_or_else(Mat4::identity),
            frustum: Frustum::from_projection(&projection_matrix),
            projection_matrix,
            view_matrix: Mat4::identity(),
            world_matrix: Mat4::identity(),
            scene_bounds_last_frame: BoundingBox::empty(),
        }
    }
    
    /// Create a perspective camera
    ///
    /// # Arguments
    /// * `fov_y` - Vertical field of view in degrees
    /// * `aspect` - Aspect ratio (width / height)
    /// * `near` - Distance to near clipping plane (must be > 0)
    /// * `far` - Distance to far clipping plane (must be > near)
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Perspective { fov_y, aspect, near, far })
    }
    
    /// Create an orthographic camera
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        Self::new(Projection::Orthographic { left, right, bottom, top, near, far })
    }
    
    /// Lens description
    pub fn projection(&self) -> &Projection {
        &self.projection
    }
    
    /// Replace the lens; matrices follow on the next [`update`](Self::update)
    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }
    
    /// Rebuild the projection matrix, its inverse and the frustum from the lens
    pub fn update_projection(&mut self) {
        self.projection_matrix = self.projection.matrix();
        self.inverse_projection = self.projection_matrix.try_inverse().unwrap_or_else(Mat4::identity);
        self.frustum = Frustum::from_projection(&self.projection_matrix);
    }
    
    /// Per-frame update from the owning node's world transform
    pub fn update(&mut self, world: &Mat4) {
        self.world_matrix = *world;
        self.view_matrix = world.try_inverse().unwrap_or_else(|| {
            log::warn!("Camera world transform is singular; using identity view");
            Mat4::identity()
        });
        self.update_projection();
    }
    
    /// World to view transform
    pub fn view_matrix(&self) -> &Mat4 {
        &self.view_matrix
    }
    
    /// View to world transform (the node's world transform at the last update)
    pub fn world_matrix(&self) -> &Mat4 {
        &self.world_matrix
    }
    
    /// View to clip transform
    pub fn projection_matrix(&self) -> &Mat4 {
        &self.projection_matrix
    }
    
    /// Clip to view transform
    pub fn inverse_projection(&self) -> &Mat4 {
        &self.inverse_projection
    }
    
    /// View-space frustum
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
    
    /// Near plane distance
    pub fn near(&self) -> f32 {
        self.projection.near()
    }
    
    /// Far plane distance
    pub fn far(&self) -> f32 {
        self.projection.far()
    }
    
    /// World-space ray through a point in normalized device coordinates
    pub fn cast_ray(&self, ndc: Vec2) -> Ray {
        let clip_to_world = self.world_matrix * self.inverse_projection;
        let unproject = |z: f32| {
            let p = clip_to_world * Vec4::new(ndc.x, ndc.y, z, 1.0);
            p.xyz() / p.w
        };
        let near_point = unproject(-1.0);
        let far_point = unproject(1.0);
        Ray {
            origin: near_point,
            direction: (far_point - near_point).normalize(),
        }
    }
    
    /// Tighten near/far around last frame's scene box
    ///
    /// Returns `false` and leaves the lens untouched when nothing in front of
    /// the camera was recorded.
    pub fn fit_clip_planes(&mut self, margin: f32) -> bool {
        let bounds = self.scene_bounds_last_frame;
        if !bounds.is_valid() || !bounds.is_finite() || bounds.min.z >= 0.0 {
            return false;
        }
        let near = (-bounds.max.z - margin).max(MIN_NEAR);
        let far = (-bounds.min.z + margin).max(near + MIN_NEAR);
        self.projection.set_clip_planes(near, far);
        self.update_projection();
        log::debug!("Camera clip planes fitted to near={near:.4} far={far:.4}");
        true
    }
    
    /// View-space position of a world-space point
    pub fn to_view_space(&self, point: &Vec3) -> Vec3 {
        self.view_matrix.transform_point(&Point3::from(*point)).coords
    }
}
