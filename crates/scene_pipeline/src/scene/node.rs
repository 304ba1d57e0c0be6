//! Scene nodes
//!
//! A [`Node`] is a transform plus a [`NodeRole`]. Hierarchy links are
//! stored as [`NodeId`]s and are only changed through
//! [`NodeTree`](super::NodeTree), which keeps parent and child lists
//! consistent.

use crate::foundation::collections::NodeId;
use crate::foundation::math::{Mat4, Quat, Transform, Vec3};
use crate::geometry::GeometryId;
use crate::render::camera::CameraData;
use crate::render::material::MaterialId;
use crate::scene::light::LightData;

/// Which faces are discarded when face culling is enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    /// Discard back faces
    #[default]
    Back,
    /// Discard front faces
    Front,
    /// Discard everything (still rasterizes points and lines)
    FrontAndBack,
}

/// Winding order of front-facing triangles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    /// Counter-clockwise
    #[default]
    Ccw,
    /// Clockwise
    Cw,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawMode {
    /// Points
    Points,
    /// Separate line segments
    Lines,
    /// Connected line strip
    LineStrip,
    /// Closed line loop
    LineLoop,
    /// Separate triangles
    #[default]
    Triangles,
    /// Triangle strip
    TriangleStrip,
    /// Triangle fan
    TriangleFan,
}

/// Geometry, material and per-object render state of a mesh node
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Geometry to draw
    pub geometry: Option<GeometryId>,
    /// Material to draw with
    pub material: Option<MaterialId>,
    /// Lower orders are drawn first within a queue
    pub render_order: i32,
    /// Enable face culling
    pub culling: bool,
    /// Faces discarded when culling
    pub cull_face: CullFace,
    /// Front-face winding
    pub front_face: FrontFace,
    /// Allow frustum culling of this object
    pub frustum_culling: bool,
    /// Contribute to the camera's scene bounds
    pub cast_shadow: bool,
    /// Receives shadows (forwarded to shaders)
    pub receive_shadow: bool,
    /// Primitive topology
    pub mode: DrawMode,
    /// Line width for line modes
    pub line_width: f32,
    /// Light group whose lights shade this mesh
    pub light_group: u32,
}

impl MeshData {
    /// Mesh drawing `geometry` with `material` and default render state
    pub fn new(geometry: GeometryId, material: MaterialId) -> Self {
        Self {
            geometry: Some(geometry),
            material: Some(material),
            ..Self::default()
        }
    }
    
    /// A renderable has both a geometry and a material
    pub fn is_renderable(&self) -> bool {
        self.geometry.is_some() && self.material.is_some()
    }
    
    /// Set the render order
    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }
    
    /// Enable or disable frustum culling
    pub fn with_frustum_culling(mut self, enabled: bool) -> Self {
        self.frustum_culling = enabled;
        self
    }
    
    /// Set the light group
    pub fn with_light_group(mut self, group: u32) -> Self {
        self.light_group = group;
        self
    }
    
    /// Set the primitive topology
    pub fn with_mode(mut self, mode: DrawMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for MeshData {
    fn default() -> Self {
        Self {
            geometry: None,
            material: None,
            render_order: 0,
            culling: true,
            cull_face: CullFace::Back,
            front_face: FrontFace::Ccw,
            frustum_culling: true,
            cast_shadow: true,
            receive_shadow: true,
            mode: DrawMode::Triangles,
            line_width: 1.0,
            light_group: 0,
        }
    }
}

/// What a node contributes to the frame
#[derive(Debug, Clone)]
pub enum NodeRole {
    /// Pure transform node
    Group,
    /// Drawable object
    Mesh(MeshData),
    /// Light source
    Light(LightData),
    /// Viewpoint
    Camera(CameraData),
}

/// Transform hierarchy element
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) serial: u64,
    /// Hidden nodes and their subtrees are skipped by updates and queues
    pub visible: bool,
    /// When false the local matrix is managed by hand and TRS is ignored
    pub auto_update_local: bool,
    pub(crate) transform: Transform,
    pub(crate) transform_revision: u64,
    pub(crate) local_built_from: u64,
    pub(crate) local_revision: u64,
    pub(crate) link_revision: u64,
    pub(crate) world_built_from: (u64, u64, u64),
    pub(crate) world_revision: u64,
    pub(crate) local: Mat4,
    pub(crate) world: Mat4,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) target: Option<Vec3>,
    /// What the node contributes to the frame
    pub role: NodeRole,
}

impl Node {
    pub(crate) fn new(serial: u64, role: NodeRole) -> Self {
        Self {
            name: format!("NODE_{serial}"),
            serial,
            visible: true,
            auto_update_local: true,
            transform: Transform::identity(),
            // Stale on creation so the first update builds the matrices.
            transform_revision: 1,
            local_built_from: 0,
            local_revision: 0,
            link_revision: 0,
            world_built_from: (u64::MAX, u64::MAX, u64::MAX),
            world_revision: 0,
            local: Mat4::identity(),
            world: Mat4::identity(),
            parent: None,
            children: Vec::new(),
            target: None,
            role,
        }
    }
    
    /// Node name
    pub fn name(&self) -> &str {
        &self.name
    }
    
    /// Creation order within the owning tree
    pub fn serial(&self) -> u64 {
        self.serial
    }
    
    /// Parent node, if attached
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
    
    /// Children in insertion order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
    
    /// Position, rotation and scale relative to the parent
    pub fn transform(&self) -> &Transform {
        &self.transform
    }
    
    /// Replace position, rotation and scale
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.transform_revision += 1;
    }
    
    /// Position relative to the parent
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }
    
    /// Set the position relative to the parent
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
        self.transform_revision += 1;
    }
    
    /// Rotation relative to the parent
    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }
    
    /// Set the rotation relative to the parent
    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
        self.transform_revision += 1;
    }
    
    /// Scale relative to the parent
    pub fn scale(&self) -> Vec3 {
        self.transform.scale
    }
    
    /// Set the scale relative to the parent
    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
        self.transform_revision += 1;
    }
    
    /// Local matrix as of the last update
    pub fn local_transform(&self) -> &Mat4 {
        &self.local
    }
    
    /// World matrix as of the last update
    pub fn world_transform(&self) -> &Mat4 {
        &self.world
    }
    
    /// Number of times the world matrix has been recomputed
    pub fn world_revision(&self) -> u64 {
        self.world_revision
    }
    
    /// Target of the last [`look_at`](super::NodeTree::look_at)
    pub fn target(&self) -> Option<Vec3> {
        self.target
    }
    
    /// True when the local matrix is older than position/rotation/scale
    pub fn needs_local_update(&self) -> bool {
        self.auto_update_local && self.local_built_from != self.transform_revision
    }
    
    /// Mesh data, if this is a mesh node
    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.role {
            NodeRole::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
    
    /// Mutable mesh data, if this is a mesh node
    pub fn mesh_mut(&mut self) -> Option<&mut MeshData> {
        match &mut self.role {
            NodeRole::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
    
    /// Light data, if this is a light node
    pub fn light(&self) -> Option<&LightData> {
        match &self.role {
            NodeRole::Light(light) => Some(light),
            _ => None,
        }
    }
    
    /// Mutable light data, if this is a light node
    pub fn light_mut(&mut self) -> Option<&mut LightData> {
        match &mut self.role {
            NodeRole::Light(light) => Some(light),
            _ => None,
        }
    }
    
    /// Camera data, if this is a camera node
    pub fn camera(&self) -> Option<&CameraData> {
        match &self.role {
            NodeRole::Camera(camera) => Some(camera),
            _ => None,
        }
    }
    
    /// Mutable camera data, if this is a camera node
    pub fn camera_mut(&mut self) -> Option<&mut CameraData> {
        match &mut self.role {
            NodeRole::Camera(camera) => Some(camera),
            _ => None,
        }
    }
    
    /// True for meshes with both geometry and material
    pub fn is_renderable(&self) -> bool {
        self.mesh().is_some_and(MeshData::is_renderable)
    }
    
    /// Rebuild the local matrix if position/rotation/scale changed
    ///
    /// Returns true when the matrix was rebuilt.
    pub(crate) fn update_local(&mut self) -> bool {
        if !self.needs_local_update() {
            return false;
        }
        self.local = self.transform.to_matrix();
        self.local_built_from = self.transform_revision;
        self.local_revision += 1;
        true
    }
    
    /// Install a hand-built local matrix and decompose it back into TRS
    pub(crate) fn set_local_matrix(&mut self, local: Mat4) {
        self.local = local;
        self.transform = Transform::from_matrix(&local);
        self.transform_revision += 1;
        self.local_built_from = self.transform_revision;
        self.local_revision += 1;
    }
    
    /// True when the world matrix predates the local matrix, the parent link
    /// or the parent's world matrix (`parent_revision` is 0 for roots)
    pub(crate) fn world_is_stale(&self, parent_revision: u64) -> bool {
        !self.auto_update_local
            || self.world_built_from != (self.local_revision, self.link_revision, parent_revision)
    }
    
    pub(crate) fn store_world(&mut self, world: Mat4, parent_revision: u64) {
        self.world = world;
        self.world_built_from = (self.local_revision, self.link_revision, parent_revision);
        self.world_revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    #[test]
    fn test_local_rebuilt_only_when_trs_changes() {
        let mut node = Node::new(1, NodeRole::Group);
        assert!(node.update_local());
        assert!(!node.update_local());
        
        node.set_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(node.update_local());
        assert_relative_eq!(node.local_transform()[(1, 3)], 2.0);
    }
    
    #[test]
    fn test_manual_local_matrix_decomposes() {
        let mut node = Node::new(1, NodeRole::Group);
        node.set_local_matrix(Mat4::new_translation(&Vec3::new(4.0, 0.0, 0.0)) * Mat4::new_scaling(2.0));
        
        assert_relative_eq!(node.position(), Vec3::new(4.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(node.scale(), Vec3::repeat(2.0), epsilon = 1e-6);
        assert!(!node.needs_local_update());
    }
    
    #[test]
    fn test_renderable_requires_geometry_and_material() {
        let mut mesh = MeshData::default();
        assert!(!mesh.is_renderable());
        mesh.geometry = Some(GeometryId(1));
        assert!(!mesh.is_renderable());
        mesh.material = Some(MaterialId(1));
        assert!(Node::new(1, NodeRole::Mesh(mesh)).is_renderable());
    }
}
