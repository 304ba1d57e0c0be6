//! The scene: a rooted node tree plus per-frame queues and lights

use std::collections::{BTreeMap, HashMap};

use super::lighting::{self, LightGroup};
use super::node::{Node, NodeRole};
use super::render_queue::RenderQueue;
use super::tree::{NodeTree, Visit};
use super::SceneError;
use crate::config::SceneConfig;
use crate::foundation::bounds::BoundingBox;
use crate::foundation::collections::NodeId;
use crate::foundation::math::Mat4;
use crate::geometry::GeometryRegistry;
use crate::render::material::{MaterialId, MaterialRegistry};

/// Rooted node tree with name and camera registries
///
/// Nodes are created in the scene's arena but only take part in a frame
/// once they are attached below [`root`](Self::root). Hierarchy changes
/// made through the scene keep the registries in sync.
#[derive(Debug, Clone)]
pub struct Scene {
    tree: NodeTree,
    root: NodeId,
    names: HashMap<String, NodeId>,
    cameras: Vec<NodeId>,
    main_camera: Option<NodeId>,
    queue: RenderQueue,
    lights: Vec<NodeId>,
    light_groups: BTreeMap<u32, LightGroup>,
    scene_material: Option<MaterialId>,
    config: SceneConfig,
}

impl Scene {
    /// Empty scene with the default configuration
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }
    
    /// Empty scene
    pub fn with_config(config: SceneConfig) -> Self {
        let mut tree = NodeTree::new();
        let root = tree.create_named("SCENE", NodeRole::Group);
        Self {
            tree,
            root,
            names: HashMap::new(),
            cameras: Vec::new(),
            main_camera: None,
            queue: RenderQueue::new(),
            lights: Vec::new(),
            light_groups: BTreeMap::new(),
            scene_material: None,
            config,
        }
    }
    
    /// Root node
    pub fn root(&self) -> NodeId {
        self.root
    }
    
    /// Node arena
    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }
    
    /// Node arena, mutably; use [`add`](Self::add) and [`remove`](Self::remove) for hierarchy changes
    pub fn tree_mut(&mut self) -> &mut NodeTree {
        &mut self.tree
    }
    
    /// Scene settings
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }
    
    /// Scene settings, mutably
    pub fn config_mut(&mut self) -> &mut SceneConfig {
        &mut self.config
    }
    
    /// Look up a node
    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.tree.node(id)
    }
    
    /// Look up a node mutably
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.tree.node_mut(id)
    }
    
    /// Create a detached node
    pub fn create(&mut self, role: NodeRole) -> NodeId {
        self.tree.create(role)
    }
    
    /// Create a detached, named node
    pub fn create_named(&mut self, name: impl Into<String>, role: NodeRole) -> NodeId {
        self.tree.create_named(name, role)
    }
    
    /// Whether `id` is attached below the root
    pub fn contains(&self, id: NodeId) -> bool {
        self.tree.contains(id) && self.tree.root_of(id) == self.root
    }
    
    /// Attach `child` under `parent`, registering it if `parent` is in the scene
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let was_attached = self.contains(child);
        self.tree.add(parent, child)?;
        if self.contains(child) {
            self.register(child);
        } else if was_attached {
            self.unregister(child);
        }
        Ok(())
    }
    
    /// Attach `child` directly under the root
    pub fn add_to_root(&mut self, child: NodeId) -> Result<(), SceneError> {
        self.add(self.root, child)
    }
    
    /// Detach `child` from `parent` and unregister its subtree
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> Result<bool, SceneError> {
        let attached = self.contains(child);
        if attached && self.tree.node(child)?.parent() == Some(parent) {
            self.unregister(child);
        }
        self.tree.remove(parent, child)
    }
    
    /// Detach and free a node and its subtree
    pub fn destroy(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        if id == self.root {
            return Err(SceneError::RootRemoval);
        }
        if self.contains(id) {
            self.unregister(id);
        }
        self.tree.destroy(id)
    }
    
    /// Rename a node, keeping the name registry in sync
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        let name = name.into();
        let old = self.tree.node(id)?.name().to_string();
        self.tree.set_name(id, name.clone())?;
        if self.contains(id) {
            if self.names.get(&old) == Some(&id) {
                self.names.remove(&old);
            }
            self.names.insert(name, id);
        }
        Ok(())
    }
    
    /// Attached node with the given name
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }
    
    /// Node at a `/`-separated path below the root
    pub fn query(&self, path: &str) -> Result<NodeId, SceneError> {
        self.tree
            .query_node(self.root, path)
            .ok_or_else(|| SceneError::InvalidPath(path.to_string()))
    }
    
    /// Cameras attached to the scene, in registration order
    pub fn cameras(&self) -> &[NodeId] {
        &self.cameras
    }
    
    /// Camera used when none is given explicitly
    pub fn main_camera(&self) -> Option<NodeId> {
        self.main_camera
    }
    
    /// Choose the main camera
    pub fn set_main_camera(&mut self, id: NodeId) -> Result<(), SceneError> {
        if self.tree.node(id)?.camera().is_none() {
            return Err(SceneError::NotACamera(id));
        }
        self.main_camera = Some(id);
        Ok(())
    }
    
    /// Material replacing every object's material, if any
    pub fn scene_material(&self) -> Option<MaterialId> {
        self.scene_material
    }
    
    /// Override (or stop overriding) every object's material
    pub fn set_scene_material(&mut self, material: Option<MaterialId>) {
        self.scene_material = material;
    }
    
    fn register(&mut self, id: NodeId) {
        let names = &mut self.names;
        let cameras = &mut self.cameras;
        self.tree.traverse(id, |node_id, node| {
            names.insert(node.name().to_string(), node_id);
            if node.camera().is_some() && !cameras.contains(&node_id) {
                cameras.push(node_id);
            }
            Visit::Continue
        });
        if self.cameras.len() > 1 {
            log::warn!("Scene has {} cameras registered", self.cameras.len());
        }
        if self.main_camera.is_none() {
            self.main_camera = self.cameras.first().copied();
        }
    }
    
    fn unregister(&mut self, id: NodeId) {
        let names = &mut self.names;
        let cameras = &mut self.cameras;
        self.tree.traverse(id, |node_id, node| {
            if names.get(node.name()) == Some(&node_id) {
                names.remove(node.name());
            }
            cameras.retain(|&c| c != node_id);
            Visit::Continue
        });
        if self.main_camera.is_some_and(|c| !self.cameras.contains(&c)) {
            self.main_camera = self.cameras.first().copied();
        }
    }
    
    /// Update transforms, rebuild the render queues and, if enabled, the light data
    pub fn update(&mut self, force: bool, materials: &MaterialRegistry) {
        self.tree.update(self.root, force);
        self.rebuild_queues(materials);
        if self.config.update_lights {
            self.update_lights();
        }
        log::trace!(
            "Scene update: {} opaque, {} transparent, {} lights",
            self.queue.opaque().len(),
            self.queue.transparent().len(),
            self.lights.len()
        );
    }
    
    fn rebuild_queues(&mut self, materials: &MaterialRegistry) {
        let override_transparent = self
            .scene_material
            .and_then(|id| materials.get(id))
            .is_some_and(|m| m.transparent);
        let queue = &mut self.queue;
        let lights = &mut self.lights;
        queue.begin();
        lights.clear();
        
        self.tree.traverse(self.root, |id, node| {
            if !node.visible {
                return Visit::SkipChildren;
            }
            match &node.role {
                NodeRole::Light(_) => lights.push(id),
                NodeRole::Mesh(mesh) if mesh.is_renderable() => {
                    let transparent = override_transparent
                        || mesh.material.and_then(|m| materials.get(m)).is_some_and(|m| m.transparent);
                    queue.push(id, transparent);
                }
                _ => {}
            }
            Visit::Continue
        });
        queue.end();
    }
    
    fn update_lights(&mut self) {
        let mut packed: Vec<_> = self
            .lights
            .iter()
            .filter_map(|&id| self.tree.get(id))
            .filter_map(|node| node.light().map(|light| (light, *node.world_transform())))
            .collect();
        // Shadow casters first; the sort is stable so tree order holds otherwise.
        packed.sort_by_key(|(light, _)| !light.cast_shadow);
        lighting::pack_lights(&mut self.light_groups, &packed);
    }
    
    /// Render queues built by the last update
    pub fn queue(&self) -> &RenderQueue {
        &self.queue
    }
    
    pub(crate) fn queue_and_tree_mut(&mut self) -> (&mut RenderQueue, &NodeTree) {
        (&mut self.queue, &self.tree)
    }
    
    /// Visible lights found by the last update, in tree order
    pub fn lights(&self) -> &[NodeId] {
        &self.lights
    }
    
    /// Light state of a group
    pub fn light_group(&self, group: u32) -> Option<&LightGroup> {
        self.light_groups.get(&group)
    }
    
    /// Light program key of a group; empty when the group has no lights
    pub fn light_program_key(&self, group: u32) -> &str {
        self.light_groups.get(&group).map_or("", LightGroup::program_key)
    }
    
    /// Whether the light counts of a group changed in the last update
    pub fn is_light_number_changed(&self, group: u32) -> bool {
        self.light_groups.get(&group).is_some_and(LightGroup::is_light_number_changed)
    }
    
    /// Box around every visible geometry in the scene, in world space
    pub fn bounding_box(&self, geometries: &GeometryRegistry) -> BoundingBox {
        self.tree
            .bounding_box(self.root, geometries, |_| true)
            .unwrap_or_else(|_| BoundingBox::empty())
    }
    
    /// World matrix of a node as of the last update
    pub fn world_transform(&self, id: NodeId) -> Result<Mat4, SceneError> {
        Ok(*self.tree.node(id)?.world_transform())
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryId;
    use crate::render::camera::CameraData;
    use crate::render::material::Material;
    use crate::render::shader::ShaderId;
    use crate::scene::{LightData, LightKind, MeshData};
    
    struct Fixture {
        scene: Scene,
        materials: MaterialRegistry,
        opaque: MaterialId,
        glass: MaterialId,
    }
    
    fn fixture() -> Fixture {
        let mut materials = MaterialRegistry::new();
        let opaque = materials.insert(Material::new("opaque", ShaderId(1)));
        let glass = materials.insert(Material::new("glass", ShaderId(1)).with_transparent(true));
        Fixture {
            scene: Scene::new(),
            materials,
            opaque,
            glass,
        }
    }
    
    fn mesh(scene: &mut Scene, parent: NodeId, name: &str, material: MaterialId) -> NodeId {
        let id = scene.create_named(name, NodeRole::Mesh(MeshData::new(GeometryId(1), material)));
        scene.add(parent, id).unwrap();
        id
    }
    
    #[test]
    fn test_queues_split_by_transparency() {
        let Fixture { mut scene, materials, opaque, glass } = fixture();
        let root = scene.root();
        let a = mesh(&mut scene, root, "a", opaque);
        let b = mesh(&mut scene, root, "b", glass);
        let c = mesh(&mut scene, a, "c", glass);
        scene.update(false, &materials);
        
        let opaque_nodes: Vec<NodeId> = scene.queue().opaque().iter().map(|i| i.node).collect();
        let transparent_nodes: Vec<NodeId> = scene.queue().transparent().iter().map(|i| i.node).collect();
        assert_eq!(opaque_nodes, vec![a]);
        assert_eq!(transparent_nodes, vec![c, b]);
    }
    
    #[test]
    fn test_hidden_subtree_is_not_queued() {
        let Fixture { mut scene, materials, opaque, .. } = fixture();
        let root = scene.root();
        let group = scene.create_named("group", NodeRole::Group);
        scene.add_to_root(group).unwrap();
        let inner = mesh(&mut scene, group, "inner", opaque);
        let outer = mesh(&mut scene, root, "outer", opaque);
        scene.update(false, &materials);
        let inner_revision = scene.node(inner).unwrap().world_revision();
        
        scene.node_mut(group).unwrap().visible = false;
        scene.node_mut(inner).unwrap().set_position(crate::foundation::math::Vec3::new(1.0, 0.0, 0.0));
        scene.update(false, &materials);
        
        let queued: Vec<NodeId> = scene.queue().opaque().iter().map(|i| i.node).collect();
        assert_eq!(queued, vec![outer]);
        assert!(scene.queue().transparent().is_empty());
        assert_eq!(scene.node(inner).unwrap().world_revision(), inner_revision);
    }
    
    #[test]
    fn test_queue_storage_is_reused() {
        let Fixture { mut scene, materials, opaque, .. } = fixture();
        let root = scene.root();
        let nodes: Vec<NodeId> = (0..8).map(|i| mesh(&mut scene, root, &format!("m{i}"), opaque)).collect();
        scene.update(false, &materials);
        let capacity = scene.queue().opaque.capacity();
        
        for &id in &nodes[2..] {
            scene.node_mut(id).unwrap().visible = false;
        }
        scene.update(false, &materials);
        
        assert_eq!(scene.queue().opaque().len(), 2);
        assert_eq!(scene.queue().opaque.capacity(), capacity);
    }
    
    #[test]
    fn test_scene_material_forces_transparency() {
        let Fixture { mut scene, materials, opaque, glass } = fixture();
        let root = scene.root();
        mesh(&mut scene, root, "a", opaque);
        scene.set_scene_material(Some(glass));
        scene.update(false, &materials);
        
        assert!(scene.queue().opaque().is_empty());
        assert_eq!(scene.queue().transparent().len(), 1);
    }
    
    #[test]
    fn test_name_registry_follows_hierarchy() {
        let Fixture { mut scene, opaque, .. } = fixture();
        let root = scene.root();
        let a = mesh(&mut scene, root, "a", opaque);
        let detached = scene.create_named("detached", NodeRole::Group);
        
        assert_eq!(scene.node_by_name("a"), Some(a));
        assert_eq!(scene.node_by_name("detached"), None);
        
        scene.set_name(a, "renamed").unwrap();
        assert_eq!(scene.node_by_name("a"), None);
        assert_eq!(scene.node_by_name("renamed"), Some(a));
        
        scene.remove(root, a).unwrap();
        assert_eq!(scene.node_by_name("renamed"), None);
        
        scene.add(detached, a).unwrap();
        assert_eq!(scene.node_by_name("renamed"), None);
        scene.add_to_root(detached).unwrap();
        assert_eq!(scene.node_by_name("renamed"), Some(a));
        assert_eq!(scene.query("detached/renamed").unwrap(), a);
    }
    
    #[test]
    fn test_camera_registry() {
        let mut scene = Scene::new();
        let first = scene.create(NodeRole::Camera(CameraData::perspective(50.0, 1.0, 0.1, 100.0)));
        let second = scene.create(NodeRole::Camera(CameraData::perspective(50.0, 1.0, 0.1, 100.0)));
        let group = scene.create(NodeRole::Group);
        scene.add_to_root(first).unwrap();
        scene.add_to_root(second).unwrap();
        scene.add_to_root(group).unwrap();
        
        assert_eq!(scene.cameras(), &[first, second]);
        assert_eq!(scene.main_camera(), Some(first));
        assert!(matches!(scene.set_main_camera(group), Err(SceneError::NotACamera(_))));
        
        scene.destroy(first).unwrap();
        assert_eq!(scene.main_camera(), Some(second));
        assert!(matches!(scene.destroy(scene.root()), Err(SceneError::RootRemoval)));
    }
    
    #[test]
    fn test_lights_pack_shadow_casters_first() {
        let Fixture { mut scene, materials, .. } = fixture();
        let soft = scene.create(NodeRole::Light(LightData::new(LightKind::point()).with_cast_shadow(false).with_intensity(0.5)));
        let hard = scene.create(NodeRole::Light(LightData::new(LightKind::point())));
        let hidden = scene.create(NodeRole::Light(LightData::new(LightKind::Directional)));
        scene.add_to_root(soft).unwrap();
        scene.add_to_root(hard).unwrap();
        scene.add_to_root(hidden).unwrap();
        scene.node_mut(hidden).unwrap().visible = false;
        scene.update(false, &materials);
        
        let group = scene.light_group(0).unwrap();
        assert_eq!(scene.lights(), &[soft, hard]);
        assert_eq!(scene.light_program_key(0), "POINT_LIGHT 2");
        assert_eq!(group.uniforms().get("pointLightColor"), Some(&[1.0, 1.0, 1.0, 0.5, 0.5, 0.5][..]));
        assert!(scene.is_light_number_changed(0));
        
        scene.update(false, &materials);
        assert!(!scene.is_light_number_changed(0));
    }
    
    #[test]
    fn test_update_lights_can_be_disabled() {
        let Fixture { materials, .. } = fixture();
        let mut scene = Scene::with_config(SceneConfig::default().with_update_lights(false));
        let light = scene.create(NodeRole::Light(LightData::new(LightKind::Ambient)));
        scene.add_to_root(light).unwrap();
        scene.update(false, &materials);
        
        assert_eq!(scene.lights(), &[light]);
        assert!(scene.light_group(0).is_none());
    }
}
