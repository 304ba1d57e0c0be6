//! Node arena and transform hierarchy
//!
//! [`NodeTree`] owns every node. Parents own their children through the
//! child list; the parent link is a plain [`NodeId`] and never keeps a
//! parent alive. A node created with [`NodeTree::create`] is detached until
//! it is added somewhere, and stays in the arena after removal until
//! [`NodeTree::destroy`] frees it with its subtree.

use super::node::{Node, NodeRole};
use super::SceneError;
use crate::foundation::bounds::BoundingBox;
use crate::foundation::collections::{NodeId, SlotMap};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::geometry::GeometryRegistry;

/// Traversal control returned by visitors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Visit the children of this node
    Continue,
    /// Do not descend into this node's children
    SkipChildren,
}

/// Arena of nodes forming one or more trees
#[derive(Debug, Default, Clone)]
pub struct NodeTree {
    nodes: SlotMap<NodeId, Node>,
    next_serial: u64,
}

impl NodeTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Create a detached node
    pub fn create(&mut self, role: NodeRole) -> NodeId {
        self.next_serial += 1;
        self.nodes.insert(Node::new(self.next_serial, role))
    }
    
    /// Create a detached node with a name
    pub fn create_named(&mut self, name: impl Into<String>, role: NodeRole) -> NodeId {
        let id = self.create(role);
        self.nodes[id].name = name.into();
        id
    }
    
    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    
    /// True when the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    
    /// True if the id refers to a live node
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }
    
    /// Look up a node
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }
    
    /// Look up a node mutably
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }
    
    /// Look up a node, failing with [`SceneError::NodeNotFound`]
    pub fn node(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }
    
    /// Look up a node mutably, failing with [`SceneError::NodeNotFound`]
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))
    }
    
    /// Iterate over every live node
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }
    
    /// Rename a node
    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), SceneError> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }
    
    /// Attach `child` under `parent`, detaching it from any previous parent
    ///
    /// Fails if `parent` is `child` itself or one of its descendants.
    pub fn add(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.node(parent)?;
        let current_parent = self.node(child)?.parent;
        if parent == child {
            return Err(SceneError::SelfParenting(child));
        }
        if current_parent == Some(parent) {
            return Ok(());
        }
        if self.is_ancestor(child, parent) {
            log::warn!("Rejected add of {child:?} under its own descendant {parent:?}");
            return Err(SceneError::Cycle { parent, child });
        }
        
        if let Some(old_parent) = current_parent {
            self.unlink(old_parent, child);
        }
        self.nodes[parent].children.push(child);
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        node.link_revision += 1;
        log::debug!("Attached {child:?} to {parent:?}");
        Ok(())
    }
    
    /// Detach `child` from `parent`; returns false if it was not a child of `parent`
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> Result<bool, SceneError> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Ok(false);
        }
        self.unlink(parent, child);
        Ok(true)
    }
    
    /// Detach a node from its parent, returning the former parent
    pub fn detach(&mut self, child: NodeId) -> Result<Option<NodeId>, SceneError> {
        let parent = self.node(child)?.parent;
        if let Some(parent) = parent {
            self.unlink(parent, child);
        }
        Ok(parent)
    }
    
    /// Detach every child of `parent`, returning them in their former order
    pub fn remove_all(&mut self, parent: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let children = std::mem::take(&mut self.node_mut(parent)?.children);
        for &child in &children {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = None;
                node.link_revision += 1;
            }
        }
        Ok(children)
    }
    
    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
            c.link_revision += 1;
        }
    }
    
    /// True if `ancestor` appears on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|n| n.parent);
        }
        false
    }
    
    /// Topmost ancestor of a node (the node itself when detached)
    pub fn root_of(&self, node: NodeId) -> NodeId {
        let mut current = node;
        while let Some(parent) = self.nodes.get(current).and_then(|n| n.parent) {
            current = parent;
        }
        current
    }
    
    /// Direct child with the given name
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes.get(parent)?
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }
    
    /// First descendant (pre-order, excluding `root`) with the given name
    pub fn descendant_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        let mut found = None;
        self.traverse(root, |id, node| {
            if found.is_some() {
                return Visit::SkipChildren;
            }
            if id != root && node.name == name {
                found = Some(id);
            }
            Visit::Continue
        });
        found
    }
    
    /// Resolve a `/`-separated path of child names below `root`
    ///
    /// Empty segments are ignored, so `"a//b/"` equals `"a/b"` and `""` is `root`.
    pub fn query_node(&self, root: NodeId, path: &str) -> Option<NodeId> {
        self.nodes.get(root)?;
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(root, |current, segment| self.child_by_name(current, segment))
    }
    
    /// Path of names from below `root` down to `node`, or `None` if `node` is not under `root`
    pub fn path_of(&self, node: NodeId, root: NodeId) -> Option<String> {
        let mut names = Vec::new();
        let mut current = node;
        while current != root {
            let n = self.nodes.get(current)?;
            names.push(n.name.as_str());
            current = n.parent?;
        }
        names.reverse();
        Some(names.join("/"))
    }
    
    /// Pre-order traversal starting at `root`
    pub fn traverse(&self, root: NodeId, mut visitor: impl FnMut(NodeId, &Node) -> Visit) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else { continue };
            if visitor(id, node) == Visit::Continue {
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }
    
    /// `root` and all of its descendants in pre-order
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.traverse(root, |id, _| {
            ids.push(id);
            Visit::Continue
        });
        ids
    }
    
    fn parent_world(&self, id: NodeId) -> Option<(Mat4, u64)> {
        let parent = self.nodes.get(id)?.parent?;
        self.nodes.get(parent).map(|p| (p.world, p.world_revision))
    }
    
    fn refresh_world(&mut self, id: NodeId, force: bool) -> bool {
        let parent = self.parent_world(id);
        let parent_revision = parent.map_or(0, |(_, rev)| rev);
        let node = &mut self.nodes[id];
        node.update_local();
        if !force && !node.world_is_stale(parent_revision) {
            return false;
        }
        let world = match parent {
            Some((parent_world, _)) => parent_world * node.local,
            None => node.local,
        };
        node.store_world(world, parent_revision);
        true
    }
    
    /// Update local and world matrices of `root` and its visible descendants, top-down
    ///
    /// A matrix is only rebuilt when its inputs changed, unless `force` is set.
    /// Hidden children are skipped together with their subtrees.
    pub fn update(&mut self, root: NodeId, force: bool) {
        if !self.nodes.contains_key(root) {
            return;
        }
        let mut stack = vec![(root, force)];
        while let Some((id, force)) = stack.pop() {
            let changed = self.refresh_world(id, force);
            let force = force || changed;
            let count = self.nodes[id].children.len();
            for i in (0..count).rev() {
                let child = self.nodes[id].children[i];
                if self.nodes.get(child).is_some_and(|c| c.visible) {
                    stack.push((child, force));
                }
            }
        }
    }
    
    /// Bring the world matrix of a single node up to date by updating its ancestor chain top-down
    pub fn update_world_chain(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.node(id)?;
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current].parent {
            chain.push(parent);
            current = parent;
        }
        for &node in chain.iter().rev() {
            self.refresh_world(node, false);
        }
        Ok(())
    }
    
    /// Replace the local matrix and decompose it into position, rotation and scale
    pub fn set_local_transform(&mut self, id: NodeId, local: Mat4) -> Result<(), SceneError> {
        self.node_mut(id)?.set_local_matrix(local);
        Ok(())
    }
    
    /// Place a node so that its world matrix equals `world`
    ///
    /// The local matrix becomes `inverse(parent.world) * world`, using the
    /// parent's world matrix as of its last update.
    pub fn set_world_transform(&mut self, id: NodeId, world: Mat4) -> Result<(), SceneError> {
        self.node(id)?;
        let parent = self.parent_world(id);
        let local = match parent {
            Some((parent_world, _)) => {
                let inverse = parent_world
                    .try_inverse()
                    .ok_or(SceneError::SingularTransform(id))?;
                inverse * world
            }
            None => world,
        };
        let node = &mut self.nodes[id];
        node.set_local_matrix(local);
        node.store_world(world, parent.map_or(0, |(_, rev)| rev));
        Ok(())
    }
    
    /// World-space position as of the last update
    pub fn world_position(&self, id: NodeId) -> Result<Vec3, SceneError> {
        Ok(self.node(id)?.world.translation_part())
    }
    
    /// Rotate a node by `angle` radians around an axis through `point` (parent space)
    pub fn rotate_around(&mut self, id: NodeId, point: Vec3, axis: Vec3, angle: f32) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        let offset = node.transform.position - point;
        let local = Mat4::new_translation(&point)
            * Mat4::rotation_about(&axis, angle)
            * Mat4::new_translation(&offset)
            * node.transform.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&node.transform.scale);
        node.set_local_matrix(local);
        Ok(())
    }
    
    /// Orient a node so its `-Z` axis points at `target` (parent space), keeping its scale
    pub fn look_at(&mut self, id: NodeId, target: Vec3, up: Vec3) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        let position = node.transform.position;
        if (target - position).norm_squared() <= f32::EPSILON {
            return Err(SceneError::DegenerateLookAt(id));
        }
        let facing = Mat4::look_at(position, target, up)
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or(SceneError::DegenerateLookAt(id))?;
        let scale = node.transform.scale;
        node.set_local_matrix(facing * Mat4::new_nonuniform_scaling(&scale));
        node.transform.scale = scale;
        node.target = Some(target);
        Ok(())
    }
    
    /// Box around every visible descendant geometry accepted by `filter`, in the parent space of `id`
    pub fn bounding_box(
        &self,
        id: NodeId,
        geometries: &GeometryRegistry,
        filter: impl Fn(&Node) -> bool,
    ) -> Result<BoundingBox, SceneError> {
        self.node(id)?;
        let to_parent = match self.parent_world(id) {
            Some((parent_world, _)) => parent_world.try_inverse().ok_or(SceneError::SingularTransform(id))?,
            None => Mat4::identity(),
        };
        let mut bbox = BoundingBox::empty();
        self.traverse(id, |_, node| {
            if !node.visible {
                return Visit::SkipChildren;
            }
            let geometry_box = node
                .mesh()
                .and_then(|mesh| mesh.geometry)
                .and_then(|g| geometries.get(g))
                .and_then(|g| g.bounding_box());
            if let Some(local_box) = geometry_box {
                if filter(node) {
                    bbox.union(&local_box.transformed(&(to_parent * node.world)));
                }
            }
            Visit::Continue
        });
        Ok(bbox)
    }
    
    /// Deep-copy a subtree; the copy is detached
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId, SceneError> {
        let source = self.node(id)?.clone();
        self.next_serial += 1;
        let mut copy = source.clone();
        copy.serial = self.next_serial;
        copy.parent = None;
        copy.children = Vec::new();
        copy.link_revision = 0;
        copy.world_built_from = (u64::MAX, u64::MAX, u64::MAX);
        let copy_id = self.nodes.insert(copy);
        
        for child in source.children {
            let child_copy = self.clone_subtree(child)?;
            self.add(copy_id, child_copy)?;
        }
        Ok(copy_id)
    }
    
    /// Detach a node and free it together with its subtree
    ///
    /// Returns the freed ids in pre-order.
    pub fn destroy(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        self.detach(id)?;
        let removed = self.descendants(id);
        for &node in &removed {
            self.nodes.remove(node);
        }
        Ok(removed)
    }
}
