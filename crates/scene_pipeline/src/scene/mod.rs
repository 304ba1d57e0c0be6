//! Scene graph
//!
//! Nodes live in a [`NodeTree`] arena. A [`Scene`] owns one tree with a
//! root node, registers names and cameras of attached nodes, and rebuilds
//! the per-frame render queues and packed light uniforms.
//!
//! ```text
//! NodeTree (hierarchy + transforms)
//!      ↓
//! Scene::update (queues + lights)
//!      ↓
//! Renderer (cull, sort, draw)
//! ```

mod graph;
mod light;
mod lighting;
mod node;
mod render_queue;
mod tree;

pub use graph::Scene;
pub use light::{LightData, LightKind, LightType, LightUniformKind};
pub use lighting::{LightGroup, LightUniforms};
pub use node::{CullFace, DrawMode, FrontFace, MeshData, Node, NodeRole};
pub use render_queue::{RenderItem, RenderQueue};
pub use tree::{NodeTree, Visit};

use thiserror::Error;

use crate::foundation::collections::NodeId;

/// Scene graph failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// The node id is stale or belongs to another tree
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),
    
    /// A node cannot be its own parent
    #[error("node {0:?} cannot be added to itself")]
    SelfParenting(NodeId),
    
    /// The new parent is a descendant of the child
    #[error("adding {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// Requested parent
        parent: NodeId,
        /// Node being added
        child: NodeId,
    },
    
    /// The node does not carry a camera
    #[error("node {0:?} is not a camera")]
    NotACamera(NodeId),
    
    /// Target coincides with the eye or is parallel to the up vector
    #[error("cannot orient node {0:?} towards its target")]
    DegenerateLookAt(NodeId),
    
    /// A matrix that must be inverted is singular
    #[error("transform of node {0:?} is not invertible")]
    SingularTransform(NodeId),
    
    /// The scene root is owned by the scene
    #[error("the scene root cannot be destroyed")]
    RootRemoval,
    
    /// A path query did not resolve
    #[error("no node at path '{0}'")]
    InvalidPath(String),
}
