//! Per-frame render queues
//!
//! Opaque and transparent renderables are collected separately. The lists
//! are rebuilt every frame without releasing their storage.

use crate::foundation::collections::{NodeId, RenderList};

/// Renderable scheduled for this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    /// Mesh node
    pub node: NodeId,
    /// View-space depth (`z`, negative in front of the camera); set by the renderer for transparent items
    pub depth: f32,
}

impl RenderItem {
    /// Item with no depth yet
    pub fn new(node: NodeId) -> Self {
        Self { node, depth: 0.0 }
    }
}

/// Opaque and transparent queues of one scene
#[derive(Debug, Clone, Default)]
pub struct RenderQueue {
    pub(crate) opaque: RenderList<RenderItem>,
    pub(crate) transparent: RenderList<RenderItem>,
}

impl RenderQueue {
    /// Create empty queues
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Start a rebuild
    pub(crate) fn begin(&mut self) {
        self.opaque.begin();
        self.transparent.begin();
    }
    
    /// Append a renderable to the matching queue
    pub(crate) fn push(&mut self, node: NodeId, transparent: bool) {
        let item = RenderItem::new(node);
        if transparent {
            self.transparent.push(item);
        } else {
            self.opaque.push(item);
        }
    }
    
    /// Finish a rebuild
    pub(crate) fn end(&mut self) {
        self.opaque.end();
        self.transparent.end();
    }
    
    /// Opaque renderables
    pub fn opaque(&self) -> &[RenderItem] {
        self.opaque.as_slice()
    }
    
    /// Transparent renderables
    pub fn transparent(&self) -> &[RenderItem] {
        self.transparent.as_slice()
    }
    
    /// Total number of queued renderables
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }
    
    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
