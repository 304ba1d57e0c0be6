//! Geometry storage, derived vertex data and GPU upload
//!
//! A [`Geometry`] keeps named float attributes and an optional triangle
//! face list. Before drawing it is converted into typed arrays, split into
//! chunks whose vertex count fits the configured index limit, and uploaded
//! once per graphics context.

mod attribute;
mod buffers;
mod chunk;
mod data;
mod derive;

pub use attribute::{Attribute, AttributeArray, AttributeSemantic, AttributeType, IndexArray, IndexType};
pub use buffers::{AttributeBinding, ChunkBuffers, IndexBinding};
pub use chunk::{ChunkLayout, ChunkRange};
pub use data::{ArrayChunk, ArrayColumn, Geometry};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::render::device::{ContextId, DeviceError};

/// Handle to a geometry stored in a [`GeometryRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

/// How often uploaded data is expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UsageHint {
    /// Uploaded once, rarely changed
    #[default]
    Static,
    /// Attribute values change frequently
    Dynamic,
}

/// Geometry failures
#[derive(Error, Debug)]
pub enum GeometryError {
    /// No attribute with this name exists
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),
    
    /// An attribute needed for a derived computation is empty
    #[error("attribute '{0}' is required but empty")]
    MissingAttribute(String),
    
    /// Attribute sizes are limited to 1..=4 components
    #[error("attribute '{name}' has unsupported size {size}")]
    InvalidAttributeSize {
        /// Attribute name
        name: String,
        /// Requested components per vertex
        size: usize,
    },
    
    /// A face references a vertex that does not exist
    #[error("face {face} references vertex {index} but only {vertex_count} vertices exist")]
    FaceIndexOutOfBounds {
        /// Offending face
        face: usize,
        /// Offending vertex index
        index: u32,
        /// Vertices available
        vertex_count: usize,
    },
    
    /// Too many vertices for the available index width
    #[error("{vertex_count} vertices cannot be addressed with 16-bit indices")]
    IndexOverflow {
        /// Vertices in the geometry
        vertex_count: usize,
    },
    
    /// Upload failed
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Owner of all geometries, addressed by [`GeometryId`]
#[derive(Debug)]
pub struct GeometryRegistry {
    geometries: HashMap<GeometryId, Geometry>,
    next_id: u32,
}

impl GeometryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            geometries: HashMap::new(),
            next_id: 1,
        }
    }
    
    /// Store a geometry and return its handle
    pub fn insert(&mut self, geometry: Geometry) -> GeometryId {
        let id = GeometryId(self.next_id);
        self.next_id += 1;
        log::debug!(
            "Registered geometry {:?} '{}' ({} vertices, {} faces)",
            id,
            geometry.name(),
            geometry.vertex_count(),
            geometry.face_count()
        );
        self.geometries.insert(id, geometry);
        id
    }
    
    /// Look up a geometry
    pub fn get(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(&id)
    }
    
    /// Look up a geometry mutably
    pub fn get_mut(&mut self, id: GeometryId) -> Option<&mut Geometry> {
        self.geometries.get_mut(&id)
    }
    
    /// Remove a geometry; GPU buffers must be disposed by the caller first
    pub fn remove(&mut self, id: GeometryId) -> Option<Geometry> {
        self.geometries.remove(&id)
    }
    
    /// Number of geometries
    pub fn len(&self) -> usize {
        self.geometries.len()
    }
    
    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
    
    /// Iterate over all geometries
    pub fn iter(&self) -> impl Iterator<Item = (GeometryId, &Geometry)> {
        self.geometries.iter().map(|(&id, g)| (id, g))
    }
    
    /// Forget every buffer belonging to a lost context without touching the device
    pub fn release_context(&mut self, context: ContextId) {
        for geometry in self.geometries.values_mut() {
            geometry.release_context(context);
        }
    }
}

impl Default for GeometryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
