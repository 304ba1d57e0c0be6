//! Materials and the material registry
//!
//! A material pairs a shader program with the uniform values, textures
//! and fixed-function state used to draw with it.

use std::collections::{BTreeMap, HashMap};

use crate::render::device::{BlendFunc, TextureId, UniformValue};
use crate::render::shader::ShaderId;

/// Handle to a material stored in a [`MaterialRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Upload progress of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureState {
    /// Still loading; the binding is skipped
    #[default]
    Loading,
    /// Uploaded and usable
    Ready,
    /// Loading failed; the binding is skipped
    Failed,
}

/// Texture bound to a sampler uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    /// Texture handle
    pub texture: TextureId,
    /// Upload progress
    pub state: TextureState,
}

/// Surface description drawn with one shader
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Display name
    pub name: String,
    /// Shader program
    pub shader: ShaderId,
    /// Drawn in the transparent pass, back to front
    pub transparent: bool,
    /// Depth testing
    pub depth_test: bool,
    /// Depth writes
    pub depth_mask: bool,
    /// Blend function used in the transparent pass; the renderer default when `None`
    pub blend: Option<BlendFunc>,
    uniforms: BTreeMap<String, UniformValue>,
    textures: BTreeMap<String, TextureBinding>,
}

impl Material {
    /// Opaque material using `shader`
    pub fn new(name: impl Into<String>, shader: ShaderId) -> Self {
        Self {
            name: name.into(),
            shader,
            transparent: false,
            depth_test: true,
            depth_mask: true,
            blend: None,
            uniforms: BTreeMap::new(),
            textures: BTreeMap::new(),
        }
    }
    
    /// Builder: set transparency
    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }
    
    /// Builder: set depth test and depth write
    pub fn with_depth(mut self, test: bool, mask: bool) -> Self {
        self.depth_test = test;
        self.depth_mask = mask;
        self
    }
    
    /// Builder: set the blend function
    pub fn with_blend(mut self, blend: BlendFunc) -> Self {
        self.blend = Some(blend);
        self
    }
    
    /// Builder: set a uniform
    pub fn with_uniform(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.set_uniform(name, value);
        self
    }
    
    /// Builder: bind a texture, initially loading
    pub fn with_texture(mut self, name: impl Into<String>, texture: TextureId) -> Self {
        self.set_texture(name, texture);
        self
    }
    
    /// Set a uniform value
    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms.insert(name.into(), value);
    }
    
    /// Uniform value by name
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.uniforms.get(name)
    }
    
    /// Every uniform, ordered by name
    pub fn uniforms(&self) -> impl Iterator<Item = (&str, &UniformValue)> {
        self.uniforms.iter().map(|(k, v)| (k.as_str(), v))
    }
    
    /// Bind a texture to a sampler; it is skipped until marked ready
    pub fn set_texture(&mut self, name: impl Into<String>, texture: TextureId) {
        self.textures.insert(
            name.into(),
            TextureBinding {
                texture,
                state: TextureState::Loading,
            },
        );
    }
    
    /// Update the upload state of a bound texture; returns false for unknown samplers
    pub fn set_texture_state(&mut self, name: &str, state: TextureState) -> bool {
        match self.textures.get_mut(name) {
            Some(binding) => {
                binding.state = state;
                true
            }
            None => false,
        }
    }
    
    /// Every texture binding, ordered by sampler name
    pub fn textures(&self) -> impl Iterator<Item = (&str, &TextureBinding)> {
        self.textures.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Owner of all materials, addressed by [`MaterialId`]
#[derive(Debug)]
pub struct MaterialRegistry {
    materials: HashMap<MaterialId, Material>,
    next_id: u32,
}

impl MaterialRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            materials: HashMap::new(),
            next_id: 1,
        }
    }
    
    /// Store a material and return its handle
    pub fn insert(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.next_id);
        self.next_id += 1;
        log::debug!("Registered material {:?} '{}'", id, material.name);
        self.materials.insert(id, material);
        id
    }
    
    /// Look up a material
    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }
    
    /// Look up a material mutably
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }
    
    /// First material with the given name
    pub fn find_by_name(&self, name: &str) -> Option<MaterialId> {
        let mut matches: Vec<MaterialId> = self
            .materials
            .iter()
            .filter(|(_, m)| m.name == name)
            .map(|(&id, _)| id)
            .collect();
        matches.sort();
        matches.first().copied()
    }
    
    /// Remove a material
    pub fn remove(&mut self, id: MaterialId) -> Option<Material> {
        self.materials.remove(&id)
    }
    
    /// Number of materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }
    
    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}
