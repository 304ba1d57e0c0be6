//! Shader programs and the semantics they declare
//!
//! Source compilation belongs to the device. On this side a shader is its
//! sources plus the list of semantic uniforms it wants the renderer to
//! fill in.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Handle to a shader stored in a [`ShaderRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Matrix a semantic is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatrixBase {
    /// Object to world
    World,
    /// World to view
    View,
    /// View to clip
    Projection,
    /// Object to view
    WorldView,
    /// World to clip
    ViewProjection,
    /// Object to clip
    WorldViewProjection,
}

impl MatrixBase {
    /// Every base matrix
    pub const ALL: [Self; 6] = [
        Self::World,
        Self::View,
        Self::Projection,
        Self::WorldView,
        Self::ViewProjection,
        Self::WorldViewProjection,
    ];
    
    /// Whether the matrix depends on the object being drawn
    pub fn is_per_object(self) -> bool {
        matches!(self, Self::World | Self::WorldView | Self::WorldViewProjection)
    }
    
    fn name(self) -> &'static str {
        match self {
            Self::World => "WORLD",
            Self::View => "VIEW",
            Self::Projection => "PROJECTION",
            Self::WorldView => "WORLDVIEW",
            Self::ViewProjection => "VIEWPROJECTION",
            Self::WorldViewProjection => "WORLDVIEWPROJECTION",
        }
    }
}

/// Named matrix uniform, e.g. `WORLDVIEWINVERSETRANSPOSE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatrixSemantic {
    /// Source matrix
    pub base: MatrixBase,
    /// Inverted
    pub inverse: bool,
    /// Transposed (applied after inversion)
    pub transpose: bool,
}

impl MatrixSemantic {
    /// Plain matrix
    pub const fn plain(base: MatrixBase) -> Self {
        Self {
            base,
            inverse: false,
            transpose: false,
        }
    }
    
    /// Inverse matrix
    pub const fn inverse(base: MatrixBase) -> Self {
        Self {
            base,
            inverse: true,
            transpose: false,
        }
    }
    
    /// Transposed matrix
    pub const fn transpose(base: MatrixBase) -> Self {
        Self {
            base,
            inverse: false,
            transpose: true,
        }
    }
    
    /// Inverse transpose, the usual normal matrix
    pub const fn inverse_transpose(base: MatrixBase) -> Self {
        Self {
            base,
            inverse: true,
            transpose: true,
        }
    }
    
    /// All 24 semantics
    pub fn all() -> impl Iterator<Item = Self> {
        MatrixBase::ALL.into_iter().flat_map(|base| {
            [
                Self::plain(base),
                Self::inverse(base),
                Self::transpose(base),
                Self::inverse_transpose(base),
            ]
        })
    }
    
    /// Parse a semantic name such as `WORLDVIEWPROJECTION` or `VIEWINVERSE`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().find(|s| s.to_string() == name)
    }
}

impl fmt::Display for MatrixSemantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.name())?;
        if self.inverse {
            f.write_str("INVERSE")?;
        }
        if self.transpose {
            f.write_str("TRANSPOSE")?;
        }
        Ok(())
    }
}

/// Frame-wide uniforms set whenever a program is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommonSemantic {
    /// `[x, y, width, height]` in device pixels
    Viewport,
    /// `[width, height]` of the render target in device pixels
    WindowSize,
    /// `[width, height]` of the viewport in device pixels
    ViewportSize,
    /// Camera near plane
    Near,
    /// Camera far plane
    Far,
    /// Device pixel ratio
    DevicePixelRatio,
    /// Seconds since the renderer was created
    Time,
}

impl CommonSemantic {
    /// Semantic name as declared by shaders
    pub fn name(self) -> &'static str {
        match self {
            Self::Viewport => "VIEWPORT",
            Self::WindowSize => "WINDOW_SIZE",
            Self::ViewportSize => "VIEWPORT_SIZE",
            Self::Near => "NEAR",
            Self::Far => "FAR",
            Self::DevicePixelRatio => "DEVICEPIXELRATIO",
            Self::Time => "TIME",
        }
    }
}

/// Program variant selected by the scene's light configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramVariant<'a> {
    /// Cache key distinguishing compiled variants
    pub key: &'a str,
    /// Preprocessor defines such as `DIRECTIONAL_LIGHT_COUNT`
    pub defines: &'a [(String, usize)],
}

/// Shader sources and declared semantics
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProgram {
    /// Display name, also used in error reports
    pub name: String,
    /// Vertex stage source
    pub vertex: String,
    /// Fragment stage source
    pub fragment: String,
    matrix_semantics: BTreeMap<MatrixSemantic, String>,
    common_semantics: BTreeMap<CommonSemantic, String>,
}

impl ShaderProgram {
    /// Program with no declared semantics
    pub fn new(name: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            matrix_semantics: BTreeMap::new(),
            common_semantics: BTreeMap::new(),
        }
    }
    
    /// Builder: fill `uniform` with a matrix semantic
    pub fn with_matrix(mut self, semantic: MatrixSemantic, uniform: impl Into<String>) -> Self {
        self.matrix_semantics.insert(semantic, uniform.into());
        self
    }
    
    /// Builder: fill `uniform` with a common semantic
    pub fn with_common(mut self, semantic: CommonSemantic, uniform: impl Into<String>) -> Self {
        self.common_semantics.insert(semantic, uniform.into());
        self
    }
    
    /// Declared matrix semantics and their uniform names
    pub fn matrix_semantics(&self) -> impl Iterator<Item = (MatrixSemantic, &str)> {
        self.matrix_semantics.iter().map(|(&s, u)| (s, u.as_str()))
    }
    
    /// Declared common semantics and their uniform names
    pub fn common_semantics(&self) -> impl Iterator<Item = (CommonSemantic, &str)> {
        self.common_semantics.iter().map(|(&s, u)| (s, u.as_str()))
    }
    
    /// Whether any declared semantic needs `base`
    pub fn needs(&self, base: MatrixBase) -> bool {
        self.matrix_semantics.keys().any(|s| s.base == base)
    }
    
    /// Whether any declared semantic needs the inverse of `base`
    pub fn needs_inverse(&self, base: MatrixBase) -> bool {
        self.matrix_semantics.keys().any(|s| s.base == base && s.inverse)
    }
}

/// Owner of all shader programs, addressed by [`ShaderId`]
#[derive(Debug)]
pub struct ShaderRegistry {
    shaders: HashMap<ShaderId, ShaderProgram>,
    next_id: u32,
}

impl ShaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            shaders: HashMap::new(),
            next_id: 1,
        }
    }
    
    /// Store a shader and return its handle
    pub fn insert(&mut self, shader: ShaderProgram) -> ShaderId {
        let id = ShaderId(self.next_id);
        self.next_id += 1;
        log::debug!("Registered shader {:?} '{}'", id, shader.name);
        self.shaders.insert(id, shader);
        id
    }
    
    /// Look up a shader
    pub fn get(&self, id: ShaderId) -> Option<&ShaderProgram> {
        self.shaders.get(&id)
    }
    
    /// Remove a shader
    pub fn remove(&mut self, id: ShaderId) -> Option<ShaderProgram> {
        self.shaders.remove(&id)
    }
    
    /// Number of shaders
    pub fn len(&self) -> usize {
        self.shaders.len()
    }
    
    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
