//! Vertex attributes and typed upload arrays

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Source of revision stamps shared by every attribute and face list
static REVISION: AtomicU64 = AtomicU64::new(1);

/// Fresh, process-unique revision stamp
pub(crate) fn next_revision() -> u64 {
    REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Element type an attribute is uploaded as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    /// Signed 8-bit
    Byte,
    /// Unsigned 8-bit
    UByte,
    /// Signed 16-bit
    Short,
    /// Unsigned 16-bit
    UShort,
    /// 32-bit float
    Float,
}

/// Role of an attribute in the vertex shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSemantic {
    /// Object-space position
    Position,
    /// Object-space normal
    Normal,
    /// Tangent with handedness in `w`
    Tangent,
    /// First UV set
    Texcoord0,
    /// Second UV set
    Texcoord1,
    /// Vertex color
    Color,
    /// Skinning joint indices
    Joint,
    /// Skinning weights
    Weight,
}

/// Named per-vertex attribute stored as `size` floats per vertex
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    ty: AttributeType,
    size: usize,
    semantic: Option<AttributeSemantic>,
    values: Vec<f32>,
    revision: u64,
}

impl Attribute {
    /// Create an empty attribute; `size` must be 1 to 4
    pub(crate) fn new(name: impl Into<String>, ty: AttributeType, size: usize, semantic: Option<AttributeSemantic>) -> Self {
        Self {
            name: name.into(),
            ty,
            size,
            semantic,
            values: Vec::new(),
            revision: next_revision(),
        }
    }
    
    /// Attribute name
    pub fn name(&self) -> &str {
        &self.name
    }
    
    /// Upload element type
    pub fn attribute_type(&self) -> AttributeType {
        self.ty
    }
    
    /// Components per vertex
    pub fn size(&self) -> usize {
        self.size
    }
    
    /// Shader semantic, if any
    pub fn semantic(&self) -> Option<AttributeSemantic> {
        self.semantic
    }
    
    /// Flat component array
    pub fn values(&self) -> &[f32] {
        &self.values
    }
    
    /// Mutable flat component array; marks the attribute dirty
    pub fn values_mut(&mut self) -> &mut Vec<f32> {
        self.revision = next_revision();
        &mut self.values
    }
    
    /// Replace the components; marks the attribute dirty
    pub fn set_values(&mut self, values: Vec<f32>) {
        self.values = values;
        self.revision = next_revision();
    }
    
    /// Number of whole vertices stored
    pub fn element_count(&self) -> usize {
        self.values.len() / self.size
    }
    
    /// Components of vertex `index`
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        self.values.get(index * self.size..(index + 1) * self.size)
    }
    
    /// Revision stamp, changed on every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }
    
    pub(crate) fn touch(&mut self) {
        self.revision = next_revision();
    }
}

/// Attribute data converted to its upload element type
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeArray {
    /// Signed 8-bit
    Byte(Vec<i8>),
    /// Unsigned 8-bit
    UByte(Vec<u8>),
    /// Signed 16-bit
    Short(Vec<i16>),
    /// Unsigned 16-bit
    UShort(Vec<u16>),
    /// 32-bit float
    Float(Vec<f32>),
}

impl AttributeArray {
    /// Convert float components to `ty` (integer conversions saturate)
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_values(ty: AttributeType, values: &[f32]) -> Self {
        match ty {
            AttributeType::Byte => Self::Byte(values.iter().map(|&v| v as i8).collect()),
            AttributeType::UByte => Self::UByte(values.iter().map(|&v| v as u8).collect()),
            AttributeType::Short => Self::Short(values.iter().map(|&v| v as i16).collect()),
            AttributeType::UShort => Self::UShort(values.iter().map(|&v| v as u16).collect()),
            AttributeType::Float => Self::Float(values.to_vec()),
        }
    }
    
    /// Element type of the stored values
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Byte(_) => AttributeType::Byte,
            Self::UByte(_) => AttributeType::UByte,
            Self::Short(_) => AttributeType::Short,
            Self::UShort(_) => AttributeType::UShort,
            Self::Float(_) => AttributeType::Float,
        }
    }
    
    /// Number of components
    pub fn len(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::UByte(v) => v.len(),
            Self::Short(v) => v.len(),
            Self::UShort(v) => v.len(),
            Self::Float(v) => v.len(),
        }
    }
    
    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    
    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Byte(v) => bytemuck::cast_slice(v),
            Self::UByte(v) => v,
            Self::Short(v) => bytemuck::cast_slice(v),
            Self::UShort(v) => bytemuck::cast_slice(v),
            Self::Float(v) => bytemuck::cast_slice(v),
        }
    }
    
    /// Component `i` widened back to float
    pub fn get(&self, i: usize) -> Option<f32> {
        match self {
            Self::Byte(v) => v.get(i).map(|&x| f32::from(x)),
            Self::UByte(v) => v.get(i).map(|&x| f32::from(x)),
            Self::Short(v) => v.get(i).map(|&x| f32::from(x)),
            Self::UShort(v) => v.get(i).map(|&x| f32::from(x)),
            Self::Float(v) => v.get(i).copied(),
        }
    }
}

/// Width of index buffer elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    /// 16-bit unsigned
    U16,
    /// 32-bit unsigned
    U32,
}

/// Chunk-local triangle indices
#[derive(Debug, Clone, PartialEq)]
pub enum IndexArray {
    /// 16-bit indices
    U16(Vec<u16>),
    /// 32-bit indices
    U32(Vec<u32>),
}

impl IndexArray {
    /// Pack indices in the narrowest type holding `max_vertices` vertices
    #[allow(clippy::cast_possible_truncation)]
    pub fn pack(indices: impl Iterator<Item = u32>, max_vertices: usize) -> Self {
        if max_vertices <= usize::from(u16::MAX) + 1 {
            Self::U16(indices.map(|i| i as u16).collect())
        } else {
            Self::U32(indices.collect())
        }
    }
    
    /// Number of indices
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
        }
    }
    
    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    
    /// Element width
    pub fn index_type(&self) -> IndexType {
        match self {
            Self::U16(_) => IndexType::U16,
            Self::U32(_) => IndexType::U32,
        }
    }
    
    /// Index `i` widened to u32
    pub fn get(&self, i: usize) -> Option<u32> {
        match self {
            Self::U16(v) => v.get(i).map(|&x| u32::from(x)),
            Self::U32(v) => v.get(i).copied(),
        }
    }
    
    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(v) => bytemuck::cast_slice(v),
            Self::U32(v) => bytemuck::cast_slice(v),
        }
    }
}
