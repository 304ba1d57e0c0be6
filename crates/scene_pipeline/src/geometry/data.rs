//! Geometry attributes, faces and the typed-array cache

use super::attribute::{next_revision, Attribute, AttributeArray, AttributeSemantic, AttributeType, IndexArray};
use super::buffers::GpuCaches;
use super::chunk::{self, ChunkLayout};
use super::{GeometryError, UsageHint};
use crate::config::{GeometryConfig, MAX_INDEX_LIMIT};
use crate::foundation::bounds::BoundingBox;

/// One attribute's typed data within a chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayColumn {
    /// Attribute name
    pub name: String,
    /// Shader semantic, if any
    pub semantic: Option<AttributeSemantic>,
    /// Components per vertex
    pub size: usize,
    /// Converted values
    pub values: AttributeArray,
}

impl ArrayColumn {
    fn new(attribute: &Attribute, values: AttributeArray) -> Self {
        Self {
            name: attribute.name().to_string(),
            semantic: attribute.semantic(),
            size: attribute.size(),
            values,
        }
    }
}

/// Typed arrays of one chunk, ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayChunk {
    /// Enabled attributes in declaration order
    pub attributes: Vec<ArrayColumn>,
    /// Chunk-local indices, absent for non-indexed geometry
    pub indices: Option<IndexArray>,
    /// Vertices in the chunk
    pub vertex_count: usize,
    /// Faces in the chunk
    pub face_count: usize,
}

/// Chunked arrays plus what they were built from
#[derive(Debug, Clone)]
pub(super) struct ArrayCache {
    pub(super) generation: u64,
    pub(super) chunks: Vec<ArrayChunk>,
    /// Attribute revision each array column was filled from
    pub(super) revisions: Vec<u64>,
    layout: Option<ChunkLayout>,
    enabled: Vec<String>,
    faces_revision: u64,
    vertex_count: usize,
    face_count: usize,
    settings: (usize, bool),
}

/// Vertex attributes plus an optional triangle list
#[derive(Debug, Clone)]
pub struct Geometry {
    pub(super) name: String,
    pub(super) attributes: Vec<Attribute>,
    pub(super) faces: Vec<[u32; 3]>,
    pub(super) faces_revision: u64,
    pub(super) use_face: bool,
    hint: UsageHint,
    pub(super) bounding_box: Option<BoundingBox>,
    pub(super) arrays: Option<ArrayCache>,
    pub(super) gpu: GpuCaches,
    layout_builds: u64,
}

impl Geometry {
    /// Empty geometry with the standard attribute set
    pub fn new() -> Self {
        let standard = [
            ("position", AttributeType::Float, 3, Some(AttributeSemantic::Position)),
            ("texcoord0", AttributeType::Float, 2, Some(AttributeSemantic::Texcoord0)),
            ("texcoord1", AttributeType::Float, 2, Some(AttributeSemantic::Texcoord1)),
            ("normal", AttributeType::Float, 3, Some(AttributeSemantic::Normal)),
            ("tangent", AttributeType::Float, 4, Some(AttributeSemantic::Tangent)),
            ("color", AttributeType::Float, 4, Some(AttributeSemantic::Color)),
            ("weight", AttributeType::Float, 4, Some(AttributeSemantic::Weight)),
            ("joint", AttributeType::Float, 4, Some(AttributeSemantic::Joint)),
            ("barycentric", AttributeType::Float, 3, None),
        ];
        Self {
            name: String::from("geometry"),
            attributes: standard
                .into_iter()
                .map(|(name, ty, size, semantic)| Attribute::new(name, ty, size, semantic))
                .collect(),
            faces: Vec::new(),
            faces_revision: next_revision(),
            use_face: true,
            hint: UsageHint::Static,
            bounding_box: None,
            arrays: None,
            gpu: GpuCaches::default(),
            layout_builds: 0,
        }
    }
    
    /// Empty geometry using the configured default usage hint
    pub fn from_config(config: &GeometryConfig) -> Self {
        Self::new().with_usage_hint(config.default_hint)
    }
    
    /// Builder: set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
    
    /// Builder: set the usage hint
    pub fn with_usage_hint(mut self, hint: UsageHint) -> Self {
        self.hint = hint;
        self
    }
    
    /// Geometry name
    pub fn name(&self) -> &str {
        &self.name
    }
    
    /// Usage hint
    pub fn usage_hint(&self) -> UsageHint {
        self.hint
    }
    
    /// Change the usage hint; cached arrays are rebuilt on next use
    pub fn set_usage_hint(&mut self, hint: UsageHint) {
        if self.hint != hint {
            self.hint = hint;
            self.arrays = None;
        }
    }
    
    /// Attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }
    
    /// Attribute by name, mutably
    pub fn attribute_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attributes.iter_mut().find(|a| a.name() == name)
    }
    
    /// First attribute carrying `semantic`
    pub fn attribute_by_semantic(&self, semantic: AttributeSemantic) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.semantic() == Some(semantic))
    }
    
    /// Every attribute, enabled or not
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }
    
    /// Attributes holding data, in declaration order
    pub fn enabled_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| !a.values().is_empty())
    }
    
    /// Add an attribute, replacing any attribute of the same name
    pub fn create_attribute(
        &mut self,
        name: &str,
        ty: AttributeType,
        size: usize,
        semantic: Option<AttributeSemantic>,
    ) -> Result<&mut Attribute, GeometryError> {
        if !(1..=4).contains(&size) {
            return Err(GeometryError::InvalidAttributeSize {
                name: name.to_string(),
                size,
            });
        }
        let attribute = Attribute::new(name, ty, size, semantic);
        let index = match self.attributes.iter().position(|a| a.name() == name) {
            Some(index) => {
                self.attributes[index] = attribute;
                index
            }
            None => {
                self.attributes.push(attribute);
                self.attributes.len() - 1
            }
        };
        Ok(&mut self.attributes[index])
    }
    
    /// Remove an attribute; returns whether it existed
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|a| a.name() != name);
        before != self.attributes.len()
    }
    
    /// Replace the values of an existing attribute
    ///
    /// New positions must still cover every index of the face list.
    pub fn set_attribute_values(&mut self, name: &str, values: Vec<f32>) -> Result<(), GeometryError> {
        let index = self
            .attributes
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| GeometryError::UnknownAttribute(name.to_string()))?;
        if self.use_face && name == "position" {
            validate_faces(&self.faces, values.len() / self.attributes[index].size())?;
        }
        self.attributes[index].set_values(values);
        Ok(())
    }
    
    /// Replace the positions (3 floats per vertex)
    pub fn set_positions(&mut self, positions: Vec<f32>) -> Result<(), GeometryError> {
        self.set_attribute_values("position", positions)
    }
    
    /// Number of vertices, taken from the position attribute
    pub fn vertex_count(&self) -> usize {
        self.attribute("position").map_or(0, Attribute::element_count)
    }
    
    /// Triangle faces
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }
    
    /// Replace the faces, validating them against the current vertex count
    pub fn set_faces(&mut self, faces: Vec<[u32; 3]>) -> Result<(), GeometryError> {
        validate_faces(&faces, self.vertex_count())?;
        self.faces = faces;
        self.faces_revision = next_revision();
        self.use_face = true;
        Ok(())
    }
    
    /// Check the face list against the current vertex count
    ///
    /// Catches positions edited in place through [`attribute_mut`](Self::attribute_mut).
    pub(super) fn check_faces(&self) -> Result<(), GeometryError> {
        if self.use_face {
            validate_faces(&self.faces, self.vertex_count())?;
        }
        Ok(())
    }
    
    /// Whether drawing uses the face list
    pub fn is_use_face(&self) -> bool {
        self.use_face
    }
    
    /// Draw from the face list, or treat consecutive vertex triples as triangles
    pub fn set_use_face(&mut self, use_face: bool) {
        if self.use_face != use_face {
            self.use_face = use_face;
            self.faces_revision = next_revision();
        }
    }
    
    /// Number of triangles drawn
    pub fn face_count(&self) -> usize {
        if self.use_face {
            self.faces.len()
        } else {
            self.vertex_count() / 3
        }
    }
    
    /// Vertex indices of triangle `index`
    pub fn face(&self, index: usize) -> Option<[u32; 3]> {
        if self.use_face {
            self.faces.get(index).copied()
        } else if index < self.face_count() {
            let base = to_u32(index * 3);
            Some([base, base + 1, base + 2])
        } else {
            None
        }
    }
    
    /// Every triangle, whether indexed or not
    pub(super) fn triangles(&self) -> Vec<[u32; 3]> {
        (0..self.face_count()).filter_map(|i| self.face(i)).collect()
    }
    
    /// Drop cached arrays so the next upload rebuilds them from scratch
    pub fn mark_dirty(&mut self) {
        self.arrays = None;
    }
    
    /// How many times the chunk layout has been computed
    pub fn layout_builds(&self) -> u64 {
        self.layout_builds
    }
    
    /// Box around the positions, if computed
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }
    
    /// Set the bounding box by hand
    pub fn set_bounding_box(&mut self, bbox: BoundingBox) {
        self.bounding_box = Some(bbox);
    }
    
    /// Typed, chunked arrays for drawing with at most `index_limit` vertices per chunk
    ///
    /// With `wide_indices` the geometry is never split and indices may be
    /// 32-bit. Static geometry re-splits whenever anything changed; dynamic
    /// geometry keeps its chunk boundaries while vertex and face counts and
    /// the face list are unchanged, and refills only changed attributes.
    pub fn arrays(&mut self, index_limit: usize, wide_indices: bool) -> Result<&[ArrayChunk], GeometryError> {
        self.prepare_arrays(index_limit, wide_indices)?;
        Ok(self.arrays.as_ref().map_or(&[][..], |cache| cache.chunks.as_slice()))
    }
    
    pub(super) fn prepare_arrays(&mut self, index_limit: usize, wide_indices: bool) -> Result<(), GeometryError> {
        // Narrow chunks address at most 65 536 vertices with 16-bit indices.
        let index_limit = if wide_indices {
            index_limit
        } else {
            index_limit.min(MAX_U16_VERTICES)
        };
        let settings = (index_limit, wide_indices);
        let vertex_count = self.vertex_count();
        let face_count = self.face_count();
        let enabled: Vec<String> = self.enabled_attributes().map(|a| a.name().to_string()).collect();
        
        if let Some(cache) = &self.arrays {
            let compatible = cache.settings == settings
                && cache.faces_revision == self.faces_revision
                && cache.vertex_count == vertex_count
                && cache.face_count == face_count
                && cache.enabled == enabled;
            if compatible {
                let dirty: Vec<usize> = self
                    .enabled_attributes()
                    .zip(&cache.revisions)
                    .enumerate()
                    .filter(|(_, (attribute, &revision))| attribute.revision() != revision)
                    .map(|(i, _)| i)
                    .collect();
                if dirty.is_empty() {
                    return Ok(());
                }
                if self.hint == UsageHint::Dynamic {
                    self.refill(&dirty);
                    return Ok(());
                }
            }
        }
        self.rebuild_arrays(settings, enabled)
    }
    
    fn refill(&mut self, dirty: &[usize]) {
        let Some(cache) = self.arrays.as_mut() else {
            return;
        };
        let enabled: Vec<&Attribute> = self.attributes.iter().filter(|a| !a.values().is_empty()).collect();
        for &column in dirty {
            let attribute = enabled[column];
            for (c, chunk) in cache.chunks.iter_mut().enumerate() {
                chunk.attributes[column].values = match &cache.layout {
                    Some(layout) => layout.gather(c, attribute),
                    None => chunk::whole_array(attribute),
                };
            }
            cache.revisions[column] = attribute.revision();
        }
    }
    
    fn rebuild_arrays(&mut self, settings: (usize, bool), enabled: Vec<String>) -> Result<(), GeometryError> {
        let (index_limit, wide_indices) = settings;
        let vertex_count = self.vertex_count();
        let face_count = self.face_count();
        if self.use_face {
            validate_faces(&self.faces, vertex_count)?;
        }
        
        let attributes: Vec<&Attribute> = self.attributes.iter().filter(|a| !a.values().is_empty()).collect();
        let split = self.use_face && !wide_indices && vertex_count > index_limit;
        let (layout, chunks) = if split {
            let layout = ChunkLayout::split(&self.faces, vertex_count, index_limit);
            let chunks = (0..layout.len())
                .map(|c| ArrayChunk {
                    attributes: attributes
                        .iter()
                        .map(|a| ArrayColumn::new(a, layout.gather(c, a)))
                        .collect(),
                    indices: Some(layout.chunk_indices(c, index_limit)),
                    vertex_count: layout.chunks()[c].vertices.len(),
                    face_count: layout.chunks()[c].faces.len(),
                })
                .collect();
            self.layout_builds += 1;
            (Some(layout), chunks)
        } else {
            if self.use_face && !wide_indices && vertex_count > MAX_U16_VERTICES {
                return Err(GeometryError::IndexOverflow { vertex_count });
            }
            let chunk = ArrayChunk {
                attributes: attributes
                    .iter()
                    .map(|a| ArrayColumn::new(a, chunk::whole_array(a)))
                    .collect(),
                indices: self.use_face.then(|| chunk::whole_indices(&self.faces, vertex_count)),
                vertex_count,
                face_count,
            };
            (None, vec![chunk])
        };
        let revisions = attributes.iter().map(|a| a.revision()).collect();
        
        log::trace!("Built {} array chunk(s) for geometry '{}'", chunks.len(), self.name);
        self.arrays = Some(ArrayCache {
            generation: next_revision(),
            chunks,
            revisions,
            layout,
            enabled,
            faces_revision: self.faces_revision,
            vertex_count,
            face_count,
            settings,
        });
        Ok(())
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

/// Most vertices a chunk with 16-bit indices can address
const MAX_U16_VERTICES: usize = MAX_INDEX_LIMIT as usize;

fn validate_faces(faces: &[[u32; 3]], vertex_count: usize) -> Result<(), GeometryError> {
    for (face, indices) in faces.iter().enumerate() {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(GeometryError::FaceIndexOutOfBounds {
                face,
                index,
                vertex_count,
            });
        }
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
pub(super) fn to_u32(value: usize) -> u32 {
    value as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::IndexType;
    
    fn strip(vertex_count: u32, hint: UsageHint) -> Geometry {
        let mut geometry = Geometry::new().with_usage_hint(hint);
        let positions = (0..vertex_count).flat_map(|i| [i as f32, (i % 2) as f32, 0.0]).collect();
        geometry.set_positions(positions).unwrap();
        geometry
            .set_faces((0..vertex_count - 2).map(|i| [i, i + 1, i + 2]).collect())
            .unwrap();
        geometry
    }
    
    #[test]
    fn test_faces_are_validated() {
        let mut geometry = Geometry::new();
        geometry.set_positions(vec![0.0; 9]).unwrap();
        
        let result = geometry.set_faces(vec![[0, 1, 3]]);
        assert!(matches!(result, Err(GeometryError::FaceIndexOutOfBounds { index: 3, .. })));
        assert!(geometry.set_faces(vec![[0, 1, 2]]).is_ok());
    }
    
    #[test]
    fn test_shrinking_positions_below_faces_is_rejected() {
        let mut geometry = Geometry::new();
        geometry.set_positions(vec![0.0; 12]).unwrap();
        geometry.set_faces(vec![[0, 1, 2], [2, 1, 3]]).unwrap();
        
        let result = geometry.set_positions(vec![0.0; 9]);
        assert!(matches!(
            result,
            Err(GeometryError::FaceIndexOutOfBounds { face: 1, index: 3, vertex_count: 3 })
        ));
        assert_eq!(geometry.vertex_count(), 4);
        assert!(geometry.generate_vertex_normals().is_ok());
    }
    
    #[test]
    fn test_enabled_attributes_only_include_data() {
        let mut geometry = Geometry::new();
        geometry.set_positions(vec![0.0; 9]).unwrap();
        geometry.set_attribute_values("normal", vec![0.0; 9]).unwrap();
        
        let names: Vec<&str> = geometry.enabled_attributes().map(Attribute::name).collect();
        assert_eq!(names, vec!["position", "normal"]);
    }
    
    #[test]
    fn test_non_indexed_face_count() {
        let mut geometry = Geometry::new();
        geometry.set_positions(vec![0.0; 18]).unwrap();
        geometry.set_use_face(false);
        
        assert_eq!(geometry.face_count(), 2);
        assert_eq!(geometry.face(1), Some([3, 4, 5]));
        let chunks = geometry.arrays(0xffff, false).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].indices.is_none());
    }
    
    #[test]
    fn test_large_strip_produces_two_narrow_chunks() {
        let mut geometry = strip(70_000, UsageHint::Static);
        let chunks = geometry.arrays(0xffff, false).unwrap();
        
        assert_eq!(chunks.len(), 2);
        for chunk in chunks {
            assert!(chunk.vertex_count <= 0xffff);
            assert_eq!(chunk.indices.as_ref().map(IndexArray::index_type), Some(IndexType::U16));
        }
        let faces: usize = chunks.iter().map(|c| c.face_count).sum();
        assert_eq!(faces, 69_998);
    }
    
    #[test]
    fn test_index_limit_above_u16_range_is_clamped() {
        let mut geometry = strip(150_000, UsageHint::Static);
        let chunks = geometry.arrays(100_000, false).unwrap();
        
        assert_eq!(chunks.len(), 3);
        for chunk in chunks {
            assert!(chunk.vertex_count <= MAX_U16_VERTICES);
            assert_eq!(chunk.indices.as_ref().map(IndexArray::index_type), Some(IndexType::U16));
        }
    }
    
    #[test]
    fn test_chunks_reproduce_face_attributes() {
        let vertex_count = 40;
        let mut geometry = strip(vertex_count, UsageHint::Static);
        let normals = (0..vertex_count).flat_map(|i| [i as f32 + 0.5, -(i as f32), 1.0]).collect();
        geometry.set_attribute_values("normal", normals).unwrap();
        let uvs = (0..vertex_count).flat_map(|i| [i as f32 * 0.25, i as f32 * 0.5]).collect();
        geometry.set_attribute_values("texcoord0", uvs).unwrap();
        
        let corner = |i: u32| -> Vec<f32> {
            geometry
                .enabled_attributes()
                .flat_map(|a| a.get(i as usize).unwrap().to_vec())
                .collect()
        };
        let mut expected: Vec<Vec<f32>> = geometry.faces().iter().map(|f| f.iter().flat_map(|&i| corner(i)).collect()).collect();
        
        let chunks = geometry.arrays(9, false).unwrap();
        assert!(chunks.len() > 1);
        let mut rebuilt = Vec::new();
        for chunk in chunks {
            let indices = chunk.indices.as_ref().unwrap();
            assert_eq!(indices.len(), chunk.face_count * 3);
            for face in 0..chunk.face_count {
                let mut values = Vec::new();
                for k in 0..3 {
                    let local = indices.get(face * 3 + k).unwrap() as usize;
                    assert!(local < chunk.vertex_count);
                    for column in &chunk.attributes {
                        for c in 0..column.size {
                            values.push(column.values.get(local * column.size + c).unwrap());
                        }
                    }
                }
                rebuilt.push(values);
            }
        }
        
        let order = |a: &Vec<f32>, b: &Vec<f32>| a.partial_cmp(b).unwrap();
        expected.sort_by(order);
        rebuilt.sort_by(order);
        assert_eq!(rebuilt, expected);
    }
    
    #[test]
    fn test_wide_indices_skip_split() {
        let mut geometry = strip(70_000, UsageHint::Static);
        let chunks = geometry.arrays(0xffff, true).unwrap();
        
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].indices.as_ref().map(IndexArray::len), Some(69_998 * 3));
        assert_eq!(geometry.layout_builds(), 0);
    }
    
    #[test]
    fn test_dynamic_geometry_keeps_layout_on_value_change() {
        let mut geometry = strip(40, UsageHint::Dynamic);
        geometry.arrays(9, false).unwrap();
        assert_eq!(geometry.layout_builds(), 1);
        
        let moved = geometry.attribute("position").unwrap().values().iter().map(|v| v + 1.0).collect();
        geometry.set_positions(moved).unwrap();
        let first = geometry.arrays(9, false).unwrap()[0].attributes[0].values.get(0);
        
        assert_eq!(first, Some(1.0));
        assert_eq!(geometry.layout_builds(), 1);
    }
    
    #[test]
    fn test_static_geometry_resplits_on_change() {
        let mut geometry = strip(40, UsageHint::Static);
        geometry.arrays(9, false).unwrap();
        geometry.attribute_mut("position").unwrap().values_mut()[0] = 5.0;
        geometry.arrays(9, false).unwrap();
        
        assert_eq!(geometry.layout_builds(), 2);
    }
    
    #[test]
    fn test_unchanged_geometry_is_not_rebuilt() {
        let mut geometry = strip(40, UsageHint::Static);
        geometry.arrays(9, false).unwrap();
        geometry.arrays(9, false).unwrap();
        
        assert_eq!(geometry.layout_builds(), 1);
    }
    
    #[test]
    fn test_attribute_size_is_checked() {
        let mut geometry = Geometry::new();
        assert!(geometry.create_attribute("custom", AttributeType::Float, 5, None).is_err());
        assert!(geometry.create_attribute("custom", AttributeType::UByte, 4, None).is_ok());
        assert!(geometry.remove_attribute("custom"));
    }
}
