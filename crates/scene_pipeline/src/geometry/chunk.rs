//! Splitting indexed geometry into chunks addressable by narrow indices
//!
//! Faces are walked in order. A new chunk starts whenever appending one more
//! face could push the chunk's vertex count past the index limit. Inside a
//! chunk every original vertex is emitted once, the first time a face uses
//! it, and later faces reuse its chunk-local index.

use std::ops::Range;

use super::attribute::{Attribute, AttributeArray, IndexArray};

/// Face ranges and vertex remapping of a chunked geometry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkLayout {
    chunks: Vec<ChunkRange>,
    local_faces: Vec<[u32; 3]>,
    vertex_count: usize,
    face_count: usize,
}

/// One chunk of a [`ChunkLayout`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRange {
    /// Faces covered, in original face order
    pub faces: Range<usize>,
    /// Original vertex index of each chunk-local vertex
    pub vertices: Vec<u32>,
}

impl ChunkLayout {
    /// Split `faces` over `vertex_count` vertices so no chunk exceeds `limit` vertices
    ///
    /// `limit` is clamped to at least 3 so a single face always fits.
    pub fn split(faces: &[[u32; 3]], vertex_count: usize, limit: usize) -> Self {
        let limit = limit.max(3);
        // chunk index + 1 that last placed each vertex, and its local index there
        let mut placed_in = vec![0usize; vertex_count];
        let mut local_index = vec![0u32; vertex_count];
        
        let mut chunks: Vec<ChunkRange> = Vec::new();
        let mut local_faces = Vec::with_capacity(faces.len());
        let mut current = ChunkRange {
            faces: 0..0,
            vertices: Vec::new(),
        };
        
        for (face_index, face) in faces.iter().enumerate() {
            if current.vertices.len() + 3 > limit {
                current.faces.end = face_index;
                let next = ChunkRange {
                    faces: face_index..face_index,
                    vertices: Vec::new(),
                };
                chunks.push(std::mem::replace(&mut current, next));
            }
            let stamp = chunks.len() + 1;
            let mut local = [0u32; 3];
            for (slot, &vertex) in local.iter_mut().zip(face) {
                let v = vertex as usize;
                if placed_in[v] != stamp {
                    placed_in[v] = stamp;
                    local_index[v] = to_u32(current.vertices.len());
                    current.vertices.push(vertex);
                }
                *slot = local_index[v];
            }
            local_faces.push(local);
        }
        current.faces.end = faces.len();
        if !current.vertices.is_empty() || chunks.is_empty() {
            chunks.push(current);
        }
        
        Self {
            chunks,
            local_faces,
            vertex_count,
            face_count: faces.len(),
        }
    }
    
    /// The chunks in face order
    pub fn chunks(&self) -> &[ChunkRange] {
        &self.chunks
    }
    
    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
    
    /// True when there are no chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
    
    /// Vertex count of the geometry this layout was built from
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }
    
    /// Face count of the geometry this layout was built from
    pub fn face_count(&self) -> usize {
        self.face_count
    }
    
    /// Chunk-local indices of the faces in `chunk`
    pub fn chunk_indices(&self, chunk: usize, max_vertices: usize) -> IndexArray {
        let range = self.chunks[chunk].faces.clone();
        IndexArray::pack(self.local_faces[range].iter().flatten().copied(), max_vertices)
    }
    
    /// Gather `attribute` into the vertex order of `chunk`
    pub fn gather(&self, chunk: usize, attribute: &Attribute) -> AttributeArray {
        let size = attribute.size();
        let source = attribute.values();
        let mut values = Vec::with_capacity(self.chunks[chunk].vertices.len() * size);
        for &vertex in &self.chunks[chunk].vertices {
            let start = vertex as usize * size;
            match source.get(start..start + size) {
                Some(components) => values.extend_from_slice(components),
                None => values.extend(std::iter::repeat(0.0).take(size)),
            }
        }
        AttributeArray::from_values(attribute.attribute_type(), &values)
    }
}

/// Whole-geometry arrays used when no split is needed
pub(crate) fn whole_array(attribute: &Attribute) -> AttributeArray {
    AttributeArray::from_values(attribute.attribute_type(), attribute.values())
}

/// Flattened faces of an unsplit geometry
pub(crate) fn whole_indices(faces: &[[u32; 3]], vertex_count: usize) -> IndexArray {
    IndexArray::pack(faces.iter().flatten().copied(), vertex_count)
}

#[allow(clippy::cast_possible_truncation)]
fn to_u32(value: usize) -> u32 {
    value as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::attribute::{AttributeSemantic, AttributeType};
    
    fn strip_faces(vertex_count: u32) -> Vec<[u32; 3]> {
        (0..vertex_count - 2).map(|i| [i, i + 1, i + 2]).collect()
    }
    
    /// Map chunk-local faces back to original indices
    fn reassemble(layout: &ChunkLayout) -> Vec<[u32; 3]> {
        let mut faces = Vec::new();
        for (c, chunk) in layout.chunks().iter().enumerate() {
            let indices = layout.chunk_indices(c, usize::MAX);
            for f in 0..chunk.faces.len() {
                let mut face = [0u32; 3];
                for (k, slot) in face.iter_mut().enumerate() {
                    let local = indices.get(f * 3 + k).unwrap_or(u32::MAX) as usize;
                    *slot = chunk.vertices[local];
                }
                faces.push(face);
            }
        }
        faces
    }
    
    #[test]
    fn test_small_geometry_is_one_chunk() {
        let faces = vec![[0, 1, 2], [2, 1, 3]];
        let layout = ChunkLayout::split(&faces, 4, 0xffff);
        
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.chunks()[0].faces, 0..2);
        assert_eq!(layout.chunks()[0].vertices, vec![0, 1, 2, 3]);
    }
    
    #[test]
    fn test_large_strip_splits_in_two() {
        let faces = strip_faces(70_000);
        let layout = ChunkLayout::split(&faces, 70_000, 0xffff);
        
        assert_eq!(layout.len(), 2);
        for chunk in layout.chunks() {
            assert!(chunk.vertices.len() <= 0xffff);
        }
        assert_eq!(layout.chunks()[0].faces.end, layout.chunks()[1].faces.start);
        assert_eq!(layout.chunks()[1].faces.end, faces.len());
    }
    
    #[test]
    fn test_reassembled_faces_match_original() {
        let faces = strip_faces(40);
        let layout = ChunkLayout::split(&faces, 40, 9);
        
        assert!(layout.len() > 1);
        assert_eq!(reassemble(&layout), faces);
        for chunk in layout.chunks() {
            assert!(chunk.vertices.len() <= 9);
        }
    }
    
    #[test]
    fn test_shared_vertices_are_emitted_once_per_chunk() {
        let faces = vec![[0, 1, 2], [0, 2, 3], [0, 3, 4]];
        let layout = ChunkLayout::split(&faces, 5, 0xffff);
        
        assert_eq!(layout.chunks()[0].vertices, vec![0, 1, 2, 3, 4]);
        assert_eq!(layout.chunk_indices(0, 5), IndexArray::U16(vec![0, 1, 2, 0, 2, 3, 0, 3, 4]));
    }
    
    #[test]
    fn test_gather_follows_chunk_order() {
        let mut attribute = Attribute::new("position", AttributeType::Float, 1, Some(AttributeSemantic::Position));
        attribute.set_values(vec![10.0, 11.0, 12.0, 13.0]);
        let layout = ChunkLayout::split(&[[3, 1, 0]], 4, 0xffff);
        
        assert_eq!(layout.gather(0, &attribute), AttributeArray::Float(vec![13.0, 11.0, 10.0]));
    }
    
    #[test]
    fn test_empty_faces_yield_single_empty_chunk() {
        let layout = ChunkLayout::split(&[], 0, 0xffff);
        assert_eq!(layout.len(), 1);
        assert!(layout.chunks()[0].faces.is_empty());
    }
}
