//! Per-context GPU buffers of a geometry

use std::collections::HashMap;

use super::attribute::{AttributeSemantic, AttributeType, IndexType};
use super::data::{ArrayCache, ArrayChunk, Geometry};
use super::{GeometryError, UsageHint};
use crate::config::GeometryConfig;
use crate::render::device::{BufferId, BufferKind, ContextId, DeviceResult, GpuDevice};

/// Uploaded attribute column of one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBinding {
    /// Attribute name
    pub name: String,
    /// Shader semantic, if any
    pub semantic: Option<AttributeSemantic>,
    /// Element type
    pub ty: AttributeType,
    /// Components per vertex
    pub size: usize,
    /// GPU buffer
    pub buffer: BufferId,
    source_revision: u64,
}

/// Uploaded index buffer of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBinding {
    /// GPU buffer
    pub buffer: BufferId,
    /// Number of indices
    pub count: usize,
    /// Element width
    pub index_type: IndexType,
}

/// GPU buffers of one chunk, drawn with a single call
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkBuffers {
    /// Attribute columns
    pub attributes: Vec<AttributeBinding>,
    /// Indices, absent for non-indexed drawing
    pub indices: Option<IndexBinding>,
    /// Vertices in the chunk
    pub vertex_count: usize,
    /// Triangles in the chunk
    pub face_count: usize,
}

impl ChunkBuffers {
    fn buffer_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.attributes
            .iter()
            .map(|a| a.buffer)
            .chain(self.indices.map(|i| i.buffer))
    }
}

/// Buffers of every chunk within one context
#[derive(Debug, Default)]
pub(crate) struct ContextBuffers {
    generation: u64,
    chunks: Vec<ChunkBuffers>,
}

/// Buffers per context; a cloned geometry starts without any
#[derive(Debug, Default)]
pub(crate) struct GpuCaches(HashMap<ContextId, ContextBuffers>);

impl Clone for GpuCaches {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl Geometry {
    /// Upload (or refresh) this geometry's buffers in the device's context
    ///
    /// A first upload, or any change of the chunk layout, replaces every
    /// buffer. Otherwise only attributes whose values changed since the last
    /// upload are re-sent.
    pub fn buffer_chunks(
        &mut self,
        device: &mut dyn GpuDevice,
        config: &GeometryConfig,
    ) -> Result<&[ChunkBuffers], GeometryError> {
        let wide = config.allow_u32_indices && device.supports_u32_indices();
        self.prepare_arrays(config.index_limit as usize, wide)?;
        let hint = self.usage_hint();
        let Some(cache) = self.arrays.as_ref() else {
            return Ok(&[]);
        };
        let entry = self.gpu.0.entry(device.context_id()).or_default();
        
        if entry.generation != cache.generation {
            for chunk in entry.chunks.drain(..) {
                chunk.buffer_ids().for_each(|id| device.delete_buffer(id));
            }
            entry.chunks = upload_all(device, cache, hint)?;
            entry.generation = cache.generation;
            log::debug!("Uploaded {} chunk(s) of geometry '{}'", entry.chunks.len(), self.name);
        } else {
            for (buffers, arrays) in entry.chunks.iter_mut().zip(&cache.chunks) {
                for (column, binding) in buffers.attributes.iter_mut().enumerate() {
                    let revision = cache.revisions[column];
                    if binding.source_revision != revision {
                        device.update_buffer(binding.buffer, arrays.attributes[column].values.as_bytes(), hint)?;
                        binding.source_revision = revision;
                    }
                }
            }
        }
        Ok(&entry.chunks)
    }
    
    /// Whether buffers exist in `context`
    pub fn is_uploaded(&self, context: ContextId) -> bool {
        self.gpu.0.contains_key(&context)
    }
    
    /// Free this geometry's buffers in the device's context
    pub fn dispose(&mut self, device: &mut dyn GpuDevice) {
        if let Some(entry) = self.gpu.0.remove(&device.context_id()) {
            for chunk in &entry.chunks {
                chunk.buffer_ids().for_each(|id| device.delete_buffer(id));
            }
        }
    }
    
    /// Forget buffers of a lost context without touching any device
    pub fn release_context(&mut self, context: ContextId) {
        self.gpu.0.remove(&context);
    }
}

fn upload_all(device: &mut dyn GpuDevice, cache: &ArrayCache, hint: UsageHint) -> DeviceResult<Vec<ChunkBuffers>> {
    let mut uploaded: Vec<ChunkBuffers> = Vec::with_capacity(cache.chunks.len());
    for arrays in &cache.chunks {
        match upload_chunk(device, arrays, &cache.revisions, hint) {
            Ok(chunk) => uploaded.push(chunk),
            Err(err) => {
                for chunk in &uploaded {
                    chunk.buffer_ids().for_each(|id| device.delete_buffer(id));
                }
                return Err(err);
            }
        }
    }
    Ok(uploaded)
}

fn upload_chunk(
    device: &mut dyn GpuDevice,
    arrays: &ArrayChunk,
    revisions: &[u64],
    hint: UsageHint,
) -> DeviceResult<ChunkBuffers> {
    let mut chunk = ChunkBuffers {
        attributes: Vec::with_capacity(arrays.attributes.len()),
        indices: None,
        vertex_count: arrays.vertex_count,
        face_count: arrays.face_count,
    };
    let result = fill_chunk(device, arrays, revisions, hint, &mut chunk);
    if result.is_err() {
        chunk.buffer_ids().for_each(|id| device.delete_buffer(id));
    }
    result.map(|()| chunk)
}

fn fill_chunk(
    device: &mut dyn GpuDevice,
    arrays: &ArrayChunk,
    revisions: &[u64],
    hint: UsageHint,
    chunk: &mut ChunkBuffers,
) -> DeviceResult<()> {
    for (column, &source_revision) in arrays.attributes.iter().zip(revisions) {
        let buffer = device.create_buffer(BufferKind::Vertex, column.values.as_bytes(), hint)?;
        chunk.attributes.push(AttributeBinding {
            name: column.name.clone(),
            semantic: column.semantic,
            ty: column.values.attribute_type(),
            size: column.size,
            buffer,
            source_revision,
        });
    }
    if let Some(indices) = &arrays.indices {
        let buffer = device.create_buffer(BufferKind::Index, indices.as_bytes(), hint)?;
        chunk.indices = Some(IndexBinding {
            buffer,
            count: indices.len(),
            index_type: indices.index_type(),
        });
    }
    Ok(())
}
