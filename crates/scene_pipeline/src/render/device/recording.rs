//! Headless device that records every command it receives

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{
    BlendFunc, BufferId, BufferKind, ClearFlags, ContextId, DeviceError, DeviceResult, DrawCall, FramebufferId,
    GpuDevice, TextureId, UniformValue, Viewport,
};
use crate::geometry::{IndexType, UsageHint};
use crate::render::shader::{ProgramVariant, ShaderProgram};
use crate::scene::{CullFace, DrawMode, FrontFace};

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

/// One draw as seen by the device
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Bound program name
    pub program: Option<String>,
    /// Primitive topology
    pub mode: DrawMode,
    /// Vertices in the drawn chunk
    pub vertex_count: usize,
    /// Indices drawn, `None` for non-indexed draws
    pub index_count: Option<usize>,
    /// Index width, `None` for non-indexed draws
    pub index_type: Option<IndexType>,
    /// Uniform values of the bound program at draw time
    pub uniforms: BTreeMap<String, UniformValue>,
}

/// A recorded device call
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Framebuffer bound
    BindFramebuffer(Option<FramebufferId>),
    /// Viewport set
    Viewport(Viewport),
    /// Scissor set
    Scissor(Viewport),
    /// Buffers cleared
    Clear(ClearFlags, [f32; 4]),
    /// Buffer created
    CreateBuffer {
        /// New handle
        id: BufferId,
        /// Binding target
        kind: BufferKind,
        /// Size in bytes
        bytes: usize,
    },
    /// Buffer contents replaced
    UpdateBuffer {
        /// Handle
        id: BufferId,
        /// Size in bytes
        bytes: usize,
    },
    /// Buffer freed
    DeleteBuffer(BufferId),
    /// Program bound
    UseProgram {
        /// Program name
        shader: String,
        /// Variant key
        key: String,
    },
    /// Uniform set
    SetUniform {
        /// Uniform name
        name: String,
        /// Value
        value: UniformValue,
    },
    /// Texture bound
    BindTexture {
        /// Texture unit
        slot: u32,
        /// Sampler uniform
        name: String,
        /// Texture handle
        texture: TextureId,
    },
    /// Depth test toggled
    DepthTest(bool),
    /// Depth writes toggled
    DepthMask(bool),
    /// Blend state set
    Blend(Option<BlendFunc>),
    /// Face culling toggled
    FaceCulling(bool),
    /// Culled faces selected
    CullFace(CullFace),
    /// Front-face winding selected
    FrontFace(FrontFace),
    /// Draw issued
    Draw(DrawRecord),
}

/// [`GpuDevice`] that keeps buffers in memory and logs every call
///
/// Shaders listed with [`fail_shader`](Self::fail_shader) fail to compile.
#[derive(Debug)]
pub struct RecordingDevice {
    context: ContextId,
    supports_u32: bool,
    commands: Vec<DeviceCommand>,
    buffers: HashMap<BufferId, (BufferKind, Vec<u8>)>,
    next_buffer: u64,
    failing_shaders: HashSet<String>,
    compile_attempts: HashMap<String, usize>,
    compiled: HashSet<(String, String)>,
    program: Option<String>,
    uniforms: HashMap<String, BTreeMap<String, UniformValue>>,
}

impl RecordingDevice {
    /// New device with a fresh context and 16-bit indices only
    pub fn new() -> Self {
        Self {
            context: ContextId(NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed)),
            supports_u32: false,
            commands: Vec::new(),
            buffers: HashMap::new(),
            next_buffer: 1,
            failing_shaders: HashSet::new(),
            compile_attempts: HashMap::new(),
            compiled: HashSet::new(),
            program: None,
            uniforms: HashMap::new(),
        }
    }
    
    /// Builder: allow 32-bit indices
    pub fn with_u32_indices(mut self, supported: bool) -> Self {
        self.supports_u32 = supported;
        self
    }
    
    /// Make every compile of the named shader fail
    pub fn fail_shader(&mut self, name: impl Into<String>) {
        self.failing_shaders.insert(name.into());
    }
    
    /// Every command since creation or the last [`take_commands`](Self::take_commands)
    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }
    
    /// Drain the command log
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }
    
    /// Recorded draws in submission order
    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Draw(record) => Some(record),
                _ => None,
            })
            .collect()
    }
    
    /// Number of commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&DeviceCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }
    
    /// How many times the named shader was compiled
    pub fn compile_attempts(&self, shader: &str) -> usize {
        self.compile_attempts.get(shader).copied().unwrap_or(0)
    }
    
    /// Number of live buffers
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
    
    /// Contents of a live buffer
    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|(_, data)| data.as_slice())
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuDevice for RecordingDevice {
    fn context_id(&self) -> ContextId {
        self.context
    }
    
    fn supports_u32_indices(&self) -> bool {
        self.supports_u32
    }
    
    fn bind_framebuffer(&mut self, target: Option<FramebufferId>) {
        self.commands.push(DeviceCommand::BindFramebuffer(target));
    }
    
    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(DeviceCommand::Viewport(viewport));
    }
    
    fn set_scissor(&mut self, scissor: Viewport) {
        self.commands.push(DeviceCommand::Scissor(scissor));
    }
    
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]) {
        self.commands.push(DeviceCommand::Clear(flags, color));
    }
    
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8], _hint: UsageHint) -> DeviceResult<BufferId> {
        let id = BufferId(self.next_buffer);
        self.next_buffer += 1;
        self.buffers.insert(id, (kind, data.to_vec()));
        self.commands.push(DeviceCommand::CreateBuffer {
            id,
            kind,
            bytes: data.len(),
        });
        Ok(id)
    }
    
    fn update_buffer(&mut self, buffer: BufferId, data: &[u8], _hint: UsageHint) -> DeviceResult<()> {
        let (_, stored) = self.buffers.get_mut(&buffer).ok_or(DeviceError::UnknownBuffer(buffer))?;
        *stored = data.to_vec();
        self.commands.push(DeviceCommand::UpdateBuffer {
            id: buffer,
            bytes: data.len(),
        });
        Ok(())
    }
    
    fn delete_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            self.commands.push(DeviceCommand::DeleteBuffer(buffer));
        }
    }
    
    fn use_program(&mut self, shader: &ShaderProgram, variant: &ProgramVariant<'_>) -> DeviceResult<()> {
        let key = (shader.name.clone(), variant.key.to_string());
        if !self.compiled.contains(&key) {
            *self.compile_attempts.entry(shader.name.clone()).or_insert(0) += 1;
            if self.failing_shaders.contains(&shader.name) {
                self.program = None;
                return Err(DeviceError::ShaderCompile {
                    shader: shader.name.clone(),
                    log: String::from("compilation disabled for this shader"),
                });
            }
            self.compiled.insert(key);
        }
        self.program = Some(shader.name.clone());
        self.commands.push(DeviceCommand::UseProgram {
            shader: shader.name.clone(),
            key: variant.key.to_string(),
        });
        Ok(())
    }
    
    fn set_uniform(&mut self, name: &str, value: &UniformValue) -> bool {
        let Some(program) = &self.program else {
            return false;
        };
        self.uniforms
            .entry(program.clone())
            .or_default()
            .insert(name.to_string(), value.clone());
        self.commands.push(DeviceCommand::SetUniform {
            name: name.to_string(),
            value: value.clone(),
        });
        true
    }
    
    fn bind_texture(&mut self, slot: u32, name: &str, texture: TextureId) {
        self.commands.push(DeviceCommand::BindTexture {
            slot,
            name: name.to_string(),
            texture,
        });
    }
    
    fn set_depth_test(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::DepthTest(enabled));
    }
    
    fn set_depth_mask(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::DepthMask(enabled));
    }
    
    fn set_blend(&mut self, blend: Option<BlendFunc>) {
        self.commands.push(DeviceCommand::Blend(blend));
    }
    
    fn set_face_culling(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::FaceCulling(enabled));
    }
    
    fn set_cull_face(&mut self, face: CullFace) {
        self.commands.push(DeviceCommand::CullFace(face));
    }
    
    fn set_front_face(&mut self, face: FrontFace) {
        self.commands.push(DeviceCommand::FrontFace(face));
    }
    
    fn draw(&mut self, call: &DrawCall<'_>) -> DeviceResult<()> {
        let chunk = call.chunk;
        for binding in &chunk.attributes {
            if !self.buffers.contains_key(&binding.buffer) {
                return Err(DeviceError::UnknownBuffer(binding.buffer));
            }
        }
        if let Some(indices) = &chunk.indices {
            if !self.buffers.contains_key(&indices.buffer) {
                return Err(DeviceError::UnknownBuffer(indices.buffer));
            }
            if indices.index_type == IndexType::U32 && !self.supports_u32 {
                return Err(DeviceError::InvalidDraw(String::from("32-bit indices are not supported")));
            }
        }
        let uniforms = self
            .program
            .as_ref()
            .and_then(|p| self.uniforms.get(p))
            .cloned()
            .unwrap_or_default();
        self.commands.push(DeviceCommand::Draw(DrawRecord {
            program: self.program.clone(),
            mode: call.mode,
            vertex_count: chunk.vertex_count,
            index_count: chunk.indices.map(|i| i.count),
            index_type: chunk.indices.map(|i| i.index_type),
            uniforms,
        }));
        Ok(())
    }
}
