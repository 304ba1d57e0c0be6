//! Graphics device abstraction
//!
//! The renderer talks to the GPU only through [`GpuDevice`]. A device owns
//! one graphics context; buffer and program handles are only meaningful
//! within the context that created them.

mod recording;

pub use recording::{DeviceCommand, DrawRecord, RecordingDevice};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::{ChunkBuffers, UsageHint};
use crate::render::shader::{ProgramVariant, ShaderProgram};
use crate::scene::{CullFace, DrawMode, FrontFace};

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Identifies a graphics context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u64);

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Handle to an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

/// Handle to an offscreen framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u64);

/// Buffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex attribute data
    Vertex,
    /// Element indices
    Index,
}

bitflags! {
    /// Buffers cleared at the start of a frame
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        /// Color buffer
        const COLOR = 0b001;
        /// Depth buffer
        const DEPTH = 0b010;
        /// Stencil buffer
        const STENCIL = 0b100;
    }
}

/// Pixel rectangle in framebuffer space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Blend factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    /// 0
    Zero,
    /// 1
    One,
    /// Source color
    SrcColor,
    /// 1 - source color
    OneMinusSrcColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination color
    DstColor,
    /// 1 - destination color
    OneMinusDstColor,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
}

/// Source and destination blend factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendFunc {
    /// Factor applied to the incoming fragment
    pub src: BlendFactor,
    /// Factor applied to the framebuffer value
    pub dst: BlendFactor,
}

impl BlendFunc {
    /// Standard alpha blending
    pub const ALPHA: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
    
    /// Additive blending
    pub const ADDITIVE: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::One,
    };
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self::ALPHA
    }
}

/// Value uploaded to a shader uniform
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// Scalar float
    Float(f32),
    /// Scalar integer
    Int(i32),
    /// 2-component vector
    Vec2([f32; 2]),
    /// 3-component vector
    Vec3([f32; 3]),
    /// 4-component vector
    Vec4([f32; 4]),
    /// Column-major 3x3 matrix
    Mat3([f32; 9]),
    /// Column-major 4x4 matrix
    Mat4([f32; 16]),
    /// Array of floats
    FloatArray(Vec<f32>),
    /// Array of 3-component vectors, flattened
    Vec3Array(Vec<f32>),
}

/// One draw of one geometry chunk
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    /// Primitive topology
    pub mode: DrawMode,
    /// Line width for line topologies
    pub line_width: f32,
    /// Buffers to draw from
    pub chunk: &'a ChunkBuffers,
}

/// Device failures
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A shader program failed to compile or link
    #[error("shader '{shader}' failed to compile: {log}")]
    ShaderCompile {
        /// Program name
        shader: String,
        /// Driver log
        log: String,
    },
    
    /// Buffer allocation failed
    #[error("buffer allocation failed: {0}")]
    OutOfMemory(String),
    
    /// A buffer handle does not belong to this context
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    
    /// A draw referenced missing or inconsistent buffers
    #[error("invalid draw: {0}")]
    InvalidDraw(String),
}

/// Immediate-mode graphics device bound to one context
pub trait GpuDevice {
    /// Context owning every handle created by this device
    fn context_id(&self) -> ContextId;
    
    /// Whether 32-bit index buffers can be drawn
    fn supports_u32_indices(&self) -> bool;
    
    /// Bind an offscreen target, or the default framebuffer for `None`
    fn bind_framebuffer(&mut self, target: Option<FramebufferId>);
    
    /// Set the viewport rectangle
    fn set_viewport(&mut self, viewport: Viewport);
    
    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: Viewport);
    
    /// Clear the selected buffers
    fn clear(&mut self, flags: ClearFlags, color: [f32; 4]);
    
    /// Create a buffer holding `data`
    fn create_buffer(&mut self, kind: BufferKind, data: &[u8], hint: UsageHint) -> DeviceResult<BufferId>;
    
    /// Replace the contents of a buffer
    fn update_buffer(&mut self, buffer: BufferId, data: &[u8], hint: UsageHint) -> DeviceResult<()>;
    
    /// Free a buffer; unknown handles are ignored
    fn delete_buffer(&mut self, buffer: BufferId);
    
    /// Compile (if needed) and bind one variant of `shader`
    fn use_program(&mut self, shader: &ShaderProgram, variant: &ProgramVariant<'_>) -> DeviceResult<()>;
    
    /// Upload a uniform of the bound program; returns false when the program has no such uniform
    fn set_uniform(&mut self, name: &str, value: &UniformValue) -> bool;
    
    /// Bind a texture to `slot` and point sampler `name` at it
    fn bind_texture(&mut self, slot: u32, name: &str, texture: TextureId);
    
    /// Enable or disable depth testing
    fn set_depth_test(&mut self, enabled: bool);
    
    /// Enable or disable depth writes
    fn set_depth_mask(&mut self, enabled: bool);
    
    /// Set blending, or disable it for `None`
    fn set_blend(&mut self, blend: Option<BlendFunc>);
    
    /// Enable or disable face culling
    fn set_face_culling(&mut self, enabled: bool);
    
    /// Select the culled faces
    fn set_cull_face(&mut self, face: CullFace);
    
    /// Select the front-face winding
    fn set_front_face(&mut self, face: FrontFace);
    
    /// Issue one draw
    fn draw(&mut self, call: &DrawCall<'_>) -> DeviceResult<()>;
}
