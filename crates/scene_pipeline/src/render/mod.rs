//! # Rendering
//!
//! Everything between a prepared [`Scene`](crate::scene::Scene) and the GPU.
//!
//! ## Architecture
//!
//! - **Renderer**: per-frame culling, sorting, state diffing and submission
//! - **Camera**: projection, view matrix and view-space frustum
//! - **Material / Shader**: what an object is drawn with, kept in registries
//! - **Device**: the [`GpuDevice`] trait every command goes through, plus a
//!   recording implementation for headless use
//!
//! GPU handles are scoped to the context that created them; see
//! [`GpuDevice::context_id`].

pub mod camera;
pub mod device;
pub mod frustum;
pub mod material;
pub mod renderer;
pub mod shader;

pub use camera::{CameraData, Projection, Ray};
pub use device::{
    BlendFactor, BlendFunc, BufferId, BufferKind, ClearFlags, ContextId, DeviceCommand, DeviceError, DeviceResult,
    DrawCall, DrawRecord, FramebufferId, GpuDevice, RecordingDevice, TextureId, UniformValue, Viewport,
};
pub use frustum::Frustum;
pub use material::{Material, MaterialId, MaterialRegistry, TextureBinding, TextureState};
pub use renderer::{RenderAssets, RenderError, RenderInfo, RenderResult, Renderer};
pub use shader::{
    CommonSemantic, MatrixBase, MatrixSemantic, ProgramVariant, ShaderId, ShaderProgram, ShaderRegistry,
};
