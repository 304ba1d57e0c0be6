//! # Scene Pipeline
//!
//! A scene-graph to GPU submission pipeline.
//!
//! ## Features
//!
//! - **Transform hierarchy**: arena-backed node tree with revision-stamped
//!   world matrix propagation
//! - **Scene queues**: opaque and transparent draw queues rebuilt each frame
//!   without reallocating, plus packed light uniforms per light group
//! - **Renderer**: frustum culling, state-minimizing sort, lazy matrix
//!   semantics and one draw per geometry chunk
//! - **Geometry chunking**: meshes beyond the 16-bit index range are split
//!   into independently drawable chunks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_pipeline::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scene = Scene::new();
//!     let camera = scene.create(NodeRole::Camera(CameraData::perspective(60.0, 1.0, 0.1, 100.0)));
//!     scene.add_to_root(camera)?;
//!
//!     let mut geometries = GeometryRegistry::new();
//!     let mut shaders = ShaderRegistry::new();
//!     let mut materials = MaterialRegistry::new();
//!     let shader = shaders.insert(ShaderProgram::new("basic", "", ""));
//!     let material = materials.insert(Material::new("basic", shader));
//!     let geometry = geometries.insert(Geometry::new());
//!     let mesh = scene.create(NodeRole::Mesh(MeshData::new(geometry, material)));
//!     scene.add_to_root(mesh)?;
//!
//!     let mut device = RecordingDevice::new();
//!     let mut renderer = Renderer::default();
//!     let mut assets = RenderAssets::new(&mut geometries, &materials, &shaders);
//!     let info = renderer.render(&mut device, &mut scene, camera, &mut assets, None)?;
//!     println!("{} draw calls", info.draw_call_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod foundation;
pub mod geometry;
pub mod render;
pub mod scene;

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, GeometryConfig, PipelineConfig, RendererConfig, SceneConfig},
        foundation::{
            bounds::BoundingBox,
            collections::NodeId,
            math::{Mat4, Quat, Transform, Vec2, Vec3},
        },
        geometry::{Geometry, GeometryError, GeometryId, GeometryRegistry, UsageHint},
        render::{
            CameraData, GpuDevice, Material, MaterialId, MaterialRegistry, Projection, RecordingDevice,
            RenderAssets, RenderError, RenderInfo, Renderer, ShaderId, ShaderProgram, ShaderRegistry,
        },
        scene::{LightData, LightKind, MeshData, Node, NodeRole, Scene, SceneError},
    };
}
