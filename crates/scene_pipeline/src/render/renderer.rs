//! # Renderer
//!
//! Turns a [`Scene`] seen through a camera node into device commands.
//!
//! ## Frame outline
//!
//! 1. Update the scene (unless disabled) and the camera.
//! 2. Bind the target, set the viewport and clear.
//! 3. Store view-space depths on transparent items and sort both queues.
//! 4. Draw the opaque queue, then the transparent queue back to front.
//!
//! Per object the renderer frustum-culls, binds the shader and material
//! only when they change, uploads the matrix semantics the shader declares,
//! diffs face-culling state and issues one draw per geometry chunk.
//! Failures of a single object are logged and counted in [`RenderInfo`];
//! they never abort the frame.

use std::collections::{BTreeSet, HashSet};
use std::ops::AddAssign;

use thiserror::Error;

use crate::config::{ConfigError, GeometryConfig, PipelineConfig, RendererConfig};
use crate::foundation::bounds::BoundingBox;
use crate::foundation::collections::NodeId;
use crate::foundation::math::{Mat4, Vec2};
use crate::foundation::time::FrameClock;
use crate::geometry::{GeometryError, GeometryId, GeometryRegistry};
use crate::render::camera::CameraData;
use crate::render::device::{
    BlendFunc, ClearFlags, DeviceError, DrawCall, FramebufferId, GpuDevice, UniformValue, Viewport,
};
use crate::render::frustum::Frustum;
use crate::render::material::{Material, MaterialId, MaterialRegistry, TextureState};
use crate::render::shader::{CommonSemantic, MatrixBase, MatrixSemantic, ProgramVariant, ShaderId, ShaderProgram, ShaderRegistry};
use crate::scene::{CullFace, FrontFace, LightGroup, NodeTree, RenderItem, Scene, SceneError};

/// View-space `z` a box straddling the camera plane is clipped to before projection
const NEAR_CLIP_Z: f32 = -1e-20;

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Rendering failures
#[derive(Error, Debug)]
pub enum RenderError {
    /// Scene lookup failed (unknown node, node is not a camera)
    #[error(transparent)]
    Scene(#[from] SceneError),
    
    /// Geometry could not be prepared
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    
    /// The device rejected a command
    #[error(transparent)]
    Device(#[from] DeviceError),
    
    /// Invalid renderer configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    
    /// A renderable references a material that is not registered
    #[error("material {0:?} is not registered")]
    MissingMaterial(MaterialId),
    
    /// A material references a shader that is not registered
    #[error("shader {0:?} is not registered")]
    MissingShader(ShaderId),
    
    /// A renderable references a geometry that is not registered
    #[error("geometry {0:?} is not registered")]
    MissingGeometry(GeometryId),
    
    /// The scene has no camera to render with
    #[error("the scene has no camera")]
    NoCamera,
}

/// Statistics of one render call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderInfo {
    /// Triangles submitted
    pub face_count: usize,
    /// Vertices submitted
    pub vertex_count: usize,
    /// Draw calls issued
    pub draw_call_count: usize,
    /// Queued meshes considered
    pub mesh_count: usize,
    /// Meshes that issued at least their draw calls
    pub rendered_mesh_count: usize,
    /// Meshes rejected by frustum culling
    pub culled_count: usize,
    /// Meshes skipped because of an error
    pub failed_count: usize,
}

impl AddAssign for RenderInfo {
    fn add_assign(&mut self, other: Self) {
        self.face_count += other.face_count;
        self.vertex_count += other.vertex_count;
        self.draw_call_count += other.draw_call_count;
        self.mesh_count += other.mesh_count;
        self.rendered_mesh_count += other.rendered_mesh_count;
        self.culled_count += other.culled_count;
        self.failed_count += other.failed_count;
    }
}

/// Registries the renderer reads objects from
pub struct RenderAssets<'a> {
    /// Geometries; mutable because buffers are uploaded on demand
    pub geometries: &'a mut GeometryRegistry,
    /// Materials
    pub materials: &'a MaterialRegistry,
    /// Shader programs
    pub shaders: &'a ShaderRegistry,
}

impl<'a> RenderAssets<'a> {
    /// Bundle the registries for one frame
    pub fn new(
        geometries: &'a mut GeometryRegistry,
        materials: &'a MaterialRegistry,
        shaders: &'a ShaderRegistry,
    ) -> Self {
        Self {
            geometries,
            materials,
            shaders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Opaque,
    Transparent,
}

enum ItemOutcome {
    Drawn {
        draw_calls: usize,
        faces: usize,
        vertices: usize,
    },
    Culled,
    Skipped,
    Empty,
}

/// Matrices by base; inverses and products are filled in on first use
#[derive(Debug, Clone, Copy)]
struct MatrixSet {
    plain: [Option<Mat4>; 6],
    inverse: [Option<Mat4>; 6],
}

impl MatrixSet {
    fn for_camera(camera: &CameraData) -> Self {
        let mut set = Self {
            plain: [None; 6],
            inverse: [None; 6],
        };
        set.plain[MatrixBase::View as usize] = Some(*camera.view_matrix());
        set.inverse[MatrixBase::View as usize] = Some(*camera.world_matrix());
        set.plain[MatrixBase::Projection as usize] = Some(*camera.projection_matrix());
        set.inverse[MatrixBase::Projection as usize] = Some(*camera.inverse_projection());
        set.plain[MatrixBase::ViewProjection as usize] = Some(camera.projection_matrix() * camera.view_matrix());
        set
    }
    
    fn for_object(&self, world: &Mat4, world_view: &Mat4) -> Self {
        let mut set = *self;
        for base in [MatrixBase::World, MatrixBase::WorldView, MatrixBase::WorldViewProjection] {
            set.plain[base as usize] = None;
            set.inverse[base as usize] = None;
        }
        set.plain[MatrixBase::World as usize] = Some(*world);
        set.plain[MatrixBase::WorldView as usize] = Some(*world_view);
        set
    }
    
    fn plain(&mut self, base: MatrixBase) -> Mat4 {
        if let Some(matrix) = self.plain[base as usize] {
            return matrix;
        }
        let matrix = match base {
            MatrixBase::ViewProjection => self.plain(MatrixBase::Projection) * self.plain(MatrixBase::View),
            MatrixBase::WorldViewProjection => self.plain(MatrixBase::Projection) * self.plain(MatrixBase::WorldView),
            // The other bases are seeded on construction.
            _ => Mat4::identity(),
        };
        self.plain[base as usize] = Some(matrix);
        matrix
    }
    
    fn inverse(&mut self, base: MatrixBase) -> Mat4 {
        if let Some(matrix) = self.inverse[base as usize] {
            return matrix;
        }
        let matrix = self.plain(base).try_inverse().unwrap_or_else(Mat4::identity);
        self.inverse[base as usize] = Some(matrix);
        matrix
    }
    
    fn get(&mut self, semantic: MatrixSemantic) -> Mat4 {
        let matrix = if semantic.inverse {
            self.inverse(semantic.base)
        } else {
            self.plain(semantic.base)
        };
        if semantic.transpose {
            matrix.transpose()
        } else {
            matrix
        }
    }
}

/// Last fixed-function state sent to the device; `None` means unknown
#[derive(Debug, Default)]
struct StateCache {
    depth_test: Option<bool>,
    depth_mask: Option<bool>,
    blend: Option<Option<BlendFunc>>,
    face_culling: Option<bool>,
    cull_face: Option<CullFace>,
    front_face: Option<FrontFace>,
}

fn diff<T: PartialEq + Copy>(slot: &mut Option<T>, value: T, apply: impl FnOnce(T)) {
    if *slot != Some(value) {
        *slot = Some(value);
        apply(value);
    }
}

struct FrameState {
    matrices: MatrixSet,
    frustum: Frustum,
    near: f32,
    far: f32,
    viewport: Viewport,
    scene_bounds: BoundingBox,
    state: StateCache,
}

impl FrameState {
    fn new(camera: &CameraData, viewport: Viewport) -> Self {
        Self {
            matrices: MatrixSet::for_camera(camera),
            frustum: camera.frustum().clone(),
            near: camera.near(),
            far: camera.far(),
            viewport,
            scene_bounds: BoundingBox::empty(),
            state: StateCache::default(),
        }
    }
}

/// Shader and material bound by the previous object of a pass
#[derive(Debug, Default)]
struct Bound {
    program: Option<(ShaderId, u32)>,
    material: Option<MaterialId>,
}

/// Sort key of a queued renderable; the serial makes every key unique
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    render_order: i32,
    shader: Option<ShaderId>,
    material: Option<MaterialId>,
    geometry: Option<GeometryId>,
    serial: u64,
}

impl SortKey {
    fn of(item: &RenderItem, tree: &NodeTree, materials: &MaterialRegistry, scene_material: Option<MaterialId>) -> Self {
        let node = tree.get(item.node);
        let mesh = node.and_then(|n| n.mesh());
        let material = scene_material.or_else(|| mesh.and_then(|m| m.material));
        Self {
            render_order: mesh.map_or(0, |m| m.render_order),
            shader: material.and_then(|id| materials.get(id)).map(|m| m.shader),
            material,
            geometry: mesh.and_then(|m| m.geometry),
            serial: node.map_or(0, |n| n.serial()),
        }
    }
}

/// Scene renderer
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    geometry_config: GeometryConfig,
    viewport: Option<Viewport>,
    clock: FrameClock,
    error_shaders: HashSet<ShaderId>,
    last_info: RenderInfo,
}

impl Renderer {
    /// Create a renderer
    pub fn new(config: RendererConfig, geometry_config: GeometryConfig) -> Self {
        log::info!(
            "Creating renderer {}x{} (index limit {})",
            config.width,
            config.height,
            geometry_config.index_limit
        );
        Self {
            config,
            geometry_config,
            viewport: None,
            clock: FrameClock::new(),
            error_shaders: HashSet::new(),
            last_info: RenderInfo::default(),
        }
    }
    
    /// Create a renderer from a validated pipeline configuration
    pub fn from_config(config: &PipelineConfig) -> RenderResult<Self> {
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(Self::new(config.renderer.clone(), config.geometry.clone()))
    }
    
    /// Renderer settings
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
    
    /// Renderer settings, mutably
    pub fn config_mut(&mut self) -> &mut RendererConfig {
        &mut self.config
    }
    
    /// Geometry settings used for uploads
    pub fn geometry_config(&self) -> &GeometryConfig {
        &self.geometry_config
    }
    
    /// Resize the surface; a custom viewport is kept
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
    }
    
    /// Restrict drawing to a rectangle, or use the full surface for `None`
    pub fn set_viewport(&mut self, viewport: Option<Viewport>) {
        self.viewport = viewport;
    }
    
    /// Viewport used by the next frame
    pub fn viewport(&self) -> Viewport {
        self.viewport.unwrap_or(Viewport {
            x: 0,
            y: 0,
            width: self.config.width,
            height: self.config.height,
        })
    }
    
    /// Statistics of the last [`render`](Self::render)
    pub fn info(&self) -> RenderInfo {
        self.last_info
    }
    
    /// Frame clock driving the `TIME` semantic
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }
    
    /// Shaders that failed to compile and are skipped
    pub fn failed_shaders(&self) -> impl Iterator<Item = ShaderId> + '_ {
        self.error_shaders.iter().copied()
    }
    
    /// Forget compile failures so the shaders are tried again
    pub fn clear_shader_errors(&mut self) {
        self.error_shaders.clear();
    }
    
    /// Render the scene through its main camera
    pub fn render_main(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &mut Scene,
        assets: &mut RenderAssets<'_>,
        target: Option<FramebufferId>,
    ) -> RenderResult<RenderInfo> {
        let camera = scene.main_camera().ok_or(RenderError::NoCamera)?;
        self.render(device, scene, camera, assets, target)
    }
    
    /// Render one frame of `scene` as seen from the `camera` node
    ///
    /// Draws into `target`, or the default framebuffer for `None`.
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &mut Scene,
        camera: NodeId,
        assets: &mut RenderAssets<'_>,
        target: Option<FramebufferId>,
    ) -> RenderResult<RenderInfo> {
        self.clock.tick();
        if scene.config().auto_update {
            scene.update(false, assets.materials);
        }
        let mut frame = self.prepare_camera(scene, camera)?;
        
        device.bind_framebuffer(target);
        device.set_viewport(frame.viewport);
        if frame.viewport != self.full_surface() {
            device.set_scissor(frame.viewport);
        }
        let flags = self.clear_flags();
        if !flags.is_empty() {
            device.clear(flags, self.config.clear_color);
        }
        
        let view = frame.matrices.plain(MatrixBase::View);
        sort_queues(scene, &view, assets.materials);
        
        let scene_ref: &Scene = scene;
        let mut info = self.draw_items(device, scene_ref, scene_ref.queue().opaque(), assets, &mut frame, Pass::Opaque);
        info += self.draw_items(
            device,
            scene_ref,
            scene_ref.queue().transparent(),
            assets,
            &mut frame,
            Pass::Transparent,
        );
        
        if let Some(data) = scene.node_mut(camera)?.camera_mut() {
            data.scene_bounds_last_frame = frame.scene_bounds;
        }
        log::trace!(
            "Frame {}: {} draw calls, {} faces, {} vertices, {}/{} meshes drawn, {} culled, {} failed",
            self.clock.frame_count(),
            info.draw_call_count,
            info.face_count,
            info.vertex_count,
            info.rendered_mesh_count,
            info.mesh_count,
            info.culled_count,
            info.failed_count
        );
        self.last_info = info;
        Ok(info)
    }
    
    /// Draw `items` in the given order with an already updated camera
    ///
    /// Used by multi-pass clients that build their own lists. Nothing is
    /// cleared, sorted or updated, and the camera's scene box is left alone.
    pub fn render_queue(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &Scene,
        camera: NodeId,
        items: &[RenderItem],
        assets: &mut RenderAssets<'_>,
        transparent: bool,
    ) -> RenderResult<RenderInfo> {
        let data = scene.node(camera)?.camera().ok_or(SceneError::NotACamera(camera))?;
        let mut frame = FrameState::new(data, self.viewport());
        let pass = if transparent { Pass::Transparent } else { Pass::Opaque };
        Ok(self.draw_items(device, scene, items, assets, &mut frame, pass))
    }
    
    /// Detach and free a subtree, releasing its geometry buffers when `dispose_geometry` is set
    ///
    /// Returns the freed node ids.
    pub fn dispose_node(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &mut Scene,
        node: NodeId,
        geometries: &mut GeometryRegistry,
        dispose_geometry: bool,
    ) -> RenderResult<Vec<NodeId>> {
        let used: BTreeSet<GeometryId> = scene
            .tree()
            .descendants(node)
            .into_iter()
            .filter_map(|id| scene.tree().get(id).and_then(|n| n.mesh()).and_then(|m| m.geometry))
            .collect();
        let removed = scene.destroy(node)?;
        if dispose_geometry {
            for id in &used {
                if let Some(geometry) = geometries.get_mut(*id) {
                    geometry.dispose(device);
                }
            }
        }
        log::debug!("Disposed {} node(s) and {} geometry buffer set(s)", removed.len(), if dispose_geometry { used.len() } else { 0 });
        Ok(removed)
    }
    
    /// Free every node below the scene root together with its geometry buffers
    pub fn dispose_scene(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &mut Scene,
        geometries: &mut GeometryRegistry,
    ) -> RenderResult<()> {
        let children = scene.node(scene.root())?.children().to_vec();
        for child in children {
            self.dispose_node(device, scene, child, geometries, true)?;
        }
        Ok(())
    }
    
    /// Convert window coordinates (origin top-left, in surface pixels) to normalized device coordinates
    pub fn screen_to_ndc(&self, x: f32, y: f32) -> Vec2 {
        let viewport = self.viewport();
        let y = self.config.height as f32 - y;
        Vec2::new(
            (x - viewport.x as f32) / viewport.width as f32 * 2.0 - 1.0,
            (y - viewport.y as f32) / viewport.height as f32 * 2.0 - 1.0,
        )
    }
    
    fn full_surface(&self) -> Viewport {
        Viewport {
            x: 0,
            y: 0,
            width: self.config.width,
            height: self.config.height,
        }
    }
    
    fn clear_flags(&self) -> ClearFlags {
        let mut flags = ClearFlags::empty();
        flags.set(ClearFlags::COLOR, self.config.clear_color_buffer);
        flags.set(ClearFlags::DEPTH, self.config.clear_depth_buffer);
        flags.set(ClearFlags::STENCIL, self.config.clear_stencil_buffer);
        flags
    }
    
    fn prepare_camera(&self, scene: &mut Scene, camera: NodeId) -> RenderResult<FrameState> {
        scene.tree_mut().update_world_chain(camera)?;
        let node = scene.node_mut(camera)?;
        let world = *node.world_transform();
        let data = node.camera_mut().ok_or(SceneError::NotACamera(camera))?;
        data.update(&world);
        Ok(FrameState::new(data, self.viewport()))
    }
    
    fn draw_items(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &Scene,
        items: &[RenderItem],
        assets: &mut RenderAssets<'_>,
        frame: &mut FrameState,
        pass: Pass,
    ) -> RenderInfo {
        let mut info = RenderInfo::default();
        let mut bound = Bound::default();
        for item in items {
            info.mesh_count += 1;
            match self.draw_item(device, scene, item, assets, frame, pass, &mut bound) {
                Ok(ItemOutcome::Drawn {
                    draw_calls,
                    faces,
                    vertices,
                }) => {
                    info.rendered_mesh_count += 1;
                    info.draw_call_count += draw_calls;
                    info.face_count += faces;
                    info.vertex_count += vertices;
                }
                Ok(ItemOutcome::Culled) => info.culled_count += 1,
                Ok(ItemOutcome::Skipped) => info.failed_count += 1,
                Ok(ItemOutcome::Empty) => {}
                Err(err) => {
                    log::warn!("Skipping node {:?}: {}", item.node, err);
                    info.failed_count += 1;
                }
            }
        }
        info
    }
    
    #[allow(clippy::too_many_arguments)]
    fn draw_item(
        &mut self,
        device: &mut dyn GpuDevice,
        scene: &Scene,
        item: &RenderItem,
        assets: &mut RenderAssets<'_>,
        frame: &mut FrameState,
        pass: Pass,
        bound: &mut Bound,
    ) -> RenderResult<ItemOutcome> {
        let node = scene.node(item.node)?;
        let Some(mesh) = node.mesh() else {
            return Ok(ItemOutcome::Skipped);
        };
        let (Some(geometry_id), Some(material_id)) = (mesh.geometry, scene.scene_material().or(mesh.material)) else {
            return Ok(ItemOutcome::Skipped);
        };
        let material = assets
            .materials
            .get(material_id)
            .ok_or(RenderError::MissingMaterial(material_id))?;
        let geometry = assets
            .geometries
            .get_mut(geometry_id)
            .ok_or(RenderError::MissingGeometry(geometry_id))?;
        if geometry.vertex_count() == 0 {
            return Ok(ItemOutcome::Empty);
        }
        
        let world = *node.world_transform();
        let world_view = frame.matrices.plain(MatrixBase::View) * world;
        let bbox = match geometry.bounding_box() {
            Some(bbox) => bbox,
            None => geometry.update_bounding_box(),
        };
        let test = self.config.frustum_culling
            && mesh.frustum_culling
            && (pass == Pass::Opaque || self.config.cull_transparent);
        let projection = frame.matrices.plain(MatrixBase::Projection);
        if is_frustum_culled(
            &bbox,
            &world_view,
            &frame.frustum,
            &projection,
            test,
            mesh.cast_shadow,
            &mut frame.scene_bounds,
        ) {
            return Ok(ItemOutcome::Culled);
        }
        
        if self.error_shaders.contains(&material.shader) {
            return Ok(ItemOutcome::Skipped);
        }
        let program = assets
            .shaders
            .get(material.shader)
            .ok_or(RenderError::MissingShader(material.shader))?;
        let key = (material.shader, mesh.light_group);
        if bound.program != Some(key) {
            let lights = scene.light_group(mesh.light_group);
            let variant = lights.map_or(
                ProgramVariant {
                    key: "",
                    defines: &[],
                },
                LightGroup::variant,
            );
            if let Err(err) = device.use_program(program, &variant) {
                log::error!("Shader '{}' disabled: {}", program.name, err);
                self.error_shaders.insert(material.shader);
                bound.program = None;
                return Ok(ItemOutcome::Skipped);
            }
            self.bind_frame_uniforms(device, program, lights, frame);
            bound.program = Some(key);
            bound.material = None;
        }
        if bound.material != Some(material_id) {
            self.bind_material(device, material, frame, pass);
            bound.material = Some(material_id);
        }
        
        let mut matrices = frame.matrices.for_object(&world, &world_view);
        for (semantic, uniform) in program.matrix_semantics() {
            if semantic.base.is_per_object() {
                device.set_uniform(uniform, &mat4_uniform(&matrices.get(semantic)));
            }
        }
        
        let state = &mut frame.state;
        diff(&mut state.face_culling, mesh.culling, |v| device.set_face_culling(v));
        if mesh.culling {
            diff(&mut state.cull_face, mesh.cull_face, |v| device.set_cull_face(v));
        }
        diff(&mut state.front_face, mesh.front_face, |v| device.set_front_face(v));
        
        let chunks = geometry.buffer_chunks(device, &self.geometry_config)?;
        let (mut draw_calls, mut faces, mut vertices) = (0, 0, 0);
        for chunk in chunks.iter().filter(|c| c.vertex_count > 0) {
            device.draw(&DrawCall {
                mode: mesh.mode,
                line_width: mesh.line_width,
                chunk,
            })?;
            draw_calls += 1;
            faces += chunk.face_count;
            vertices += chunk.vertex_count;
        }
        Ok(ItemOutcome::Drawn {
            draw_calls,
            faces,
            vertices,
        })
    }
    
    fn bind_frame_uniforms(
        &self,
        device: &mut dyn GpuDevice,
        program: &ShaderProgram,
        lights: Option<&LightGroup>,
        frame: &mut FrameState,
    ) {
        let viewport = frame.viewport;
        for (semantic, uniform) in program.common_semantics() {
            let value = match semantic {
                CommonSemantic::Viewport => UniformValue::Vec4([
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.width as f32,
                    viewport.height as f32,
                ]),
                CommonSemantic::WindowSize => {
                    UniformValue::Vec2([self.config.width as f32, self.config.height as f32])
                }
                CommonSemantic::ViewportSize => UniformValue::Vec2([viewport.width as f32, viewport.height as f32]),
                CommonSemantic::Near => UniformValue::Float(frame.near),
                CommonSemantic::Far => UniformValue::Float(frame.far),
                CommonSemantic::DevicePixelRatio => UniformValue::Float(self.config.device_pixel_ratio),
                CommonSemantic::Time => UniformValue::Float(self.clock.elapsed()),
            };
            device.set_uniform(uniform, &value);
        }
        for (semantic, uniform) in program.matrix_semantics() {
            if !semantic.base.is_per_object() {
                device.set_uniform(uniform, &mat4_uniform(&frame.matrices.get(semantic)));
            }
        }
        if let Some(lights) = lights {
            for (symbol, value) in lights.uniforms().iter() {
                device.set_uniform(symbol, &value);
            }
        }
    }
    
    fn bind_material(&self, device: &mut dyn GpuDevice, material: &Material, frame: &mut FrameState, pass: Pass) {
        let state = &mut frame.state;
        diff(&mut state.depth_test, material.depth_test, |v| device.set_depth_test(v));
        diff(&mut state.depth_mask, material.depth_mask, |v| device.set_depth_mask(v));
        let blend = match pass {
            Pass::Opaque => None,
            Pass::Transparent => Some(material.blend.unwrap_or(self.config.transparent_blend)),
        };
        diff(&mut state.blend, blend, |v| device.set_blend(v));
        
        for (name, value) in material.uniforms() {
            device.set_uniform(name, value);
        }
        let mut slot = 0;
        for (name, binding) in material.textures() {
            if binding.state == TextureState::Ready {
                device.bind_texture(slot, name, binding.texture);
                slot += 1;
            } else {
                log::trace!("Texture '{}' of material '{}' is not ready, skipped", name, material.name);
            }
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RendererConfig::default(), GeometryConfig::default())
    }
}

/// Store view-space depths on transparent items, then sort both queues
///
/// Opaque items are grouped by render order, shader, material and geometry.
/// Transparent items are ordered by render order, then far to near.
fn sort_queues(scene: &mut Scene, view: &Mat4, materials: &MaterialRegistry) {
    let scene_material = scene.scene_material();
    let (queue, tree) = scene.queue_and_tree_mut();
    for item in queue.transparent.as_mut_slice() {
        item.depth = tree.get(item.node).map_or(0.0, |n| (view * n.world_transform())[(2, 3)]);
    }
    let key = |item: &RenderItem| SortKey::of(item, tree, materials, scene_material);
    queue.opaque.as_mut_slice().sort_by(|a, b| key(a).cmp(&key(b)));
    queue.transparent.as_mut_slice().sort_by(|a, b| {
        let (ka, kb) = (key(a), key(b));
        ka.render_order
            .cmp(&kb.render_order)
            .then(a.depth.total_cmp(&b.depth))
            .then(ka.cmp(&kb))
    });
}

/// Whether a geometry box is outside the view volume
///
/// The view-space box of a shadow caster is merged into `scene_bounds`
/// before any test. With `test` unset nothing is culled.
fn is_frustum_culled(
    bbox: &BoundingBox,
    world_view: &Mat4,
    frustum: &Frustum,
    projection: &Mat4,
    test: bool,
    cast_shadow: bool,
    scene_bounds: &mut BoundingBox,
) -> bool {
    if !bbox.is_valid() {
        return false;
    }
    let mut view_box = bbox.transformed(world_view);
    if cast_shadow {
        scene_bounds.union(&view_box);
    }
    if !test {
        return false;
    }
    if !view_box.intersects(&frustum.bounding_box) {
        return true;
    }
    // Corners behind the camera would flip sign in the perspective divide.
    if view_box.max.z > 0.0 && view_box.min.z < 0.0 {
        view_box.max.z = NEAR_CLIP_Z;
    }
    let ndc = view_box.projected(projection);
    ndc.max.x < -1.0
        || ndc.min.x > 1.0
        || ndc.max.y < -1.0
        || ndc.min.y > 1.0
        || ndc.max.z < -1.0
        || ndc.min.z > 1.0
}

fn mat4_uniform(matrix: &Mat4) -> UniformValue {
    let mut values = [0.0; 16];
    values.copy_from_slice(matrix.as_slice());
    UniformValue::Mat4(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::geometry::{Geometry, IndexType};
    use crate::render::device::{DeviceCommand, RecordingDevice, TextureId};
    use crate::render::material::Material;
    use crate::render::shader::ShaderProgram;
    use crate::scene::{LightData, LightKind, MeshData, NodeRole};
    use approx::assert_relative_eq;
    
    const EPSILON: f32 = 1e-4;
    
    struct Fixture {
        scene: Scene,
        camera: NodeId,
        geometries: GeometryRegistry,
        materials: MaterialRegistry,
        shaders: ShaderRegistry,
        device: RecordingDevice,
        renderer: Renderer,
    }
    
    impl Fixture {
        fn new() -> Self {
            crate::foundation::logging::try_init();
            let mut scene = Scene::new();
            let camera = scene.create_named(
                "camera",
                NodeRole::Camera(CameraData::perspective(60.0, 1.0, 0.1, 100.0)),
            );
            scene.add_to_root(camera).unwrap();
            Self {
                scene,
                camera,
                geometries: GeometryRegistry::new(),
                materials: MaterialRegistry::new(),
                shaders: ShaderRegistry::new(),
                device: RecordingDevice::new(),
                renderer: Renderer::default(),
            }
        }
        
        fn shader(&mut self, name: &str) -> ShaderId {
            self.shaders.insert(
                ShaderProgram::new(name, "", "")
                    .with_matrix(MatrixSemantic::plain(MatrixBase::World), "u_world")
                    .with_matrix(MatrixSemantic::plain(MatrixBase::WorldViewProjection), "u_mvp"),
            )
        }
        
        fn quad(&mut self) -> GeometryId {
            let mut geometry = Geometry::new().with_name("quad");
            geometry
                .set_positions(vec![
                    -0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0,
                ])
                .unwrap();
            geometry.set_faces(vec![[0, 1, 2], [0, 2, 3]]).unwrap();
            self.geometries.insert(geometry)
        }
        
        fn mesh_at(&mut self, geometry: GeometryId, material: MaterialId, position: Vec3) -> NodeId {
            let id = self.scene.create(NodeRole::Mesh(MeshData::new(geometry, material)));
            self.scene.node_mut(id).unwrap().set_position(position);
            self.scene.add_to_root(id).unwrap();
            id
        }
        
        fn render(&mut self) -> RenderInfo {
            let mut assets = RenderAssets::new(&mut self.geometries, &self.materials, &self.shaders);
            self.renderer
                .render(&mut self.device, &mut self.scene, self.camera, &mut assets, None)
                .unwrap()
        }
        
        fn drawn_depths(&self) -> Vec<f32> {
            self.device
                .draws()
                .iter()
                .filter_map(|d| match d.uniforms.get("u_world") {
                    Some(UniformValue::Mat4(m)) => Some(m[14]),
                    _ => None,
                })
                .collect()
        }
    }
    
    #[test]
    fn test_transparent_drawn_back_to_front() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let first = fx.shader("first");
        let second = fx.shader("second");
        let glass_a = fx.materials.insert(Material::new("glass_a", second).with_transparent(true));
        let glass_b = fx.materials.insert(Material::new("glass_b", first).with_transparent(true));
        let near = fx.mesh_at(quad, glass_b, Vec3::new(0.0, 0.0, -2.0));
        let far = fx.mesh_at(quad, glass_a, Vec3::new(0.0, 0.0, -5.0));
        
        fx.render();
        assert_eq!(fx.drawn_depths(), vec![-5.0, -2.0]);
        
        fx.scene.node_mut(near).unwrap().mesh_mut().unwrap().material = Some(glass_a);
        fx.scene.node_mut(far).unwrap().mesh_mut().unwrap().material = Some(glass_b);
        fx.device.take_commands();
        fx.render();
        assert_eq!(fx.drawn_depths(), vec![-5.0, -2.0]);
    }
    
    #[test]
    fn test_large_mesh_is_drawn_in_two_chunks() {
        let mut fx = Fixture::new();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        let mut strip = Geometry::new();
        let positions = (0..70_000u32)
            .flat_map(|i| [i as f32 * 1e-4, (i % 2) as f32, 0.0])
            .collect();
        strip.set_positions(positions).unwrap();
        strip.set_faces((0..69_998u32).map(|i| [i, i + 1, i + 2]).collect()).unwrap();
        let geometry = fx.geometries.insert(strip);
        fx.mesh_at(geometry, material, Vec3::new(0.0, 0.0, -10.0));
        
        let info = fx.render();
        
        assert_eq!(info.draw_call_count, 2);
        assert_eq!(info.face_count, 69_998);
        let draws = fx.device.draws();
        assert_eq!(draws.len(), 2);
        assert!(draws.iter().all(|d| d.index_type == Some(IndexType::U16) && d.vertex_count <= 0xffff));
    }
    
    #[test]
    fn test_hidden_subtree_is_not_drawn() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        let group = fx.scene.create_named("group", NodeRole::Group);
        fx.scene.add_to_root(group).unwrap();
        let hidden = fx.scene.create(NodeRole::Mesh(MeshData::new(quad, material)));
        fx.scene.add(group, hidden).unwrap();
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -3.0));
        fx.scene.node_mut(group).unwrap().visible = false;
        
        let info = fx.render();
        
        assert_eq!(info.mesh_count, 1);
        assert_eq!(info.draw_call_count, 1);
    }
    
    #[test]
    fn test_frustum_culling() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        fx.mesh_at(quad, material, Vec3::new(1000.0, 0.0, -10.0));
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, 20.0));
        
        let mut slab = Geometry::new();
        slab.set_positions(vec![-1.0, -1.0, -1.0, 1.0, -1.0, 1.0, 0.0, 1.0, 0.0]).unwrap();
        slab.set_faces(vec![[0, 1, 2]]).unwrap();
        let slab = fx.geometries.insert(slab);
        fx.mesh_at(slab, material, Vec3::zeros());
        
        let info = fx.render();
        
        assert_eq!(info.culled_count, 2);
        assert_eq!(info.rendered_mesh_count, 1);
        assert_eq!(fx.device.draws().len(), 1);
    }
    
    #[test]
    fn test_transparent_queue_bypasses_culling_by_default() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let glass = fx.materials.insert(Material::new("glass", shader).with_transparent(true));
        fx.mesh_at(quad, glass, Vec3::new(1000.0, 0.0, -10.0));
        
        assert_eq!(fx.render().culled_count, 0);
        
        fx.renderer.config_mut().cull_transparent = true;
        assert_eq!(fx.render().culled_count, 1);
    }
    
    #[test]
    fn test_scene_bounds_follow_shadow_casters() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -4.0));
        let skipped = fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -50.0));
        fx.scene.node_mut(skipped).unwrap().mesh_mut().unwrap().cast_shadow = false;
        
        fx.render();
        
        let camera = fx.scene.node(fx.camera).unwrap().camera().unwrap();
        let bounds = camera.scene_bounds_last_frame;
        assert_relative_eq!(bounds.min, Vec3::new(-0.5, -0.5, -4.0), epsilon = EPSILON);
        assert_relative_eq!(bounds.max, Vec3::new(0.5, 0.5, -4.0), epsilon = EPSILON);
    }
    
    #[test]
    fn test_opaque_sort_groups_by_shader_and_is_stable() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let a = fx.shader("a");
        let b = fx.shader("b");
        let mat_a = fx.materials.insert(Material::new("a", a));
        let mat_b = fx.materials.insert(Material::new("b", b));
        for (i, material) in [mat_b, mat_a, mat_b, mat_a].into_iter().enumerate() {
            fx.mesh_at(quad, material, Vec3::new(i as f32 * 0.1, 0.0, -3.0));
        }
        
        fx.render();
        let first: Vec<NodeId> = fx.scene.queue().opaque().iter().map(|i| i.node).collect();
        let programs: Vec<Option<String>> = fx.device.draws().iter().map(|d| d.program.clone()).collect();
        let expected: Vec<Option<String>> = ["a", "a", "b", "b"].iter().map(|s| Some(s.to_string())).collect();
        assert_eq!(programs, expected);
        
        fx.render();
        let second: Vec<NodeId> = fx.scene.queue().opaque().iter().map(|i| i.node).collect();
        assert_eq!(first, second);
    }
    
    #[test]
    fn test_state_changes_are_diffed() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        for i in 0..3 {
            fx.mesh_at(quad, material, Vec3::new(i as f32, 0.0, -5.0));
        }
        
        let info = fx.render();
        
        assert_eq!(info.draw_call_count, 3);
        let device = &fx.device;
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::UseProgram { .. })), 1);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::DepthTest(_))), 1);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::FaceCulling(_))), 1);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::Blend(_))), 1);
        assert_eq!(device.count(|c| matches!(c, DeviceCommand::CreateBuffer { .. })), 2);
    }
    
    #[test]
    fn test_cull_state_changes_between_objects() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -5.0));
        let double_sided = fx.mesh_at(quad, material, Vec3::new(1.0, 0.0, -5.0));
        fx.scene.node_mut(double_sided).unwrap().mesh_mut().unwrap().culling = false;
        
        fx.render();
        
        let toggles: Vec<bool> = fx
            .device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::FaceCulling(on) => Some(*on),
                _ => None,
            })
            .collect();
        assert_eq!(toggles, vec![true, false]);
    }
    
    #[test]
    fn test_failed_shader_is_compiled_once() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let good = fx.shader("good");
        let broken = fx.shader("broken");
        fx.device.fail_shader("broken");
        let good_material = fx.materials.insert(Material::new("good", good));
        let broken_material = fx.materials.insert(Material::new("broken", broken));
        fx.mesh_at(quad, broken_material, Vec3::new(-1.0, 0.0, -5.0));
        fx.mesh_at(quad, broken_material, Vec3::new(1.0, 0.0, -5.0));
        fx.mesh_at(quad, good_material, Vec3::new(0.0, 0.0, -5.0));
        
        let first = fx.render();
        let second = fx.render();
        
        assert_eq!(first.failed_count, 2);
        assert_eq!(second.failed_count, 2);
        assert_eq!(second.rendered_mesh_count, 1);
        assert_eq!(fx.device.compile_attempts("broken"), 1);
        assert_eq!(fx.renderer.failed_shaders().collect::<Vec<_>>(), vec![broken]);
        
        fx.renderer.clear_shader_errors();
        fx.render();
        assert_eq!(fx.device.compile_attempts("broken"), 2);
    }
    
    #[test]
    fn test_program_rebound_per_light_group() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("lit");
        let material = fx.materials.insert(Material::new("lit", shader));
        let sun = fx.scene.create(NodeRole::Light(LightData::new(LightKind::Directional)));
        fx.scene.add_to_root(sun).unwrap();
        let lamp = fx.scene.create(NodeRole::Light(LightData::new(LightKind::point()).with_group(1)));
        fx.scene.add_to_root(lamp).unwrap();
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -5.0));
        let grouped = fx
            .scene
            .create(NodeRole::Mesh(MeshData::new(quad, material).with_light_group(1)));
        fx.scene.node_mut(grouped).unwrap().set_position(Vec3::new(1.0, 0.0, -5.0));
        fx.scene.add_to_root(grouped).unwrap();
        
        fx.render();
        
        let keys: Vec<String> = fx
            .device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::UseProgram { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], fx.scene.light_program_key(0));
        assert_eq!(keys[1], fx.scene.light_program_key(1));
        assert_ne!(keys[0], keys[1]);
    }
    
    #[test]
    fn test_missing_material_fails_only_that_object() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -5.0));
        fx.mesh_at(quad, MaterialId(99), Vec3::new(1.0, 0.0, -5.0));
        
        let info = fx.render();
        
        assert_eq!(info.failed_count, 1);
        assert_eq!(info.draw_call_count, 1);
    }
    
    #[test]
    fn test_empty_geometry_issues_no_draw() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let empty = fx.geometries.insert(Geometry::new().with_name("empty"));
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -5.0));
        fx.mesh_at(empty, material, Vec3::new(1.0, 0.0, -5.0));
        
        let info = fx.render();
        
        assert_eq!(info.mesh_count, 2);
        assert_eq!(info.rendered_mesh_count, 1);
        assert_eq!(info.draw_call_count, 1);
        assert_eq!(info.failed_count, 0);
        assert_eq!(fx.device.draws().len(), 1);
    }
    
    #[test]
    fn test_textures_bound_only_when_ready() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx
            .materials
            .insert(Material::new("textured", shader).with_texture("u_diffuse", TextureId(7)));
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -5.0));
        
        let info = fx.render();
        assert_eq!(info.draw_call_count, 1);
        assert_eq!(fx.device.count(|c| matches!(c, DeviceCommand::BindTexture { .. })), 0);
        
        fx.materials
            .get_mut(material)
            .unwrap()
            .set_texture_state("u_diffuse", TextureState::Ready);
        fx.device.take_commands();
        fx.render();
        assert_eq!(fx.device.count(|c| matches!(c, DeviceCommand::BindTexture { slot: 0, .. })), 1);
    }
    
    #[test]
    fn test_transparent_pass_enables_blending() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let solid = fx.materials.insert(Material::new("solid", shader));
        let glass = fx
            .materials
            .insert(Material::new("glass", shader).with_transparent(true).with_blend(BlendFunc::ADDITIVE));
        fx.mesh_at(quad, solid, Vec3::new(0.0, 0.0, -5.0));
        fx.mesh_at(quad, glass, Vec3::new(0.0, 0.0, -4.0));
        
        fx.render();
        
        let blends: Vec<Option<BlendFunc>> = fx
            .device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::Blend(b) => Some(*b),
                _ => None,
            })
            .collect();
        assert_eq!(blends, vec![None, Some(BlendFunc::ADDITIVE)]);
    }
    
    #[test]
    fn test_matrix_semantics() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shaders.insert(
            ShaderProgram::new("lit", "", "")
                .with_matrix(MatrixSemantic::plain(MatrixBase::WorldViewProjection), "u_mvp")
                .with_matrix(MatrixSemantic::inverse_transpose(MatrixBase::World), "u_normal")
                .with_matrix(MatrixSemantic::inverse(MatrixBase::View), "u_view_inverse")
                .with_common(CommonSemantic::Far, "u_far"),
        );
        let material = fx.materials.insert(Material::new("lit", shader));
        let node = fx.mesh_at(quad, material, Vec3::new(1.0, 2.0, -5.0));
        fx.scene.node_mut(node).unwrap().set_scale(Vec3::new(2.0, 2.0, 2.0));
        fx.scene.node_mut(fx.camera).unwrap().set_position(Vec3::new(0.0, 0.0, 3.0));
        
        fx.render();
        
        let world = fx.scene.world_transform(node).unwrap();
        let camera = fx.scene.node(fx.camera).unwrap().camera().unwrap();
        let mvp = camera.projection_matrix() * camera.view_matrix() * world;
        let normal = world.try_inverse().unwrap().transpose();
        let draws = fx.device.draws();
        let uniforms = &draws[0].uniforms;
        let as_matrix = |name: &str| match uniforms.get(name) {
            Some(UniformValue::Mat4(m)) => Mat4::from_column_slice(m),
            other => panic!("missing {name}: {other:?}"),
        };
        assert_relative_eq!(as_matrix("u_mvp"), mvp, epsilon = EPSILON);
        assert_relative_eq!(as_matrix("u_normal"), normal, epsilon = EPSILON);
        assert_relative_eq!(as_matrix("u_view_inverse").column(3)[2], 3.0, epsilon = EPSILON);
        assert_eq!(uniforms.get("u_far"), Some(&UniformValue::Float(100.0)));
    }
    
    #[test]
    fn test_target_viewport_and_scissor() {
        let mut fx = Fixture::new();
        fx.renderer.set_viewport(Some(Viewport {
            x: 10,
            y: 20,
            width: 100,
            height: 50,
        }));
        let mut assets = RenderAssets::new(&mut fx.geometries, &fx.materials, &fx.shaders);
        fx.renderer
            .render(&mut fx.device, &mut fx.scene, fx.camera, &mut assets, Some(FramebufferId(3)))
            .unwrap();
        
        let commands = fx.device.commands();
        assert_eq!(commands[0], DeviceCommand::BindFramebuffer(Some(FramebufferId(3))));
        assert!(matches!(commands[1], DeviceCommand::Viewport(Viewport { width: 100, .. })));
        assert!(matches!(commands[2], DeviceCommand::Scissor(_)));
        assert!(matches!(commands[3], DeviceCommand::Clear(flags, _) if flags == ClearFlags::COLOR | ClearFlags::DEPTH));
    }
    
    #[test]
    fn test_full_surface_has_no_scissor() {
        let mut fx = Fixture::new();
        fx.render();
        assert_eq!(fx.device.count(|c| matches!(c, DeviceCommand::Scissor(_))), 0);
    }
    
    #[test]
    fn test_non_camera_is_rejected() {
        let mut fx = Fixture::new();
        let group = fx.scene.create(NodeRole::Group);
        let mut assets = RenderAssets::new(&mut fx.geometries, &fx.materials, &fx.shaders);
        let result = fx.renderer.render(&mut fx.device, &mut fx.scene, group, &mut assets, None);
        assert!(matches!(result, Err(RenderError::Scene(SceneError::NotACamera(_)))));
        
        let mut empty = Scene::new();
        let result = fx.renderer.render_main(&mut fx.device, &mut empty, &mut assets, None);
        assert!(matches!(result, Err(RenderError::NoCamera)));
    }
    
    #[test]
    fn test_render_queue_draws_given_items() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        let a = fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -3.0));
        let b = fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -6.0));
        fx.render();
        fx.device.take_commands();
        
        let items = [RenderItem::new(b), RenderItem::new(a)];
        let mut assets = RenderAssets::new(&mut fx.geometries, &fx.materials, &fx.shaders);
        let info = fx
            .renderer
            .render_queue(&mut fx.device, &fx.scene, fx.camera, &items, &mut assets, false)
            .unwrap();
        
        assert_eq!(info.draw_call_count, 2);
        assert_eq!(fx.drawn_depths(), vec![-6.0, -3.0]);
    }
    
    #[test]
    fn test_dispose_node_releases_buffers() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        let node = fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -3.0));
        fx.render();
        assert_eq!(fx.device.live_buffers(), 2);
        
        let removed = fx
            .renderer
            .dispose_node(&mut fx.device, &mut fx.scene, node, &mut fx.geometries, true)
            .unwrap();
        
        assert_eq!(removed, vec![node]);
        assert_eq!(fx.device.live_buffers(), 0);
        assert!(fx.render().mesh_count == 0);
    }
    
    #[test]
    fn test_dispose_scene_keeps_root() {
        let mut fx = Fixture::new();
        let quad = fx.quad();
        let shader = fx.shader("flat");
        let material = fx.materials.insert(Material::new("flat", shader));
        fx.mesh_at(quad, material, Vec3::new(0.0, 0.0, -3.0));
        fx.render();
        
        fx.renderer
            .dispose_scene(&mut fx.device, &mut fx.scene, &mut fx.geometries)
            .unwrap();
        
        assert!(fx.scene.node(fx.scene.root()).unwrap().children().is_empty());
        assert!(fx.scene.cameras().is_empty());
        assert_eq!(fx.device.live_buffers(), 0);
    }
    
    #[test]
    fn test_screen_to_ndc() {
        let renderer = Renderer::new(RendererConfig::default().with_size(200, 100), GeometryConfig::default());
        assert_relative_eq!(renderer.screen_to_ndc(100.0, 50.0), Vec2::zeros(), epsilon = EPSILON);
        assert_relative_eq!(renderer.screen_to_ndc(0.0, 0.0), Vec2::new(-1.0, 1.0), epsilon = EPSILON);
        assert_relative_eq!(renderer.screen_to_ndc(200.0, 100.0), Vec2::new(1.0, -1.0), epsilon = EPSILON);
    }
    
    #[test]
    fn test_screen_to_ndc_after_resize() {
        let mut renderer = Renderer::default();
        renderer.resize(400, 300);
        assert_eq!(renderer.viewport().width, 400);
        assert_relative_eq!(renderer.screen_to_ndc(400.0, 0.0), Vec2::new(1.0, 1.0), epsilon = EPSILON);
    }
    
    #[test]
    fn test_near_plane_straddler_is_kept() {
        let frustum_projection = Mat4::new_perspective(1.0, 1.0, 0.1, 100.0);
        let frustum = Frustum::from_projection(&frustum_projection);
        let straddler = BoundingBox::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let behind = BoundingBox::new(Vec3::new(-1.0, -1.0, 1.0), Vec3::new(1.0, 1.0, 2.0));
        let mut bounds = BoundingBox::empty();
        
        let identity = Mat4::identity();
        assert!(!is_frustum_culled(&straddler, &identity, &frustum, &frustum_projection, true, true, &mut bounds));
        assert!(is_frustum_culled(&behind, &identity, &frustum, &frustum_projection, true, true, &mut bounds));
        // Both boxes were recorded before the fine test.
        assert_relative_eq!(bounds.max.z, 2.0, epsilon = EPSILON);
    }
}
