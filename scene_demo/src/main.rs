//! Headless Scene Demo
//!
//! Builds a small scene and renders a few frames through the recording
//! device, logging the statistics of every frame:
//! - A field of randomly placed opaque and transparent cubes
//! - A terrain grid too large for 16-bit indices, drawn in chunks
//! - Directional, point and ambient lights
//! - A camera orbiting the origin
//!
//! Pass a `.toml` or `.ron` pipeline configuration as the first argument to
//! override the defaults.

use rand::prelude::*;
use scene_pipeline::prelude::*;
use scene_pipeline::render::{
    CommonSemantic, DeviceCommand, MatrixBase, MatrixSemantic, TextureId, TextureState, UniformValue,
};

// Scene layout
const CUBE_COUNT: usize = 40;
const FIELD_SIZE: f32 = 20.0;
const GRID_RESOLUTION: u32 = 300;
const GRID_SIZE: f32 = 60.0;

// Camera orbit
const ORBIT_RADIUS: f32 = 30.0;
const ORBIT_HEIGHT: f32 = 12.0;
const FRAME_COUNT: usize = 6;

/// Demo failures
#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("scene: {0}")]
    Scene(#[from] SceneError),

    #[error("geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("render: {0}")]
    Render(#[from] RenderError),
}

struct Assets {
    geometries: GeometryRegistry,
    materials: MaterialRegistry,
    shaders: ShaderRegistry,
}

struct SceneDemo {
    config: PipelineConfig,
    scene: Scene,
    camera: NodeId,
    assets: Assets,
    device: RecordingDevice,
    renderer: Renderer,
    textured: MaterialId,
}

impl SceneDemo {
    fn new(config: PipelineConfig) -> Result<Self, DemoError> {
        let renderer = Renderer::from_config(&config)?;
        let mut scene = Scene::with_config(config.scene.clone());
        let mut assets = Assets {
            geometries: GeometryRegistry::new(),
            materials: MaterialRegistry::new(),
            shaders: ShaderRegistry::new(),
        };

        let lit = assets.shaders.insert(
            ShaderProgram::new("lit", "lit.vert", "lit.frag")
                .with_matrix(MatrixSemantic::plain(MatrixBase::WorldViewProjection), "u_mvp")
                .with_matrix(MatrixSemantic::inverse_transpose(MatrixBase::World), "u_normal_matrix")
                .with_matrix(MatrixSemantic::inverse(MatrixBase::View), "u_camera_world")
                .with_common(CommonSemantic::Time, "u_time"),
        );
        let unlit = assets.shaders.insert(
            ShaderProgram::new("unlit", "unlit.vert", "unlit.frag")
                .with_matrix(MatrixSemantic::plain(MatrixBase::WorldViewProjection), "u_mvp"),
        );

        let stone = assets
            .materials
            .insert(Material::new("stone", lit).with_uniform("u_color", UniformValue::Vec3([0.6, 0.6, 0.55])));
        let glass = assets.materials.insert(
            Material::new("glass", unlit)
                .with_transparent(true)
                .with_depth(true, false)
                .with_uniform("u_color", UniformValue::Vec4([0.3, 0.6, 1.0, 0.4])),
        );
        let textured = assets
            .materials
            .insert(Material::new("ground", lit).with_texture("u_diffuse", TextureId(1)));

        let cube = assets.geometries.insert(cube_geometry()?);
        let grid = assets.geometries.insert(grid_geometry(GRID_RESOLUTION, GRID_SIZE)?);

        let camera = scene.create_named("camera", NodeRole::Camera(CameraData::perspective(
            60.0,
            config.renderer.width as f32 / config.renderer.height as f32,
            0.1,
            500.0,
        )));
        scene.add_to_root(camera)?;

        let sun = scene.create_named("sun", NodeRole::Light(LightData::new(LightKind::Directional).with_intensity(0.8)));
        scene.add_to_root(sun)?;
        scene.tree_mut().look_at(sun, Vec3::new(-1.0, -2.0, -1.0), Vec3::y())?;
        let ambient = scene.create_named("ambient", NodeRole::Light(
            LightData::new(LightKind::Ambient).with_intensity(0.2).with_cast_shadow(false),
        ));
        scene.add_to_root(ambient)?;

        let ground = scene.create_named("ground", NodeRole::Mesh(MeshData::new(grid, textured)));
        scene.add_to_root(ground)?;

        let field = scene.create_named("field", NodeRole::Group);
        scene.add_to_root(field)?;
        let mut rng = thread_rng();
        for i in 0..CUBE_COUNT {
            let material = if rng.gen_bool(0.3) { glass } else { stone };
            let node = scene.create_named(format!("cube_{i}"), NodeRole::Mesh(MeshData::new(cube, material)));
            let position = Vec3::new(
                rng.gen_range(-FIELD_SIZE..FIELD_SIZE),
                rng.gen_range(0.5..4.0),
                rng.gen_range(-FIELD_SIZE..FIELD_SIZE),
            );
            scene.node_mut(node)?.set_position(position);
            scene.add(field, node)?;
            if i % 8 == 0 {
                let lamp = scene.create_named(format!("lamp_{i}"), NodeRole::Light(LightData::new(LightKind::point())));
                scene.node_mut(lamp)?.set_position(Vec3::new(0.0, 1.5, 0.0));
                scene.add(node, lamp)?;
            }
        }
        log::info!(
            "Scene ready: {} geometries, {} materials, {} cameras",
            assets.geometries.len(),
            assets.materials.len(),
            scene.cameras().len()
        );

        let device = RecordingDevice::new().with_u32_indices(config.geometry.allow_u32_indices);
        Ok(Self {
            config,
            scene,
            camera,
            assets,
            device,
            renderer,
            textured,
        })
    }

    fn run(&mut self) -> Result<(), DemoError> {
        for frame in 0..FRAME_COUNT {
            let angle = frame as f32 / FRAME_COUNT as f32 * std::f32::consts::TAU;
            let eye = Vec3::new(angle.cos() * ORBIT_RADIUS, ORBIT_HEIGHT, angle.sin() * ORBIT_RADIUS);
            self.scene.node_mut(self.camera)?.set_position(eye);
            self.scene.tree_mut().look_at(self.camera, Vec3::zeros(), Vec3::y())?;

            // The ground texture finishes loading half way through.
            if frame == FRAME_COUNT / 2 {
                if let Some(material) = self.assets.materials.get_mut(self.textured) {
                    material.set_texture_state("u_diffuse", TextureState::Ready);
                }
            }

            let mut assets = RenderAssets::new(
                &mut self.assets.geometries,
                &self.assets.materials,
                &self.assets.shaders,
            );
            let info = self.renderer.render(&mut self.device, &mut self.scene, self.camera, &mut assets, None)?;
            let commands = self.device.take_commands();
            let uploads = commands
                .iter()
                .filter(|c| matches!(c, DeviceCommand::CreateBuffer { .. } | DeviceCommand::UpdateBuffer { .. }))
                .count();

            log::info!(
                "Frame {}: {} draw calls, {} faces, {} vertices, {}/{} meshes ({} culled, {} failed), {} uploads, {} commands",
                frame,
                info.draw_call_count,
                info.face_count,
                info.vertex_count,
                info.rendered_mesh_count,
                info.mesh_count,
                info.culled_count,
                info.failed_count,
                uploads,
                commands.len()
            );

            if let Some(camera) = self.scene.node_mut(self.camera)?.camera_mut() {
                if camera.fit_clip_planes(1.0) {
                    log::debug!("Clip planes now {:.2}..{:.2}", camera.near(), camera.far());
                }
            }
        }
        log::info!(
            "Light program key: {:?}",
            self.scene.light_program_key(0).replace('\n', ", ")
        );
        log::info!(
            "Index limit {}, 32-bit indices {}",
            self.config.geometry.index_limit,
            self.config.geometry.allow_u32_indices
        );

        self.renderer
            .dispose_scene(&mut self.device, &mut self.scene, &mut self.assets.geometries)?;
        log::info!("Disposed scene, {} buffers left", self.device.live_buffers());
        Ok(())
    }
}

fn cube_geometry() -> Result<Geometry, GeometryError> {
    let mut geometry = Geometry::new().with_name("cube");
    let corners: Vec<f32> = (0..8)
        .flat_map(|i| {
            let bit = |b: u32| if i & (1 << b) == 0 { -0.5 } else { 0.5 };
            [bit(0), bit(1), bit(2)]
        })
        .collect();
    geometry.set_positions(corners)?;
    geometry.set_faces(vec![
        [0, 2, 3], [0, 3, 1], // -z
        [4, 5, 7], [4, 7, 6], // +z
        [0, 1, 5], [0, 5, 4], // -y
        [2, 6, 7], [2, 7, 3], // +y
        [0, 4, 6], [0, 6, 2], // -x
        [1, 3, 7], [1, 7, 5], // +x
    ])?;
    geometry.generate_face_normals()?;
    geometry.update_bounding_box();
    Ok(geometry)
}

fn grid_geometry(resolution: u32, size: f32) -> Result<Geometry, GeometryError> {
    let mut geometry = Geometry::new().with_name("terrain");
    let step = size / (resolution - 1) as f32;
    let mut positions = Vec::with_capacity((resolution * resolution * 3) as usize);
    let mut uvs = Vec::with_capacity((resolution * resolution * 2) as usize);
    for row in 0..resolution {
        for col in 0..resolution {
            let (x, z) = (col as f32 * step - size / 2.0, row as f32 * step - size / 2.0);
            positions.extend_from_slice(&[x, (x * 0.2).sin() * (z * 0.2).cos(), z]);
            uvs.extend_from_slice(&[col as f32 / (resolution - 1) as f32, row as f32 / (resolution - 1) as f32]);
        }
    }
    geometry.set_positions(positions)?;
    geometry.set_attribute_values("texcoord0", uvs)?;

    let mut faces = Vec::with_capacity(((resolution - 1) * (resolution - 1) * 2) as usize);
    for row in 0..resolution - 1 {
        for col in 0..resolution - 1 {
            let i = row * resolution + col;
            faces.push([i, i + resolution, i + 1]);
            faces.push([i + 1, i + resolution, i + resolution + 1]);
        }
    }
    geometry.set_faces(faces)?;
    geometry.generate_vertex_normals()?;
    geometry.generate_tangents()?;
    geometry.update_bounding_box();
    Ok(geometry)
}

fn load_config() -> Result<PipelineConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            Ok(PipelineConfig::load_validated(&path)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting headless scene demo");
    let config = load_config()?;
    let mut demo = SceneDemo::new(config)?;

    match demo.run() {
        Ok(()) => {
            log::info!("Scene demo finished successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Scene demo failed: {:?}", e);
            Err(e.into())
        }
    }
}
