//! # Pipeline Configuration
//!
//! Serializable settings for the renderer, the scene update step and
//! geometry chunking. All structs provide defaults matching a 16-bit index
//! buffer and a full-surface viewport, builder-style `with_*` methods and a
//! `validate` check.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::geometry::UsageHint;
use crate::render::device::BlendFunc;

/// Largest vertex count addressable by a 16-bit unsigned index buffer
pub const DEFAULT_INDEX_LIMIT: u32 = 0xffff;

/// Most vertices one chunk may hold while indices stay 16-bit
pub const MAX_INDEX_LIMIT: u32 = 1 << 16;

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Surface width in physical pixels
    pub width: u32,
    /// Surface height in physical pixels
    pub height: u32,
    /// Ratio between physical and logical pixels
    pub device_pixel_ratio: f32,
    /// RGBA clear color
    pub clear_color: [f32; 4],
    /// Clear the color buffer at frame start
    pub clear_color_buffer: bool,
    /// Clear the depth buffer at frame start
    pub clear_depth_buffer: bool,
    /// Clear the stencil buffer at frame start
    pub clear_stencil_buffer: bool,
    /// Global frustum-culling switch (objects can still opt out individually)
    pub frustum_culling: bool,
    /// Also frustum-cull the transparent queue
    pub cull_transparent: bool,
    /// Blend function for transparent materials that do not set their own
    pub transparent_blend: BlendFunc,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            device_pixel_ratio: 1.0,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_color_buffer: true,
            clear_depth_buffer: true,
            clear_stencil_buffer: false,
            frustum_culling: true,
            cull_transparent: false,
            transparent_blend: BlendFunc::ALPHA,
        }
    }
}

impl RendererConfig {
    /// Set the surface size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
    
    /// Set the clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }
    
    /// Enable or disable frustum culling globally
    pub fn with_frustum_culling(mut self, enabled: bool) -> Self {
        self.frustum_culling = enabled;
        self
    }
    
    /// Enable or disable culling of the transparent queue
    pub fn with_cull_transparent(mut self, enabled: bool) -> Self {
        self.cull_transparent = enabled;
        self
    }
    
    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("Surface size must be non-zero, got {}x{}", self.width, self.height));
        }
        if !(self.device_pixel_ratio > 0.0) {
            return Err(format!("Device pixel ratio must be positive, got {}", self.device_pixel_ratio));
        }
        Ok(())
    }
}

/// Scene update settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Update transforms and queues automatically when rendered
    pub auto_update: bool,
    /// Rebuild light counts and uniform arrays during update
    pub update_lights: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            auto_update: true,
            update_lights: true,
        }
    }
}

impl SceneConfig {
    /// Enable or disable automatic scene updates
    pub fn with_auto_update(mut self, enabled: bool) -> Self {
        self.auto_update = enabled;
        self
    }
    
    /// Enable or disable light packing
    pub fn with_update_lights(mut self, enabled: bool) -> Self {
        self.update_lights = enabled;
        self
    }
}

/// Geometry chunking settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Maximum vertices per chunk (the index width limit)
    pub index_limit: u32,
    /// Use 32-bit index buffers instead of chunking when the device supports them
    pub allow_u32_indices: bool,
    /// Usage hint given to newly created geometries
    pub default_hint: UsageHint,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            index_limit: DEFAULT_INDEX_LIMIT,
            allow_u32_indices: false,
            default_hint: UsageHint::Static,
        }
    }
}

impl GeometryConfig {
    /// Set the per-chunk vertex limit
    pub fn with_index_limit(mut self, limit: u32) -> Self {
        self.index_limit = limit;
        self
    }
    
    /// Allow 32-bit index buffers
    pub fn with_u32_indices(mut self, allowed: bool) -> Self {
        self.allow_u32_indices = allowed;
        self
    }
    
    /// Validate the settings
    pub fn validate(&self) -> Result<(), String> {
        // A chunk must hold at least one whole triangle.
        if self.index_limit < 3 {
            return Err(format!("Index limit must be at least 3, got {}", self.index_limit));
        }
        if self.index_limit > MAX_INDEX_LIMIT {
            return Err(format!(
                "Index limit must be at most {}, got {}",
                MAX_INDEX_LIMIT, self.index_limit
            ));
        }
        Ok(())
    }
}

/// Top-level configuration aggregating every subsystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Scene settings
    pub scene: SceneConfig,
    /// Geometry settings
    pub geometry: GeometryConfig,
}

impl Config for PipelineConfig {}

impl PipelineConfig {
    /// Load and validate a configuration file
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }
    
    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.renderer.validate()?;
        self.geometry.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("scene_pipeline_{}_{}", std::process::id(), name))
            .to_string_lossy()
            .into_owned()
    }
    
    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.geometry.index_limit, 65535);
        assert!(!config.renderer.cull_transparent);
    }
    
    #[test]
    fn test_toml_round_trip() {
        let path = temp_path("config.toml");
        let config = PipelineConfig {
            renderer: RendererConfig::default().with_size(1024, 768).with_clear_color([0.1, 0.2, 0.3, 1.0]),
            scene: SceneConfig::default().with_update_lights(false),
            geometry: GeometryConfig::default().with_index_limit(300),
        };
        
        config.save_to_file(&path).unwrap();
        let loaded = PipelineConfig::load_validated(&path).unwrap();
        std::fs::remove_file(&path).ok();
        
        assert_eq!(loaded, config);
    }
    
    #[test]
    fn test_ron_round_trip() {
        let path = temp_path("config.ron");
        let config = PipelineConfig {
            geometry: GeometryConfig::default().with_u32_indices(true),
            ..Default::default()
        };
        
        config.save_to_file(&path).unwrap();
        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        
        assert_eq!(loaded, config);
    }
    
    #[test]
    fn test_unsupported_extension() {
        let result = PipelineConfig::default().save_to_file("config.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
    
    #[test]
    fn test_invalid_values_rejected() {
        let path = temp_path("invalid.toml");
        std::fs::write(&path, "[geometry]\nindex_limit = 2\n").unwrap();
        let result = PipelineConfig::load_validated(&path);
        std::fs::remove_file(&path).ok();
        
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
    
    #[test]
    fn test_index_limit_must_fit_16_bit_indices() {
        assert!(GeometryConfig::default().with_index_limit(MAX_INDEX_LIMIT).validate().is_ok());
        assert!(GeometryConfig::default().with_index_limit(100_000).validate().is_err());
        
        let config = PipelineConfig {
            geometry: GeometryConfig::default().with_index_limit(100_000),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
