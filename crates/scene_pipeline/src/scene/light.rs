//! Lights and their packed uniform templates

use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Light categories, one per shader light array
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LightType {
    /// Directional light (like sunlight)
    Directional,
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
    /// Constant ambient term
    Ambient,
}

impl LightType {
    /// Every light type, in declaration order
    pub const ALL: [Self; 4] = [Self::Directional, Self::Point, Self::Spot, Self::Ambient];
    
    /// Name used in shader program keys, e.g. `DIRECTIONAL_LIGHT`
    pub fn key_name(self) -> &'static str {
        match self {
            Self::Directional => "DIRECTIONAL_LIGHT",
            Self::Point => "POINT_LIGHT",
            Self::Spot => "SPOT_LIGHT",
            Self::Ambient => "AMBIENT_LIGHT",
        }
    }
}

/// Type-specific light parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Directional light shining down the node's `-Z` axis
    Directional,
    /// Omnidirectional light at the node position
    Point {
        /// Attenuation range
        range: f32,
    },
    /// Cone light at the node position shining down `-Z`
    Spot {
        /// Attenuation range
        range: f32,
        /// Inner cone angle in degrees
        umbra_angle: f32,
        /// Outer cone angle in degrees
        penumbra_angle: f32,
        /// Falloff exponent between the cones
        falloff_factor: f32,
    },
    /// Constant ambient light
    Ambient,
}

impl LightKind {
    /// Point light with the default range
    pub fn point() -> Self {
        Self::Point { range: 100.0 }
    }
    
    /// Spot light with the default cone
    pub fn spot() -> Self {
        Self::Spot {
            range: 20.0,
            umbra_angle: 30.0,
            penumbra_angle: 45.0,
            falloff_factor: 2.0,
        }
    }
    
    /// Category of this light
    pub fn light_type(&self) -> LightType {
        match self {
            Self::Directional => LightType::Directional,
            Self::Point { .. } => LightType::Point,
            Self::Spot { .. } => LightType::Spot,
            Self::Ambient => LightType::Ambient,
        }
    }
}

/// Element layout of a packed light uniform array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightUniformKind {
    /// One float per light
    Float,
    /// Three floats per light
    Vec3,
}

/// Light state carried by a light node
#[derive(Debug, Clone, PartialEq)]
pub struct LightData {
    /// Type-specific parameters
    pub kind: LightKind,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier applied to the color
    pub intensity: f32,
    /// Shaders only receive lights of their own group
    pub group: u32,
    /// Shadow casters are packed ahead of other lights
    pub cast_shadow: bool,
}

impl LightData {
    /// Create a white light of the given kind
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            group: 0,
            cast_shadow: true,
        }
    }
    
    /// Set the color
    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }
    
    /// Set the intensity
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }
    
    /// Set the light group
    pub fn with_group(mut self, group: u32) -> Self {
        self.group = group;
        self
    }
    
    /// Enable or disable shadow casting
    pub fn with_cast_shadow(mut self, cast_shadow: bool) -> Self {
        self.cast_shadow = cast_shadow;
        self
    }
    
    /// Category of this light
    pub fn light_type(&self) -> LightType {
        self.kind.light_type()
    }
    
    /// Emit this light's uniform values given its world transform
    ///
    /// Each call of `emit` receives the uniform symbol, its element layout and
    /// the values to append to that symbol's array.
    pub fn write_uniforms(&self, world: &Mat4, mut emit: impl FnMut(&'static str, LightUniformKind, &[f32])) {
        let color = self.color * self.intensity;
        let position = world.translation_part();
        let direction = {
            let z = Vec3::new(world[(0, 2)], world[(1, 2)], world[(2, 2)]);
            -z.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z)
        };
        
        match self.kind {
            LightKind::Directional => {
                emit("directionalLightDirection", LightUniformKind::Vec3, direction.as_slice());
                emit("directionalLightColor", LightUniformKind::Vec3, color.as_slice());
            }
            LightKind::Point { range } => {
                emit("pointLightPosition", LightUniformKind::Vec3, position.as_slice());
                emit("pointLightRange", LightUniformKind::Float, &[range]);
                emit("pointLightColor", LightUniformKind::Vec3, color.as_slice());
            }
            LightKind::Spot { range, umbra_angle, penumbra_angle, falloff_factor } => {
                emit("spotLightPosition", LightUniformKind::Vec3, position.as_slice());
                emit("spotLightRange", LightUniformKind::Float, &[range]);
                emit("spotLightUmbraAngleCosine", LightUniformKind::Float, &[utils::deg_to_rad(umbra_angle).cos()]);
                emit("spotLightPenumbraAngleCosine", LightUniformKind::Float, &[utils::deg_to_rad(penumbra_angle).cos()]);
                emit("spotLightFalloffFactor", LightUniformKind::Float, &[falloff_factor]);
                emit("spotLightDirection", LightUniformKind::Vec3, direction.as_slice());
                emit("spotLightColor", LightUniformKind::Vec3, color.as_slice());
            }
            LightKind::Ambient => {
                emit("ambientLightColor", LightUniformKind::Vec3, color.as_slice());
            }
        }
    }
}
