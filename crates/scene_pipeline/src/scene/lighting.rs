//! Light counting and uniform packing per light group

use std::collections::BTreeMap;

use super::light::{LightData, LightType, LightUniformKind};
use crate::foundation::math::Mat4;
use crate::render::device::UniformValue;
use crate::render::shader::ProgramVariant;

/// Uniform arrays of every light in a group, one array per symbol
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightUniforms {
    arrays: BTreeMap<&'static str, (LightUniformKind, Vec<f32>)>,
}

impl LightUniforms {
    fn reset(&mut self) {
        for (_, values) in self.arrays.values_mut() {
            values.clear();
        }
    }
    
    fn append(&mut self, symbol: &'static str, kind: LightUniformKind, values: &[f32]) {
        self.arrays
            .entry(symbol)
            .or_insert_with(|| (kind, Vec::new()))
            .1
            .extend_from_slice(values);
    }
    
    /// Packed values of one symbol
    pub fn get(&self, symbol: &str) -> Option<&[f32]> {
        self.arrays
            .get(symbol)
            .map(|(_, values)| values.as_slice())
            .filter(|values| !values.is_empty())
    }
    
    /// Non-empty arrays as uniform values, ordered by symbol
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, UniformValue)> + '_ {
        self.arrays
            .iter()
            .filter(|(_, (_, values))| !values.is_empty())
            .map(|(&symbol, (kind, values))| {
                let value = match kind {
                    LightUniformKind::Float => UniformValue::FloatArray(values.clone()),
                    LightUniformKind::Vec3 => UniformValue::Vec3Array(values.clone()),
                };
                (symbol, value)
            })
    }
}

/// Light state shared by shaders of one light group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightGroup {
    counts: [usize; 4],
    previous: [usize; 4],
    program_key: String,
    defines: Vec<(String, usize)>,
    uniforms: LightUniforms,
}

impl LightGroup {
    /// Number of lights of one type
    pub fn count(&self, light_type: LightType) -> usize {
        self.counts[slot(light_type)]
    }
    
    /// Total number of lights
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
    
    /// Whether any per-type count differs from the previous update
    pub fn is_light_number_changed(&self) -> bool {
        self.counts != self.previous
    }
    
    /// Deterministic key of the light configuration, one `"<TYPE>_LIGHT <count>"` line per present type
    pub fn program_key(&self) -> &str {
        &self.program_key
    }
    
    /// `<TYPE>_LIGHT_COUNT` defines of present types
    pub fn defines(&self) -> &[(String, usize)] {
        &self.defines
    }
    
    /// Program variant for this light configuration
    pub fn variant(&self) -> ProgramVariant<'_> {
        ProgramVariant {
            key: &self.program_key,
            defines: &self.defines,
        }
    }
    
    /// Packed uniform arrays
    pub fn uniforms(&self) -> &LightUniforms {
        &self.uniforms
    }
    
    fn begin(&mut self) {
        self.previous = self.counts;
        self.counts = [0; 4];
        self.uniforms.reset();
    }
    
    fn add(&mut self, light: &LightData, world: &Mat4) {
        self.counts[slot(light.light_type())] += 1;
        let uniforms = &mut self.uniforms;
        light.write_uniforms(world, |symbol, kind, values| uniforms.append(symbol, kind, values));
    }
    
    fn finish(&mut self) {
        let mut lines: Vec<String> = LightType::ALL
            .iter()
            .filter(|&&t| self.count(t) > 0)
            .map(|&t| format!("{} {}", t.key_name(), self.count(t)))
            .collect();
        lines.sort();
        self.program_key = lines.join("\n");
        self.defines = LightType::ALL
            .iter()
            .filter(|&&t| self.count(t) > 0)
            .map(|&t| (format!("{}_COUNT", t.key_name()), self.count(t)))
            .collect();
    }
}

fn slot(light_type: LightType) -> usize {
    match light_type {
        LightType::Directional => 0,
        LightType::Point => 1,
        LightType::Spot => 2,
        LightType::Ambient => 3,
    }
}

/// Rebuild every group from `lights`, given in packing order
///
/// A group that lost its last light reports the change for one update and
/// is dropped on the next.
pub(crate) fn pack_lights(groups: &mut BTreeMap<u32, LightGroup>, lights: &[(&LightData, Mat4)]) {
    for group in groups.values_mut() {
        group.begin();
    }
    for (light, world) in lights {
        let group = groups.entry(light.group).or_insert_with(|| {
            let mut group = LightGroup::default();
            group.begin();
            group
        });
        group.add(light, world);
    }
    for (id, group) in groups.iter_mut() {
        group.finish();
        if group.is_light_number_changed() {
            log::debug!("Light group {} changed to [{}]", id, group.program_key.replace('\n', ", "));
        }
    }
    groups.retain(|_, group| group.total() > 0 || group.previous.iter().any(|&count| count > 0));
}
