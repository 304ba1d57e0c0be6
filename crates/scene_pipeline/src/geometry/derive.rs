//! Vertex data derived from positions, normals and UVs

use super::data::{to_u32, Geometry};
use super::{AttributeSemantic, AttributeType, GeometryError};
use crate::foundation::bounds::BoundingBox;
use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};

impl Geometry {
    fn vec3_at(&self, name: &str, index: u32) -> Vec3 {
        self.attribute(name)
            .and_then(|a| a.get(index as usize))
            .map_or_else(Vec3::zeros, |v| Vec3::new(v[0], v.get(1).copied().unwrap_or(0.0), v.get(2).copied().unwrap_or(0.0)))
    }
    
    fn vec2_at(&self, name: &str, index: u32) -> Vec2 {
        self.attribute(name)
            .and_then(|a| a.get(index as usize))
            .map_or_else(Vec2::zeros, |v| Vec2::new(v[0], v.get(1).copied().unwrap_or(0.0)))
    }
    
    fn require(&self, name: &str) -> Result<(), GeometryError> {
        match self.attribute(name) {
            Some(a) if !a.values().is_empty() => Ok(()),
            _ => Err(GeometryError::MissingAttribute(name.to_string())),
        }
    }
    
    /// Smooth per-vertex normals from area-weighted face normals
    pub fn generate_vertex_normals(&mut self) -> Result<(), GeometryError> {
        self.require("position")?;
        self.check_faces()?;
        let mut accumulated = vec![Vec3::zeros(); self.vertex_count()];
        for face in self.triangles() {
            let [a, b, c] = face.map(|i| self.vec3_at("position", i));
            let normal = (b - a).cross(&(c - a));
            for &i in &face {
                accumulated[i as usize] += normal;
            }
        }
        let values = accumulated
            .iter()
            .flat_map(|n| {
                let n = n.try_normalize(f32::EPSILON).unwrap_or(*n);
                [n.x, n.y, n.z]
            })
            .collect();
        self.set_attribute_values("normal", values)
    }
    
    /// Flat normals; vertices are made unique first
    pub fn generate_face_normals(&mut self) -> Result<(), GeometryError> {
        self.require("position")?;
        self.check_faces()?;
        if !self.is_unique_vertex() {
            self.generate_unique_vertex()?;
        }
        let mut values = vec![0.0; self.vertex_count() * 3];
        for face in self.triangles() {
            let [a, b, c] = face.map(|i| self.vec3_at("position", i));
            let n = (b - a).cross(&(c - a));
            let n = n.try_normalize(f32::EPSILON).unwrap_or(n);
            for &i in &face {
                values[i as usize * 3..i as usize * 3 + 3].copy_from_slice(n.as_slice());
            }
        }
        self.set_attribute_values("normal", values)
    }
    
    /// Per-vertex tangents with handedness in `w`, from positions, normals and the first UV set
    pub fn generate_tangents(&mut self) -> Result<(), GeometryError> {
        self.require("position")?;
        self.check_faces()?;
        self.require("normal")?;
        self.require("texcoord0")?;
        let vertex_count = self.vertex_count();
        let mut tan1 = vec![Vec3::zeros(); vertex_count];
        let mut tan2 = vec![Vec3::zeros(); vertex_count];
        
        for face in self.triangles() {
            let [p1, p2, p3] = face.map(|i| self.vec3_at("position", i));
            let [w1, w2, w3] = face.map(|i| self.vec2_at("texcoord0", i));
            let (e1, e2) = (p2 - p1, p3 - p1);
            let (s1, s2) = (w2.x - w1.x, w3.x - w1.x);
            let (t1, t2) = (w2.y - w1.y, w3.y - w1.y);
            let det = s1 * t2 - s2 * t1;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let sdir = (e1 * t2 - e2 * t1) * r;
            let tdir = (e2 * s1 - e1 * s2) * r;
            for &i in &face {
                tan1[i as usize] += sdir;
                tan2[i as usize] += tdir;
            }
        }
        
        let mut values = Vec::with_capacity(vertex_count * 4);
        for i in 0..vertex_count {
            let n = self.vec3_at("normal", to_u32(i));
            let t = tan1[i];
            let tangent = (t - n * n.dot(&t)).try_normalize(f32::EPSILON).unwrap_or_else(Vec3::zeros);
            let w = if n.cross(&t).dot(&tan2[i]) < 0.0 { -1.0 } else { 1.0 };
            values.extend_from_slice(&[tangent.x, tangent.y, tangent.z, w]);
        }
        self.set_attribute_values("tangent", values)
    }
    
    /// True when no vertex is shared between triangles
    pub fn is_unique_vertex(&self) -> bool {
        !self.use_face || self.vertex_count() == self.faces.len() * 3
    }
    
    /// Give every triangle corner its own vertex, duplicating attribute data
    pub fn generate_unique_vertex(&mut self) -> Result<(), GeometryError> {
        self.require("position")?;
        self.check_faces()?;
        let corners: Vec<u32> = self.triangles().into_iter().flatten().collect();
        for attribute in &mut self.attributes {
            if attribute.values().is_empty() {
                continue;
            }
            let size = attribute.size();
            let mut values = Vec::with_capacity(corners.len() * size);
            for &corner in &corners {
                match attribute.get(corner as usize) {
                    Some(v) => values.extend_from_slice(v),
                    None => values.extend(std::iter::repeat(0.0).take(size)),
                }
            }
            attribute.set_values(values);
        }
        let faces = (0..corners.len() / 3)
            .map(|f| {
                let base = to_u32(f * 3);
                [base, base + 1, base + 2]
            })
            .collect();
        self.set_faces(faces)
    }
    
    /// Barycentric coordinates per corner, for wireframe shading
    pub fn generate_barycentric(&mut self) -> Result<(), GeometryError> {
        if !self.is_unique_vertex() {
            self.generate_unique_vertex()?;
        }
        let face_count = self.face_count();
        if self.attribute("barycentric").is_some_and(|a| a.element_count() == face_count * 3) {
            return Ok(());
        }
        let corner = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let values = std::iter::repeat(corner).take(face_count).flatten().collect();
        match self.attribute_mut("barycentric") {
            Some(attribute) => attribute.set_values(values),
            None => {
                self.create_attribute("barycentric", AttributeType::Float, 3, None)?
                    .set_values(values);
            }
        }
        Ok(())
    }
    
    /// Transform positions by `matrix`, and normals and tangents by its inverse transpose
    pub fn apply_transform(&mut self, matrix: &Mat4) {
        let normal_matrix: Mat3 = matrix
            .fixed_view::<3, 3>(0, 0)
            .into_owned()
            .try_inverse()
            .map_or_else(Mat3::identity, |m| m.transpose());
        
        for attribute in &mut self.attributes {
            let size = attribute.size();
            if attribute.values().is_empty() || size < 3 {
                continue;
            }
            match attribute.semantic() {
                Some(AttributeSemantic::Position) => {
                    for v in attribute.values_mut().chunks_exact_mut(size) {
                        let p = matrix * Vec4::new(v[0], v[1], v[2], 1.0);
                        let w = if p.w.abs() > f32::EPSILON { p.w } else { 1.0 };
                        v[..3].copy_from_slice(&[p.x / w, p.y / w, p.z / w]);
                    }
                }
                Some(AttributeSemantic::Normal | AttributeSemantic::Tangent) => {
                    for v in attribute.values_mut().chunks_exact_mut(size) {
                        let n = normal_matrix * Vec3::new(v[0], v[1], v[2]);
                        let n = n.try_normalize(f32::EPSILON).unwrap_or(n);
                        v[..3].copy_from_slice(n.as_slice());
                    }
                }
                _ => {}
            }
        }
        if self.bounding_box.is_some() {
            self.update_bounding_box();
        }
    }
    
    /// Recompute the bounding box from the positions
    pub fn update_bounding_box(&mut self) -> BoundingBox {
        let bbox = match self.attribute("position") {
            Some(positions) => {
                let points: Vec<Vec3> = positions
                    .values()
                    .chunks_exact(3)
                    .map(|p| Vec3::new(p[0], p[1], p[2]))
                    .collect();
                BoundingBox::from_points(&points)
            }
            None => BoundingBox::empty(),
        };
        self.bounding_box = Some(bbox);
        bbox
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    
    /// Unit quad in the XY plane facing +Z, two triangles sharing an edge
    fn quad() -> Geometry {
        let mut geometry = Geometry::new();
        geometry
            .set_positions(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0])
            .unwrap();
        geometry
            .set_attribute_values("texcoord0", vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0])
            .unwrap();
        geometry.set_faces(vec![[0, 1, 2], [0, 2, 3]]).unwrap();
        geometry
    }
    
    #[test]
    fn test_vertex_normals_face_the_viewer() {
        let mut geometry = quad();
        geometry.generate_vertex_normals().unwrap();
        
        let normals = geometry.attribute("normal").unwrap();
        assert_eq!(normals.element_count(), 4);
        for i in 0..4 {
            assert_relative_eq!(normals.get(i).unwrap()[2], 1.0, epsilon = 1e-6);
        }
    }
    
    #[test]
    fn test_face_normals_make_vertices_unique() {
        let mut geometry = quad();
        assert!(!geometry.is_unique_vertex());
        geometry.generate_face_normals().unwrap();
        
        assert!(geometry.is_unique_vertex());
        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(geometry.attribute("texcoord0").unwrap().element_count(), 6);
        assert_eq!(geometry.face(1), Some([3, 4, 5]));
    }
    
    #[test]
    fn test_tangents_follow_u_direction() {
        let mut geometry = quad();
        geometry.generate_vertex_normals().unwrap();
        geometry.generate_tangents().unwrap();
        
        let tangent = geometry.attribute("tangent").unwrap().get(0).unwrap().to_vec();
        assert_relative_eq!(tangent[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(tangent[1], 0.0, epsilon = 1e-5);
        assert_relative_eq!(tangent[3], 1.0);
    }
    
    #[test]
    fn test_tangents_need_uvs() {
        let mut geometry = Geometry::new();
        geometry.set_positions(vec![0.0; 9]).unwrap();
        geometry.set_attribute_values("normal", vec![0.0; 9]).unwrap();
        
        assert!(matches!(geometry.generate_tangents(), Err(GeometryError::MissingAttribute(name)) if name == "texcoord0"));
    }
    
    #[test]
    fn test_barycentric_corners() {
        let mut geometry = quad();
        geometry.generate_barycentric().unwrap();
        
        let bary = geometry.attribute("barycentric").unwrap();
        assert_eq!(bary.element_count(), 6);
        assert_eq!(bary.get(4), Some(&[0.0, 1.0, 0.0][..]));
    }
    
    #[test]
    fn test_apply_transform_updates_bounds() {
        let mut geometry = quad();
        geometry.generate_vertex_normals().unwrap();
        geometry.update_bounding_box();
        geometry.apply_transform(&Mat4::new_nonuniform_scaling(&Vec3::new(2.0, 3.0, 1.0)));
        
        let bbox = geometry.bounding_box().unwrap();
        assert_relative_eq!(bbox.max, Vec3::new(2.0, 3.0, 0.0));
        assert_relative_eq!(geometry.attribute("normal").unwrap().get(0).unwrap()[2], 1.0, epsilon = 1e-6);
    }
    
    #[test]
    fn test_derived_data_rejects_positions_edited_in_place() {
        let mut geometry = quad();
        geometry.attribute_mut("position").unwrap().values_mut().truncate(9);
        
        assert!(matches!(
            geometry.generate_vertex_normals(),
            Err(GeometryError::FaceIndexOutOfBounds { index: 3, .. })
        ));
        assert!(geometry.generate_face_normals().is_err());
        assert!(geometry.generate_tangents().is_err());
        assert!(geometry.generate_unique_vertex().is_err());
    }
}
