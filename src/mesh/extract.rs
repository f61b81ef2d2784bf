//! Material split, vertex dedup and array assembly.

use std::collections::{BTreeMap, HashMap};

use glam::{Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::capabilities::Capabilities;
use super::skin::SkinBinding;
use super::tangent::compute_tangents;
use crate::document::{IndexArray, Mesh, Primitive, Skin, VertexArray, VertexAttrib, MAX_UV_CHANNELS};
use crate::scene::MeshData;
use crate::util::{zup_to_yup_vector, Result};

/// Extraction switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    pub export_tangents: bool,
    pub remove_doubles: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            export_tangents: false,
            remove_doubles: true,
        }
    }
}

/// Draw-ready geometry of one material index, before it gets an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPart {
    pub material_index: u32,
    pub vertex_arrays: Vec<VertexArray>,
    pub indices: IndexArray,
    pub skin: Option<Skin>,
}

impl MeshPart {
    pub fn vertex_count(&self) -> usize {
        self.vertex_arrays
            .first()
            .map(VertexArray::vertex_count)
            .unwrap_or(0)
    }

    pub fn into_mesh(self, id: String, name: String) -> Mesh {
        Mesh {
            id,
            name,
            primitive: Primitive::Triangles,
            vertex_arrays: self.vertex_arrays,
            index_arrays: vec![self.indices],
            skin: self.skin,
        }
    }
}

/// Dedup key: raw bits of every emitted per-vertex value.
type VertexKey = SmallVec<[u32; 24]>;

struct PartBuilder<'a> {
    mesh: &'a MeshData,
    caps: Capabilities,
    skin: Option<&'a SkinBinding>,
    remove_doubles: bool,
    lookup: HashMap<VertexKey, u32>,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    colors: Vec<Vec4>,
    uvs: Vec<Vec<Vec2>>,
    /// Source vertex of each output vertex, for skin lookup.
    source: Vec<u32>,
    indices: Vec<u32>,
}

impl<'a> PartBuilder<'a> {
    fn new(mesh: &'a MeshData, caps: Capabilities, skin: Option<&'a SkinBinding>, remove_doubles: bool) -> Self {
        Self {
            mesh,
            caps,
            skin,
            remove_doubles,
            lookup: HashMap::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            uvs: vec![Vec::new(); caps.uv_count()],
            source: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn push_triangle(&mut self, tri_index: usize) {
        for corner in 0..3 {
            let index = self.push_corner(tri_index, corner);
            self.indices.push(index);
        }
    }

    fn push_corner(&mut self, tri_index: usize, corner: usize) -> u32 {
        let tri = &self.mesh.triangles[tri_index];
        let k = tri_index * 3 + corner;
        let vertex = tri.vertices[corner];

        let position = Vec3::from(zup_to_yup_vector(self.mesh.positions[vertex as usize]));
        let normal = Vec3::from(zup_to_yup_vector(tri.normals[corner]));
        let color = match (&self.mesh.colors, self.caps.has_color()) {
            (Some(colors), true) => Some(colors[k]),
            _ => None,
        };
        let mut uvs: SmallVec<[Vec2; MAX_UV_CHANNELS]> = SmallVec::new();
        for layer in self.mesh.uv_layers.iter().take(self.uvs.len()) {
            uvs.push(layer.uvs[k]);
        }

        if self.remove_doubles {
            let mut key = VertexKey::new();
            key.extend_from_slice(bytemuck::cast_slice(&position.to_array()));
            key.extend_from_slice(bytemuck::cast_slice(&normal.to_array()));
            for uv in &uvs {
                key.extend_from_slice(bytemuck::cast_slice(&uv.to_array()));
            }
            if let Some(c) = color {
                key.extend_from_slice(bytemuck::cast_slice(&c.to_array()));
            }
            // Vertices with equal attributes may still carry different weights.
            if self.skin.is_some() {
                key.push(vertex);
            }

            if let Some(&index) = self.lookup.get(&key) {
                return index;
            }
            let index = self.positions.len() as u32;
            self.lookup.insert(key, index);
            self.push_vertex(vertex, position, normal, color, &uvs);
            index
        } else {
            let index = self.positions.len() as u32;
            self.push_vertex(vertex, position, normal, color, &uvs);
            index
        }
    }

    fn push_vertex(&mut self, source: u32, position: Vec3, normal: Vec3, color: Option<Vec4>, uvs: &[Vec2]) {
        self.positions.push(position);
        self.normals.push(normal);
        if let Some(c) = color {
            self.colors.push(c);
        }
        for (channel, uv) in self.uvs.iter_mut().zip(uvs) {
            channel.push(*uv);
        }
        self.source.push(source);
    }

    fn finish(self, material_index: u32) -> MeshPart {
        let mut arrays = Vec::with_capacity(self.caps.attribs().len());

        arrays.push(float_array(VertexAttrib::Position, self.positions.iter().flat_map(|v| v.to_array())));
        arrays.push(float_array(VertexAttrib::Normal, self.normals.iter().flat_map(|v| v.to_array())));
        if self.caps.has_color() {
            arrays.push(float_array(VertexAttrib::Color, self.colors.iter().flat_map(|v| v.to_array())));
        }
        for (ch, channel) in self.uvs.iter().enumerate() {
            arrays.push(float_array(
                VertexAttrib::Texcoord(ch as u8),
                channel.iter().flat_map(|v| v.to_array()),
            ));
        }
        for (ch, channel) in self.uvs.iter().enumerate() {
            if self.caps.has_tangent(ch as u8) {
                let tangents = compute_tangents(&self.positions, &self.normals, channel, &self.indices);
                arrays.push(float_array(VertexAttrib::Tangent(ch as u8), tangents.into_iter().flatten()));
            }
        }

        let skin = self.skin.filter(|_| self.caps.has_skin()).map(|binding| {
            let mut skin = Skin::default();
            for &v in &self.source {
                let influences = binding.influences(self.mesh, v);
                skin.bone_count.push(influences.len() as u32);
                for (bone, weight) in influences {
                    skin.bone_index.push(bone);
                    skin.bone_weight.push(weight);
                }
            }
            skin
        });

        MeshPart {
            material_index,
            vertex_arrays: arrays,
            indices: IndexArray {
                step: 3,
                ints: self.indices,
            },
            skin,
        }
    }
}

fn float_array(attrib: VertexAttrib, floats: impl Iterator<Item = f32>) -> VertexArray {
    let mut array = VertexArray::new(attrib);
    array.floats = floats.collect();
    array
}

/// Split `mesh` by material index and build one part per index in use.
///
/// Indices without faces produce no part; a mesh without faces produces an
/// empty map. Positions and normals are re-based to Y-up.
pub fn extract(mesh: &MeshData, skin: Option<&SkinBinding>, options: ExtractOptions) -> Result<BTreeMap<u32, MeshPart>> {
    mesh.validate()?;
    if mesh.uv_layers.len() > MAX_UV_CHANNELS {
        tracing::warn!(
            "mesh '{}': {} uv layers, only the first {} are exported",
            mesh.name,
            mesh.uv_layers.len(),
            MAX_UV_CHANNELS
        );
    }

    let caps = Capabilities::detect(mesh, options.export_tangents, skin.is_some());

    let mut faces: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, tri) in mesh.triangles.iter().enumerate() {
        faces.entry(tri.material_index).or_default().push(i);
    }

    let mut parts = BTreeMap::new();
    for (material_index, tris) in faces {
        let mut builder = PartBuilder::new(mesh, caps, skin, options.remove_doubles);
        for tri in tris {
            builder.push_triangle(tri);
        }
        let part = builder.finish(material_index);
        tracing::trace!(
            "mesh '{}' material {}: {} vertices, {} triangles",
            mesh.name,
            material_index,
            part.vertex_count(),
            part.indices.ints.len() / 3
        );
        parts.insert(material_index, part);
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ArmatureData, BoneData, Triangle, UvLayer, VertexWeight};
    use glam::Mat4;

    /// Unit quad made of two triangles sharing an edge.
    fn quad(material_indices: [u32; 2]) -> MeshData {
        MeshData {
            handle: 1,
            name: "Quad".into(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            triangles: vec![
                Triangle {
                    vertices: [0, 1, 2],
                    normals: [Vec3::Z; 3],
                    material_index: material_indices[0],
                },
                Triangle {
                    vertices: [0, 2, 3],
                    normals: [Vec3::Z; 3],
                    material_index: material_indices[1],
                },
            ],
            ..Default::default()
        }
    }

    fn check_consistent(part: &MeshPart) {
        let count = part.vertex_count();
        for array in &part.vertex_arrays {
            assert_eq!(array.vertex_count(), count, "{}", array.attrib.name());
            assert_eq!(array.floats.len() % array.step as usize, 0);
        }
        assert_eq!(part.indices.ints.len() % 3, 0);
        assert_eq!(*part.indices.ints.iter().max().unwrap() as usize, count - 1);
    }

    #[test]
    fn test_dedup_shares_vertices() {
        let parts = extract(&quad([0, 0]), None, ExtractOptions::default()).unwrap();
        let part = &parts[&0];
        assert_eq!(part.vertex_count(), 4);
        assert_eq!(part.indices.ints, vec![0, 1, 2, 0, 2, 3]);
        check_consistent(part);
    }

    #[test]
    fn test_without_dedup_every_corner_is_unique() {
        let options = ExtractOptions {
            remove_doubles: false,
            ..Default::default()
        };
        let parts = extract(&quad([0, 0]), None, options).unwrap();
        assert_eq!(parts[&0].vertex_count(), 6);
        check_consistent(&parts[&0]);
    }

    #[test]
    fn test_split_by_material() {
        let parts = extract(&quad([0, 2]), None, ExtractOptions::default()).unwrap();
        assert_eq!(parts.keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        for part in parts.values() {
            assert_eq!(part.vertex_count(), 3);
            check_consistent(part);
        }
    }

    #[test]
    fn test_empty_mesh_has_no_parts() {
        let mesh = MeshData {
            name: "Empty".into(),
            positions: vec![Vec3::ZERO],
            ..Default::default()
        };
        assert!(extract(&mesh, None, ExtractOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn test_axis_rebased_positions() {
        let parts = extract(&quad([0, 0]), None, ExtractOptions::default()).unwrap();
        let pos = parts[&0].vertex_arrays[0].floats.clone();
        // source (1, 1, 0) becomes (1, 0, -1)
        assert_eq!(&pos[6..9], &[1.0, 0.0, -1.0]);
        let nrm = &parts[&0].vertex_arrays[1].floats;
        assert_eq!(&nrm[0..3], &[0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_uv_seam_splits_vertex() {
        let mut mesh = quad([0, 0]);
        // corner 3 (vertex 0 of the second triangle) gets a different uv
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.5, 0.5),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        mesh.uv_layers.push(UvLayer { name: "UVMap".into(), uvs });
        mesh.colors = Some(vec![Vec4::ONE; 6]);
        let options = ExtractOptions {
            export_tangents: true,
            remove_doubles: true,
        };
        let parts = extract(&mesh, None, options).unwrap();
        let part = &parts[&0];
        assert_eq!(part.vertex_count(), 5);
        let attribs: Vec<_> = part.vertex_arrays.iter().map(|a| a.attrib).collect();
        assert_eq!(
            attribs,
            vec![
                VertexAttrib::Position,
                VertexAttrib::Normal,
                VertexAttrib::Color,
                VertexAttrib::Texcoord(0),
                VertexAttrib::Tangent(0),
            ]
        );
        check_consistent(part);
    }

    #[test]
    fn test_skin_arrays() {
        let mut mesh = quad([0, 0]);
        mesh.vertex_groups = vec!["root".into(), "tip".into()];
        mesh.weights = vec![
            vec![VertexWeight { group: 0, weight: 1.0 }],
            vec![VertexWeight { group: 0, weight: 0.5 }, VertexWeight { group: 1, weight: 0.5 }],
            vec![VertexWeight { group: 1, weight: 1.0 }],
            vec![],
        ];
        let armature = ArmatureData {
            handle: 9,
            name: "rig".into(),
            bones: vec![
                BoneData { handle: 1, name: "root".into(), parent: None, matrix_local: Mat4::IDENTITY },
                BoneData { handle: 2, name: "tip".into(), parent: Some(0), matrix_local: Mat4::IDENTITY },
            ],
        };
        let binding = SkinBinding::new(&mesh, &armature, 4).unwrap();
        let parts = extract(&mesh, Some(&binding), ExtractOptions::default()).unwrap();
        let skin = parts[&0].skin.as_ref().unwrap();
        assert_eq!(skin.bone_count, vec![1, 2, 1, 0]);
        assert_eq!(skin.bone_index.len(), 4);
        assert_eq!(skin.bone_weight.len(), 4);
        assert_eq!(skin.bone_index[0], 0);
        assert_eq!(skin.bone_index[3], 1);
    }
}
