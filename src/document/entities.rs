//! Typed entities stored in a [`Document`](super::Document).

use serde::{Deserialize, Serialize};

/// Local transform, already re-based to the document's Y-up convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: [f32; 3],
    /// Quaternion as `[x, y, z, w]`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

/// Scene node. Hierarchy is expressed through relations, not nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TObject {
    pub id: String,
    pub name: String,
    pub transform: Transform,
}

// ----------------------------------------------------------------------------
// Meshes
// ----------------------------------------------------------------------------

/// Maximum number of texcoord (and tangent) channels per mesh.
pub const MAX_UV_CHANNELS: usize = 8;

/// Primitive topology of a mesh. Output is always triangle lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Primitive {
    #[default]
    Triangles,
}

/// Semantic of a vertex array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexAttrib {
    Position,
    Normal,
    Color,
    /// Texcoord channel `0..8` (`texcoord` .. `texcoord8`).
    Texcoord(u8),
    /// Tangent channel `0..8` (`tangent` .. `tangent8`).
    Tangent(u8),
}

impl VertexAttrib {
    /// Float stride of the attribute.
    pub const fn step(self) -> u32 {
        match self {
            Self::Position | Self::Normal => 3,
            Self::Color | Self::Tangent(_) => 4,
            Self::Texcoord(_) => 2,
        }
    }

    /// Stable wire code.
    pub const fn code(self) -> u8 {
        match self {
            Self::Position => 0,
            Self::Normal => 1,
            Self::Color => 2,
            Self::Texcoord(ch) => 3 + ch,
            Self::Tangent(ch) => 3 + MAX_UV_CHANNELS as u8 + ch,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        const UV: u8 = MAX_UV_CHANNELS as u8;
        match code {
            0 => Some(Self::Position),
            1 => Some(Self::Normal),
            2 => Some(Self::Color),
            c if (3..3 + UV).contains(&c) => Some(Self::Texcoord(c - 3)),
            c if (3 + UV..3 + 2 * UV).contains(&c) => Some(Self::Tangent(c - 3 - UV)),
            _ => None,
        }
    }

    /// Display name as used by consumers (`texcoord`, `texcoord2`, ...).
    pub fn name(self) -> String {
        match self {
            Self::Position => "position".to_string(),
            Self::Normal => "normal".to_string(),
            Self::Color => "color".to_string(),
            Self::Texcoord(0) => "texcoord".to_string(),
            Self::Texcoord(ch) => format!("texcoord{}", ch + 1),
            Self::Tangent(0) => "tangent".to_string(),
            Self::Tangent(ch) => format!("tangent{}", ch + 1),
        }
    }
}

/// One per-vertex attribute channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexArray {
    pub attrib: VertexAttrib,
    pub step: u32,
    pub floats: Vec<f32>,
}

impl VertexArray {
    /// Empty array with the attribute's natural stride.
    pub fn new(attrib: VertexAttrib) -> Self {
        Self {
            attrib,
            step: attrib.step(),
            floats: Vec::new(),
        }
    }

    /// Number of vertices stored.
    pub fn vertex_count(&self) -> usize {
        if self.step == 0 {
            0
        } else {
            self.floats.len() / self.step as usize
        }
    }
}

/// Triangle-list indices (`step == 3`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexArray {
    pub step: u32,
    pub ints: Vec<u32>,
}

impl Default for IndexArray {
    fn default() -> Self {
        Self { step: 3, ints: Vec::new() }
    }
}

/// Skinning data: `bone_count[v]` entries of `bone_index`/`bone_weight`
/// belong to vertex `v`, in vertex order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    pub bone_count: Vec<u32>,
    pub bone_index: Vec<u32>,
    pub bone_weight: Vec<f32>,
}

/// Draw-ready geometry for one (source mesh, material index) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub id: String,
    pub name: String,
    pub primitive: Primitive,
    pub vertex_arrays: Vec<VertexArray>,
    pub index_arrays: Vec<IndexArray>,
    pub skin: Option<Skin>,
}

impl Mesh {
    /// Look up a vertex array by semantic.
    pub fn array(&self, attrib: VertexAttrib) -> Option<&VertexArray> {
        self.vertex_arrays.iter().find(|a| a.attrib == attrib)
    }

    /// Vertex count (taken from the position array).
    pub fn vertex_count(&self) -> usize {
        self.array(VertexAttrib::Position)
            .map(VertexArray::vertex_count)
            .unwrap_or(0)
    }

    /// Number of triangles across all index arrays.
    pub fn triangle_count(&self) -> usize {
        self.index_arrays.iter().map(|a| a.ints.len() / 3).sum()
    }

    /// Check the array invariants; returns a description of each defect.
    pub fn defects(&self) -> Vec<String> {
        let mut out = Vec::new();
        let count = self.vertex_count();

        for array in &self.vertex_arrays {
            if array.step == 0 || array.floats.len() % array.step as usize != 0 {
                out.push(format!(
                    "mesh '{}': {} array length {} is not a multiple of {}",
                    self.id,
                    array.attrib.name(),
                    array.floats.len(),
                    array.step
                ));
            } else if array.vertex_count() != count {
                out.push(format!(
                    "mesh '{}': {} array has {} vertices, position has {}",
                    self.id,
                    array.attrib.name(),
                    array.vertex_count(),
                    count
                ));
            }
        }

        for indices in &self.index_arrays {
            if indices.step != 3 || indices.ints.len() % 3 != 0 {
                out.push(format!("mesh '{}': index array is not a triangle list", self.id));
            }
            if let Some(max) = indices.ints.iter().copied().max() {
                if max as usize >= count {
                    out.push(format!(
                        "mesh '{}': index {} out of bounds for {} vertices",
                        self.id, max, count
                    ));
                }
            }
        }

        if let Some(skin) = &self.skin {
            let total: u64 = skin.bone_count.iter().map(|&c| c as u64).sum();
            if skin.bone_count.len() != count
                || skin.bone_index.len() as u64 != total
                || skin.bone_weight.len() as u64 != total
            {
                out.push(format!("mesh '{}': skin arrays are inconsistent", self.id));
            }
        }
        out
    }
}

// ----------------------------------------------------------------------------
// Materials
// ----------------------------------------------------------------------------

/// Reference to an exported texture asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureRef {
    pub id: String,
    /// Output-relative path of the texture file.
    pub rpath: String,
}

/// Typed material property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Color([f32; 4]),
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Quat([f32; 4]),
    Texture(TextureRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperty {
    pub id: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub name: String,
    /// Shading model path the properties belong to; empty when unresolved.
    pub mat_id: String,
    pub properties: Vec<MaterialProperty>,
}

// ----------------------------------------------------------------------------
// Lights
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotAngle {
    /// Half cone angle in radians.
    pub max: f32,
    /// Start of the linear edge blend, `0..=1`.
    pub linear_begin: f32,
}

/// Radial attenuation curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    Constant,
    Linear { end: f32 },
    Inverse { scale: f32, constant: f32, linear: f32 },
    InverseSquare { scale: f32, constant: f32, linear: f32, quadratic: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub id: String,
    pub name: String,
    pub kind: LightKind,
    pub color: [f32; 4],
    pub intensity: f32,
    pub cast_shadow: bool,
    pub spot_angle: Option<SpotAngle>,
    pub radial_distance_max: f32,
    pub falloff: Falloff,
}

// ----------------------------------------------------------------------------
// Skeletons and animation
// ----------------------------------------------------------------------------

/// Bone with its rest transform relative to the parent bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub id: String,
    pub name: String,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub id: String,
    pub name: String,
    pub bones: Vec<Bone>,
}

/// What an animation drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    Object,
    Skeleton,
}

/// Keyframes for one sampled target, as parallel arrays.
///
/// All arrays have equal length and `at` strictly increases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Joint name for skeletal clips; `None` when the clip drives the object.
    pub bone_name: Option<String>,
    /// Sample times in milliseconds; negative before the timeline origin.
    pub at: Vec<i32>,
    pub translation: Vec<[f32; 3]>,
    pub rotation: Vec<[f32; 4]>,
    pub scale: Vec<[f32; 3]>,
}

impl Clip {
    pub fn len(&self) -> usize {
        self.at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.at.is_empty()
    }

    /// Check the parallel-array and time-order invariants.
    pub fn defects(&self, owner: &str) -> Vec<String> {
        let mut out = Vec::new();
        let n = self.at.len();
        if self.translation.len() != n || self.rotation.len() != n || self.scale.len() != n {
            out.push(format!("animation '{}': clip arrays have unequal lengths", owner));
        }
        if self.at.windows(2).any(|w| w[0] >= w[1]) {
            out.push(format!("animation '{}': clip times are not strictly increasing", owner));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationKf {
    pub id: String,
    pub name: String,
    /// Duration in milliseconds.
    pub duration: u32,
    pub target_kind: TargetKind,
    pub clips: Vec<Clip>,
}

// ----------------------------------------------------------------------------
// Physics
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RigidBodyType {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionShape {
    Mesh,
    Sphere,
    Hull,
    Box,
    Capsule,
    Cylinder,
    Cone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidBody {
    pub id: String,
    pub kind: RigidBodyType,
    pub mass: f32,
    pub is_kinematic: bool,
    pub friction: f32,
    pub restitution: f32,
    pub margin: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub angular_factor: [f32; 3],
    pub linear_factor: [f32; 3],
    pub shape: CollisionShape,
    pub collision_group: u32,
    pub collision_mask: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericConstraint {
    pub pivot_a: [f32; 3],
    pub pivot_b: [f32; 3],
    pub disable_collisions: bool,
    pub upper_linear_limit: [f32; 3],
    pub lower_linear_limit: [f32; 3],
    pub upper_angular_limit: [f32; 3],
    pub lower_angular_limit: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    /// Rigid body ids of the two constrained bodies.
    pub a_ref: String,
    pub b_ref: String,
    pub generic: Option<GenericConstraint>,
}

// ----------------------------------------------------------------------------
// Audio, parameters, fields
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    /// Output-relative path of the audio file.
    pub rpath: String,
    pub volume: f32,
    pub pitch: f32,
    pub distance_max: f32,
    pub distance_reference: f32,
    pub attenuation: f32,
}

/// Value of a user-defined custom property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomValue {
    Bool(bool),
    String(String),
    Float(f32),
    Int(i64),
    Vec3([f32; 3]),
    Quat([f32; 4]),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomParam {
    pub name: String,
    pub value: CustomValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomParams {
    pub id: String,
    pub params: Vec<CustomParam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceField {
    pub id: String,
    pub gravity: [f32; 3],
}

/// Particle collider: an infinite plane through `point`, clipped to `extents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionPlane {
    pub id: String,
    pub name: String,
    pub point: [f32; 3],
    /// Unit normal, world space.
    pub normal: [f32; 3],
    pub extents: [f32; 3],
    pub damping: f32,
    pub damping_randomness: f32,
    pub friction: f32,
    pub friction_randomness: f32,
    pub stickiness: f32,
    pub permeability: f32,
    pub kill_particles: bool,
}

/// Ordered structural edge between two entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub ref1: String,
    pub ref2: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrib_codes_round_trip() {
        let mut all = vec![VertexAttrib::Position, VertexAttrib::Normal, VertexAttrib::Color];
        for ch in 0..MAX_UV_CHANNELS as u8 {
            all.push(VertexAttrib::Texcoord(ch));
            all.push(VertexAttrib::Tangent(ch));
        }
        for attrib in all {
            assert_eq!(VertexAttrib::from_code(attrib.code()), Some(attrib));
        }
        assert_eq!(VertexAttrib::from_code(19), None);
    }

    #[test]
    fn test_attrib_names() {
        assert_eq!(VertexAttrib::Texcoord(0).name(), "texcoord");
        assert_eq!(VertexAttrib::Texcoord(7).name(), "texcoord8");
        assert_eq!(VertexAttrib::Tangent(1).name(), "tangent2");
    }

    #[test]
    fn test_mesh_defects() {
        let mut pos = VertexArray::new(VertexAttrib::Position);
        pos.floats = vec![0.0; 9];
        let mut nrm = VertexArray::new(VertexAttrib::Normal);
        nrm.floats = vec![0.0; 6];
        let mesh = Mesh {
            id: "me1_0".into(),
            name: "m".into(),
            primitive: Primitive::Triangles,
            vertex_arrays: vec![pos, nrm],
            index_arrays: vec![IndexArray { step: 3, ints: vec![0, 1, 3] }],
            skin: None,
        };
        let defects = mesh.defects();
        assert_eq!(defects.len(), 2);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_clip_defects() {
        let clip = Clip {
            bone_name: None,
            at: vec![0, 33, 33],
            translation: vec![[0.0; 3]; 3],
            rotation: vec![[0.0, 0.0, 0.0, 1.0]; 3],
            scale: vec![[1.0; 3]; 2],
        };
        assert_eq!(clip.defects("ac1").len(), 2);
    }
}
