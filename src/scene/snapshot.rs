//! Read-only scene snapshot handed over by the host application.
//!
//! Geometry is already deformed and triangulated, material values are
//! already resolved. Every entity carries a `handle`: its runtime identity
//! in the host, stable for the duration of one export run.

use std::path::{Path, PathBuf};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::document::{CollisionShape, CustomValue};
use crate::util::{Error, Result};

/// Complete scene snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    /// Frames per second of the timeline.
    pub fps: f32,
    /// Scene gravity, if enabled.
    pub gravity: Option<Vec3>,
    pub objects: Vec<SceneObject>,
    pub meshes: Vec<MeshData>,
    pub materials: Vec<MaterialData>,
    pub lights: Vec<LightData>,
    pub armatures: Vec<ArmatureData>,
    pub actions: Vec<ActionData>,
    pub speakers: Vec<SpeakerData>,
    pub sounds: Vec<SoundData>,
    pub images: Vec<ImageData>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            fps: 24.0,
            gravity: None,
            objects: Vec::new(),
            meshes: Vec::new(),
            materials: Vec::new(),
            lights: Vec::new(),
            armatures: Vec::new(),
            actions: Vec::new(),
            speakers: Vec::new(),
            sounds: Vec::new(),
            images: Vec::new(),
        }
    }
}

macro_rules! lookup {
    ($name:ident, $field:ident, $ty:ty) => {
        pub fn $name(&self, handle: u64) -> Option<&$ty> {
            self.$field.iter().find(|e| e.handle == handle)
        }
    };
}

impl Scene {
    /// Parse a snapshot from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let scene: Scene = serde_json::from_str(json)?;
        scene.validate()?;
        Ok(scene)
    }

    /// Load a snapshot from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_json_str(&text)
    }

    lookup!(object, objects, SceneObject);
    lookup!(mesh, meshes, MeshData);
    lookup!(material, materials, MaterialData);
    lookup!(light, lights, LightData);
    lookup!(armature, armatures, ArmatureData);
    lookup!(action, actions, ActionData);
    lookup!(speaker, speakers, SpeakerData);
    lookup!(sound, sounds, SoundData);
    lookup!(image, images, ImageData);

    /// Objects whose data block is the given mesh.
    pub fn mesh_users(&self, mesh: u64) -> impl Iterator<Item = &SceneObject> {
        self.objects
            .iter()
            .filter(move |o| o.data == ObjectData::Mesh(mesh))
    }

    /// Structural checks that the rest of the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(Error::invalid(format!("scene fps must be positive, got {}", self.fps)));
        }
        for obj in &self.objects {
            if let Some(parent) = obj.parent {
                if self.object(parent).is_none() {
                    return Err(Error::invalid(format!(
                        "object '{}' has unknown parent {}",
                        obj.name, parent
                    )));
                }
            }
        }
        for mesh in &self.meshes {
            mesh.validate()?;
        }
        for armature in &self.armatures {
            armature.validate()?;
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Objects
// ----------------------------------------------------------------------------

/// Data block attached to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "handle", rename_all = "snake_case")]
pub enum ObjectData {
    #[default]
    Empty,
    Mesh(u64),
    Armature(u64),
    Light(u64),
    Speaker(u64),
    Camera,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneObject {
    pub handle: u64,
    pub name: String,
    pub data: ObjectData,
    pub parent: Option<u64>,
    /// Transform relative to the parent object.
    pub matrix_local: Mat4,
    /// World transform (used for constraint pivots).
    pub matrix_world: Mat4,
    pub hidden: bool,
    pub selected: bool,
    /// Material per slot; `None` for an empty slot.
    pub material_slots: Vec<Option<u64>>,
    /// Armature object deforming this mesh, if any.
    pub armature: Option<u64>,
    pub animation: Option<AnimationBinding>,
    pub rigid_body: Option<RigidBodySettings>,
    pub rigid_body_constraint: Option<ConstraintSettings>,
    /// Particle collision settings; only meaningful on mesh objects.
    pub collision: Option<CollisionSettings>,
    /// User properties in host order.
    pub custom_properties: Vec<(String, CustomValue)>,
}

impl Default for SceneObject {
    fn default() -> Self {
        Self {
            handle: 0,
            name: String::new(),
            data: ObjectData::Empty,
            parent: None,
            matrix_local: Mat4::IDENTITY,
            matrix_world: Mat4::IDENTITY,
            hidden: false,
            selected: true,
            material_slots: Vec::new(),
            armature: None,
            animation: None,
            rigid_body: None,
            rigid_body_constraint: None,
            collision: None,
            custom_properties: Vec::new(),
        }
    }
}

/// Animation tracks bound to an object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationBinding {
    pub nla_tracks: Vec<NlaTrack>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NlaTrack {
    pub name: String,
    /// Action handle per strip; strips without an action are `None`.
    pub strips: Vec<Option<u64>>,
}

// ----------------------------------------------------------------------------
// Meshes
// ----------------------------------------------------------------------------

/// One triangle with per-corner normals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [u32; 3],
    pub normals: [Vec3; 3],
    #[serde(default)]
    pub material_index: u32,
}

/// One UV layer, one value per triangle corner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UvLayer {
    pub name: String,
    pub uvs: Vec<Vec2>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexWeight {
    /// Index into [`MeshData::vertex_groups`].
    pub group: u32,
    pub weight: f32,
}

/// Deformed, triangulated geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshData {
    pub handle: u64,
    pub name: String,
    pub positions: Vec<Vec3>,
    pub triangles: Vec<Triangle>,
    pub uv_layers: Vec<UvLayer>,
    /// Vertex colors, one per triangle corner.
    pub colors: Option<Vec<Vec4>>,
    /// Vertex group names; groups named after bones carry skin weights.
    pub vertex_groups: Vec<String>,
    /// Group weights per vertex (empty, or one entry per position).
    pub weights: Vec<Vec<VertexWeight>>,
}

impl MeshData {
    pub fn corner_count(&self) -> usize {
        self.triangles.len() * 3
    }

    pub fn validate(&self) -> Result<()> {
        let corners = self.corner_count();
        let vcount = self.positions.len();
        for (i, tri) in self.triangles.iter().enumerate() {
            if tri.vertices.iter().any(|&v| v as usize >= vcount) {
                return Err(Error::invalid(format!(
                    "mesh '{}': triangle {} references a vertex beyond {}",
                    self.name, i, vcount
                )));
            }
        }
        for layer in &self.uv_layers {
            if layer.uvs.len() != corners {
                return Err(Error::invalid(format!(
                    "mesh '{}': uv layer '{}' has {} values for {} corners",
                    self.name,
                    layer.name,
                    layer.uvs.len(),
                    corners
                )));
            }
        }
        if let Some(colors) = &self.colors {
            if colors.len() != corners {
                return Err(Error::invalid(format!(
                    "mesh '{}': {} colors for {} corners",
                    self.name,
                    colors.len(),
                    corners
                )));
            }
        }
        if !self.weights.is_empty() && self.weights.len() != vcount {
            return Err(Error::invalid(format!(
                "mesh '{}': {} weight lists for {} vertices",
                self.name,
                self.weights.len(),
                vcount
            )));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Materials and assets
// ----------------------------------------------------------------------------

/// Material property value as delivered by the material resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedValue {
    Color([f32; 4]),
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Quat([f32; 4]),
    /// Image reference. `args` carries per-input options such as
    /// `dds{solid=DXT1,alpha=DXT5}`; `solid` is false when alpha is used.
    Texture {
        image: u64,
        #[serde(default)]
        args: String,
        #[serde(default = "default_true")]
        solid: bool,
    },
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedProperty {
    pub name: String,
    pub value: ResolvedValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialData {
    pub handle: u64,
    pub name: String,
    /// Shading model path of the exportable material, if one was found.
    pub mat_id: Option<String>,
    pub properties: Vec<ResolvedProperty>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageData {
    pub handle: u64,
    pub name: String,
    /// Host file format name (`PNG`, `TARGA`, `JPEG`, ...).
    pub file_format: Option<String>,
    pub filepath: Option<PathBuf>,
    /// Bytes embedded in the host file.
    pub packed: Option<Vec<u8>>,
    pub size: [u32; 2],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundData {
    pub handle: u64,
    pub name: String,
    pub filepath: Option<PathBuf>,
    pub packed: Option<Vec<u8>>,
}

// ----------------------------------------------------------------------------
// Lights and speakers
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLightKind {
    Sun,
    Area,
    Hemi,
    #[default]
    Point,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFalloff {
    #[default]
    Constant,
    InverseLinear,
    InverseSquare,
    LinearQuadraticWeighted { linear: f32, quadratic: f32 },
}

/// Emission values resolved from a node-based light setup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    pub color: Vec4,
    pub strength: f32,
    pub cast_shadow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LightData {
    pub handle: u64,
    pub name: String,
    pub kind: SourceLightKind,
    pub color: Vec3,
    pub energy: f32,
    pub distance: f32,
    /// Full cone angle in radians.
    pub spot_size: f32,
    pub spot_blend: f32,
    pub use_shadow: bool,
    pub use_sphere: bool,
    pub falloff: SourceFalloff,
    pub emission: Option<Emission>,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            handle: 0,
            name: String::new(),
            kind: SourceLightKind::Point,
            color: Vec3::ONE,
            energy: 1.0,
            distance: 25.0,
            spot_size: std::f32::consts::FRAC_PI_4,
            spot_blend: 0.15,
            use_shadow: false,
            use_sphere: false,
            falloff: SourceFalloff::Constant,
            emission: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeakerData {
    pub handle: u64,
    pub name: String,
    pub sound: Option<u64>,
    pub volume: f32,
    pub pitch: f32,
    pub distance_max: f32,
    pub distance_reference: f32,
    pub attenuation: f32,
}

impl Default for SpeakerData {
    fn default() -> Self {
        Self {
            handle: 0,
            name: String::new(),
            sound: None,
            volume: 1.0,
            pitch: 1.0,
            distance_max: f32::MAX,
            distance_reference: 1.0,
            attenuation: 1.0,
        }
    }
}

// ----------------------------------------------------------------------------
// Armatures and actions
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneData {
    pub handle: u64,
    pub name: String,
    /// Index of the parent bone; parents precede their children.
    #[serde(default)]
    pub parent: Option<usize>,
    /// Rest matrix in armature space.
    pub matrix_local: Mat4,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmatureData {
    pub handle: u64,
    pub name: String,
    pub bones: Vec<BoneData>,
}

impl ArmatureData {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Rest matrix of a bone relative to its parent bone.
    pub fn rest_relative(&self, index: usize) -> Mat4 {
        let bone = &self.bones[index];
        match bone.parent {
            Some(p) => self.bones[p].matrix_local.inverse() * bone.matrix_local,
            None => bone.matrix_local,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (i, bone) in self.bones.iter().enumerate() {
            if let Some(p) = bone.parent {
                if p >= i {
                    return Err(Error::invalid(format!(
                        "armature '{}': bone '{}' lists parent {} that does not precede it",
                        self.name, bone.name, p
                    )));
                }
            }
        }
        Ok(())
    }
}

/// What an action was authored for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRoot {
    #[default]
    Object,
    Armature,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformKey {
    pub frame: f32,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

/// Keyed local transform of one object or bone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformTrack {
    pub interpolation: Interpolation,
    /// Keys sorted by frame.
    pub keys: Vec<TransformKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneTrack {
    pub bone: String,
    pub track: TransformTrack,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionData {
    pub handle: u64,
    pub name: String,
    pub id_root: ActionRoot,
    pub frame_start: f32,
    pub frame_end: f32,
    /// Object-level channels; `None` leaves the object at its rest transform.
    pub object_track: Option<TransformTrack>,
    pub bone_tracks: Vec<BoneTrack>,
}

impl ActionData {
    pub fn bone_track(&self, bone: &str) -> Option<&TransformTrack> {
        self.bone_tracks
            .iter()
            .find(|t| t.bone == bone)
            .map(|t| &t.track)
    }
}

// ----------------------------------------------------------------------------
// Physics
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RigidBodyRole {
    #[default]
    Active,
    Passive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBodySettings {
    pub handle: u64,
    pub role: RigidBodyRole,
    pub enabled: bool,
    pub mass: f32,
    pub kinematic: bool,
    pub friction: f32,
    pub restitution: f32,
    pub use_margin: bool,
    pub collision_margin: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub collision_shape: CollisionShape,
    /// Collision layer membership, bit `i` = layer `i`.
    pub collision_groups: Vec<bool>,
}

impl Default for RigidBodySettings {
    fn default() -> Self {
        Self {
            handle: 0,
            role: RigidBodyRole::Active,
            enabled: true,
            mass: 1.0,
            kinematic: false,
            friction: 0.5,
            restitution: 0.0,
            use_margin: false,
            collision_margin: 0.04,
            linear_damping: 0.04,
            angular_damping: 0.1,
            collision_shape: CollisionShape::Hull,
            collision_groups: vec![true],
        }
    }
}

/// Collision modifier of a mesh object. Factors are in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    pub damping: f32,
    pub damping_random: f32,
    pub friction: f32,
    pub friction_random: f32,
    pub stickiness: f32,
    pub permeability: f32,
    pub kill_particles: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    #[default]
    Generic,
    Other(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSettings {
    pub handle: u64,
    pub kind: ConstraintKind,
    pub object1: u64,
    pub object2: u64,
    pub disable_collisions: bool,
    /// `[lower, upper]` per axis; `None` leaves the axis unlimited.
    pub linear_limits: [Option<[f32; 2]>; 3],
    pub angular_limits: [Option<[f32; 2]>; 3],
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(v: [u32; 3], material_index: u32) -> Triangle {
        Triangle {
            vertices: v,
            normals: [Vec3::Z; 3],
            material_index,
        }
    }

    #[test]
    fn test_scene_json_defaults() {
        let scene = Scene::from_json_str(
            r#"{
                "fps": 30.0,
                "objects": [
                    { "handle": 1, "name": "Cube", "data": { "type": "mesh", "handle": 10 } },
                    { "handle": 2, "name": "Child", "parent": 1 }
                ],
                "meshes": [
                    { "handle": 10, "name": "CubeMesh",
                      "positions": [[0,0,0],[1,0,0],[0,1,0]],
                      "triangles": [ { "vertices": [0,1,2], "normals": [[0,0,1],[0,0,1],[0,0,1]] } ] }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scene.fps, 30.0);
        let cube = scene.object(1).unwrap();
        assert_eq!(cube.data, ObjectData::Mesh(10));
        assert_eq!(cube.matrix_local, Mat4::IDENTITY);
        assert!(cube.selected);
        assert_eq!(scene.object(2).unwrap().data, ObjectData::Empty);
        assert_eq!(scene.mesh_users(10).count(), 1);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let err = Scene::from_json_str(r#"{ "objects": [ { "handle": 1, "parent": 5 } ] }"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_mesh_validation() {
        let mut mesh = MeshData {
            handle: 1,
            name: "m".into(),
            positions: vec![Vec3::ZERO; 3],
            triangles: vec![triangle([0, 1, 2], 0)],
            ..Default::default()
        };
        assert!(mesh.validate().is_ok());

        mesh.uv_layers.push(UvLayer { name: "uv".into(), uvs: vec![Vec2::ZERO; 2] });
        assert!(mesh.validate().is_err());

        mesh.uv_layers[0].uvs.push(Vec2::ZERO);
        assert!(mesh.validate().is_ok());

        mesh.triangles.push(triangle([0, 1, 3], 0));
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn test_armature_parent_order() {
        let bone = |name: &str, parent| BoneData {
            handle: 0,
            name: name.into(),
            parent,
            matrix_local: Mat4::IDENTITY,
        };
        let ok = ArmatureData {
            handle: 1,
            name: "rig".into(),
            bones: vec![bone("root", None), bone("arm", Some(0))],
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.bone_index("arm"), Some(1));

        let bad = ArmatureData {
            handle: 1,
            name: "rig".into(),
            bones: vec![bone("arm", Some(1)), bone("root", None)],
        };
        assert!(bad.validate().is_err());
    }
}
