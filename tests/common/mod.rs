//! Scene builders shared by the integration tests.

#![allow(dead_code)]

use glam::{Mat4, Quat, Vec2, Vec3};
use scenepack::scene::*;

pub fn triangle(vertices: [u32; 3], material_index: u32) -> Triangle {
    Triangle {
        vertices,
        normals: [Vec3::Z; 3],
        material_index,
    }
}

/// Unit quad: 4 positions, 2 triangles sharing an edge, one material.
pub fn quad_mesh(handle: u64, name: &str) -> MeshData {
    MeshData {
        handle,
        name: name.to_string(),
        positions: vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ],
        triangles: vec![triangle([0, 1, 2], 0), triangle([0, 2, 3], 0)],
        uv_layers: vec![UvLayer {
            name: "UVMap".into(),
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
        }],
        ..Default::default()
    }
}

/// Three triangles using material indices 0, 2 and 0.
pub fn split_mesh(handle: u64) -> MeshData {
    MeshData {
        handle,
        name: "Split".into(),
        positions: (0..6).map(|i| Vec3::new(i as f32, 0.0, (i % 2) as f32)).collect(),
        triangles: vec![triangle([0, 1, 2], 0), triangle([3, 4, 5], 2), triangle([1, 2, 3], 0)],
        ..Default::default()
    }
}

pub fn mesh_object(handle: u64, name: &str, mesh: u64) -> SceneObject {
    SceneObject {
        handle,
        name: name.to_string(),
        data: ObjectData::Mesh(mesh),
        ..Default::default()
    }
}

pub fn material(handle: u64, name: &str) -> MaterialData {
    MaterialData {
        handle,
        name: name.to_string(),
        mat_id: Some("Materials/Standard".into()),
        properties: vec![ResolvedProperty {
            name: "BaseColor".into(),
            value: ResolvedValue::Color([0.8, 0.2, 0.2, 1.0]),
        }],
    }
}

/// Two-bone rig with an action moving the second bone.
pub fn rigged_scene() -> Scene {
    let mut scene = Scene::default();
    scene.armatures.push(ArmatureData {
        handle: 5,
        name: "Rig".into(),
        bones: vec![
            BoneData {
                handle: 51,
                name: "root".into(),
                parent: None,
                matrix_local: Mat4::IDENTITY,
            },
            BoneData {
                handle: 52,
                name: "arm".into(),
                parent: Some(0),
                matrix_local: Mat4::from_translation(Vec3::new(0.0, 0.0, 1.0)),
            },
        ],
    });
    scene.actions.push(ActionData {
        handle: 9,
        name: "Wave".into(),
        id_root: ActionRoot::Armature,
        frame_start: 0.0,
        frame_end: 23.0,
        object_track: None,
        bone_tracks: vec![BoneTrack {
            bone: "arm".into(),
            track: TransformTrack {
                interpolation: Interpolation::Linear,
                keys: vec![
                    transform_key(0.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
                    transform_key(12.0, Vec3::ZERO, Quat::from_rotation_x(1.0), Vec3::ONE),
                ],
            },
        }],
    });
    scene.objects.push(SceneObject {
        handle: 1,
        name: "Armature".into(),
        data: ObjectData::Armature(5),
        animation: Some(AnimationBinding {
            nla_tracks: vec![NlaTrack {
                name: "Wave".into(),
                strips: vec![Some(9), None],
            }],
        }),
        ..Default::default()
    });

    let mut body = quad_mesh(20, "Body");
    body.vertex_groups = vec!["root".into(), "arm".into()];
    body.weights = vec![
        vec![VertexWeight { group: 0, weight: 1.0 }],
        vec![VertexWeight { group: 0, weight: 0.5 }, VertexWeight { group: 1, weight: 0.5 }],
        vec![VertexWeight { group: 1, weight: 1.0 }],
        vec![],
    ];
    scene.meshes.push(body);
    scene.objects.push(SceneObject {
        armature: Some(1),
        parent: Some(1),
        ..mesh_object(2, "Body", 20)
    });
    scene
}
