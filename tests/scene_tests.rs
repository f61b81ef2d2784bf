//! Integration tests for snapshot loading, physics, speakers and
//! scene-level entities.

mod common;

use glam::{Mat4, Vec3};
use scenepack::document::{CustomValue, RigidBodyType};
use scenepack::scene::*;
use scenepack::{export_scene, format, ExportConfig, Exporter, IdentityRegistry};

use common::*;

const SNAPSHOT: &str = r#"{
    "fps": 25.0,
    "gravity": [0.0, 0.0, -9.81],
    "objects": [
        { "handle": 1, "name": "Crate", "data": { "type": "mesh", "handle": 10 },
          "material_slots": [100],
          "custom_properties": [ ["health", { "int": 5 }], ["_RNA_UI", { "bool": true }] ] },
        { "handle": 2, "name": "Lid", "parent": 1 }
    ],
    "meshes": [
        { "handle": 10, "name": "CrateMesh",
          "positions": [[0,0,0],[1,0,0],[0,1,0]],
          "triangles": [ { "vertices": [0,1,2], "normals": [[0,0,1],[0,0,1],[0,0,1]] } ] }
    ],
    "materials": [
        { "handle": 100, "name": "Wood", "mat_id": "Materials/Standard",
          "properties": [ { "name": "Roughness", "value": { "float": 0.7 } } ] }
    ]
}"#;

#[test]
fn test_export_from_json_snapshot() {
    let scene = Scene::from_json_str(SNAPSHOT).expect("Failed to parse snapshot");
    let doc = export_scene(&scene, &ExportConfig::default())
        .expect("Export failed")
        .document;

    assert_eq!(doc.objects.len(), 2);
    assert_eq!(doc.meshes.len(), 1);
    assert_eq!(doc.materials[0].mat_id, "Materials/Standard");
    assert_eq!(doc.materials[0].properties.len(), 1);

    // Host-internal keys are filtered out
    assert_eq!(doc.custom_params.len(), 1);
    let params = &doc.custom_params[0];
    assert_eq!(params.id, "params_ob1");
    assert_eq!(params.params.len(), 1);
    assert_eq!(params.params[0].name, "health");
    assert_eq!(params.params[0].value, CustomValue::Int(5));
    assert!(doc.relations_from("params_ob1").any(|r| r.ref2 == "ob1"));

    assert_eq!(doc.force_fields.len(), 1);
    assert_eq!(doc.force_fields[0].id, "sceneGravity");
    assert_eq!(doc.force_fields[0].gravity, [0.0, -9.81, 0.0]);

    assert!(doc.relations_from("ob1").any(|r| r.ref2 == "ob2"));
    doc.check().expect("Document has defects");
}

#[test]
fn test_object_transform_is_y_up() {
    let mut scene = Scene::default();
    scene.objects.push(SceneObject {
        handle: 1,
        name: "Offset".into(),
        matrix_local: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
        ..Default::default()
    });
    let doc = export_scene(&scene, &ExportConfig::default())
        .expect("Export failed")
        .document;
    let t = &doc.objects[0].transform;
    assert_eq!(t.translation, [1.0, 3.0, -2.0]);
    assert_eq!(t.scale, [1.0, 1.0, 1.0]);
}

fn body(handle: u64) -> RigidBodySettings {
    RigidBodySettings {
        handle,
        ..Default::default()
    }
}

fn physics_scene() -> Scene {
    let mut scene = Scene::default();
    scene.meshes.push(quad_mesh(10, "Box"));
    scene.objects.push(SceneObject {
        rigid_body: Some(body(31)),
        matrix_world: Mat4::from_translation(Vec3::new(0.0, 0.0, 2.0)),
        ..mesh_object(1, "Top", 10)
    });
    scene.objects.push(SceneObject {
        rigid_body: Some(RigidBodySettings {
            role: RigidBodyRole::Passive,
            ..body(32)
        }),
        ..mesh_object(2, "Ground", 10)
    });
    scene.objects.push(SceneObject {
        handle: 3,
        name: "Hinge".into(),
        rigid_body_constraint: Some(ConstraintSettings {
            handle: 41,
            object1: 1,
            object2: 2,
            angular_limits: [None, None, Some([-0.5, 0.5])],
            ..Default::default()
        }),
        ..Default::default()
    });
    scene
}

#[test]
fn test_rigid_bodies_and_constraint() {
    let doc = export_scene(&physics_scene(), &ExportConfig::default())
        .expect("Export failed")
        .document;

    assert_eq!(doc.rigid_bodies.len(), 2);
    assert_eq!(doc.rigid_bodies[0].id, "rb31");
    assert_eq!(doc.rigid_bodies[0].kind, RigidBodyType::Dynamic);
    assert_eq!(doc.rigid_bodies[1].kind, RigidBodyType::Static);
    assert!(doc.relations_from("rb31").any(|r| r.ref2 == "ob1"));
    assert!(doc.relations_from("rb32").any(|r| r.ref2 == "ob2"));

    assert_eq!(doc.constraints.len(), 1);
    let constraint = &doc.constraints[0];
    assert_eq!(constraint.id, "rc41");
    assert_eq!(constraint.a_ref, "rb31");
    assert_eq!(constraint.b_ref, "rb32");
    let generic = constraint.generic.as_ref().expect("Generic constraint without limits");
    assert_eq!(generic.pivot_b, [0.0, 2.0, 0.0]);
    // source Z limits land on the Y axis
    assert_eq!(generic.upper_angular_limit[1], 0.5);
    assert_eq!(generic.lower_angular_limit[1], -0.5);
    doc.check().expect("Document has defects");
}

#[test]
fn test_constraint_on_hidden_body_is_skipped() {
    let mut scene = physics_scene();
    scene.objects[1].hidden = true;

    let outcome = export_scene(&scene, &ExportConfig::default()).expect("Export failed");
    assert_eq!(outcome.document.rigid_bodies.len(), 1);
    assert!(outcome.document.constraints.is_empty());
    assert_eq!(outcome.report.skipped.len(), 1);
    assert_eq!(outcome.report.skipped[0].entity, "rc41");
    outcome.document.check().expect("Document has defects");
}

fn collider_scene() -> Scene {
    let mut scene = Scene::default();
    scene.meshes.push(quad_mesh(10, "Ground"));
    scene.objects.push(SceneObject {
        matrix_world: Mat4::from_translation(Vec3::new(0.0, 0.0, -1.0)),
        collision: Some(CollisionSettings {
            friction: 0.4,
            stickiness: 0.1,
            kill_particles: true,
            ..Default::default()
        }),
        ..mesh_object(7, "Ground", 10)
    });
    scene
}

#[test]
fn test_collision_plane_export() {
    let outcome = export_scene(&collider_scene(), &ExportConfig::default()).expect("Export failed");
    let doc = &outcome.document;
    assert!(outcome.report.is_clean());

    assert_eq!(doc.collision_planes.len(), 1);
    let plane = &doc.collision_planes[0];
    assert_eq!(plane.id, "cp7");
    assert_eq!(plane.name, "Ground");
    assert_eq!(plane.point, [0.0, -1.0, -0.0]);
    assert_eq!(plane.normal, [0.0, 1.0, -0.0]);
    assert_eq!(plane.friction, 0.4);
    assert!(plane.kill_particles);
    assert!(doc.relations_from("cp7").any(|r| r.ref2 == "ob7"));
    // the collider is still an ordinary object with its mesh
    assert_eq!(doc.objects.len(), 1);
    assert_eq!(doc.meshes.len(), 1);
    doc.check().expect("Document has defects");

    let bytes = format::encode(doc, 6).expect("Encode failed");
    assert_eq!(&format::decode(&bytes).expect("Decode failed"), doc);
}

#[test]
fn test_collision_plane_is_exported_once() {
    let scene = collider_scene();
    let exporter = Exporter::new(ExportConfig::default());
    let registry = IdentityRegistry::new();

    let first = exporter.export_with(&scene, &registry).expect("First export failed");
    assert_eq!(first.document.collision_planes.len(), 1);
    let second = exporter.export_with(&scene, &registry).expect("Second export failed");
    assert!(second.document.collision_planes.is_empty());
    assert!(second.document.relations_from("cp7").any(|r| r.ref2 == "ob7"));
}

#[test]
fn test_collision_on_non_mesh_object_is_ignored() {
    let mut scene = Scene::default();
    scene.objects.push(SceneObject {
        handle: 3,
        name: "Empty".into(),
        collision: Some(CollisionSettings::default()),
        ..Default::default()
    });
    let outcome = export_scene(&scene, &ExportConfig::default()).expect("Export failed");
    assert!(outcome.document.collision_planes.is_empty());
    assert!(outcome.report.is_clean());
}

#[test]
fn test_speaker_with_packed_sound() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut scene = Scene::default();
    scene.sounds.push(SoundData {
        handle: 61,
        name: "hum.ogg".into(),
        filepath: None,
        packed: Some(b"OggS".to_vec()),
    });
    scene.speakers.push(SpeakerData {
        handle: 60,
        name: "SpeakerData".into(),
        sound: Some(61),
        volume: 0.8,
        ..Default::default()
    });
    for handle in [1, 2] {
        scene.objects.push(SceneObject {
            handle,
            name: format!("Speaker.{}", handle),
            data: ObjectData::Speaker(60),
            ..Default::default()
        });
    }

    let config = ExportConfig {
        assets_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    let outcome = export_scene(&scene, &config).expect("Export failed");
    let doc = &outcome.document;

    assert_eq!(doc.speakers.len(), 1, "shared speaker data is exported once");
    let speaker = &doc.speakers[0];
    assert_eq!(speaker.id, "sp60");
    assert_eq!(speaker.name, "Speaker.1");
    assert_eq!(speaker.rpath, "Sounds/hum.ogg");
    assert_eq!(speaker.volume, 0.8);
    assert_eq!(doc.relations_from("sp60").count(), 2);

    assert_eq!(outcome.report.assets_written, 1);
    let bytes = std::fs::read(dir.path().join("Sounds/hum.ogg")).expect("Sound not written");
    assert_eq!(bytes, b"OggS");
}

#[test]
fn test_missing_material_keeps_placeholder() {
    let mut scene = Scene::default();
    scene.meshes.push(quad_mesh(10, "Quad"));
    scene.objects.push(SceneObject {
        material_slots: vec![Some(404)],
        ..mesh_object(1, "Quad", 10)
    });

    let outcome = export_scene(&scene, &ExportConfig::default()).expect("Export failed");
    let doc = &outcome.document;
    assert_eq!(doc.materials.len(), 1);
    assert_eq!(doc.materials[0].id, "ma404");
    assert!(doc.materials[0].mat_id.is_empty());
    assert!(doc.relations_from("ma404").any(|r| r.ref2 == "me10_0"));
    assert_eq!(outcome.report.skipped.len(), 1);
    doc.check().expect("Document has defects");
}
