//! Rigid bodies, constraints and particle collision planes.

use super::{missing, ExportRun};
use crate::core::{EntityClass, SourceKey};
use crate::document::{CollisionPlane, Constraint, GenericConstraint, RigidBody, RigidBodyType};
use crate::scene::{
    CollisionSettings, ConstraintKind, ConstraintSettings, MeshData, ObjectData, RigidBodyRole,
    RigidBodySettings, SceneObject,
};
use crate::util::{decompose, zup_to_yup_scale, zup_to_yup_translation, zup_to_yup_vector, Error, Result};
use glam::Vec3;

/// Collision layer flags packed into a bit mask; layers past 32 are dropped.
fn collision_bits(groups: &[bool]) -> u32 {
    groups
        .iter()
        .take(32)
        .enumerate()
        .filter(|(_, on)| **on)
        .fold(0u32, |bits, (i, _)| bits | (1 << i))
}

pub fn convert_rigid_body(id: String, settings: &RigidBodySettings) -> RigidBody {
    let kind = if settings.role == RigidBodyRole::Passive || !settings.enabled {
        RigidBodyType::Static
    } else {
        RigidBodyType::Dynamic
    };
    let group = collision_bits(&settings.collision_groups);
    RigidBody {
        id,
        kind,
        mass: settings.mass,
        is_kinematic: settings.kinematic,
        friction: settings.friction,
        restitution: settings.restitution,
        margin: if settings.use_margin { settings.collision_margin } else { 0.0 },
        linear_damping: settings.linear_damping,
        angular_damping: settings.angular_damping,
        angular_factor: [1.0; 3],
        linear_factor: [1.0; 3],
        shape: settings.collision_shape,
        collision_group: group,
        collision_mask: group,
    }
}

/// Per-axis `[lower, upper]` limits to Y-up `(upper, lower)` vectors.
///
/// Unlimited axes span the whole real line. The source Y axis becomes the
/// negated Z axis, so its bounds swap roles.
fn limits(axes: &[Option<[f32; 2]>; 3]) -> ([f32; 3], [f32; 3]) {
    let [lx, ly, lz] = axes.map(|a| a.map_or(f32::NEG_INFINITY, |[lower, _]| lower));
    let [ux, uy, uz] = axes.map(|a| a.map_or(f32::INFINITY, |[_, upper]| upper));
    ([ux, uz, -ly], [lx, lz, -uy])
}

pub fn convert_generic(settings: &ConstraintSettings, o1_world: Vec3, o2_world: Vec3) -> GenericConstraint {
    let (upper_linear_limit, lower_linear_limit) = limits(&settings.linear_limits);
    let (upper_angular_limit, lower_angular_limit) = limits(&settings.angular_limits);
    GenericConstraint {
        pivot_a: [0.0; 3],
        pivot_b: zup_to_yup_vector(o1_world - o2_world),
        disable_collisions: settings.disable_collisions,
        upper_linear_limit,
        lower_linear_limit,
        upper_angular_limit,
        lower_angular_limit,
    }
}

/// Geometric normal of the first non-degenerate face, in mesh space.
fn face_normal(mesh: &MeshData) -> Option<Vec3> {
    mesh.triangles.iter().find_map(|tri| {
        let [a, b, c] = tri.vertices.map(|v| mesh.positions.get(v as usize).copied());
        let (a, b, c) = (a?, b?, c?);
        (b - a).cross(c - a).try_normalize()
    })
}

/// Plane through the object origin, oriented by the first face of its mesh.
///
/// Extents are the bounding box of the mesh scaled by the world scale.
pub fn convert_collision_plane(
    id: String,
    obj: &SceneObject,
    mesh: &MeshData,
    settings: &CollisionSettings,
) -> Result<CollisionPlane> {
    let normal = face_normal(mesh).ok_or_else(|| {
        Error::invalid(format!("collision mesh '{}' has no face to take a normal from", mesh.name))
    })?;
    let (translation, rotation, scale) = decompose(&obj.matrix_world);
    let normal = (rotation * normal).normalize();

    let (min, max) = mesh
        .positions
        .iter()
        .fold((Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)), |(lo, hi), p| {
            (lo.min(*p), hi.max(*p))
        });
    let extents = (max - min) * scale.abs();

    Ok(CollisionPlane {
        id,
        name: obj.name.clone(),
        point: zup_to_yup_translation(translation),
        normal: zup_to_yup_vector(normal),
        extents: zup_to_yup_scale(extents),
        damping: settings.damping,
        damping_randomness: settings.damping_random,
        friction: settings.friction,
        friction_randomness: settings.friction_random,
        stickiness: settings.stickiness,
        permeability: settings.permeability,
        kill_particles: settings.kill_particles,
    })
}

impl ExportRun<'_> {
    /// One plane per exportable mesh object with collision settings.
    pub(super) fn export_collision_planes(&mut self) -> Result<()> {
        for obj in self.exportable_objects() {
            let Some(settings) = &obj.collision else {
                continue;
            };
            let ObjectData::Mesh(handle) = obj.data else {
                tracing::debug!("object '{}': collision settings on a non-mesh object", obj.name);
                continue;
            };
            let key = SourceKey::new(EntityClass::CollisionPlane, obj.handle);
            let id = self.registry.id_of(key)?;
            let object_id = self.registry.id_of(SourceKey::object(obj.handle))?;

            if self.registry.need_update(key) {
                let plane = match self.scene.mesh(handle) {
                    Some(mesh) => convert_collision_plane(id.clone(), obj, mesh, settings),
                    None => Err(missing("mesh", handle)),
                };
                match self.recover(&id, plane)? {
                    Some(plane) => {
                        self.builder.add(plane)?;
                    }
                    None => {
                        self.registry.mark_dirty(key);
                        continue;
                    }
                }
            }
            self.relate(&id, &object_id)?;
        }
        Ok(())
    }

    pub(super) fn export_physics(&mut self) -> Result<()> {
        for obj in self.exportable_objects() {
            if let Some(settings) = &obj.rigid_body {
                let key = SourceKey::new(EntityClass::RigidBody, settings.handle);
                let id = self.registry.id_of(key)?;
                let object_id = self.registry.id_of(SourceKey::object(obj.handle))?;
                if self.registry.need_update(key) {
                    self.builder.add(convert_rigid_body(id.clone(), settings))?;
                }
                self.relate(&id, &object_id)?;
            }
            if let Some(settings) = &obj.rigid_body_constraint {
                let key = SourceKey::new(EntityClass::Constraint, settings.handle);
                let id = self.registry.id_of(key)?;
                if self.registry.need_update(key) {
                    let constraint = self.constraint(obj, id.clone(), settings);
                    match self.recover(&id, constraint)? {
                        Some(constraint) => {
                            self.builder.add(constraint)?;
                        }
                        None => self.registry.mark_dirty(key),
                    }
                }
            }
        }
        Ok(())
    }

    /// Rigid body id of a constrained object.
    fn body_ref(&self, handle: u64) -> Result<(&SceneObject, String)> {
        let scene = self.scene;
        let obj = scene.object(handle).ok_or_else(|| missing("object", handle))?;
        if !self.is_exportable(obj) {
            return Err(Error::invalid(format!("constrained object '{}' is not exported", obj.name)));
        }
        let body = obj.rigid_body.as_ref().ok_or_else(|| {
            Error::invalid(format!("constrained object '{}' has no rigid body", obj.name))
        })?;
        let id = self.registry.id_of(SourceKey::new(EntityClass::RigidBody, body.handle))?;
        Ok((obj, id))
    }

    fn constraint(&self, owner: &SceneObject, id: String, settings: &ConstraintSettings) -> Result<Constraint> {
        let (o1, a_ref) = self.body_ref(settings.object1)?;
        let (o2, b_ref) = self.body_ref(settings.object2)?;
        let generic = match &settings.kind {
            ConstraintKind::Generic => Some(convert_generic(
                settings,
                o1.matrix_world.w_axis.truncate(),
                o2.matrix_world.w_axis.truncate(),
            )),
            ConstraintKind::Other(kind) => {
                tracing::warn!("constraint on '{}': type '{}' exported without limits", owner.name, kind);
                None
            }
        };
        Ok(Constraint { id, a_ref, b_ref, generic })
    }
}
