//! Output document: typed entity collections plus one flat relation list.
//!
//! Structure that the source scene expressed through nesting (parenting,
//! ownership, bone hierarchies) is expressed here as `(ref1, ref2)` identity
//! pairs. Consumers rebuild it by relation lookups.

mod builder;
mod entities;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

pub use builder::{DocumentBuilder, Handle, Strictness};
pub use entities::*;

/// The flattened, serializable export result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub objects: Vec<TObject>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub lights: Vec<Light>,
    pub skeletons: Vec<Skeleton>,
    pub animations: Vec<AnimationKf>,
    pub rigid_bodies: Vec<RigidBody>,
    pub constraints: Vec<Constraint>,
    pub speakers: Vec<Speaker>,
    pub custom_params: Vec<CustomParams>,
    pub force_fields: Vec<ForceField>,
    pub collision_planes: Vec<CollisionPlane>,
    pub relations: Vec<Relation>,
}

/// An entity type stored in one of the document's collections.
pub trait Entity: Sized {
    /// Collection name, for logs and summaries.
    const KIND: &'static str;

    fn id(&self) -> &str;

    /// Ids of entities nested inside this one (bones of a skeleton).
    fn nested_ids(&self) -> Vec<&str> {
        Vec::new()
    }

    fn collection(doc: &Document) -> &Vec<Self>;

    fn collection_mut(doc: &mut Document) -> &mut Vec<Self>;
}

macro_rules! impl_entity {
    ($ty:ty, $field:ident, $kind:literal) => {
        impl Entity for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn collection(doc: &Document) -> &Vec<Self> {
                &doc.$field
            }

            fn collection_mut(doc: &mut Document) -> &mut Vec<Self> {
                &mut doc.$field
            }
        }
    };
}

impl_entity!(TObject, objects, "object");
impl_entity!(Mesh, meshes, "mesh");
impl_entity!(Material, materials, "material");
impl_entity!(Light, lights, "light");
impl_entity!(AnimationKf, animations, "animation");
impl_entity!(RigidBody, rigid_bodies, "rigid body");
impl_entity!(Constraint, constraints, "constraint");
impl_entity!(Speaker, speakers, "speaker");
impl_entity!(CustomParams, custom_params, "custom params");
impl_entity!(ForceField, force_fields, "force field");
impl_entity!(CollisionPlane, collision_planes, "collision plane");

impl Entity for Skeleton {
    const KIND: &'static str = "skeleton";

    fn id(&self) -> &str {
        &self.id
    }

    fn nested_ids(&self) -> Vec<&str> {
        self.bones.iter().map(|b| b.id.as_str()).collect()
    }

    fn collection(doc: &Document) -> &Vec<Self> {
        &doc.skeletons
    }

    fn collection_mut(doc: &mut Document) -> &mut Vec<Self> {
        &mut doc.skeletons
    }
}

fn push_ids<'a, E: Entity>(items: &'a [E], out: &mut HashSet<&'a str>) {
    for item in items {
        out.insert(item.id());
        out.extend(item.nested_ids());
    }
}

impl Document {
    /// Every entity id in the document, nested bone ids included.
    pub fn ids(&self) -> HashSet<&str> {
        let mut out = HashSet::new();
        push_ids(&self.objects, &mut out);
        push_ids(&self.meshes, &mut out);
        push_ids(&self.materials, &mut out);
        push_ids(&self.lights, &mut out);
        push_ids(&self.skeletons, &mut out);
        push_ids(&self.animations, &mut out);
        push_ids(&self.rigid_bodies, &mut out);
        push_ids(&self.constraints, &mut out);
        push_ids(&self.speakers, &mut out);
        push_ids(&self.custom_params, &mut out);
        push_ids(&self.force_fields, &mut out);
        push_ids(&self.collision_planes, &mut out);
        out
    }

    /// Relations whose endpoints are not entity ids of this document.
    pub fn dangling_relations(&self) -> Vec<&Relation> {
        let ids = self.ids();
        self.relations
            .iter()
            .filter(|r| !ids.contains(r.ref1.as_str()) || !ids.contains(r.ref2.as_str()))
            .collect()
    }

    /// Relations with `id` as first endpoint.
    pub fn relations_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.ref1 == id)
    }

    /// Relations with `id` as second endpoint.
    pub fn relations_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.ref2 == id)
    }

    /// Total number of top-level entities.
    pub fn entity_count(&self) -> usize {
        self.objects.len()
            + self.meshes.len()
            + self.materials.len()
            + self.lights.len()
            + self.skeletons.len()
            + self.animations.len()
            + self.rigid_bodies.len()
            + self.constraints.len()
            + self.speakers.len()
            + self.custom_params.len()
            + self.force_fields.len()
            + self.collision_planes.len()
    }

    /// Describe every invariant violation: dangling relations, duplicate ids,
    /// inconsistent mesh arrays and unordered clips.
    pub fn defects(&self) -> Vec<String> {
        let mut out = Vec::new();

        for r in self.dangling_relations() {
            out.push(format!("dangling relation '{}' -> '{}'", r.ref1, r.ref2));
        }

        let mut seen = HashSet::new();
        let mut all_ids: Vec<&str> = Vec::new();
        macro_rules! collect {
            ($($field:ident),*) => {
                $(
                    for item in &self.$field {
                        all_ids.push(item.id());
                        all_ids.extend(item.nested_ids());
                    }
                )*
            };
        }
        collect!(
            objects, meshes, materials, lights, skeletons, animations, rigid_bodies,
            constraints, speakers, custom_params, force_fields, collision_planes
        );
        for id in all_ids {
            if !seen.insert(id) {
                out.push(format!("duplicate entity id '{}'", id));
            }
        }

        for mesh in &self.meshes {
            out.extend(mesh.defects());
        }
        for anim in &self.animations {
            for clip in &anim.clips {
                out.extend(clip.defects(&anim.id));
            }
        }
        out
    }

    /// Fail with the first defect found by [`defects`](Self::defects).
    pub fn check(&self) -> Result<()> {
        match self.defects().into_iter().next() {
            Some(defect) => Err(Error::invalid(defect)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: &str) -> TObject {
        TObject {
            id: id.to_string(),
            name: id.to_string(),
            transform: Transform::default(),
        }
    }

    #[test]
    fn test_ids_include_bones() {
        let mut doc = Document::default();
        doc.skeletons.push(Skeleton {
            id: "ar1".into(),
            name: "rig".into(),
            bones: vec![Bone {
                id: "bo1".into(),
                name: "root".into(),
                transform: Transform::default(),
            }],
        });
        let ids = doc.ids();
        assert!(ids.contains("ar1"));
        assert!(ids.contains("bo1"));
    }

    #[test]
    fn test_dangling_and_duplicates() {
        let mut doc = Document::default();
        doc.objects.push(object("ob1"));
        doc.objects.push(object("ob1"));
        doc.relations.push(Relation { ref1: "ob1".into(), ref2: "ob9".into() });

        assert_eq!(doc.dangling_relations().len(), 1);
        let defects = doc.defects();
        assert!(defects.iter().any(|d| d.contains("dangling")));
        assert!(defects.iter().any(|d| d.contains("duplicate")));
        assert!(doc.check().is_err());
    }

    #[test]
    fn test_relation_lookup() {
        let mut doc = Document::default();
        doc.objects.push(object("ob1"));
        doc.objects.push(object("ob2"));
        doc.relations.push(Relation { ref1: "ob1".into(), ref2: "ob2".into() });
        assert_eq!(doc.relations_from("ob1").count(), 1);
        assert_eq!(doc.relations_to("ob2").count(), 1);
        assert_eq!(doc.relations_to("ob1").count(), 0);
        assert!(doc.check().is_ok());
    }
}
