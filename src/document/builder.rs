//! Append-only construction of a [`Document`].

use std::collections::HashSet;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::{Document, Entity, Relation};
use crate::core::is_well_formed;
use crate::util::{Error, Result};

/// How relation defects are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Log malformed or dangling relations and keep going.
    #[default]
    Permissive,
    /// Treat malformed or dangling relations as errors.
    Strict,
}

/// Typed index into one of the document's collections.
pub struct Handle<E> {
    index: usize,
    _marker: PhantomData<fn() -> E>,
}

impl<E> Handle<E> {
    /// Position of the entity in its collection.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<E> Clone for Handle<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Handle<E> {}

impl<E> std::fmt::Debug for Handle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// The only way to add entities and relations to a document.
///
/// Nothing is ever removed. Entity ids are unique across all collections.
pub struct DocumentBuilder {
    doc: Document,
    ids: HashSet<String>,
    /// Ids of entities living in an earlier document; valid relation targets.
    external: HashSet<String>,
    strictness: Strictness,
}

impl DocumentBuilder {
    pub fn new(strictness: Strictness) -> Self {
        Self {
            doc: Document::default(),
            ids: HashSet::new(),
            external: HashSet::new(),
            strictness,
        }
    }

    /// Accept `ids` as relation endpoints without adding them to this document.
    pub fn assume_present(&mut self, ids: impl IntoIterator<Item = String>) {
        self.external.extend(ids);
    }

    pub fn strictness(&self) -> Strictness {
        self.strictness
    }

    /// Append an entity to its collection.
    ///
    /// Fails if the entity (or one of its nested entities) reuses an id
    /// already present in the document.
    pub fn add<E: Entity>(&mut self, entity: E) -> Result<Handle<E>> {
        let mut new_ids = Vec::with_capacity(1);
        new_ids.push(entity.id().to_string());
        new_ids.extend(entity.nested_ids().into_iter().map(str::to_string));

        for id in &new_ids {
            if self.ids.contains(id) {
                return Err(Error::DuplicateEntity(id.clone()));
            }
        }
        self.ids.extend(new_ids);

        tracing::trace!(kind = E::KIND, id = entity.id(), "add entity");
        let items = E::collection_mut(&mut self.doc);
        items.push(entity);
        Ok(Handle {
            index: items.len() - 1,
            _marker: PhantomData,
        })
    }

    pub fn get<E: Entity>(&self, handle: Handle<E>) -> Option<&E> {
        E::collection(&self.doc).get(handle.index)
    }

    /// Mutable access while an entity is still being filled in.
    pub fn get_mut<E: Entity>(&mut self, handle: Handle<E>) -> Option<&mut E> {
        E::collection_mut(&mut self.doc).get_mut(handle.index)
    }

    /// Whether any entity in the document carries `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Append a structural edge.
    ///
    /// Endpoints are checked for syntax in debug builds and in strict mode.
    /// Whether they exist is checked in [`finish`](Self::finish), since the
    /// target entity is often added after its relation.
    pub fn add_relation(&mut self, ref1: impl Into<String>, ref2: impl Into<String>) -> Result<()> {
        let ref1 = ref1.into();
        let ref2 = ref2.into();

        if cfg!(debug_assertions) || self.strictness == Strictness::Strict {
            for r in [&ref1, &ref2] {
                if !is_well_formed(r) {
                    match self.strictness {
                        Strictness::Strict => return Err(Error::MalformedIdentity(r.clone())),
                        Strictness::Permissive => {
                            tracing::warn!("relation endpoint {:?} is not a well-formed identity", r)
                        }
                    }
                }
            }
        }

        tracing::debug!("add relation: '{}' to '{}'", ref1, ref2);
        self.doc.relations.push(Relation { ref1, ref2 });
        Ok(())
    }

    /// Number of relations added so far.
    pub fn relation_count(&self) -> usize {
        self.doc.relations.len()
    }

    /// Read-only view of the document under construction.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Run the relation integrity check and hand out the document.
    pub fn finish(self) -> Result<Document> {
        let mut dangling = 0usize;
        for r in &self.doc.relations {
            let known = |id: &String| self.ids.contains(id) || self.external.contains(id);
            let ok = known(&r.ref1) && known(&r.ref2);
            if ok {
                continue;
            }
            match self.strictness {
                Strictness::Strict => {
                    return Err(Error::DanglingRelation {
                        ref1: r.ref1.clone(),
                        ref2: r.ref2.clone(),
                    })
                }
                Strictness::Permissive => {
                    dangling += 1;
                    tracing::warn!("dangling relation '{}' -> '{}'", r.ref1, r.ref2);
                }
            }
        }
        if dangling > 0 {
            tracing::warn!("{} dangling relation(s) left in document", dangling);
        }
        Ok(self.doc)
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(Strictness::default())
    }
}
