//! Stable identities and dirty tracking for source entities.
//!
//! Every source entity is known by a [`SourceKey`] (its runtime handle plus
//! the class of entity). The registry turns keys into identity strings and
//! remembers, per key, whether the entity still needs to be exported.
//!
//! The dirty map is shared by every exporter in a run. It sits behind a
//! `parking_lot::Mutex` so extraction work running on other threads can
//! query it; each query is a single read-modify-write under the lock.

use std::collections::{HashMap, HashSet};
use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Class of a source entity. Part of the runtime identity: the same handle
/// value may be used by entities of different classes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityClass {
    Object,
    Mesh,
    Material,
    Light,
    Armature,
    Bone,
    Action,
    RigidBody,
    Constraint,
    Speaker,
    Sound,
    Image,
    CollisionPlane,
}

impl EntityClass {
    /// Identity prefix. Prefixes are distinct and contain no digits, which
    /// keeps `prefix + handle` injective.
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Object => "ob",
            Self::Mesh => "me",
            Self::Material => "ma",
            Self::Light => "la",
            Self::Armature => "ar",
            Self::Bone => "bo",
            Self::Action => "ac",
            Self::RigidBody => "rb",
            Self::Constraint => "rc",
            Self::Speaker => "sp",
            Self::Sound => "so",
            Self::Image => "im",
            Self::CollisionPlane => "cp",
        }
    }
}

/// Runtime identity of a source entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub class: EntityClass,
    pub handle: u64,
}

impl SourceKey {
    #[inline]
    pub const fn new(class: EntityClass, handle: u64) -> Self {
        Self { class, handle }
    }

    pub const fn object(handle: u64) -> Self {
        Self::new(EntityClass::Object, handle)
    }

    pub const fn mesh(handle: u64) -> Self {
        Self::new(EntityClass::Mesh, handle)
    }

    pub const fn material(handle: u64) -> Self {
        Self::new(EntityClass::Material, handle)
    }

    pub const fn action(handle: u64) -> Self {
        Self::new(EntityClass::Action, handle)
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.class, self.handle)
    }
}

/// Owner of a claimed identity string.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Owner {
    Source(SourceKey),
    Derived(String),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Source(key) => write!(f, "{}", key),
            Owner::Derived(tag) => write!(f, "derived '{}'", tag),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// Memoized identity strings.
    ids: HashMap<SourceKey, String>,
    /// Reverse map used for collision detection.
    owners: HashMap<String, Owner>,
    /// Dirty flags; absent means "never observed" (dirty).
    modified: HashMap<SourceKey, bool>,
    /// Identities that landed in a finished document.
    exported: HashSet<String>,
}

/// Identity and dirty-flag registry for one export run.
#[derive(Default)]
pub struct IdentityRegistry {
    state: Mutex<RegistryState>,
}

impl IdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity string of a source entity.
    ///
    /// Deterministic and memoized; fails only if the string was already
    /// claimed by a different owner.
    pub fn id_of(&self, key: SourceKey) -> Result<String> {
        let mut state = self.state.lock();
        if let Some(id) = state.ids.get(&key) {
            return Ok(id.clone());
        }

        let id = format!("{}{}", key.class.prefix(), key.handle);
        Self::claim_locked(&mut state, &id, Owner::Source(key))?;
        state.ids.insert(key, id.clone());
        Ok(id)
    }

    /// Register an identity derived from another one (mesh parts, parameter
    /// blocks, scene-level singletons).
    ///
    /// Claiming the same string again with the same `tag` is a no-op.
    pub fn claim(&self, id: &str, tag: &str) -> Result<()> {
        let mut state = self.state.lock();
        Self::claim_locked(&mut state, id, Owner::Derived(tag.to_string()))
    }

    fn claim_locked(state: &mut RegistryState, id: &str, owner: Owner) -> Result<()> {
        if !is_well_formed(id) {
            return Err(Error::MalformedIdentity(id.to_string()));
        }
        match state.owners.get(id) {
            Some(existing) if *existing != owner => Err(Error::IdentityCollision {
                id: id.to_string(),
                first: existing.to_string(),
                second: owner.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                state.owners.insert(id.to_string(), owner);
                Ok(())
            }
        }
    }

    /// Returns whether the entity needs to be exported and marks it clean.
    ///
    /// The first query for a key reports `true`; later queries report
    /// `false` until [`mark_dirty`](Self::mark_dirty) is called.
    pub fn need_update(&self, key: SourceKey) -> bool {
        let mut state = self.state.lock();
        let previous = state.modified.insert(key, false);
        previous.unwrap_or(true)
    }

    /// Flag an entity so the next [`need_update`](Self::need_update) reports `true`.
    pub fn mark_dirty(&self, key: SourceKey) {
        self.state.lock().modified.insert(key, true);
    }

    /// Whether the entity has been observed in this run.
    pub fn is_known(&self, key: SourceKey) -> bool {
        self.state.lock().modified.contains_key(&key)
    }

    /// Remember identities written by a finished run.
    pub fn record_exported<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        state.exported.extend(ids.into_iter().map(Into::into));
    }

    /// Identities present in some earlier document of this registry.
    ///
    /// A claimed identity whose entity failed to export is not listed.
    pub fn exported_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().exported.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of identity strings handed out (source and derived).
    pub fn len(&self) -> usize {
        self.state.lock().owners.len()
    }

    /// Check if no identity was handed out yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Syntactic identity check: non-empty, printable ASCII, no whitespace.
pub fn is_well_formed(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_graphic())
}
