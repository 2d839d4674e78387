//! Re-associating recorded paths with live entities after a reload

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::host::{CapabilityKind, CombatEntity, FlagEntity, SequenceController, World};

/// A live entity found by path
#[derive(Clone)]
pub enum EntityRef {
    Combat(Arc<dyn CombatEntity>),
    Flag(Arc<dyn FlagEntity>),
    Sequence(Arc<dyn SequenceController>),
}

impl EntityRef {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            EntityRef::Combat(_) => CapabilityKind::Health,
            EntityRef::Flag(_) => CapabilityKind::PersistentFlag,
            EntityRef::Sequence(_) => CapabilityKind::Sequence,
        }
    }

    pub fn path(&self) -> String {
        match self {
            EntityRef::Combat(e) => e.path(),
            EntityRef::Flag(e) => e.path(),
            EntityRef::Sequence(e) => e.path(),
        }
    }

    pub fn into_combat(self) -> Option<Arc<dyn CombatEntity>> {
        match self {
            EntityRef::Combat(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_sequence(self) -> Option<Arc<dyn SequenceController>> {
        match self {
            EntityRef::Sequence(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .finish()
    }
}

/// A recorded path that no longer matches any live entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveMiss {
    pub kind: CapabilityKind,
    pub path: String,
}

impl fmt::Display for ResolveMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} entity {}", self.kind, self.path)
    }
}

/// Path lookup over the live entities of one container.
///
/// Each capability kind is enumerated once, on first use, and indexed by
/// exact path. When two live entities share a path the first one wins.
pub struct EntityResolver<'a> {
    world: &'a dyn World,
    index: HashMap<CapabilityKind, HashMap<String, EntityRef>>,
}

impl<'a> EntityResolver<'a> {
    pub fn new(world: &'a dyn World) -> Self {
        Self {
            world,
            index: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, kind: CapabilityKind, path: &str) -> Option<EntityRef> {
        let world = self.world;
        let by_path = self.index.entry(kind).or_insert_with(|| {
            let mut by_path = HashMap::new();
            for entity in enumerate(world, kind) {
                by_path.entry(entity.path()).or_insert(entity);
            }
            by_path
        });
        by_path.get(path).cloned()
    }

    /// Resolve or report the miss, logging it
    pub fn resolve_or_miss(
        &mut self,
        kind: CapabilityKind,
        path: &str,
    ) -> Result<EntityRef, ResolveMiss> {
        self.resolve(kind, path).ok_or_else(|| {
            tracing::info!(kind = %kind, path, "ResolveMiss: no live entity at recorded path");
            ResolveMiss {
                kind,
                path: path.to_string(),
            }
        })
    }
}

fn enumerate(world: &dyn World, kind: CapabilityKind) -> Vec<EntityRef> {
    match kind {
        CapabilityKind::Health => world
            .combat_entities()
            .into_iter()
            .map(EntityRef::Combat)
            .collect(),
        CapabilityKind::PersistentFlag => world
            .flag_entities()
            .into_iter()
            .map(EntityRef::Flag)
            .collect(),
        CapabilityKind::Sequence => world
            .sequence_controllers()
            .into_iter()
            .map(EntityRef::Sequence)
            .collect(),
    }
}
