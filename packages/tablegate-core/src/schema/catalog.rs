//! Process-wide schema catalog.
//!
//! The catalog is loaded once and published through an [`ArcSwap`], so
//! request handlers read it without taking locks. A reload replaces the
//! whole snapshot atomically; in-flight requests keep the snapshot they
//! started with.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::entity::EntitySchema;
use super::CatalogError;

/// Source of per-entity metadata.
pub trait SchemaCatalog: Send + Sync {
    /// Resolves an entity by name or REST path alias.
    fn get_schema(&self, name_or_path: &str) -> Option<Arc<EntitySchema>>;
}

/// Immutable set of entities indexed by name and REST path.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    entities: HashMap<String, Arc<EntitySchema>>,
    paths: HashMap<String, String>,
}

impl CatalogSnapshot {
    /// Builds a snapshot, rejecting duplicate names and path collisions.
    pub fn new(entities: Vec<EntitySchema>) -> Result<Self, CatalogError> {
        let mut snapshot = Self::default();
        for entity in entities {
            let name = entity.name().to_string();
            if snapshot.entities.contains_key(&name) || snapshot.paths.contains_key(&name) {
                return Err(CatalogError::DuplicateEntity(name));
            }
            if let Some(path) = entity.rest_path() {
                if path != name
                    && (snapshot.paths.contains_key(path) || snapshot.entities.contains_key(path))
                {
                    return Err(CatalogError::DuplicateEntity(path.to_string()));
                }
                snapshot.paths.insert(path.to_string(), name.clone());
            }
            snapshot.entities.insert(name, Arc::new(entity));
        }
        Ok(snapshot)
    }

    pub fn get(&self, name_or_path: &str) -> Option<Arc<EntitySchema>> {
        self.entities
            .get(name_or_path)
            .or_else(|| {
                self.paths
                    .get(name_or_path)
                    .and_then(|name| self.entities.get(name))
            })
            .cloned()
    }

    /// Iterates all entities in unspecified order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntitySchema>> + '_ {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Lock-free, swappable catalog.
#[derive(Debug)]
pub struct Catalog {
    snapshot: ArcSwap<CatalogSnapshot>,
}

impl Catalog {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Convenience constructor from a list of entities.
    pub fn from_entities(entities: Vec<EntitySchema>) -> Result<Self, CatalogError> {
        Ok(Self::new(CatalogSnapshot::new(entities)?))
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    /// Atomically publishes a new snapshot.
    pub fn replace(&self, snapshot: CatalogSnapshot) {
        tracing::info!("Publishing catalog snapshot with {} entities", snapshot.len());
        self.snapshot.store(Arc::new(snapshot));
    }
}

impl SchemaCatalog for Catalog {
    fn get_schema(&self, name_or_path: &str) -> Option<Arc<EntitySchema>> {
        self.snapshot.load().get(name_or_path)
    }
}
