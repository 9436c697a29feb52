use std::path::Path;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sled::Db;

use crate::domain::forest::Forest;
use crate::domain::model::{CallEdge, ClassEntity, CodeGraph, MethodEntity};
use crate::error::Result;

/// A weighted graph together with the forest built over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub classes: Vec<ClassEntity>,
    pub methods: Vec<MethodEntity>,
    pub edges: Vec<CallEdge>,
    pub forest: Forest,
}

impl ForestSnapshot {
    pub fn capture(graph: &CodeGraph, forest: &Forest) -> Self {
        Self {
            classes: graph.classes().cloned().collect(),
            methods: graph.methods().cloned().collect(),
            edges: graph.edges().to_vec(),
            forest: forest.clone(),
        }
    }

    /// Rebuild the graph indexes and hand back graph and forest.
    pub fn restore(self) -> (CodeGraph, Forest) {
        (CodeGraph::new(self.classes, self.methods, self.edges), self.forest)
    }
}

/// Trait for snapshot storage backends.
/// Implementations must be thread-safe (Send + Sync).
pub trait ForestStore: Send + Sync {
    fn save(&self, name: &str, snapshot: &ForestSnapshot) -> Result<()>;
    fn load(&self, name: &str) -> Result<Option<ForestSnapshot>>;
    fn remove(&self, name: &str) -> Result<bool>;
    /// Stored snapshot names, sorted.
    fn names(&self) -> Result<Vec<String>>;
}

// ============================================================================
// MemoryForestStore - in-process storage using DashMap
// ============================================================================

#[derive(Default)]
pub struct MemoryForestStore {
    snapshots: DashMap<String, ForestSnapshot>,
}

impl ForestStore for MemoryForestStore {
    fn save(&self, name: &str, snapshot: &ForestSnapshot) -> Result<()> {
        self.snapshots.insert(name.to_string(), snapshot.clone());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<ForestSnapshot>> {
        Ok(self.snapshots.get(name).map(|r| r.clone()))
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.snapshots.remove(name).is_some())
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.snapshots.iter().map(|r| r.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}

// ============================================================================
// DiskForestStore - persistent storage using sled + bincode
// ============================================================================

pub struct DiskForestStore {
    db: Db,
    snapshots: sled::Tree,
}

impl DiskForestStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let snapshots = db.open_tree("snapshots")?;
        Ok(Self { db, snapshots })
    }
}

impl ForestStore for DiskForestStore {
    fn save(&self, name: &str, snapshot: &ForestSnapshot) -> Result<()> {
        let bytes = bincode::serialize(snapshot)?;
        self.snapshots.insert(name.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<ForestSnapshot>> {
        match self.snapshots.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let removed = self.snapshots.remove(name.as_bytes())?.is_some();
        self.db.flush()?;
        Ok(removed)
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for key in self.snapshots.iter().keys() {
            names.push(String::from_utf8_lossy(&key?).into_owned());
        }
        Ok(names)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::forest::{CallTree, TreeRelation};
    use crate::domain::layer::{BusinessDomain, LayerType};
    use crate::domain::model::{ClassSeed, MethodSeed};
    use tempfile::tempdir;

    fn sample_snapshot() -> ForestSnapshot {
        let class = ClassEntity::from_seed(
            &ClassSeed::new("shop.OrderService"),
            LayerType::Service,
            BusinessDomain::Order,
        );
        let methods = vec![
            MethodEntity::from_seed(&class.id, &MethodSeed::public("place")),
            MethodEntity::from_seed(&class.id, &MethodSeed::public("audit")),
        ];
        let edges = vec![CallEdge::new("shop.OrderService#place()", "shop.OrderService#audit()")];
        let graph = CodeGraph::new(vec![class], methods, edges);
        let forest = Forest {
            trees: vec![CallTree {
                id: "tree-1".to_string(),
                root_method_id: "shop.OrderService#place()".to_string(),
                business_domain: BusinessDomain::Order,
                max_depth: 1,
                node_count: 2,
                cross_node_count: 0,
                path_count: 0,
                truncated_count: 0,
                cycle_count: 0,
                convergences: Vec::new(),
            }],
            relations: vec![TreeRelation {
                id: "rel-1".to_string(),
                tree_id: "tree-1".to_string(),
                parent_method_id: "shop.OrderService#place()".to_string(),
                child_method_id: "shop.OrderService#audit()".to_string(),
                depth: 1,
                ordinal: 0,
            }],
            ..Forest::default()
        };
        ForestSnapshot::capture(&graph, &forest)
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryForestStore::default();
        store.save("main", &sample_snapshot()).unwrap();

        let loaded = store.load("main").unwrap();
        assert_eq!(loaded, Some(sample_snapshot()));
        assert!(store.load("missing").unwrap().is_none());
        assert_eq!(store.names().unwrap(), vec!["main"]);
        assert!(store.remove("main").unwrap());
        assert!(!store.remove("main").unwrap());
    }

    #[test]
    fn test_disk_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DiskForestStore::open(dir.path()).unwrap();
            store.save("nightly", &sample_snapshot()).unwrap();
        }
        let store = DiskForestStore::open(dir.path()).unwrap();
        let loaded = store.load("nightly").unwrap().unwrap();
        assert_eq!(loaded.forest.trees.len(), 1);
        assert_eq!(store.names().unwrap(), vec!["nightly"]);

        let (graph, forest) = loaded.restore();
        assert_eq!(graph.out_degree("shop.OrderService#place()"), 1);
        assert_eq!(forest.relations[0].child_method_id, "shop.OrderService#audit()");
    }
}
