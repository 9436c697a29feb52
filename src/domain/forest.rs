//! Forest Data Structure
//!
//! Call trees, their parent/child relations and the core paths from every
//! visited node back to its root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::layer::BusinessDomain;

/// One rooted spanning structure over the methods reachable from an entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTree {
    pub id: String,
    pub root_method_id: String,
    pub business_domain: BusinessDomain,
    /// Deepest relation depth in this tree
    pub max_depth: usize,
    /// Visited methods, root included
    pub node_count: usize,
    /// Times an already visited node was reached again from elsewhere in the tree
    pub cross_node_count: usize,
    pub path_count: usize,
    /// Nodes at the depth ceiling that still had admissible successors
    pub truncated_count: usize,
    /// Edges skipped because they pointed back into the current path
    pub cycle_count: usize,
    pub convergences: Vec<Convergence>,
}

/// An edge that reached an already visited node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Convergence {
    pub from_method_id: String,
    pub to_method_id: String,
}

/// A parent -> child edge inside exactly one tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRelation {
    pub id: String,
    pub tree_id: String,
    pub parent_method_id: String,
    pub child_method_id: String,
    /// Depth of the child; the root sits at 0
    pub depth: usize,
    /// Position among the parent's children
    pub ordinal: usize,
}

/// The parent chain from a visited node back to its tree's root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorePath {
    pub id: String,
    pub tree_id: String,
    pub from_method_id: String,
    pub root_method_id: String,
    /// Root first, `from_method_id` last
    pub nodes: Vec<String>,
    /// Hops between root and target
    pub path_length: usize,
    /// Sum of per-node layer weights
    pub layer_weight: f64,
    /// Layer weight plus the business-domain contribution
    pub weight: f64,
    /// Hops whose endpoints sit in different layers
    pub layer_crossings: usize,
}

/// Counters collected while building a forest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub roots_considered: usize,
    pub trees_built: usize,
    /// Roots missing from the graph or yielding too small a tree
    pub abandoned_roots: usize,
    /// Roots already claimed by an earlier tree
    pub duplicate_roots: usize,
    pub truncations: usize,
    pub cycles_skipped: usize,
    pub convergences: usize,
    /// Successors refused by edge admission
    pub pruned_successors: usize,
}

/// Every tree produced by one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    pub trees: Vec<CallTree>,
    pub relations: Vec<TreeRelation>,
    pub core_paths: Vec<CorePath>,
    pub stats: BuildStats,
}

impl Forest {
    pub fn tree(&self, tree_id: &str) -> Option<&CallTree> {
        self.trees.iter().find(|t| t.id == tree_id)
    }

    pub fn relations_of<'a>(
        &'a self,
        tree_id: &'a str,
    ) -> impl Iterator<Item = &'a TreeRelation> + 'a {
        self.relations.iter().filter(move |r| r.tree_id == tree_id)
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Methods of one tree grouped by depth, root at index 0.
    pub fn nodes_by_depth<'a>(&'a self, tree_id: &'a str) -> Vec<Vec<&'a str>> {
        let Some(tree) = self.tree(tree_id) else {
            return Vec::new();
        };
        let mut layers: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        layers.entry(0).or_default().push(tree.root_method_id.as_str());
        for relation in self.relations_of(tree_id) {
            layers
                .entry(relation.depth)
                .or_default()
                .push(relation.child_method_id.as_str());
        }
        layers.into_values().collect()
    }
}
