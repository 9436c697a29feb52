//! Forest consistency checks.
//!
//! Diagnostics only: a report lists what is wrong, it never aborts a build.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::forest::Forest;
use crate::domain::model::CodeGraph;
use crate::domain::resolver::ResolverWarning;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Tree root is not a method of the graph
    MissingRoot,
    /// Relation or path endpoint is not a method of the graph
    DanglingMethod,
    /// Relation or path names a tree that does not exist
    UnknownTree,
    /// A method entered the same tree twice
    DuplicateChild,
    /// Relation parent was never visited in its tree
    OrphanParent,
    /// Relation beyond the depth ceiling or its tree's own depth, or not
    /// one below its parent
    DepthExceeded,
    /// Tree counters disagree with its relations or paths
    RelationCountMismatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub tree_id: Option<String>,
    pub method_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    /// Graph methods that belong to no tree
    pub orphan_node_count: usize,
    pub resolver_warnings: Vec<ResolverWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count_by_kind(&self) -> BTreeMap<IssueKind, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn with_resolver_warnings(mut self, warnings: Vec<ResolverWarning>) -> Self {
        self.resolver_warnings = warnings;
        self
    }

    fn push(&mut self, kind: IssueKind, tree_id: &str, method_id: Option<&str>, message: String) {
        self.issues.push(ValidationIssue {
            kind,
            tree_id: Some(tree_id.to_string()),
            method_id: method_id.map(str::to_string),
            message,
        });
    }
}

/// Check `forest` against `graph` and against the `max_depth` it was built with.
pub fn validate_forest(graph: &CodeGraph, forest: &Forest, max_depth: usize) -> ValidationReport {
    let mut report = ValidationReport::default();
    let trees: HashMap<&str, _> = forest.trees.iter().map(|t| (t.id.as_str(), t)).collect();

    // Depth of every visited node, per tree.
    let mut visited: HashMap<&str, HashMap<&str, usize>> = HashMap::new();
    for tree in &forest.trees {
        if !graph.contains_method(&tree.root_method_id) {
            report.push(
                IssueKind::MissingRoot,
                &tree.id,
                Some(tree.root_method_id.as_str()),
                format!("root {} is not in the graph", tree.root_method_id),
            );
        }
        visited
            .entry(tree.id.as_str())
            .or_default()
            .insert(tree.root_method_id.as_str(), 0);
    }

    for relation in &forest.relations {
        let tree_id = relation.tree_id.as_str();
        let Some(tree) = trees.get(tree_id) else {
            report.push(
                IssueKind::UnknownTree,
                tree_id,
                Some(relation.child_method_id.as_str()),
                format!("relation {} names unknown tree", relation.id),
            );
            continue;
        };
        for endpoint in [&relation.parent_method_id, &relation.child_method_id] {
            if !graph.contains_method(endpoint) {
                report.push(
                    IssueKind::DanglingMethod,
                    tree_id,
                    Some(endpoint.as_str()),
                    format!("relation {} references unknown method", relation.id),
                );
            }
        }
        if relation.depth > max_depth {
            report.push(
                IssueKind::DepthExceeded,
                tree_id,
                Some(relation.child_method_id.as_str()),
                format!("depth {} exceeds ceiling {}", relation.depth, max_depth),
            );
        } else if relation.depth > tree.max_depth {
            report.push(
                IssueKind::DepthExceeded,
                tree_id,
                Some(relation.child_method_id.as_str()),
                format!("depth {} exceeds tree depth {}", relation.depth, tree.max_depth),
            );
        }
        let nodes = visited.entry(tree_id).or_default();
        if nodes.insert(relation.child_method_id.as_str(), relation.depth).is_some() {
            report.push(
                IssueKind::DuplicateChild,
                tree_id,
                Some(relation.child_method_id.as_str()),
                "method entered the tree more than once".to_string(),
            );
        }
    }

    // Parents are checked once every child of the tree is known.
    for relation in &forest.relations {
        let Some(nodes) = visited.get(relation.tree_id.as_str()) else {
            continue;
        };
        match nodes.get(relation.parent_method_id.as_str()) {
            None => report.push(
                IssueKind::OrphanParent,
                &relation.tree_id,
                Some(relation.parent_method_id.as_str()),
                format!("parent of relation {} was never visited", relation.id),
            ),
            Some(parent_depth) if parent_depth + 1 != relation.depth => report.push(
                IssueKind::DepthExceeded,
                &relation.tree_id,
                Some(relation.child_method_id.as_str()),
                format!("child at depth {} under parent at depth {}", relation.depth, parent_depth),
            ),
            Some(_) => {}
        }
    }

    for path in &forest.core_paths {
        if !trees.contains_key(path.tree_id.as_str()) {
            report.push(
                IssueKind::UnknownTree,
                &path.tree_id,
                Some(path.from_method_id.as_str()),
                format!("core path {} names unknown tree", path.id),
            );
        } else if !graph.contains_method(&path.from_method_id) {
            report.push(
                IssueKind::DanglingMethod,
                &path.tree_id,
                Some(path.from_method_id.as_str()),
                format!("core path {} starts at unknown method", path.id),
            );
        }
    }

    let mut path_counts: HashMap<&str, usize> = HashMap::new();
    for path in &forest.core_paths {
        *path_counts.entry(path.tree_id.as_str()).or_insert(0) += 1;
    }
    for tree in &forest.trees {
        let nodes = visited.get(tree.id.as_str()).map(HashMap::len).unwrap_or(0);
        let paths = path_counts.get(tree.id.as_str()).copied().unwrap_or(0);
        if nodes != tree.node_count || paths != tree.path_count {
            report.push(
                IssueKind::RelationCountMismatch,
                &tree.id,
                None,
                format!(
                    "tree reports {} nodes / {} paths, found {} / {}",
                    tree.node_count, tree.path_count, nodes, paths
                ),
            );
        }
    }

    let members: HashSet<&str> = visited.values().flat_map(|n| n.keys().copied()).collect();
    report.orphan_node_count = graph.methods().filter(|m| !members.contains(m.id.as_str())).count();

    if !report.is_valid() {
        warn!("[Validation] {} forest issues found", report.issues.len());
    }
    report
}
