//! Tree Query Service
//!
//! Read-only views over a finished forest. Lookups are indexed once when the
//! service is created; no query mutates the graph or the forest.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::forest::{CallTree, CorePath, Forest, TreeRelation};
use crate::domain::layer::{BusinessDomain, LayerType};
use crate::domain::model::CodeGraph;

/// Position of a method inside one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Root,
    /// Has children of its own in this tree
    Parent,
    DirectChild,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeMembership {
    pub tree_id: String,
    pub root_method_id: String,
    pub role: NodeRole,
    pub depth: usize,
    pub business_domain: BusinessDomain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorePathView {
    pub path_id: String,
    pub tree_id: String,
    pub root_method_id: String,
    pub from_method_id: String,
    pub nodes: Vec<String>,
    pub path_length: usize,
    pub weight: f64,
    pub layer_weight: f64,
    pub layer_crossings: usize,
}

impl From<&CorePath> for CorePathView {
    fn from(path: &CorePath) -> Self {
        Self {
            path_id: path.id.clone(),
            tree_id: path.tree_id.clone(),
            root_method_id: path.root_method_id.clone(),
            from_method_id: path.from_method_id.clone(),
            nodes: path.nodes.clone(),
            path_length: path.path_length,
            weight: path.weight,
            layer_weight: path.layer_weight,
            layer_crossings: path.layer_crossings,
        }
    }
}

/// A tree rebuilt from its flat relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeStructure {
    pub tree_id: String,
    pub root_method_id: String,
    pub business_domain: BusinessDomain,
    /// Parent -> children in sibling order
    pub adjacency: BTreeMap<String, Vec<String>>,
    /// Index is depth; the root sits alone at 0
    pub nodes_by_depth: Vec<Vec<String>>,
    pub layer_breakdown: BTreeMap<LayerType, usize>,
    pub domain_breakdown: BTreeMap<BusinessDomain, usize>,
    pub node_count: usize,
    pub max_depth: usize,
    /// Nodes of this tree that also belong to another tree
    pub shared_node_count: usize,
    pub convergence_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSummary {
    pub tree_id: String,
    pub root_method_id: String,
    pub business_domain: BusinessDomain,
    pub node_count: usize,
    pub max_depth: usize,
    pub path_count: usize,
    pub cross_node_count: usize,
}

impl From<&CallTree> for TreeSummary {
    fn from(tree: &CallTree) -> Self {
        Self {
            tree_id: tree.id.clone(),
            root_method_id: tree.root_method_id.clone(),
            business_domain: tree.business_domain,
            node_count: tree.node_count,
            max_depth: tree.max_depth,
            path_count: tree.path_count,
            cross_node_count: tree.cross_node_count,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForestOverview {
    pub tree_count: usize,
    pub relation_count: usize,
    pub core_path_count: usize,
    pub class_count: usize,
    pub method_count: usize,
    /// Methods that belong to more than one tree
    pub shared_method_count: usize,
    pub domain_distribution: BTreeMap<BusinessDomain, usize>,
    pub average_path_length: f64,
    pub max_depth: usize,
    /// Sorted by domain priority, then node count, both descending
    pub trees: Vec<TreeSummary>,
}

pub struct TreeQueryService<'a> {
    graph: &'a CodeGraph,
    forest: &'a Forest,
    trees: HashMap<&'a str, &'a CallTree>,
    /// Child method id -> relations placing it in some tree
    by_child: HashMap<&'a str, Vec<&'a TreeRelation>>,
    /// (tree id, method id) pairs where the method has children
    parents: HashSet<(&'a str, &'a str)>,
    paths_by_target: HashMap<&'a str, Vec<&'a CorePath>>,
}

impl<'a> TreeQueryService<'a> {
    pub fn new(graph: &'a CodeGraph, forest: &'a Forest) -> Self {
        let trees = forest.trees.iter().map(|t| (t.id.as_str(), t)).collect();
        let mut by_child: HashMap<&str, Vec<&TreeRelation>> = HashMap::new();
        let mut parents = HashSet::new();
        for relation in &forest.relations {
            by_child
                .entry(relation.child_method_id.as_str())
                .or_default()
                .push(relation);
            parents.insert((relation.tree_id.as_str(), relation.parent_method_id.as_str()));
        }
        let mut paths_by_target: HashMap<&str, Vec<&CorePath>> = HashMap::new();
        for path in &forest.core_paths {
            paths_by_target
                .entry(path.from_method_id.as_str())
                .or_default()
                .push(path);
        }
        Self {
            graph,
            forest,
            trees,
            by_child,
            parents,
            paths_by_target,
        }
    }

    /// Every tree containing `method_id`, ordered by root method id.
    pub fn trees_containing(&self, method_id: &str) -> Vec<TreeMembership> {
        let mut out = Vec::new();
        for tree in self.forest.trees.iter().filter(|t| t.root_method_id == method_id) {
            out.push(TreeMembership {
                tree_id: tree.id.clone(),
                root_method_id: tree.root_method_id.clone(),
                role: NodeRole::Root,
                depth: 0,
                business_domain: tree.business_domain,
            });
        }
        for relation in self.by_child.get(method_id).into_iter().flatten() {
            let Some(tree) = self.trees.get(relation.tree_id.as_str()) else {
                continue;
            };
            let role = if self.parents.contains(&(relation.tree_id.as_str(), method_id)) {
                NodeRole::Parent
            } else if relation.depth == 1 {
                NodeRole::DirectChild
            } else {
                NodeRole::Descendant
            };
            out.push(TreeMembership {
                tree_id: tree.id.clone(),
                root_method_id: tree.root_method_id.clone(),
                role,
                depth: relation.depth,
                business_domain: tree.business_domain,
            });
        }
        out.sort_by(|a, b| {
            a.root_method_id
                .cmp(&b.root_method_id)
                .then_with(|| a.tree_id.cmp(&b.tree_id))
        });
        out
    }

    /// Core paths ending at `method_id`, heaviest first.
    pub fn core_paths_of(&self, method_id: &str) -> Vec<CorePathView> {
        let mut views: Vec<CorePathView> = self
            .paths_by_target
            .get(method_id)
            .into_iter()
            .flatten()
            .map(|p| CorePathView::from(*p))
            .collect();
        views.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.root_method_id.cmp(&b.root_method_id))
        });
        views
    }

    pub fn structure_of(&self, tree_id: &str) -> Option<TreeStructure> {
        let tree = self.trees.get(tree_id)?;
        let mut relations: Vec<&TreeRelation> = self.forest.relations_of(tree_id).collect();
        relations.sort_by_key(|r| (r.depth, r.ordinal));

        let mut adjacency: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut nodes_by_depth: Vec<Vec<String>> = vec![vec![tree.root_method_id.clone()]];
        let mut nodes: Vec<&str> = vec![tree.root_method_id.as_str()];
        for relation in relations {
            adjacency
                .entry(relation.parent_method_id.clone())
                .or_default()
                .push(relation.child_method_id.clone());
            while nodes_by_depth.len() <= relation.depth {
                nodes_by_depth.push(Vec::new());
            }
            nodes_by_depth[relation.depth].push(relation.child_method_id.clone());
            nodes.push(relation.child_method_id.as_str());
        }

        let mut layer_breakdown = BTreeMap::new();
        let mut domain_breakdown = BTreeMap::new();
        let mut shared = 0;
        for node in &nodes {
            *layer_breakdown.entry(self.graph.layer_of(node)).or_insert(0) += 1;
            *domain_breakdown.entry(self.graph.domain_of(node)).or_insert(0) += 1;
            if self.graph.method(node).map(|m| m.cross_count > 1).unwrap_or(false) {
                shared += 1;
            }
        }

        Some(TreeStructure {
            tree_id: tree.id.clone(),
            root_method_id: tree.root_method_id.clone(),
            business_domain: tree.business_domain,
            adjacency,
            max_depth: nodes_by_depth.len() - 1,
            nodes_by_depth,
            layer_breakdown,
            domain_breakdown,
            node_count: nodes.len(),
            shared_node_count: shared,
            convergence_count: tree.cross_node_count,
        })
    }

    pub fn forest_overview(&self) -> ForestOverview {
        let mut domain_distribution = BTreeMap::new();
        for tree in &self.forest.trees {
            *domain_distribution.entry(tree.business_domain).or_insert(0) += 1;
        }
        let paths = &self.forest.core_paths;
        let average_path_length = if paths.is_empty() {
            0.0
        } else {
            paths.iter().map(|p| p.path_length).sum::<usize>() as f64 / paths.len() as f64
        };

        let mut trees: Vec<TreeSummary> = self.forest.trees.iter().map(TreeSummary::from).collect();
        trees.sort_by(|a, b| {
            b.business_domain
                .priority()
                .cmp(&a.business_domain.priority())
                .then_with(|| b.node_count.cmp(&a.node_count))
                .then_with(|| a.tree_id.cmp(&b.tree_id))
        });

        ForestOverview {
            tree_count: self.forest.trees.len(),
            relation_count: self.forest.relations.len(),
            core_path_count: paths.len(),
            class_count: self.graph.class_count(),
            method_count: self.graph.method_count(),
            shared_method_count: self.graph.methods().filter(|m| m.cross_count > 1).count(),
            domain_distribution,
            average_path_length,
            max_depth: self.forest.trees.iter().map(|t| t.max_depth).max().unwrap_or(0),
            trees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builder::{BuildConfig, TreeBuilder};
    use crate::domain::entry_point::RootDetector;
    use crate::domain::ids::ContentHashIds;
    use crate::domain::model::{CallEdge, ClassEntity, ClassSeed, MethodEntity, MethodSeed};
    use crate::domain::resolver::ImplementationIndex;
    use crate::domain::weight::WeightCalculator;
    use std::sync::Arc;

    /// A -> B -> C, D -> C, with A and D annotated boundary methods.
    fn scenario() -> (CodeGraph, Forest) {
        let ctl = ClassSeed::new("web.OrderController").annotated("@RestController");
        let ctl_entity = ClassEntity::from_seed(&ctl, LayerType::Entry, BusinessDomain::Order);
        let entity = |name: &str, layer| {
            ClassEntity::from_seed(&ClassSeed::new(name), layer, BusinessDomain::Order)
        };
        let svc = entity("svc.OrderService", LayerType::Service);
        let repo = entity("dao.OrderDao", LayerType::Persistence);
        let methods = vec![
            MethodEntity::from_seed(&ctl_entity.id, &MethodSeed::public("a")),
            MethodEntity::from_seed(&ctl_entity.id, &MethodSeed::public("d")),
            MethodEntity::from_seed(&svc.id, &MethodSeed::public("b")),
            MethodEntity::from_seed(&repo.id, &MethodSeed::public("c")),
        ];
        let edges = vec![
            CallEdge::new("web.OrderController#a()", "svc.OrderService#b()"),
            CallEdge::new("svc.OrderService#b()", "dao.OrderDao#c()"),
            CallEdge::new("web.OrderController#d()", "dao.OrderDao#c()"),
        ];
        let mut graph = CodeGraph::new(vec![ctl_entity, svc, repo], methods, edges);
        let roots = RootDetector::default().detect(&graph);
        let builder = TreeBuilder::new(
            BuildConfig {
                parallel: false,
                ..BuildConfig::default()
            },
            Arc::new(ContentHashIds),
        );
        let forest = builder.build(&graph, &ImplementationIndex::default(), &roots);
        WeightCalculator::new().recompute(&mut graph, &forest);
        (graph, forest)
    }

    #[test]
    fn test_trees_containing_roles() {
        let (graph, forest) = scenario();
        let queries = TreeQueryService::new(&graph, &forest);

        let c = queries.trees_containing("dao.OrderDao#c()");
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].root_method_id, "web.OrderController#a()");
        assert_eq!(c[0].role, NodeRole::Descendant);
        assert_eq!(c[0].depth, 2);
        assert_eq!(c[1].role, NodeRole::DirectChild);

        let b = queries.trees_containing("svc.OrderService#b()");
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].role, NodeRole::Parent);

        let a = queries.trees_containing("web.OrderController#a()");
        assert_eq!(a[0].role, NodeRole::Root);
        assert!(queries.trees_containing("nope#x()").is_empty());
    }

    #[test]
    fn test_core_paths_sorted_by_weight() {
        let (graph, forest) = scenario();
        let queries = TreeQueryService::new(&graph, &forest);
        let paths = queries.core_paths_of("dao.OrderDao#c()");
        assert_eq!(paths.len(), 2);
        assert!(paths[0].weight >= paths[1].weight);
        // A -> B -> C carries the extra service hop.
        assert_eq!(paths[0].root_method_id, "web.OrderController#a()");
        assert_eq!(paths[0].nodes.len(), 3);
        assert_eq!(paths[1].root_method_id, "web.OrderController#d()");
    }

    #[test]
    fn test_structure_of_tree() {
        let (graph, forest) = scenario();
        let queries = TreeQueryService::new(&graph, &forest);
        let tree_id = &queries.trees_containing("web.OrderController#a()")[0].tree_id;
        let structure = queries.structure_of(tree_id).unwrap();
        assert_eq!(structure.node_count, 3);
        assert_eq!(structure.max_depth, 2);
        assert_eq!(structure.nodes_by_depth[2], vec!["dao.OrderDao#c()"]);
        assert_eq!(structure.adjacency["svc.OrderService#b()"], vec!["dao.OrderDao#c()"]);
        assert_eq!(structure.layer_breakdown[&LayerType::Service], 1);
        assert_eq!(structure.domain_breakdown[&BusinessDomain::Order], 3);
        assert_eq!(structure.shared_node_count, 1);
        assert!(queries.structure_of("missing").is_none());
    }

    #[test]
    fn test_forest_overview() {
        let (graph, forest) = scenario();
        let overview = TreeQueryService::new(&graph, &forest).forest_overview();
        assert_eq!(overview.tree_count, 2);
        assert_eq!(overview.relation_count, 3);
        assert_eq!(overview.shared_method_count, 1);
        assert_eq!(overview.domain_distribution[&BusinessDomain::Order], 2);
        assert_eq!(overview.max_depth, 2);
        assert!((overview.average_path_length - 4.0 / 3.0).abs() < 1e-9);
        assert_eq!(overview.trees[0].node_count, 3);
    }
}
