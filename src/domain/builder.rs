//! Call-Tree Builder
//!
//! Grows one tree per root with a bounded breadth-first traversal. Trees for
//! different roots are independent and may be built in parallel; the only
//! shared state is the set of roots already claimed and the id generator.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use dashmap::DashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::classifier::infer_domain_from_name;
use crate::domain::entry_point::EntryPoint;
use crate::domain::forest::{BuildStats, CallTree, Convergence, CorePath, Forest, TreeRelation};
use crate::domain::ids::{ContentHashIds, IdGenerator, IdKind};
use crate::domain::layer::{BusinessDomain, LayerType};
use crate::domain::model::CodeGraph;
use crate::domain::resolver::ImplementationIndex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Depth ceiling; nodes at this depth are not expanded.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Build trees for different roots on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    /// Layers never expanded into a tree.
    #[serde(default = "default_prune_layers")]
    pub prune_layers: Vec<LayerType>,
    /// Trees with fewer visited nodes are abandoned.
    #[serde(default = "default_min_tree_nodes")]
    pub min_tree_nodes: usize,
    /// Call edges below this confidence are not followed.
    #[serde(default)]
    pub min_edge_confidence: f64,
}

fn default_max_depth() -> usize {
    10
}

fn default_parallel() -> bool {
    true
}

fn default_prune_layers() -> Vec<LayerType> {
    vec![LayerType::Utility, LayerType::Configuration, LayerType::DataHolder]
}

fn default_min_tree_nodes() -> usize {
    1
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            parallel: default_parallel(),
            prune_layers: default_prune_layers(),
            min_tree_nodes: default_min_tree_nodes(),
            min_edge_confidence: 0.0,
        }
    }
}

/// Per-node traversal state inside one tree.
struct Visit {
    depth: usize,
    parent: Option<String>,
    children: usize,
}

/// Everything one root produced.
struct TreeBuild {
    tree: CallTree,
    relations: Vec<TreeRelation>,
    core_paths: Vec<CorePath>,
    pruned: usize,
}

enum TreeOutcome {
    Built(TreeBuild),
    Duplicate,
    Abandoned,
}

/// Read-only inputs shared by every tree of one build.
struct BuildContext<'a> {
    graph: &'a CodeGraph,
    implementations: &'a ImplementationIndex,
    roots: HashSet<&'a str>,
    claimed: DashSet<String>,
}

pub struct TreeBuilder {
    config: BuildConfig,
    ids: Arc<dyn IdGenerator>,
}

impl TreeBuilder {
    pub fn new(config: BuildConfig, ids: Arc<dyn IdGenerator>) -> Self {
        Self { config, ids }
    }

    /// Build one tree per distinct root.
    pub fn build(
        &self,
        graph: &CodeGraph,
        implementations: &ImplementationIndex,
        roots: &[EntryPoint],
    ) -> Forest {
        let ctx = BuildContext {
            graph,
            implementations,
            roots: roots.iter().map(|r| r.method_id.as_str()).collect(),
            claimed: DashSet::new(),
        };

        let outcomes: Vec<TreeOutcome> = if self.config.parallel {
            roots.par_iter().map(|root| self.build_tree(&ctx, root)).collect()
        } else {
            roots.iter().map(|root| self.build_tree(&ctx, root)).collect()
        };

        let mut stats = BuildStats {
            roots_considered: roots.len(),
            ..BuildStats::default()
        };
        let mut builds = Vec::new();
        for outcome in outcomes {
            match outcome {
                TreeOutcome::Built(build) => builds.push(build),
                TreeOutcome::Duplicate => stats.duplicate_roots += 1,
                TreeOutcome::Abandoned => stats.abandoned_roots += 1,
            }
        }
        builds.sort_by(|a, b| a.tree.root_method_id.cmp(&b.tree.root_method_id));

        let mut forest = Forest::default();
        for build in builds {
            stats.trees_built += 1;
            stats.truncations += build.tree.truncated_count;
            stats.cycles_skipped += build.tree.cycle_count;
            stats.convergences += build.tree.cross_node_count;
            stats.pruned_successors += build.pruned;
            forest.relations.extend(build.relations);
            forest.core_paths.extend(build.core_paths);
            forest.trees.push(build.tree);
        }
        forest.stats = stats;

        info!(
            "[TreeBuilder] Built {} trees ({} relations, {} core paths) from {} roots",
            forest.trees.len(),
            forest.relations.len(),
            forest.core_paths.len(),
            roots.len()
        );
        forest
    }

    fn build_tree(&self, ctx: &BuildContext<'_>, root: &EntryPoint) -> TreeOutcome {
        if !ctx.claimed.insert(root.method_id.clone()) {
            return TreeOutcome::Duplicate;
        }
        let Some(root_method) = ctx.graph.method(&root.method_id) else {
            info!("[TreeBuilder] Root {} is not in the graph, skipping", root.method_id);
            return TreeOutcome::Abandoned;
        };

        let root_id = root_method.id.as_str();
        let tree_id = self.ids.next_id(IdKind::Tree, &[root_id]);

        let mut visited: HashMap<String, Visit> = HashMap::new();
        visited.insert(
            root_id.to_string(),
            Visit {
                depth: 0,
                parent: None,
                children: 0,
            },
        );
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(root_id.to_string());

        let mut relations = Vec::new();
        let mut core_paths = Vec::new();
        let mut convergences = Vec::new();
        let mut truncated = 0;
        let mut cycles = 0;
        let mut pruned = 0;

        while let Some(current) = queue.pop_front() {
            let depth = visited[&current].depth;
            let successors = self.successors(ctx, &current);

            if depth >= self.config.max_depth {
                // Only successors the tree has not reached yet are lost.
                let cut_off = successors
                    .iter()
                    .any(|s| !visited.contains_key(s) && self.admits(ctx, s));
                if cut_off {
                    truncated += 1;
                    debug!("[TreeBuilder] Depth ceiling reached at {} in {}", current, tree_id);
                }
                continue;
            }

            for next in successors {
                if !self.admits(ctx, &next) {
                    pruned += 1;
                    continue;
                }
                if visited.contains_key(&next) {
                    if is_on_path(&visited, &current, &next) {
                        cycles += 1;
                    } else {
                        convergences.push(Convergence {
                            from_method_id: current.clone(),
                            to_method_id: next.clone(),
                        });
                    }
                    continue;
                }

                let ordinal = match visited.get_mut(&current) {
                    Some(parent) => {
                        parent.children += 1;
                        parent.children - 1
                    }
                    None => 0,
                };
                visited.insert(
                    next.clone(),
                    Visit {
                        depth: depth + 1,
                        parent: Some(current.clone()),
                        children: 0,
                    },
                );

                relations.push(TreeRelation {
                    id: self.ids.next_id(IdKind::Relation, &[&tree_id, &current, &next]),
                    tree_id: tree_id.clone(),
                    parent_method_id: current.clone(),
                    child_method_id: next.clone(),
                    depth: depth + 1,
                    ordinal,
                });
                let chain = path_to_root(&visited, &next);
                core_paths.push(self.core_path(ctx.graph, &tree_id, root_id, chain));
                queue.push_back(next);
            }
        }

        if visited.len() < self.config.min_tree_nodes {
            info!(
                "[TreeBuilder] Root {} reached {} nodes, below minimum of {}",
                root_id,
                visited.len(),
                self.config.min_tree_nodes
            );
            return TreeOutcome::Abandoned;
        }

        let business_domain = match ctx.graph.domain_of(root_id) {
            BusinessDomain::Unknown => infer_domain_from_name(&root_method.name),
            domain => domain,
        };

        let tree = CallTree {
            id: tree_id,
            root_method_id: root_id.to_string(),
            business_domain,
            max_depth: relations.iter().map(|r| r.depth).max().unwrap_or(0),
            node_count: visited.len(),
            cross_node_count: convergences.len(),
            path_count: core_paths.len(),
            truncated_count: truncated,
            cycle_count: cycles,
            convergences,
        };
        debug!(
            "[TreeBuilder] {} rooted at {}: {} nodes, depth {}",
            tree.id, tree.root_method_id, tree.node_count, tree.max_depth
        );

        TreeOutcome::Built(TreeBuild {
            tree,
            relations,
            core_paths,
            pruned,
        })
    }

    /// Call targets of `method_id` followed by resolved implementations,
    /// without duplicates.
    fn successors(&self, ctx: &BuildContext<'_>, method_id: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let targets = ctx
            .graph
            .outgoing(method_id)
            .filter(|e| e.confidence >= self.config.min_edge_confidence)
            .map(|e| e.to.as_str())
            .chain(ctx.implementations.implementations(method_id).iter().map(String::as_str));
        for target in targets {
            if seen.insert(target) {
                out.push(target.to_string());
            }
        }
        out
    }

    /// Edge admission: known business method, expandable layer, not a root.
    fn admits(&self, ctx: &BuildContext<'_>, method_id: &str) -> bool {
        let Some(method) = ctx.graph.method(method_id) else {
            return false;
        };
        let Some(class) = ctx.graph.class(&method.class_id) else {
            return false;
        };
        method.is_business_method()
            && !self.config.prune_layers.contains(&class.layer)
            && !ctx.roots.contains(method_id)
    }

    fn core_path(
        &self,
        graph: &CodeGraph,
        tree_id: &str,
        root_id: &str,
        nodes: Vec<String>,
    ) -> CorePath {
        let from = nodes.last().cloned().unwrap_or_default();
        let layers: Vec<LayerType> = nodes.iter().map(|n| graph.layer_of(n)).collect();
        let layer_weight: f64 = layers.iter().map(|l| l.method_base_weight()).sum();
        let domain_priority = nodes
            .iter()
            .map(|n| graph.domain_of(n).priority())
            .max()
            .unwrap_or(0);
        let layer_crossings = layers.windows(2).filter(|w| w[0] != w[1]).count();

        CorePath {
            id: self.ids.next_id(IdKind::CorePath, &[tree_id, &from]),
            tree_id: tree_id.to_string(),
            from_method_id: from,
            root_method_id: root_id.to_string(),
            path_length: nodes.len().saturating_sub(1),
            layer_weight,
            weight: layer_weight + domain_priority as f64 * 0.5,
            layer_crossings,
            nodes,
        }
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new(BuildConfig::default(), Arc::new(ContentHashIds))
    }
}

/// True if `target` is `current` or one of its ancestors.
fn is_on_path(visited: &HashMap<String, Visit>, current: &str, target: &str) -> bool {
    let mut cursor = Some(current);
    while let Some(id) = cursor {
        if id == target {
            return true;
        }
        cursor = visited.get(id).and_then(|v| v.parent.as_deref());
    }
    false
}

/// Parent chain of `node`, root first.
fn path_to_root(visited: &HashMap<String, Visit>, node: &str) -> Vec<String> {
    let mut chain = vec![node.to_string()];
    let mut cursor = visited.get(node).and_then(|v| v.parent.as_deref());
    while let Some(id) = cursor {
        chain.push(id.to_string());
        cursor = visited.get(id).and_then(|v| v.parent.as_deref());
    }
    chain.reverse();
    chain
}
