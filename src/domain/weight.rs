//! Cross-Count & Weight Calculator
//!
//! Re-derives tree membership and importance scores from a finished forest.
//! Every run overwrites `cross_count`, `weight`, `tree_ids` and `is_root_node`
//! from scratch, so running it twice on the same graph gives the same values.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::forest::Forest;
use crate::domain::model::{CodeGraph, MethodEntity};
use crate::domain::naming;

const ROOT_BONUS: f64 = 15.0;
const TOP_METHODS: usize = 10;

const MUTATING_VERBS: &[&str] = &[
    "create", "save", "update", "delete", "remove", "insert", "add", "place", "submit", "cancel",
    "pay", "refund", "register", "modify", "persist", "store", "transfer", "charge", "deduct",
];

const WORKFLOW_VERBS: &[&str] = &[
    "process", "handle", "execute", "run", "apply", "approve", "confirm", "dispatch", "sync",
    "complete", "publish", "notify", "send", "schedule", "start", "finish", "checkout",
];

const QUERY_VERBS: &[&str] = &[
    "find", "get", "list", "search", "query", "count", "load", "fetch", "select", "exists", "check",
    "read", "lookup",
];

/// Keyword bucket of a method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameBucket {
    Mutating,
    Workflow,
    Query,
    Accessor,
    Other,
}

impl NameBucket {
    pub fn of(method: &MethodEntity) -> Self {
        if method.is_accessor() {
            return NameBucket::Accessor;
        }
        let starts =
            |verbs: &[&str]| verbs.iter().any(|v| naming::has_verb_prefix(&method.name, v));
        if starts(MUTATING_VERBS) {
            NameBucket::Mutating
        } else if starts(WORKFLOW_VERBS) {
            NameBucket::Workflow
        } else if starts(QUERY_VERBS) {
            NameBucket::Query
        } else {
            NameBucket::Other
        }
    }

    pub fn bonus(&self) -> f64 {
        match self {
            NameBucket::Mutating => 3.0,
            NameBucket::Workflow => 2.5,
            NameBucket::Query => 1.5,
            NameBucket::Accessor => 0.5,
            NameBucket::Other => 1.0,
        }
    }
}

/// Stepped bonus for methods: 0, 1, 2, 3-4, 5+ trees.
pub fn method_cross_bonus(cross_count: usize) -> f64 {
    match cross_count {
        0 => 0.0,
        1 => 5.0,
        2 => 10.0,
        3 | 4 => 15.0,
        _ => 20.0,
    }
}

/// Same steps as [`method_cross_bonus`], larger constants.
pub fn class_cross_bonus(cross_count: usize) -> f64 {
    match cross_count {
        0 => 0.0,
        1 => 8.0,
        2 => 15.0,
        3 | 4 => 22.0,
        _ => 30.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedMethod {
    pub method_id: String,
    pub weight: f64,
    pub cross_count: usize,
}

/// Aggregate result of one recompute pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSummary {
    pub method_count: usize,
    pub class_count: usize,
    pub root_count: usize,
    /// Methods present in more than one tree
    pub cross_node_count: usize,
    pub max_method_weight: f64,
    pub mean_method_weight: f64,
    pub max_class_weight: f64,
    pub mean_class_weight: f64,
    pub top_methods: Vec<WeightedMethod>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WeightCalculator;

impl WeightCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn recompute(&self, graph: &mut CodeGraph, forest: &Forest) -> WeightSummary {
        let (memberships, roots) = tree_memberships(forest);

        // Methods first; class weights read the finished method weights.
        let method_ids: Vec<String> = graph.methods().map(|m| m.id.clone()).collect();
        for id in &method_ids {
            let tree_ids = memberships.get(id).cloned().unwrap_or_default();
            let is_root = roots.contains(id.as_str());
            let weight = match graph.method(id) {
                Some(method) => self.method_weight(graph, method, tree_ids.len(), is_root),
                None => continue,
            };
            if let Some(method) = graph.method_mut(id) {
                method.cross_count = tree_ids.len();
                method.tree_ids = tree_ids;
                method.is_root_node = is_root;
                method.weight = weight;
            }
        }

        let inherited: HashSet<String> = inheritance_targets(graph);
        let class_ids: Vec<String> = graph.classes().map(|c| c.id.clone()).collect();
        for id in &class_ids {
            let Some(class) = graph.class(id) else { continue };
            let mut trees: BTreeSet<&str> = BTreeSet::new();
            let mut method_weights = Vec::new();
            for method in graph.methods_of(class) {
                trees.extend(method.tree_ids.iter().map(String::as_str));
                method_weights.push(method.weight);
            }
            let cross_count = trees.len();
            let mean_method = mean(&method_weights);
            let participates = class.super_type.is_some()
                || !class.interfaces.is_empty()
                || inherited.contains(id);

            let mut weight = class.layer.class_base_weight()
                + class_cross_bonus(cross_count)
                + class.business_domain.priority() as f64
                + 0.3 * mean_method;
            if participates {
                weight += 3.0;
            }
            if let Some(class) = graph.class_mut(id) {
                class.cross_count = cross_count;
                class.weight = weight.max(0.0);
            }
        }

        let summary = summarize(graph);
        info!(
            "[Weights] {} methods, {} classes, {} cross nodes, max method weight {:.2}",
            summary.method_count,
            summary.class_count,
            summary.cross_node_count,
            summary.max_method_weight
        );
        summary
    }

    pub fn method_weight(
        &self,
        graph: &CodeGraph,
        method: &MethodEntity,
        cross_count: usize,
        is_root: bool,
    ) -> f64 {
        let mut weight = graph.layer_of(&method.id).method_base_weight();
        weight += method_cross_bonus(cross_count);
        weight += graph.domain_of(&method.id).priority() as f64 * 0.5;

        if method.is_public() {
            weight += 2.0;
        }
        if method.is_static {
            weight += 1.0;
        }
        if method.is_abstract {
            weight += 1.5;
        }
        if method.is_constructor {
            weight -= 1.0;
        }

        let degree = graph.in_degree(&method.id) + graph.out_degree(&method.id);
        weight += 0.5 * (degree as f64).sqrt();
        if is_root {
            weight += ROOT_BONUS;
        }
        weight += NameBucket::of(method).bonus();
        weight.max(0.0)
    }
}

/// Method id -> ids of trees it takes part in, plus the set of root ids.
pub fn tree_memberships(forest: &Forest) -> (BTreeMap<String, BTreeSet<String>>, HashSet<&str>) {
    let mut memberships: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut roots = HashSet::new();
    for tree in &forest.trees {
        memberships
            .entry(tree.root_method_id.clone())
            .or_default()
            .insert(tree.id.clone());
        roots.insert(tree.root_method_id.as_str());
    }
    for relation in &forest.relations {
        for node in [&relation.parent_method_id, &relation.child_method_id] {
            memberships
                .entry(node.clone())
                .or_default()
                .insert(relation.tree_id.clone());
        }
    }
    (memberships, roots)
}

/// Classes named as a supertype or interface by some other class.
fn inheritance_targets(graph: &CodeGraph) -> HashSet<String> {
    let mut targets = HashSet::new();
    for class in graph.classes() {
        for name in class.super_type.iter().chain(class.interfaces.iter()) {
            if let Some(target) = graph.find_class(name) {
                targets.insert(target.id.clone());
            }
        }
    }
    targets
}

fn summarize(graph: &CodeGraph) -> WeightSummary {
    let method_weights: Vec<f64> = graph.methods().map(|m| m.weight).collect();
    let class_weights: Vec<f64> = graph.classes().map(|c| c.weight).collect();

    let mut top: Vec<WeightedMethod> = graph
        .methods()
        .map(|m| WeightedMethod {
            method_id: m.id.clone(),
            weight: m.weight,
            cross_count: m.cross_count,
        })
        .collect();
    top.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.method_id.cmp(&b.method_id))
    });
    top.truncate(TOP_METHODS);

    WeightSummary {
        method_count: graph.method_count(),
        class_count: graph.class_count(),
        root_count: graph.methods().filter(|m| m.is_root_node).count(),
        cross_node_count: graph.methods().filter(|m| m.cross_count > 1).count(),
        max_method_weight: method_weights.iter().copied().fold(0.0, f64::max),
        mean_method_weight: mean(&method_weights),
        max_class_weight: class_weights.iter().copied().fold(0.0, f64::max),
        mean_class_weight: mean(&class_weights),
        top_methods: top,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
