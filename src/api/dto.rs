use serde::{Deserialize, Serialize};

use crate::domain::layer::{BusinessDomain, LayerType};
use crate::domain::model::CodeGraph;
use crate::domain::query::CorePathView;

#[derive(Debug, Deserialize)]
pub struct CommandReq {
    pub command: String,
    pub params: Option<serde_json::Value>,
}

/// Where a LOAD request takes its forest from. Exactly one of
/// `inventory` or `snapshot` must be given; `snapshot` also needs `store`.
#[derive(Debug, Default, Deserialize)]
pub struct LoadParams {
    pub inventory: Option<String>,
    pub store: Option<String>,
    pub snapshot: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MethodParams {
    pub method: String,
}

#[derive(Debug, Deserialize)]
pub struct TreeParams {
    pub tree: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadSummary {
    pub source: String,
    pub class_count: usize,
    pub method_count: usize,
    pub tree_count: usize,
    pub relation_count: usize,
}

/// One node of a core path, with the facts a viewer shows next to it.
#[derive(Debug, Serialize, Deserialize)]
pub struct PathNodeDto {
    pub id: String,
    pub label: String,
    pub layer: LayerType,
    pub domain: BusinessDomain,
    pub weight: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CorePathDto {
    pub tree_id: String,
    pub root_method_id: String,
    pub weight: f64,
    pub layer_crossings: usize,
    pub nodes: Vec<PathNodeDto>,
}

impl CorePathDto {
    pub fn from_view(view: &CorePathView, graph: &CodeGraph) -> Self {
        let nodes = view
            .nodes
            .iter()
            .map(|id| {
                let method = graph.method(id);
                let label = match (method, graph.class_of(id)) {
                    (Some(m), Some(c)) => format!("{}.{}", c.simple_name, m.name),
                    _ => id.clone(),
                };
                PathNodeDto {
                    id: id.clone(),
                    label,
                    layer: graph.layer_of(id),
                    domain: graph.domain_of(id),
                    weight: method.map(|m| m.weight).unwrap_or(0.0),
                }
            })
            .collect();
        Self {
            tree_id: view.tree_id.clone(),
            root_method_id: view.root_method_id.clone(),
            weight: view.weight,
            layer_crossings: view.layer_crossings,
            nodes,
        }
    }
}
