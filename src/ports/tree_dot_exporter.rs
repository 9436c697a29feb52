//! Tree DOT Exporter
//!
//! Exports one call tree as Graphviz DOT, nodes colored by layer and ranked
//! by depth. Convergence edges are drawn dashed.

use std::io::Write;

use crate::application::ForestAnalysis;
use crate::domain::forest::Forest;
use crate::domain::layer::LayerType;
use crate::domain::model::CodeGraph;
use crate::error::{ForestError, Result};
use crate::ports::ForestExporter;

#[derive(Debug, Clone, Default)]
pub struct TreeDotExporter {
    /// Tree to draw; the heaviest tree of the overview when unset.
    pub tree_id: Option<String>,
}

impl TreeDotExporter {
    pub fn for_tree(tree_id: &str) -> Self {
        Self {
            tree_id: Some(tree_id.to_string()),
        }
    }

    /// Convert one tree to a DOT string.
    pub fn to_dot(graph: &CodeGraph, forest: &Forest, tree_id: &str) -> Option<String> {
        let tree = forest.tree(tree_id)?;
        let mut lines = Vec::new();

        lines.push("digraph CallTree {".to_string());
        lines.push("    rankdir=TB;".to_string());
        lines.push("    nodesep=0.6;".to_string());
        lines.push("    ranksep=0.9;".to_string());
        lines.push(
            "    node [fontname=\"Helvetica\", fontsize=12, shape=box, style=\"filled,rounded\"];"
                .to_string(),
        );
        lines.push("    edge [fontname=\"Helvetica\", fontsize=10];".to_string());
        lines.push(format!("    label=\"{}\";", Self::escape_label(&tree.root_method_id)));
        lines.push("".to_string());

        let layers = forest.nodes_by_depth(tree_id);
        for node in layers.iter().flatten() {
            let layer = graph.layer_of(node);
            let (fill, border) = Self::layer_colors(layer);
            let label = match graph.method(node) {
                Some(m) => format!(
                    "{}.{}\\nweight {:.1} | trees {}",
                    graph.class(&m.class_id).map(|c| c.simple_name.as_str()).unwrap_or(""),
                    m.name,
                    m.weight,
                    m.cross_count
                ),
                None => Self::escape_label(node),
            };
            lines.push(format!(
                "    \"{}\" [label=\"{}\", fillcolor=\"{}\", color=\"{}\"];",
                Self::escape_label(node),
                label,
                fill,
                border
            ));
        }

        lines.push("".to_string());

        for relation in forest.relations_of(tree_id) {
            lines.push(format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];",
                Self::escape_label(&relation.parent_method_id),
                Self::escape_label(&relation.child_method_id),
                relation.ordinal + 1
            ));
        }
        for convergence in &tree.convergences {
            lines.push(format!(
                "    \"{}\" -> \"{}\" [style=dashed, color=\"#6c7086\"];",
                Self::escape_label(&convergence.from_method_id),
                Self::escape_label(&convergence.to_method_id)
            ));
        }

        for layer in &layers {
            let node_ids: Vec<String> = layer
                .iter()
                .map(|n| format!("\"{}\"", Self::escape_label(n)))
                .collect();
            lines.push(format!("    {{ rank=same; {} }}", node_ids.join("; ")));
        }

        lines.push("}".to_string());
        Some(lines.join("\n"))
    }

    fn layer_colors(layer: LayerType) -> (&'static str, &'static str) {
        match layer {
            LayerType::Entry => ("#a6e3a1", "#40a02b"),       // Green
            LayerType::Service => ("#89b4fa", "#1e66f5"),     // Blue
            LayerType::Persistence => ("#f9e2af", "#df8e1d"), // Yellow
            LayerType::Mapping => ("#fab387", "#fe640b"),
            LayerType::Component => ("#cba6f7", "#8839ef"),   // Purple
            LayerType::Configuration | LayerType::Utility | LayerType::DataHolder => {
                ("#bac2de", "#7c7f93")
            }
            LayerType::Unknown => ("#6c7086", "#5c5f77"),     // Gray
        }
    }

    fn escape_label(label: &str) -> String {
        label
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    }
}

impl ForestExporter for TreeDotExporter {
    fn export(&self, analysis: &ForestAnalysis, out: &mut dyn Write) -> Result<()> {
        let tree_id = match &self.tree_id {
            Some(id) => id.clone(),
            None => match analysis.queries().forest_overview().trees.first() {
                Some(summary) => summary.tree_id.clone(),
                None => return Ok(()),
            },
        };
        let dot = Self::to_dot(&analysis.graph, &analysis.forest, &tree_id).ok_or_else(|| {
            ForestError::Config {
                message: format!("no tree with id {}", tree_id),
                field: Some("tree_id".to_string()),
            }
        })?;
        out.write_all(dot.as_bytes())
            .map_err(|e| ForestError::io("cannot write DOT output", e))
    }
}
