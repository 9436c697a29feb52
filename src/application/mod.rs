//! Use cases: run the analysis stages in order over one inventory.

use std::collections::HashSet;
use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ForestConfig;
use crate::domain::builder::TreeBuilder;
use crate::domain::classifier::LayerClassifier;
use crate::domain::entry_point::{EntryPoint, RootDetector};
use crate::domain::filter::{FilterStats, NodeFilter};
use crate::domain::forest::{BuildStats, Forest};
use crate::domain::model::{CallEdge, ClassEntity, CodeGraph, Inventory, MethodEntity};
use crate::domain::query::{ForestOverview, TreeQueryService};
use crate::domain::resolver::{ImplementationIndex, ImplementationMapping, InterfaceResolver};
use crate::domain::store::ForestSnapshot;
use crate::domain::validation::{validate_forest, ValidationReport};
use crate::domain::weight::{WeightCalculator, WeightSummary};
use crate::error::{ForestError, Result};
use crate::ports::{ForestExporter, InventorySource};

/// Graph assembly outcome before any tree is built.
#[derive(Debug, Clone, Default)]
pub struct AssembledGraph {
    pub graph: CodeGraph,
    pub filter_stats: FilterStats,
    /// Edges dropped for a missing endpoint or low confidence
    pub dropped_edges: usize,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone)]
pub struct ForestAnalysis {
    pub graph: CodeGraph,
    pub forest: Forest,
    pub roots: Vec<EntryPoint>,
    pub mappings: Vec<ImplementationMapping>,
    pub filter_stats: FilterStats,
    pub dropped_edges: usize,
    pub weights: WeightSummary,
    pub validation: ValidationReport,
}

impl ForestAnalysis {
    /// The read path over the finished forest.
    pub fn queries(&self) -> TreeQueryService<'_> {
        TreeQueryService::new(&self.graph, &self.forest)
    }

    pub fn snapshot(&self) -> ForestSnapshot {
        ForestSnapshot::capture(&self.graph, &self.forest)
    }

    pub fn report(&self) -> AnalysisReport {
        AnalysisReport {
            overview: self.queries().forest_overview(),
            roots: self.roots.clone(),
            mapping_count: self.mappings.len(),
            filter_stats: self.filter_stats.clone(),
            dropped_edges: self.dropped_edges,
            build_stats: self.forest.stats.clone(),
            weights: self.weights.clone(),
            validation: self.validation.clone(),
        }
    }
}

/// Serializable summary of a run, written by the JSON exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub overview: ForestOverview,
    pub roots: Vec<EntryPoint>,
    pub mapping_count: usize,
    pub filter_stats: FilterStats,
    pub dropped_edges: usize,
    pub build_stats: BuildStats,
    pub weights: WeightSummary,
    pub validation: ValidationReport,
}

pub struct ForestPipeline {
    config: ForestConfig,
    classifier: LayerClassifier,
    filter: NodeFilter,
}

impl ForestPipeline {
    pub fn new(config: ForestConfig) -> Self {
        let filter = NodeFilter::new(config.filter.clone());
        Self {
            config,
            classifier: LayerClassifier::new(),
            filter,
        }
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Classify, filter and index the inventory.
    pub fn assemble(&self, inventory: &Inventory) -> Result<AssembledGraph> {
        let mut stats = FilterStats::default();
        let mut seen_classes = HashSet::new();
        let mut classes = Vec::new();
        let mut methods: Vec<MethodEntity> = Vec::new();
        let mut method_ids = HashSet::new();

        for seed in &inventory.classes {
            if seed.qualified_name.trim().is_empty() {
                return Err(ForestError::invalid_seed(
                    "<unnamed>",
                    "class has an empty qualified name",
                ));
            }
            if !seen_classes.insert(seed.qualified_name.as_str()) {
                return Err(ForestError::DuplicateClass(seed.qualified_name.clone()));
            }
            if let Some(m) = seed.methods.iter().find(|m| m.name.trim().is_empty()) {
                return Err(ForestError::invalid_seed(
                    &seed.qualified_name,
                    format!("method with empty name ({} parameters)", m.parameter_types.len()),
                ));
            }

            let (layer, domain) = self.classifier.classify(seed);
            let exclusion = self.filter.class_exclusion(seed, layer);
            stats.record_class(exclusion);
            if let Some(reason) = exclusion {
                debug!("[Assembly] Excluded class {} ({:?})", seed.qualified_name, reason);
                continue;
            }

            let class = ClassEntity::from_seed(seed, layer, domain);
            for method_seed in &seed.methods {
                let exclusion = self.filter.method_exclusion(method_seed, seed, layer);
                stats.record_method(exclusion);
                if exclusion.is_some() {
                    continue;
                }
                let method = MethodEntity::from_seed(&class.id, method_seed);
                if method_ids.insert(method.id.clone()) {
                    methods.push(method);
                } else {
                    debug!("[Assembly] Duplicate method id {}, keeping the first", method.id);
                }
            }
            classes.push(class);
        }

        let floor = self.config.build.min_edge_confidence;
        let mut dropped = 0;
        let mut edges = Vec::with_capacity(inventory.edges.len());
        for edge in inventory.edges.iter().map(CallEdge::canonicalized) {
            let linked = method_ids.contains(&edge.from) && method_ids.contains(&edge.to);
            if linked && edge.confidence >= floor {
                edges.push(edge);
            } else {
                debug!("[Assembly] Dropped edge {} -> {}", edge.from, edge.to);
                dropped += 1;
            }
        }

        let graph = CodeGraph::new(classes, methods, edges);
        info!(
            "[Assembly] {} classes, {} methods, {} edges admitted ({} edges dropped)",
            graph.class_count(),
            graph.method_count(),
            graph.edges().len(),
            dropped
        );
        Ok(AssembledGraph {
            graph,
            filter_stats: stats,
            dropped_edges: dropped,
        })
    }

    /// Run every stage in order.
    pub fn run(&self, inventory: &Inventory) -> Result<ForestAnalysis> {
        let AssembledGraph {
            mut graph,
            filter_stats,
            dropped_edges,
        } = self.assemble(inventory)?;

        let resolution =
            InterfaceResolver::new(self.config.resolver.clone()).resolve_with_warnings(&graph);
        let index = ImplementationIndex::new(&resolution.kept);

        let roots = RootDetector::new(self.config.roots.clone()).detect(&graph);
        let builder = TreeBuilder::new(
            self.config.build.clone(),
            self.config.id_strategy.generator(),
        );
        let forest = builder.build(&graph, &index, &roots);

        let weights = WeightCalculator::new().recompute(&mut graph, &forest);
        let validation = validate_forest(&graph, &forest, self.config.build.max_depth)
            .with_resolver_warnings(resolution.warnings);

        Ok(ForestAnalysis {
            graph,
            forest,
            roots,
            mappings: resolution.kept,
            filter_stats,
            dropped_edges,
            weights,
            validation,
        })
    }
}

impl Default for ForestPipeline {
    fn default() -> Self {
        Self::new(ForestConfig::default())
    }
}

/// Load through a source port, analyze, and hand the result to an exporter.
pub struct AnalyzeUsecase<'a> {
    pub source: &'a dyn InventorySource,
    pub exporter: &'a dyn ForestExporter,
}

impl<'a> AnalyzeUsecase<'a> {
    pub fn run(
        &self,
        pipeline: &ForestPipeline,
        out: &mut dyn Write,
    ) -> anyhow::Result<ForestAnalysis> {
        let inventory = self.source.load_inventory()?;
        let analysis = pipeline.run(&inventory)?;
        self.exporter.export(&analysis, out)?;
        Ok(analysis)
    }
}
