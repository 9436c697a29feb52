// Infrastructure adapters for callforest.

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::application::{AnalysisReport, ForestAnalysis};
use crate::domain::forest::Forest;
use crate::domain::model::Inventory;
use crate::error::{ForestError, Result};
use crate::ports::{ForestExporter, InventorySource};

pub mod concurrency;

/// Reads an extractor inventory from a JSON document on disk.
pub struct JsonInventorySource {
    pub path: PathBuf,
}

impl JsonInventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(text: &str) -> Result<Inventory> {
        Ok(serde_json::from_str(text)?)
    }
}

impl InventorySource for JsonInventorySource {
    fn load_inventory(&self) -> Result<Inventory> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            ForestError::io(format!("cannot read inventory {}", self.path.display()), e)
        })?;
        let inventory = Self::parse(&text)?;
        info!(
            "[Inventory] Loaded {} classes and {} edges from {}",
            inventory.classes.len(),
            inventory.edges.len(),
            self.path.display()
        );
        Ok(inventory)
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    report: AnalysisReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    forest: Option<&'a Forest>,
}

/// Writes the analysis report, optionally with the full forest, as JSON.
#[derive(Debug, Clone, Default)]
pub struct JsonForestExporter {
    pub pretty: bool,
    pub include_forest: bool,
}

impl ForestExporter for JsonForestExporter {
    fn export(&self, analysis: &ForestAnalysis, out: &mut dyn Write) -> Result<()> {
        let document = JsonDocument {
            report: analysis.report(),
            forest: self.include_forest.then_some(&analysis.forest),
        };
        if self.pretty {
            serde_json::to_writer_pretty(&mut *out, &document)?;
        } else {
            serde_json::to_writer(&mut *out, &document)?;
        }
        out.write_all(b"\n")
            .map_err(|e| ForestError::io("cannot write JSON output", e))
    }
}
