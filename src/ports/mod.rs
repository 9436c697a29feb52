use std::io::Write;

use crate::application::ForestAnalysis;
use crate::domain::model::Inventory;
use crate::error::Result;

pub mod tree_dot_exporter;

/// Supplies the extractor's inventory.
pub trait InventorySource {
    fn load_inventory(&self) -> Result<Inventory>;
}

/// Writes a finished analysis in some presentation format.
pub trait ForestExporter {
    fn export(&self, analysis: &ForestAnalysis, out: &mut dyn Write) -> Result<()>;
}
