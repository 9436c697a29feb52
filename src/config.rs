//! Pipeline configuration, loadable from TOML.
//!
//! ```toml
//! id_strategy = "content_hash"
//!
//! [build]
//! max_depth = 8
//! prune_layers = ["utility", "configuration", "data_holder"]
//!
//! [roots]
//! name_fallback = false
//!
//! [filter]
//! exclude_test_code = true
//!
//! [resolver]
//! std_prefixes = ["java.", "javax."]
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::builder::BuildConfig;
use crate::domain::entry_point::RootRules;
use crate::domain::filter::FilterConfig;
use crate::domain::ids::{ContentHashIds, IdGenerator, SequenceIds};
use crate::domain::resolver::ResolverConfig;
use crate::error::{ForestError, Result};

/// How tree, relation and path ids are minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    #[default]
    ContentHash,
    Sequence,
}

impl IdStrategy {
    pub fn generator(&self) -> Arc<dyn IdGenerator> {
        match self {
            IdStrategy::ContentHash => Arc::new(ContentHashIds),
            IdStrategy::Sequence => Arc::new(SequenceIds::new()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForestConfig {
    #[serde(default)]
    pub id_strategy: IdStrategy,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub roots: RootRules,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl ForestConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ForestConfig =
            toml::from_str(text).map_err(|e| ForestError::Config {
                message: e.to_string(),
                field: None,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ForestError::io(format!("cannot read config {}", path.display()), e))?;
        Self::from_toml_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.build.max_depth == 0 {
            return Err(ForestError::config(
                "build.max_depth",
                "max_depth must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.build.min_edge_confidence) {
            return Err(ForestError::config(
                "build.min_edge_confidence",
                "min_edge_confidence must be within [0, 1]",
            ));
        }
        if self.roots.boundary_annotations.is_empty()
            && self.roots.request_param_suffixes.is_empty()
            && !self.roots.name_fallback
        {
            return Err(ForestError::config(
                "roots",
                "at least one root detection rule must be enabled",
            ));
        }
        if self.resolver.std_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ForestError::config(
                "resolver.std_prefixes",
                "standard-library prefixes must not be empty",
            ));
        }
        Ok(())
    }
}
