// Main library entry point for callforest.

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

pub use application::{AnalyzeUsecase, ForestAnalysis, ForestPipeline};
pub use config::ForestConfig;
pub use error::{ForestError, Result};
