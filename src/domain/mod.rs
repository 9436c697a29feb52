// Core model and analysis stages.

pub mod builder;
pub mod classifier;
pub mod entry_point;
pub mod filter;
pub mod forest;
pub mod ids;
pub mod layer;
pub mod model;
pub mod naming;
pub mod query;
pub mod resolver;
pub mod store;
pub mod validation;
pub mod weight;
