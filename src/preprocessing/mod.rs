//! Data preparation
//!
//! - [`features`]: target/feature selection, validation and null-dropping
//! - [`numeric`]: the standalone numeric feature extraction job

pub mod features;
pub mod numeric;

pub use features::{
    build_features, choose_target, heuristic_columns, ColumnSelection, FeatureBuilder,
    FeatureMatrix, PREFERRED_TARGETS,
};
pub use numeric::{extract, numeric_features, ExtractSummary};
