//! Phased FIGS - greedy sums of trees
//!
//! Grows several additive trees at once by repeatedly accepting the best
//! split anywhere in the ensemble, with support for feature columns that
//! arrive in phases and for extending a fitted ensemble with extra rules.

pub mod annotate;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod ensemble;
pub mod errors;
pub mod frontier;
pub mod node;
pub mod phase;
pub mod stump;

use std::path::Path;

pub use config::{FigsConfig, MaxFeatures};
pub use dataset::Dataset;
pub use deterministic::LcgRng;
pub use ensemble::{FigsEnsemble, FigsModel};
pub use errors::{FigsError, Result};
pub use frontier::{Candidate, Frontier, GrowthOutcome, GrowthParams, StopReason};
pub use node::{predict_tree, Node, Tree};
pub use stump::construct_best_stump;

/// Fit an ensemble directly from a CSV file using the provided configuration.
pub fn fit_from_csv(path: &Path, config: FigsConfig) -> Result<FigsEnsemble> {
    let dataset = Dataset::from_csv(path)?;
    let mut ensemble = FigsEnsemble::new(config)?;
    ensemble.fit(dataset.features.view(), &dataset.targets)?;
    Ok(ensemble)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
