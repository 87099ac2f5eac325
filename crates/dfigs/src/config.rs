//! Ensemble configuration
//!
//! Loaded from TOML or built in code; every field has a default so a
//! partial file is valid.

use crate::errors::{FigsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// How many features a stump may consider at each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature
    #[default]
    All,
    /// `floor(sqrt(n_features))`
    Sqrt,
    /// `floor(log2(n_features))`
    Log2,
    /// A fixed number, capped at `n_features`
    Count(usize),
    /// A fraction of `n_features` in `(0, 1]`
    Fraction(f64),
}

impl MaxFeatures {
    /// Number of features to draw out of `n_features`. Never zero unless
    /// there are no features at all.
    pub fn resolve(&self, n_features: usize) -> usize {
        if n_features == 0 {
            return 0;
        }
        let k = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Count(k) => k,
            MaxFeatures::Fraction(f) => (f * n_features as f64) as usize,
        };
        k.clamp(1, n_features)
    }
}

/// Fitting parameters for [`crate::FigsEnsemble`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigsConfig {
    /// Cumulative number of splits across all trees
    pub max_rules: usize,
    /// Smallest impurity reduction a split may have to be accepted
    pub min_impurity_decrease: f64,
    /// Feature subsampling per stump
    pub max_features: MaxFeatures,
    /// Seed for feature subsampling
    pub random_state: i64,
}

impl Default for FigsConfig {
    fn default() -> Self {
        Self {
            max_rules: 12,
            min_impurity_decrease: 0.0,
            max_features: MaxFeatures::All,
            random_state: 0,
        }
    }
}

impl FigsConfig {
    /// Load and validate a configuration file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|err| FigsError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_impurity_decrease.is_finite() || self.min_impurity_decrease < 0.0 {
            return Err(FigsError::InvalidConfig(format!(
                "min_impurity_decrease must be a non-negative number, got {}",
                self.min_impurity_decrease
            )));
        }
        match self.max_features {
            MaxFeatures::Count(0) => Err(FigsError::InvalidConfig(
                "max_features count must be at least 1".to_string(),
            )),
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(FigsError::InvalidConfig(
                format!("max_features fraction must be in (0, 1], got {}", f),
            )),
            _ => Ok(()),
        }
    }
}
