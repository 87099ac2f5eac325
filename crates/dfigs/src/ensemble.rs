//! Fitted sum-of-trees ensemble with incremental extension
//!
//! `fit` grows trees from a single root candidate. `add_new_phase`
//! registers a later group of feature columns and narrows the remaining
//! candidates to samples that have that data. `extend_trees` raises the
//! rule budget and resumes growth from the leaves of the existing trees.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotate::annotate_tree;
use crate::config::{FigsConfig, MaxFeatures};
use crate::deterministic::LcgRng;
use crate::errors::{FigsError, Result};
use crate::frontier::{grow, tree_predictions, Candidate, Frontier, GrowthParams};
use crate::node::{Node, Tree};
use crate::phase::{restrict_to_complete, PhaseStore};
use crate::stump::construct_best_stump;

/// Serializable view of a fitted ensemble
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FigsModel {
    pub version: String,
    pub created_at: u64,
    pub config: FigsConfig,
    pub complexity: usize,
    pub max_rules: usize,
    pub n_phases: usize,
    pub trees: Vec<Tree>,
}

/// Greedy sum of trees supporting phased features and budget extension
#[derive(Debug, Clone)]
pub struct FigsEnsemble {
    config: FigsConfig,
    trees: Vec<Tree>,
    complexity: usize,
    max_rules: usize,
    frontier: Frontier,
    phases: Option<PhaseStore>,
    rng: LcgRng,
}

impl Default for FigsEnsemble {
    fn default() -> Self {
        let config = FigsConfig::default();
        Self {
            max_rules: config.max_rules,
            rng: LcgRng::new(config.random_state),
            config,
            trees: Vec::new(),
            complexity: 0,
            frontier: Frontier::new(),
            phases: None,
        }
    }
}

fn check_columns(x: ArrayView2<f64>, required: usize) -> Result<()> {
    if x.ncols() < required {
        return Err(FigsError::ShapeMismatch {
            what: "columns",
            expected: required,
            actual: x.ncols(),
        });
    }
    Ok(())
}

fn check_xy(x: ArrayView2<f64>, y: &[f64]) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(FigsError::ShapeMismatch {
            what: "target values",
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    Ok(())
}

impl FigsEnsemble {
    pub fn new(config: FigsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            max_rules: config.max_rules,
            rng: LcgRng::new(config.random_state),
            config,
            ..Self::default()
        })
    }

    pub fn config(&self) -> &FigsConfig {
        &self.config
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Total accepted splits across all trees
    pub fn complexity(&self) -> usize {
        self.complexity
    }

    /// Current cumulative split budget
    pub fn max_rules(&self) -> usize {
        self.max_rules
    }

    pub fn is_fitted(&self) -> bool {
        self.phases.is_some()
    }

    pub fn phases(&self) -> Option<&PhaseStore> {
        self.phases.as_ref()
    }

    /// Nodes behind the candidates still waiting on the frontier
    pub fn frontier_nodes(&self) -> Vec<&Node> {
        self.frontier
            .candidates()
            .iter()
            .map(|c| c.node(&self.trees))
            .collect()
    }

    /// Columns the trees split on
    fn tree_columns(&self) -> usize {
        self.trees
            .iter()
            .map(Tree::required_columns)
            .max()
            .unwrap_or(0)
    }

    fn growth_params(&self) -> GrowthParams {
        GrowthParams {
            max_rules: self.max_rules,
            min_impurity_decrease: self.config.min_impurity_decrease,
            max_features: self.config.max_features,
        }
    }

    fn annotate(&mut self, x: ArrayView2<f64>, y: &[f64]) {
        for tree in &mut self.trees {
            annotate_tree(tree, x, y);
        }
    }

    /// Fit from scratch. `x` becomes the first feature phase.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: &[f64]) -> Result<&mut Self> {
        check_xy(x, y)?;
        if x.nrows() == 0 {
            return Err(FigsError::EmptyDataset);
        }

        self.trees.clear();
        self.complexity = 0;
        self.max_rules = self.config.max_rules;
        self.rng = LcgRng::new(self.config.random_state);

        let idxs: Vec<usize> = (0..x.nrows()).collect();
        let mut root =
            construct_best_stump(x, y, &idxs, None, self.config.max_features, &mut self.rng);
        root.is_root = true;
        self.frontier = Frontier::new();
        self.frontier.push(Candidate::Seed(Box::new(root)));

        let params = self.growth_params();
        let outcome = grow(
            x,
            y,
            &mut self.frontier,
            &mut self.trees,
            &mut self.complexity,
            &params,
            &mut self.rng,
        );
        self.annotate(x, y);
        self.phases = Some(PhaseStore::new(x));

        info!(
            samples = x.nrows(),
            features = x.ncols(),
            trees = self.trees.len(),
            complexity = self.complexity,
            stop = ?outcome.stop,
            "Fitted ensemble"
        );
        Ok(self)
    }

    /// Raise the rule budget by `additional_rule_budget` and keep growing
    /// from the leaves of the existing trees.
    ///
    /// Every leaf is re-scored against `y` over its own samples; leaves
    /// with a usable split become the new frontier, and growth re-targets
    /// them at the residuals after the first accepted split. Rows of `x`
    /// must line up with the rows the ensemble was fitted on, and `x` must
    /// hold every registered phase column; it may carry extra trailing
    /// columns.
    pub fn extend_trees(
        &mut self,
        x: ArrayView2<f64>,
        y: &[f64],
        additional_rule_budget: usize,
    ) -> Result<&mut Self> {
        let store = self.phases.as_ref().ok_or(FigsError::NotFitted)?;
        let n_rows = store.n_rows();
        let required = store.data().ncols().max(self.tree_columns());
        check_xy(x, y)?;
        check_columns(x, required)?;
        if x.nrows() != n_rows {
            return Err(FigsError::ShapeMismatch {
                what: "rows",
                expected: n_rows,
                actual: x.nrows(),
            });
        }

        self.max_rules += additional_rule_budget;
        let complexity_before = self.complexity;

        let mut frontier = Frontier::new();
        for (tree_num, tree) in self.trees.iter_mut().enumerate() {
            for leaf_idx in tree.leaves() {
                let leaf = &mut tree.nodes[leaf_idx];
                let split = construct_best_stump(
                    x,
                    y,
                    &leaf.idxs,
                    Some(tree_num),
                    MaxFeatures::All,
                    &mut self.rng,
                );
                if split.impurity_reduction.is_some() {
                    leaf.impurity = split.impurity;
                    leaf.adopt_split(split);
                    frontier.push(Candidate::Leaf {
                        tree: tree_num,
                        node: leaf_idx,
                    });
                }
            }
        }
        self.frontier = frontier;

        let params = self.growth_params();
        let outcome = grow(
            x,
            y,
            &mut self.frontier,
            &mut self.trees,
            &mut self.complexity,
            &params,
            &mut self.rng,
        );
        self.annotate(x, y);

        info!(
            added = self.complexity - complexity_before,
            complexity = self.complexity,
            max_rules = self.max_rules,
            stop = ?outcome.stop,
            "Extended ensemble"
        );
        Ok(self)
    }

    /// Register the next feature phase.
    ///
    /// Fails without changing anything if some sample has data in
    /// `new_phase` while missing earlier-phase data. Otherwise appends the
    /// columns and restricts every frontier candidate to the samples whose
    /// `new_phase` row is complete.
    pub fn add_new_phase(&mut self, new_phase: ArrayView2<f64>) -> Result<()> {
        let store = self.phases.as_mut().ok_or(FigsError::NotFitted)?;
        store.push_phase(new_phase)?;
        let n_phases = store.n_phases();

        self.frontier.for_each_node_mut(&mut self.trees, |node| {
            node.idxs = restrict_to_complete(&node.idxs, new_phase);
        });

        info!(
            phases = n_phases,
            columns = new_phase.ncols(),
            candidates = self.frontier.len(),
            "Added feature phase"
        );
        Ok(())
    }

    /// Sum of every tree's prediction
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<f64>> {
        check_columns(x, self.tree_columns())?;
        let mut total = vec![0.0; x.nrows()];
        for prediction in tree_predictions(x, &self.trees) {
            for (t, p) in total.iter_mut().zip(prediction) {
                *t += p;
            }
        }
        Ok(total)
    }

    pub fn to_model(&self) -> FigsModel {
        FigsModel {
            version: crate::VERSION.to_string(),
            created_at: chrono::Utc::now().timestamp() as u64,
            config: self.config.clone(),
            complexity: self.complexity,
            max_rules: self.max_rules,
            n_phases: self.phases.as_ref().map_or(0, PhaseStore::n_phases),
            trees: self.trees.clone(),
        }
    }
}
