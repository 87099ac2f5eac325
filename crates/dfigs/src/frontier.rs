//! Greedy growth of several trees at once
//!
//! All not-yet-accepted candidate splits of every tree live in one
//! [`Frontier`]. Each round the candidate with the largest impurity
//! reduction is committed, every tree's residual target is recomputed from
//! the predictions of the other trees, and every remaining candidate is
//! re-scored against its own tree's residual.
//!
//! Each accepted split costs one prediction pass per tree over all samples
//! plus one stump search per remaining candidate, i.e.
//! O(rounds x trees x samples) for the prediction part alone.

use ndarray::ArrayView2;
use tracing::debug;

use crate::config::MaxFeatures;
use crate::deterministic::LcgRng;
use crate::node::{predict_tree, Node, Tree};
use crate::stump::construct_best_stump;

/// A pending split
#[derive(Debug, Clone)]
pub enum Candidate {
    /// Root of a tree that has not been started yet
    Seed(Box<Node>),
    /// Leaf already committed at `trees[tree].nodes[node]`
    Leaf { tree: usize, node: usize },
}

impl Candidate {
    pub fn node<'a>(&'a self, trees: &'a [Tree]) -> &'a Node {
        match self {
            Candidate::Seed(node) => node.as_ref(),
            Candidate::Leaf { tree, node } => &trees[*tree].nodes[*node],
        }
    }

    pub fn node_mut<'a>(&'a mut self, trees: &'a mut [Tree]) -> &'a mut Node {
        match self {
            Candidate::Seed(node) => node.as_mut(),
            Candidate::Leaf { tree, node } => &mut trees[*tree].nodes[*node],
        }
    }
}

/// Candidate splits across all trees, kept sorted ascending by impurity
/// reduction so the best one is last.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    candidates: Vec<Candidate>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn push(&mut self, candidate: Candidate) {
        self.candidates.push(candidate);
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Drop candidates without a usable split and stable-sort the rest
    /// ascending by impurity reduction.
    pub fn sort(&mut self, trees: &[Tree]) {
        self.candidates
            .retain(|c| c.node(trees).impurity_reduction.is_some());
        self.candidates.sort_by(|a, b| {
            let ra = a.node(trees).impurity_reduction.unwrap_or(f64::NEG_INFINITY);
            let rb = b.node(trees).impurity_reduction.unwrap_or(f64::NEG_INFINITY);
            ra.total_cmp(&rb)
        });
    }

    /// Remove the candidate with the largest reduction (the last one after [`Frontier::sort`])
    pub fn pop_best(&mut self) -> Option<Candidate> {
        self.candidates.pop()
    }

    /// Apply `f` to the node behind every candidate
    pub fn for_each_node_mut(&mut self, trees: &mut [Tree], mut f: impl FnMut(&mut Node)) {
        for candidate in &mut self.candidates {
            f(candidate.node_mut(trees));
        }
    }
}

/// Limits for one growth run
#[derive(Debug, Clone, Copy)]
pub struct GrowthParams {
    pub max_rules: usize,
    pub min_impurity_decrease: f64,
    pub max_features: MaxFeatures,
}

/// Why growth stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FrontierExhausted,
    BelowThreshold,
    BudgetReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthOutcome {
    pub accepted: usize,
    pub stop: StopReason,
}

/// Per-tree predictions over every row of `x`
pub fn tree_predictions(x: ArrayView2<f64>, trees: &[Tree]) -> Vec<Vec<f64>> {
    trees.iter().map(|tree| predict_tree(tree, x)).collect()
}

/// Residual targets: for each tree, `y` minus the predictions of every
/// other tree. The unstarted tree sees `y` minus all trees.
#[derive(Debug, Clone)]
pub struct Residuals {
    per_tree: Vec<Vec<f64>>,
    unstarted: Vec<f64>,
}

impl Residuals {
    pub fn from_predictions(y: &[f64], predictions: &[Vec<f64>]) -> Self {
        let residual_excluding = |skip: Option<usize>| -> Vec<f64> {
            let mut target = y.to_vec();
            for (other, prediction) in predictions.iter().enumerate() {
                if Some(other) == skip {
                    continue;
                }
                for (t, p) in target.iter_mut().zip(prediction) {
                    *t -= p;
                }
            }
            target
        };

        Self {
            per_tree: (0..predictions.len())
                .map(|t| residual_excluding(Some(t)))
                .collect(),
            unstarted: residual_excluding(None),
        }
    }

    pub fn compute(x: ArrayView2<f64>, y: &[f64], trees: &[Tree]) -> Self {
        Self::from_predictions(y, &tree_predictions(x, trees))
    }

    /// Target for the tree `tree_num`; `None` is the not-yet-started tree
    pub fn for_tree(&self, tree_num: Option<usize>) -> &[f64] {
        match tree_num {
            Some(t) => &self.per_tree[t],
            None => &self.unstarted,
        }
    }
}

/// Run the greedy accept loop until the frontier empties, the best
/// reduction drops below `min_impurity_decrease`, or `complexity` reaches
/// `max_rules`.
///
/// Accepting a seed starts a new tree and pushes a fresh seed so another
/// tree can always be started. A candidate that stops growth for being
/// below the threshold is left on the frontier.
pub fn grow(
    x: ArrayView2<f64>,
    y: &[f64],
    frontier: &mut Frontier,
    trees: &mut Vec<Tree>,
    complexity: &mut usize,
    params: &GrowthParams,
    rng: &mut LcgRng,
) -> GrowthOutcome {
    let n_samples = x.nrows();
    let mut accepted = 0;
    frontier.sort(trees);

    let stop = loop {
        if *complexity >= params.max_rules {
            break StopReason::BudgetReached;
        }
        let Some(candidate) = frontier.pop_best() else {
            break StopReason::FrontierExhausted;
        };

        let reduction = candidate
            .node(trees)
            .impurity_reduction
            .unwrap_or(f64::NEG_INFINITY);
        if reduction < params.min_impurity_decrease {
            frontier.push(candidate);
            break StopReason::BelowThreshold;
        }

        *complexity += 1;
        accepted += 1;

        let (tree, node) = match candidate {
            Candidate::Seed(mut root) => {
                let tree = trees.len();
                root.set_tree_num(tree);
                trees.push(Tree::from_root(*root));
                frontier.push(Candidate::Seed(Box::new(Node::seed(n_samples))));
                (tree, 0)
            }
            Candidate::Leaf { tree, node } => (tree, node),
        };

        if let Some((left, right)) = trees[tree].commit_children(node) {
            frontier.push(Candidate::Leaf { tree, node: left });
            frontier.push(Candidate::Leaf { tree, node: right });
        }

        let split = &trees[tree].nodes[node];
        debug!(
            tree,
            node,
            feature = ?split.feature,
            threshold = ?split.threshold,
            reduction,
            complexity = *complexity,
            "Accepted split"
        );

        let residuals = Residuals::compute(x, y, trees);
        frontier.for_each_node_mut(trees, |node| {
            let target = residuals.for_tree(node.tree_num);
            let updated =
                construct_best_stump(x, target, &node.idxs, node.tree_num, params.max_features, rng);
            node.adopt_split(updated);
        });
        frontier.sort(trees);
    };

    debug!(accepted, ?stop, frontier = frontier.len(), "Growth finished");
    GrowthOutcome { accepted, stop }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn params(max_rules: usize) -> GrowthParams {
        GrowthParams {
            max_rules,
            min_impurity_decrease: 0.0,
            max_features: MaxFeatures::All,
        }
    }

    fn seeded_frontier(x: ArrayView2<f64>, y: &[f64], rng: &mut LcgRng) -> Frontier {
        let idxs: Vec<usize> = (0..x.nrows()).collect();
        let mut root = construct_best_stump(x, y, &idxs, None, MaxFeatures::All, rng);
        root.is_root = true;
        let mut frontier = Frontier::new();
        frontier.push(Candidate::Seed(Box::new(root)));
        frontier
    }

    /// y = step(x0) + step(x1), which two separate stumps explain exactly
    fn additive_data() -> (Array2<f64>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for a in 0..4 {
            for b in 0..4 {
                rows.extend_from_slice(&[a as f64, b as f64]);
                y.push(if a >= 2 { 1.0 } else { 0.0 } + if b >= 2 { 5.0 } else { 0.0 });
            }
        }
        (Array2::from_shape_vec((16, 2), rows).unwrap(), y)
    }

    #[test]
    fn test_sort_drops_unsplittable_and_orders_ascending() {
        let mut a = Node::new(vec![0], None, 0.0, 0.0);
        a.impurity_reduction = Some(3.0);
        let mut b = Node::new(vec![0], None, 0.0, 0.0);
        b.impurity_reduction = Some(1.0);
        let c = Node::new(vec![0], None, 0.0, 0.0);

        let mut frontier = Frontier::new();
        for node in [a, b, c] {
            frontier.push(Candidate::Seed(Box::new(node)));
        }
        frontier.sort(&[]);
        assert_eq!(frontier.len(), 2);
        let best = frontier.pop_best().unwrap();
        assert_eq!(best.node(&[]).impurity_reduction, Some(3.0));
    }

    #[test]
    fn test_ties_pop_latest_inserted() {
        let mut frontier = Frontier::new();
        for value in [1.0, 2.0] {
            let mut node = Node::new(vec![0], None, value, 0.0);
            node.impurity_reduction = Some(1.0);
            frontier.push(Candidate::Seed(Box::new(node)));
        }
        frontier.sort(&[]);
        assert_eq!(frontier.pop_best().unwrap().node(&[]).value, 2.0);
    }

    #[test]
    fn test_residuals_exclude_own_tree() {
        let y = [10.0, 20.0];
        let predictions = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let residuals = Residuals::from_predictions(&y, &predictions);
        assert_eq!(residuals.for_tree(Some(0)), &[2.0, 10.0]);
        assert_eq!(residuals.for_tree(Some(1)), &[4.0, 12.0]);
        assert_eq!(residuals.for_tree(Some(2)), &[6.0, 14.0]);
        assert_eq!(residuals.for_tree(None), &[1.0, 8.0]);
    }

    #[test]
    fn test_additive_target_grows_two_trees() {
        let (x, y) = additive_data();
        let mut rng = LcgRng::new(0);
        let mut frontier = seeded_frontier(x.view(), &y, &mut rng);
        let mut trees = Vec::new();
        let mut complexity = 0;

        let outcome = grow(x.view(), &y, &mut frontier, &mut trees, &mut complexity, &params(2), &mut rng);

        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.stop, StopReason::BudgetReached);
        assert_eq!(complexity, 2);
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].root().feature, Some(1));
        assert_eq!(trees[1].root().feature, Some(0));
        for (t, tree) in trees.iter().enumerate() {
            assert!(tree.nodes.iter().all(|n| n.tree_num == Some(t)));
        }

        let predictions = tree_predictions(x.view(), &trees);
        for i in 0..y.len() {
            let total: f64 = predictions.iter().map(|p| p[i]).sum();
            assert!((total - y[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_budget_is_respected() {
        let (x, y) = additive_data();
        let mut rng = LcgRng::new(0);
        let mut frontier = seeded_frontier(x.view(), &y, &mut rng);
        let mut trees = Vec::new();
        let mut complexity = 3;

        let outcome = grow(x.view(), &y, &mut frontier, &mut trees, &mut complexity, &params(3), &mut rng);
        assert_eq!(outcome.accepted, 0);
        assert_eq!(outcome.stop, StopReason::BudgetReached);
        assert!(trees.is_empty());
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_threshold_stops_without_committing() {
        let (x, y) = additive_data();
        let mut rng = LcgRng::new(0);
        let mut frontier = seeded_frontier(x.view(), &y, &mut rng);
        let mut trees = Vec::new();
        let mut complexity = 0;
        let params = GrowthParams {
            min_impurity_decrease: 1e6,
            ..params(10)
        };

        let outcome = grow(x.view(), &y, &mut frontier, &mut trees, &mut complexity, &params, &mut rng);
        assert_eq!(outcome.stop, StopReason::BelowThreshold);
        assert_eq!(complexity, 0);
        assert!(trees.is_empty());
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn test_exhausts_frontier_on_perfect_fit() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0.0, 0.0, 1.0, 1.0];
        let mut rng = LcgRng::new(0);
        let mut frontier = seeded_frontier(x.view(), &y, &mut rng);
        let mut trees = Vec::new();
        let mut complexity = 0;

        let outcome = grow(x.view(), &y, &mut frontier, &mut trees, &mut complexity, &params(10), &mut rng);
        assert_eq!(outcome.stop, StopReason::FrontierExhausted);
        assert_eq!(complexity, 1);
        assert_eq!(trees.len(), 1);
        assert!(frontier.is_empty());
    }
}
