//! Best single-split ("stump") search over a sample subset
//!
//! Exact-greedy search under mean squared error: every midpoint between
//! consecutive distinct values of every eligible feature is scored.

use ndarray::ArrayView2;

use crate::config::MaxFeatures;
use crate::deterministic::LcgRng;
use crate::node::Node;

/// Best split found for one subset
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    reduction: f64,
}

/// Whether the spread of `y` over `idxs` is only rounding noise relative
/// to the magnitude of the values.
fn is_pure(y: &[f64], idxs: &[usize], impurity: f64) -> bool {
    if impurity == 0.0 {
        return true;
    }
    let mean_sq = idxs.iter().map(|&i| y[i] * y[i]).sum::<f64>() / idxs.len() as f64;
    impurity <= f64::EPSILON * mean_sq
}

/// Mean and mean squared deviation of `y` over `idxs`
fn mean_and_impurity(y: &[f64], idxs: &[usize]) -> (f64, f64) {
    if idxs.is_empty() {
        return (0.0, 0.0);
    }
    let n = idxs.len() as f64;
    let mean = idxs.iter().map(|&i| y[i]).sum::<f64>() / n;
    let impurity = idxs.iter().map(|&i| (y[i] - mean).powi(2)).sum::<f64>() / n;
    (mean, impurity)
}

/// Sum of squared deviations from running sums
fn sse(sum: f64, sum_sq: f64, n: f64) -> f64 {
    (sum_sq - sum * sum / n).max(0.0)
}

/// Best threshold on a single feature, or `None` if the feature is
/// constant or has a missing value inside the subset.
fn best_split_for_feature(
    x: ArrayView2<f64>,
    y: &[f64],
    idxs: &[usize],
    feature: usize,
    parent_sse: f64,
) -> Option<SplitCandidate> {
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(idxs.len());
    for &i in idxs {
        let v = x[[i, feature]];
        if v.is_nan() {
            return None;
        }
        pairs.push((v, y[i]));
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total_sum: f64 = pairs.iter().map(|p| p.1).sum();
    let total_sq: f64 = pairs.iter().map(|p| p.1 * p.1).sum();
    let n = pairs.len();

    let mut best: Option<SplitCandidate> = None;
    let mut left_sum = 0.0;
    let mut left_sq = 0.0;
    for i in 1..n {
        let (prev_v, prev_y) = pairs[i - 1];
        left_sum += prev_y;
        left_sq += prev_y * prev_y;

        let v = pairs[i].0;
        if v <= prev_v {
            continue;
        }

        let n_left = i as f64;
        let n_right = (n - i) as f64;
        let children_sse = sse(left_sum, left_sq, n_left)
            + sse(total_sum - left_sum, total_sq - left_sq, n_right);
        let reduction = (parent_sse - children_sse).max(0.0);

        if best.map_or(true, |b| reduction > b.reduction) {
            let mut threshold = prev_v + (v - prev_v) / 2.0;
            if threshold >= v {
                threshold = prev_v;
            }
            best = Some(SplitCandidate {
                feature,
                threshold,
                reduction,
            });
        }
    }
    best
}

/// Compute the best single-feature threshold split of `idxs` against
/// target `y`.
///
/// The returned node always carries the subset's mean as `value` and its
/// impurity. When a split exists, `feature`, `threshold`,
/// `impurity_reduction` and both provisional children are set; otherwise
/// `impurity_reduction` is `None`.
pub fn construct_best_stump(
    x: ArrayView2<f64>,
    y: &[f64],
    idxs: &[usize],
    tree_num: Option<usize>,
    max_features: MaxFeatures,
    rng: &mut LcgRng,
) -> Node {
    let (value, impurity) = mean_and_impurity(y, idxs);
    let mut node = Node::new(idxs.to_vec(), tree_num, value, impurity);

    if idxs.len() < 2 || is_pure(y, idxs, impurity) {
        return node;
    }

    let n_features = x.ncols();
    let k = max_features.resolve(n_features);
    let features: Vec<usize> = if k >= n_features {
        (0..n_features).collect()
    } else {
        rng.sample_indices(n_features, k)
    };

    let parent_sse = impurity * idxs.len() as f64;
    let mut best: Option<SplitCandidate> = None;
    for feature in features {
        if let Some(candidate) = best_split_for_feature(x, y, idxs, feature, parent_sse) {
            if best.map_or(true, |b| candidate.reduction > b.reduction) {
                best = Some(candidate);
            }
        }
    }

    let Some(split) = best else {
        return node;
    };

    let (left_idxs, right_idxs): (Vec<usize>, Vec<usize>) = idxs
        .iter()
        .copied()
        .partition(|&i| x[[i, split.feature]] <= split.threshold);
    let (left_value, left_impurity) = mean_and_impurity(y, &left_idxs);
    let (right_value, right_impurity) = mean_and_impurity(y, &right_idxs);

    node.feature = Some(split.feature);
    node.threshold = Some(split.threshold);
    node.impurity_reduction = Some(split.reduction);
    node.left_temp = Some(Box::new(Node::new(
        left_idxs,
        tree_num,
        left_value,
        left_impurity,
    )));
    node.right_temp = Some(Box::new(Node::new(
        right_idxs,
        tree_num,
        right_value,
        right_impurity,
    )));
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn all(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_picks_informative_feature() {
        let x = array![[5.0, 1.0], [1.0, 2.0], [4.0, 3.0], [2.0, 4.0]];
        let y = [0.0, 0.0, 10.0, 10.0];
        let mut rng = LcgRng::new(0);
        let node = construct_best_stump(x.view(), &y, &all(4), Some(0), MaxFeatures::All, &mut rng);

        assert_eq!(node.feature, Some(1));
        assert_eq!(node.threshold, Some(2.5));
        assert_eq!(node.value, 5.0);
        assert_eq!(node.impurity, 25.0);
        // parent SSE 100, children pure
        assert!((node.impurity_reduction.unwrap() - 100.0).abs() < 1e-9);

        let left = node.left_temp.as_ref().unwrap();
        let right = node.right_temp.as_ref().unwrap();
        assert_eq!(left.idxs, vec![0, 1]);
        assert_eq!(right.idxs, vec![2, 3]);
        assert_eq!(left.value, 0.0);
        assert_eq!(right.value, 10.0);
        assert_eq!(left.tree_num, Some(0));
    }

    #[test]
    fn test_no_split_for_pure_or_tiny_subsets() {
        let x = array![[1.0], [2.0], [3.0]];
        let mut rng = LcgRng::new(0);

        let pure = construct_best_stump(x.view(), &[1.0, 1.0, 1.0], &all(3), None, MaxFeatures::All, &mut rng);
        assert!(pure.impurity_reduction.is_none());
        assert!(pure.left_temp.is_none());

        let single = construct_best_stump(x.view(), &[1.0, 2.0, 3.0], &[1], None, MaxFeatures::All, &mut rng);
        assert!(single.impurity_reduction.is_none());
        assert_eq!(single.value, 2.0);

        let empty = construct_best_stump(x.view(), &[1.0, 2.0, 3.0], &[], None, MaxFeatures::All, &mut rng);
        assert!(empty.impurity_reduction.is_none());
        assert!(empty.idxs.is_empty());
    }

    #[test]
    fn test_small_scale_target_still_splits() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0.0, 0.0, 1e-8, 1e-8];
        let mut rng = LcgRng::new(0);
        let node = construct_best_stump(x.view(), &y, &all(4), None, MaxFeatures::All, &mut rng);

        assert!(node.impurity > 0.0);
        assert!(node.impurity_reduction.unwrap() > 0.0);
        assert_eq!(node.threshold, Some(1.5));
    }

    #[test]
    fn test_rounding_noise_counts_as_pure() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = [0.1, 0.1, 0.1];
        let mut rng = LcgRng::new(0);
        let node = construct_best_stump(x.view(), &y, &all(3), None, MaxFeatures::All, &mut rng);
        assert!(node.impurity_reduction.is_none());
    }

    #[test]
    fn test_constant_feature_has_no_split() {
        let x = array![[1.0], [1.0], [1.0]];
        let mut rng = LcgRng::new(0);
        let node = construct_best_stump(x.view(), &[0.0, 1.0, 2.0], &all(3), None, MaxFeatures::All, &mut rng);
        assert!(node.impurity_reduction.is_none());
    }

    #[test]
    fn test_feature_with_missing_values_is_skipped() {
        let x = array![[f64::NAN, 1.0], [1.0, 1.0], [2.0, 2.0], [3.0, 2.0]];
        let y = [0.0, 0.0, 1.0, 1.0];
        let mut rng = LcgRng::new(0);
        let node = construct_best_stump(x.view(), &y, &all(4), None, MaxFeatures::All, &mut rng);
        assert_eq!(node.feature, Some(1));

        // the same feature is usable once the missing row is excluded
        let node = construct_best_stump(x.view(), &y, &[1, 2, 3], None, MaxFeatures::All, &mut rng);
        assert!(node.impurity_reduction.is_some());
    }

    #[test]
    fn test_ties_keep_first_feature() {
        let x = array![[1.0, 1.0], [2.0, 2.0]];
        let mut rng = LcgRng::new(0);
        let node = construct_best_stump(x.view(), &[0.0, 1.0], &all(2), None, MaxFeatures::All, &mut rng);
        assert_eq!(node.feature, Some(0));
    }

    #[test]
    fn test_feature_subsampling_is_deterministic() {
        let x = array![
            [1.0, 4.0, 2.0, 0.0],
            [2.0, 3.0, 1.0, 1.0],
            [3.0, 2.0, 4.0, 0.0],
            [4.0, 1.0, 3.0, 1.0]
        ];
        let y = [1.0, 2.0, 3.0, 4.0];
        let a = construct_best_stump(x.view(), &y, &all(4), None, MaxFeatures::Count(1), &mut LcgRng::new(9));
        let b = construct_best_stump(x.view(), &y, &all(4), None, MaxFeatures::Count(1), &mut LcgRng::new(9));
        assert_eq!(a.feature, b.feature);
        assert_eq!(a.threshold, b.threshold);
    }
}
