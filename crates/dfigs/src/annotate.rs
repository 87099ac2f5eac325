//! Final per-node bookkeeping: pre-order ids and binary label counts

use ndarray::ArrayView2;

use crate::node::Tree;

fn label_counts(y: &[f64], rows: &[usize]) -> [f64; 2] {
    let mut counts = [0.0, 0.0];
    for &i in rows {
        if y[i] == 0.0 {
            counts[0] += 1.0;
        } else if y[i] == 1.0 {
            counts[1] += 1.0;
        }
    }
    counts
}

fn annotate_node(
    tree: &mut Tree,
    idx: usize,
    x: ArrayView2<f64>,
    y: &[f64],
    rows: &[usize],
    counter: &mut usize,
) {
    let node = &mut tree.nodes[idx];
    node.node_id = Some(*counter);
    node.value_sklearn = Some(label_counts(y, rows));
    *counter += 1;

    let (left, right) = (node.left, node.right);
    if left.is_none() && right.is_none() {
        return;
    }
    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
        rows.iter().copied().partition(|&i| node.goes_left(x.row(i)));

    if let Some(left) = left {
        annotate_node(tree, left, x, y, &left_rows, counter);
    }
    if let Some(right) = right {
        annotate_node(tree, right, x, y, &right_rows, counter);
    }
}

/// Assign pre-order `node_id`s starting at 0 and the `[label-0, label-1]`
/// counts of the rows of `x` reaching each node.
pub fn annotate_tree(tree: &mut Tree, x: ArrayView2<f64>, y: &[f64]) {
    let rows: Vec<usize> = (0..x.nrows()).collect();
    let mut counter = 0;
    annotate_node(tree, 0, x, y, &rows, &mut counter);
}
