//! Tree nodes, per-tree arenas and tree evaluation
//!
//! A [`Tree`] owns its nodes in a vector (root at index 0); committed
//! children are indices into that vector. Candidate children produced by
//! the stump constructor are boxed and owned by their parent until the
//! split is accepted, at which point they move into the arena.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// A tree node or a pending candidate split.
///
/// `impurity_reduction == None` means no usable split was found for the
/// node's samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Candidate that would start a new tree when accepted
    pub is_root: bool,
    /// Owning tree; `None` until the tree is started
    pub tree_num: Option<usize>,
    /// Sample indices covered by this node (ascending)
    #[serde(skip)]
    pub idxs: Vec<usize>,
    pub feature: Option<usize>,
    pub threshold: Option<f64>,
    pub impurity: f64,
    pub impurity_reduction: Option<f64>,
    /// Mean target at construction time; the prediction when this node is a leaf
    pub value: f64,
    #[serde(skip)]
    pub left_temp: Option<Box<Node>>,
    #[serde(skip)]
    pub right_temp: Option<Box<Node>>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub node_id: Option<usize>,
    /// `[label-0 count, label-1 count]` after annotation
    pub value_sklearn: Option<[f64; 2]>,
}

impl Node {
    /// A node with no split information yet
    pub fn new(idxs: Vec<usize>, tree_num: Option<usize>, value: f64, impurity: f64) -> Self {
        Self {
            is_root: false,
            tree_num,
            idxs,
            feature: None,
            threshold: None,
            impurity,
            impurity_reduction: None,
            value,
            left_temp: None,
            right_temp: None,
            left: None,
            right: None,
            node_id: None,
            value_sklearn: None,
        }
    }

    /// The placeholder candidate for a tree that has not been started,
    /// covering every sample.
    pub fn seed(n_samples: usize) -> Self {
        Self {
            is_root: true,
            ..Self::new((0..n_samples).collect(), None, 0.0, 0.0)
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Take over the split found by a fresh stump while keeping identity,
    /// sample set and the value recorded when this node was created.
    pub fn adopt_split(&mut self, split: Node) {
        self.feature = split.feature;
        self.threshold = split.threshold;
        self.impurity_reduction = split.impurity_reduction;
        self.left_temp = split.left_temp;
        self.right_temp = split.right_temp;
    }

    /// Stamp this node and its provisional children with a tree index
    pub fn set_tree_num(&mut self, tree_num: usize) {
        self.tree_num = Some(tree_num);
        for child in [self.left_temp.as_mut(), self.right_temp.as_mut()]
            .into_iter()
            .flatten()
        {
            child.tree_num = Some(tree_num);
        }
    }

    /// Which side a feature value falls on. Missing values compare false and go right.
    pub fn goes_left(&self, row: ArrayView1<f64>) -> bool {
        match (self.feature, self.threshold) {
            (Some(feature), Some(threshold)) => row[feature] <= threshold,
            _ => false,
        }
    }
}

/// One tree of the ensemble, stored as an arena of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn from_root(root: Node) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Move a node's provisional children into the arena as its committed
    /// children. Returns their indices, or `None` when the node has no
    /// candidate split.
    pub fn commit_children(&mut self, idx: usize) -> Option<(usize, usize)> {
        let node = &mut self.nodes[idx];
        let (left, right) = match (node.left_temp.take(), node.right_temp.take()) {
            (Some(left), Some(right)) => (left, right),
            (left, right) => {
                node.left_temp = left;
                node.right_temp = right;
                return None;
            }
        };

        let left_idx = self.nodes.len();
        let right_idx = left_idx + 1;
        self.nodes.push(*left);
        self.nodes.push(*right);
        self.nodes[idx].left = Some(left_idx);
        self.nodes[idx].right = Some(right_idx);
        Some((left_idx, right_idx))
    }

    /// Evaluate this tree on a single row
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            let next = if node.is_leaf() {
                None
            } else if node.goes_left(row) {
                node.left
            } else {
                node.right
            };
            match next {
                Some(child) => idx = child,
                None => return node.value,
            }
        }
    }

    /// Number of leading feature columns a row needs to be routed through
    /// every committed split.
    pub fn required_columns(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.is_leaf())
            .filter_map(|n| n.feature)
            .map(|f| f + 1)
            .max()
            .unwrap_or(0)
    }

    /// Arena indices of every node without committed children.
    pub fn leaves(&self) -> Vec<usize> {
        let mut stack = vec![0usize];
        let mut leaves = Vec::new();
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if let Some(left) = node.left {
                stack.push(left);
            }
            if let Some(right) = node.right {
                stack.push(right);
            }
            if node.is_leaf() {
                leaves.push(idx);
            }
        }
        leaves
    }
}

/// Per-row predictions of one tree over a feature matrix
pub fn predict_tree(tree: &Tree, x: ArrayView2<f64>) -> Vec<f64> {
    x.rows().into_iter().map(|row| tree.predict_row(row)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Root splits feature 0 at 1.5, right child splits feature 1 at 0.5
    fn two_level_tree() -> Tree {
        let mut root = Node::new(vec![0, 1, 2, 3], Some(0), 2.0, 1.0);
        root.feature = Some(0);
        root.threshold = Some(1.5);
        root.left_temp = Some(Box::new(Node::new(vec![0, 1], Some(0), 1.0, 0.0)));
        root.right_temp = Some(Box::new(Node::new(vec![2, 3], Some(0), 3.0, 0.5)));

        let mut tree = Tree::from_root(root);
        let (_, right) = tree.commit_children(0).unwrap();

        let node = &mut tree.nodes[right];
        node.feature = Some(1);
        node.threshold = Some(0.5);
        node.left_temp = Some(Box::new(Node::new(vec![2], Some(0), 2.5, 0.0)));
        node.right_temp = Some(Box::new(Node::new(vec![3], Some(0), 3.5, 0.0)));
        tree.commit_children(right).unwrap();
        tree
    }

    #[test]
    fn test_commit_moves_children_into_arena() {
        let tree = two_level_tree();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.root().left, Some(1));
        assert_eq!(tree.root().right, Some(2));
        assert!(tree.nodes.iter().all(|n| n.left_temp.is_none() && n.right_temp.is_none()));
    }

    #[test]
    fn test_commit_without_candidate_is_noop() {
        let mut tree = Tree::from_root(Node::new(vec![0], Some(0), 1.0, 0.0));
        assert!(tree.commit_children(0).is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_predict_tree() {
        let tree = two_level_tree();
        let x = array![[1.0, 9.0], [2.0, 0.0], [2.0, 1.0], [f64::NAN, 0.0]];
        assert_eq!(predict_tree(&tree, x.view()), vec![1.0, 2.5, 3.5, 2.5]);
    }

    #[test]
    fn test_uncommitted_candidate_predicts_its_value() {
        let mut root = Node::new(vec![0, 1], Some(0), 4.0, 1.0);
        root.feature = Some(0);
        root.threshold = Some(0.0);
        let tree = Tree::from_root(root);
        let x = array![[-1.0], [1.0]];
        assert_eq!(predict_tree(&tree, x.view()), vec![4.0, 4.0]);
    }

    #[test]
    fn test_leaf_candidate_feature_is_not_read() {
        let mut tree = two_level_tree();
        tree.nodes[1].feature = Some(7);
        tree.nodes[1].threshold = Some(0.0);
        assert_eq!(tree.required_columns(), 2);
        let x = array![[1.0, 0.0]];
        assert_eq!(predict_tree(&tree, x.view()), vec![1.0]);
    }

    #[test]
    fn test_leaves() {
        let tree = two_level_tree();
        let mut leaves = tree.leaves();
        leaves.sort_unstable();
        assert_eq!(leaves, vec![1, 3, 4]);

        let single = Tree::from_root(Node::new(vec![0], Some(0), 1.0, 0.0));
        assert_eq!(single.leaves(), vec![0]);
    }

    #[test]
    fn test_set_tree_num_stamps_children() {
        let mut node = Node::seed(3);
        node.left_temp = Some(Box::new(Node::new(vec![0], None, 0.0, 0.0)));
        node.right_temp = Some(Box::new(Node::new(vec![1, 2], None, 0.0, 0.0)));
        node.set_tree_num(4);
        assert_eq!(node.tree_num, Some(4));
        assert_eq!(node.left_temp.as_ref().unwrap().tree_num, Some(4));
        assert_eq!(node.right_temp.as_ref().unwrap().tree_num, Some(4));
    }
}
