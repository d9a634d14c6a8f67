//! Gradient-boosted binary classifier on ndarray.
//!
//! Newton boosting with logistic loss: each round fits a depth-limited
//! regression tree to the per-row gradients and takes a damped Newton step
//! per leaf. Predictions are sigmoid-transformed raw margins, so they lie
//! in (0, 1) by construction and need no clamp.
//!
//! All randomness flows through a single Pcg64Mcg stream seeded from
//! `BoosterParams::seed`, so a run is reproducible for a given seed.

use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// Training hyperparameters. Defaults mirror a stock binary booster:
/// 100 rounds, 0.1 shrinkage, depth-3 trees, seed 42.
#[derive(Debug, Clone)]
pub struct BoosterParams {
    pub rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Minimum rows on each side of a split
    pub min_leaf: usize,
    /// L2 regularization on leaf weights
    pub lambda: f64,
    /// Fraction of features considered per tree, in (0, 1]
    pub feature_fraction: f64,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            rounds: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_leaf: 5,
            lambda: 1.0,
            feature_fraction: 1.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted booster: a base margin plus an additive tree ensemble
#[derive(Debug, Clone)]
pub struct GradientBooster {
    base_margin: f64,
    trees: Vec<Node>,
    learning_rate: f64,
}

impl GradientBooster {
    /// Predicted probability of the positive class for every row
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array1<f64> {
        Array1::from_iter((0..features.nrows()).map(|i| sigmoid(self.raw_margin(features.row(i)))))
    }

    fn raw_margin(&self, row: ArrayView1<f64>) -> f64 {
        let mut margin = self.base_margin;
        for tree in &self.trees {
            margin += self.learning_rate * eval_tree(tree, row);
        }
        margin
    }
}

/// Fit a gradient-boosted binary classifier.
///
/// # Arguments
/// * `features` - (n_rows, n_features) matrix
/// * `labels` - 0/1 targets, one per row
///
/// # Errors
/// * Empty training set or feature/label length mismatch
pub fn train(
    features: &Array2<f64>,
    labels: &Array1<f64>,
    params: &BoosterParams,
) -> crate::Result<GradientBooster> {
    let n_rows = features.nrows();
    if n_rows == 0 {
        anyhow::bail!("cannot train on an empty dataset");
    }
    if labels.len() != n_rows {
        anyhow::bail!(
            "feature/label row mismatch: {} rows vs {} labels",
            n_rows,
            labels.len()
        );
    }

    // Base margin is the log-odds of the positive rate, clamped away from
    // the degenerate all-0/all-1 cases.
    let positive_rate = (labels.sum() / n_rows as f64).clamp(1e-6, 1.0 - 1e-6);
    let base_margin = (positive_rate / (1.0 - positive_rate)).ln();

    let mut margins = vec![base_margin; n_rows];
    let mut rng = Pcg64Mcg::seed_from_u64(params.seed);
    let mut trees = Vec::with_capacity(params.rounds);
    let all_rows: Vec<usize> = (0..n_rows).collect();

    for _ in 0..params.rounds {
        let mut grad = vec![0.0; n_rows];
        let mut hess = vec![0.0; n_rows];
        for i in 0..n_rows {
            let p = sigmoid(margins[i]);
            grad[i] = p - labels[i];
            hess[i] = (p * (1.0 - p)).max(1e-12);
        }

        let columns = sample_features(features.ncols(), params.feature_fraction, &mut rng);
        let tree = build_node(features, &grad, &hess, &all_rows, &columns, 0, params);

        for i in 0..n_rows {
            margins[i] += params.learning_rate * eval_tree(&tree, features.row(i));
        }
        trees.push(tree);
    }

    Ok(GradientBooster {
        base_margin,
        trees,
        learning_rate: params.learning_rate,
    })
}

/// Recursively grow one regression tree over `rows` with exact greedy splits
fn build_node(
    features: &Array2<f64>,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    columns: &[usize],
    depth: usize,
    params: &BoosterParams,
) -> Node {
    let grad_sum: f64 = rows.iter().map(|&i| grad[i]).sum();
    let hess_sum: f64 = rows.iter().map(|&i| hess[i]).sum();
    let leaf_value = -grad_sum / (hess_sum + params.lambda);

    if depth >= params.max_depth || rows.len() < 2 * params.min_leaf.max(1) {
        return Node::Leaf(leaf_value);
    }

    let parent_score = grad_sum * grad_sum / (hess_sum + params.lambda);
    let mut best: Option<(f64, usize, f64)> = None;

    for &col in columns {
        let mut order = rows.to_vec();
        order.sort_by(|&a, &b| features[[a, col]].total_cmp(&features[[b, col]]));

        let mut grad_left = 0.0;
        let mut hess_left = 0.0;
        for k in 0..order.len() - 1 {
            grad_left += grad[order[k]];
            hess_left += hess[order[k]];

            let value = features[[order[k], col]];
            let next_value = features[[order[k + 1], col]];
            if value == next_value {
                continue;
            }

            let n_left = k + 1;
            let n_right = order.len() - n_left;
            if n_left < params.min_leaf || n_right < params.min_leaf {
                continue;
            }

            let grad_right = grad_sum - grad_left;
            let hess_right = hess_sum - hess_left;
            let gain = grad_left * grad_left / (hess_left + params.lambda)
                + grad_right * grad_right / (hess_right + params.lambda)
                - parent_score;
            if gain > 1e-12 && best.map_or(true, |(g, _, _)| gain > g) {
                best = Some((gain, col, 0.5 * (value + next_value)));
            }
        }
    }

    match best {
        None => Node::Leaf(leaf_value),
        Some((_, feature, threshold)) => {
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .iter()
                .copied()
                .partition(|&i| features[[i, feature]] <= threshold);
            Node::Split {
                feature,
                threshold,
                left: Box::new(build_node(
                    features,
                    grad,
                    hess,
                    &left_rows,
                    columns,
                    depth + 1,
                    params,
                )),
                right: Box::new(build_node(
                    features,
                    grad,
                    hess,
                    &right_rows,
                    columns,
                    depth + 1,
                    params,
                )),
            }
        }
    }
}

fn eval_tree(node: &Node, row: ArrayView1<f64>) -> f64 {
    match node {
        Node::Leaf(value) => *value,
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] <= *threshold {
                eval_tree(left, row)
            } else {
                eval_tree(right, row)
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Deterministic partial Fisher-Yates draw of the per-tree feature subset
fn sample_features(n_features: usize, fraction: f64, rng: &mut Pcg64Mcg) -> Vec<usize> {
    if fraction >= 1.0 || n_features <= 1 {
        return (0..n_features).collect();
    }
    let keep = ((n_features as f64 * fraction).ceil() as usize).clamp(1, n_features);
    let mut indices: Vec<usize> = (0..n_features).collect();
    for i in 0..keep {
        let j = rng.gen_range(i..n_features);
        indices.swap(i, j);
    }
    indices.truncate(keep);
    indices.sort_unstable();
    indices
}
