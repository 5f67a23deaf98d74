//! Evaluation of exported scikit-learn estimators.

use serde::{Deserialize, Serialize};

/// Marker scikit-learn uses for "no child" in `children_left`/`children_right`.
pub const TREE_LEAF: i64 = -1;

/// A fitted estimator, tagged by `type` in the artifact JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    /// Linear model; a single coefficient row with two classes is a binary
    /// sigmoid, otherwise rows are per-class logits combined with softmax.
    LogisticRegression {
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
    DecisionTree { tree: Tree },
    /// Mean of per-tree class probabilities.
    RandomForest { trees: Vec<Tree> },
}

/// Parallel node arrays in the layout of scikit-learn's `tree_` attribute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights; only leaves are read.
    pub value: Vec<Vec<f64>>,
}

impl Estimator {
    /// Checks array shapes against the artifact's feature and class counts.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency.
    pub fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        match self {
            Self::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                let binary = n_classes == 2 && coefficients.len() == 1;
                if !binary && coefficients.len() != n_classes {
                    return Err(format!(
                        "expected {n_classes} coefficient rows, found {}",
                        coefficients.len()
                    ));
                }
                if intercepts.len() != coefficients.len() {
                    return Err(format!(
                        "expected {} intercepts, found {}",
                        coefficients.len(),
                        intercepts.len()
                    ));
                }
                if let Some(row) = coefficients.iter().find(|row| row.len() != n_features) {
                    return Err(format!(
                        "coefficient row has {} entries for {n_features} features",
                        row.len()
                    ));
                }
                let finite = coefficients.iter().flatten().chain(intercepts).all(|v| v.is_finite());
                if !finite {
                    return Err("coefficients must be finite".to_string());
                }
                Ok(())
            }
            Self::DecisionTree { tree } => tree.validate(n_features, n_classes),
            Self::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err("random forest has no trees".to_string());
                }
                for (index, tree) in trees.iter().enumerate() {
                    tree.validate(n_features, n_classes)
                        .map_err(|message| format!("tree {index}: {message}"))?;
                }
                Ok(())
            }
        }
    }

    /// Class probabilities for one feature vector; shapes must already be validated.
    #[must_use]
    pub fn predict_proba(&self, x: &[f64]) -> Vec<f64> {
        match self {
            Self::LogisticRegression {
                coefficients,
                intercepts,
            } => {
                let logits: Vec<f64> = coefficients
                    .iter()
                    .zip(intercepts)
                    .map(|(row, intercept)| dot(row, x) + intercept)
                    .collect();
                if logits.len() == 1 {
                    let positive = sigmoid(logits[0]);
                    vec![1.0 - positive, positive]
                } else {
                    softmax(&logits)
                }
            }
            Self::DecisionTree { tree } => normalize(tree.leaf_value(x)),
            Self::RandomForest { trees } => {
                let mut total: Vec<f64> = Vec::new();
                for tree in trees {
                    let probabilities = normalize(tree.leaf_value(x));
                    if total.is_empty() {
                        total = probabilities;
                    } else {
                        for (sum, value) in total.iter_mut().zip(probabilities) {
                            *sum += value;
                        }
                    }
                }
                #[allow(clippy::cast_precision_loss)]
                let count = trees.len() as f64;
                total.iter().map(|sum| sum / count).collect()
            }
        }
    }
}

impl Tree {
    fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        let nodes = self.node_count();
        if nodes == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_right.len() != nodes
            || self.feature.len() != nodes
            || self.threshold.len() != nodes
            || self.value.len() != nodes
        {
            return Err("tree node arrays differ in length".to_string());
        }
        for node in 0..nodes {
            let left = self.children_left[node];
            let right = self.children_right[node];
            if left == TREE_LEAF && right == TREE_LEAF {
                let value = &self.value[node];
                if value.len() != n_classes {
                    return Err(format!(
                        "leaf {node} has {} class weights for {n_classes} classes",
                        value.len()
                    ));
                }
                if value.iter().any(|weight| !weight.is_finite() || *weight < 0.0) {
                    return Err(format!("leaf {node} has invalid class weights"));
                }
                continue;
            }
            // Children must point forward so traversal always terminates.
            let in_range = |child: i64| {
                usize::try_from(child).is_ok_and(|child| child > node && child < nodes)
            };
            if !in_range(left) || !in_range(right) {
                return Err(format!("node {node} has out-of-range children"));
            }
            let feature_ok = usize::try_from(self.feature[node]).is_ok_and(|f| f < n_features);
            if !feature_ok {
                return Err(format!("node {node} splits on an unknown feature"));
            }
            if self.threshold[node].is_nan() {
                return Err(format!("node {node} has a NaN threshold"));
            }
        }
        Ok(())
    }

    fn leaf_value(&self, x: &[f64]) -> &[f64] {
        let mut node = 0usize;
        loop {
            let left = self.children_left[node];
            let right = self.children_right[node];
            if left == TREE_LEAF {
                return &self.value[node];
            }
            let feature = usize::try_from(self.feature[node]).unwrap_or_default();
            let next = if x.get(feature).copied().unwrap_or_default() <= self.threshold[node] {
                left
            } else {
                right
            };
            node = usize::try_from(next).unwrap_or_default();
        }
    }
}

fn dot(row: &[f64], x: &[f64]) -> f64 {
    row.iter().zip(x).map(|(weight, value)| weight * value).sum()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|logit| (logit - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.iter().map(|value| value / sum).collect()
}

fn normalize(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let uniform = 1.0 / weights.len() as f64;
        return vec![uniform; weights.len()];
    }
    weights.iter().map(|weight| weight / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![0.5, -2.0, -2.0],
            value: vec![vec![5.0, 5.0], vec![4.0, 1.0], vec![0.0, 3.0]],
        }
    }

    #[test]
    fn tree_follows_sklearn_split_direction() {
        let estimator = Estimator::DecisionTree { tree: stump() };
        estimator.validate(1, 2).expect("stump is valid");
        assert_eq!(estimator.predict_proba(&[0.5]), vec![0.8, 0.2]);
        assert_eq!(estimator.predict_proba(&[0.6]), vec![0.0, 1.0]);
    }

    #[test]
    fn forest_averages_trees() {
        let mut flipped = stump();
        flipped.value = vec![vec![1.0, 1.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        let estimator = Estimator::RandomForest {
            trees: vec![stump(), flipped],
        };
        estimator.validate(1, 2).expect("forest is valid");
        let probabilities = estimator.predict_proba(&[0.0]);
        assert!((probabilities[0] - 0.4).abs() < 1e-12);
        assert!((probabilities[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn logistic_softmax_sums_to_one() {
        let estimator = Estimator::LogisticRegression {
            coefficients: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, -1.0]],
            intercepts: vec![0.0, 0.0, 0.0],
        };
        estimator.validate(2, 3).expect("valid shape");
        let probabilities = estimator.predict_proba(&[2.0, 0.0]);
        assert!((probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(probabilities[0] > probabilities[1]);
    }

    #[test]
    fn binary_logistic_uses_sigmoid() {
        let estimator = Estimator::LogisticRegression {
            coefficients: vec![vec![1.0]],
            intercepts: vec![0.0],
        };
        estimator.validate(1, 2).expect("binary shape");
        assert_eq!(estimator.predict_proba(&[0.0]), vec![0.5, 0.5]);
    }

    #[test]
    fn validation_rejects_cycles_and_bad_shapes() {
        let mut cyclic = stump();
        cyclic.children_left[0] = 0;
        assert!(Estimator::DecisionTree { tree: cyclic }.validate(1, 2).is_err());

        let mut bad_feature = stump();
        bad_feature.feature[0] = 3;
        assert!(Estimator::DecisionTree { tree: bad_feature }.validate(1, 2).is_err());

        let logistic = Estimator::LogisticRegression {
            coefficients: vec![vec![1.0, 2.0]],
            intercepts: vec![0.0],
        };
        assert!(logistic.validate(3, 2).is_err());
        assert!(Estimator::RandomForest { trees: Vec::new() }.validate(1, 2).is_err());
    }
}
