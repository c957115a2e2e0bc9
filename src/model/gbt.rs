//! Histogram gradient-boosted trees
//!
//! Binary log-loss boosting. Features are bucketed into at most 255
//! quantile bins per column, trees grow depth-first up to `max_depth`, and
//! split thresholds are stored as real values so prediction does not need
//! the bins.

use crate::model::{check_training_data, Classifier, DesignMatrix};
use crate::{ModelConfig, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

const MAX_BINS: usize = 255;
const MIN_HESSIAN: f64 = 1e-16;
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    pub max_iter: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_leaf: usize,
    pub l2_regularization: f64,
    /// Row fraction drawn per iteration
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GradientBoostedTrees {
    fn default() -> Self {
        Self::from_config(&crate::Config::default().model)
    }
}

impl GradientBoostedTrees {
    pub fn from_config(config: &ModelConfig) -> Self {
        GradientBoostedTrees {
            max_iter: config.max_iter,
            max_depth: config.max_depth,
            learning_rate: config.learning_rate,
            min_samples_leaf: config.min_samples_leaf,
            l2_regularization: config.l2_regularization,
            subsample: config.subsample,
            seed: config.random_seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Split {
        feature: usize,
        /// Values `<= threshold` go left
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A regression tree stored as a node arena, root at index 0
#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

/// Fitted ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct GbtModel {
    baseline: f64,
    trees: Vec<Tree>,
    n_features: usize,
}

impl GbtModel {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn raw_score(&self, row: &[f64]) -> f64 {
        self.baseline + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }
}

/// Per-column bin edges
struct Binner {
    /// Ascending thresholds; bin `b` holds values in `(t[b-1], t[b]]`
    thresholds: Vec<Vec<f64>>,
}

impl Binner {
    fn fit(x: &DesignMatrix) -> Self {
        let thresholds = (0..x.n_cols())
            .map(|j| {
                let mut values: Vec<f64> = x.column(j).filter(|v| v.is_finite()).collect();
                values.sort_by(f64::total_cmp);
                values.dedup();
                column_thresholds(&values)
            })
            .collect();
        Binner { thresholds }
    }

    fn bin(&self, col: usize, value: f64) -> u8 {
        // At most MAX_BINS - 1 thresholds, so this always fits
        self.thresholds[col].partition_point(|&t| t < value) as u8
    }

    fn n_bins(&self, col: usize) -> usize {
        self.thresholds[col].len() + 1
    }

    /// Column-major bin codes
    fn transform(&self, x: &DesignMatrix) -> Vec<Vec<u8>> {
        (0..x.n_cols())
            .map(|j| x.column(j).map(|v| self.bin(j, v)).collect())
            .collect()
    }
}

/// Midpoints between distinct values, or between quantiles when there are
/// too many distinct values
fn column_thresholds(distinct: &[f64]) -> Vec<f64> {
    if distinct.len() <= 1 {
        return Vec::new();
    }
    if distinct.len() <= MAX_BINS {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }
    let n = distinct.len();
    let mut cuts: Vec<f64> = (1..MAX_BINS)
        .map(|k| {
            let pos = k * (n - 1) / MAX_BINS;
            (distinct[pos] + distinct[pos + 1]) / 2.0
        })
        .collect();
    cuts.dedup();
    cuts
}

#[derive(Debug, Clone, Copy, Default)]
struct BinStats {
    grad: f64,
    hess: f64,
    count: usize,
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// State for growing one tree
struct TreeGrower<'a> {
    params: &'a GradientBoostedTrees,
    binner: &'a Binner,
    bins: &'a [Vec<u8>],
    grad: &'a [f64],
    hess: &'a [f64],
    nodes: Vec<Node>,
}

impl<'a> TreeGrower<'a> {
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.l2_regularization) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.l2_regularization).max(MIN_HESSIAN)
    }

    fn best_split(&self, rows: &[usize], g_total: f64, h_total: f64) -> Option<SplitCandidate> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent = self.score(g_total, h_total);
        let mut best: Option<SplitCandidate> = None;

        for (feature, col) in self.bins.iter().enumerate() {
            let n_bins = self.binner.n_bins(feature);
            if n_bins < 2 {
                continue;
            }
            let mut hist = vec![BinStats::default(); n_bins];
            for &r in rows {
                let b = &mut hist[col[r] as usize];
                b.grad += self.grad[r];
                b.hess += self.hess[r];
                b.count += 1;
            }

            let mut left = BinStats::default();
            for (bin, stats) in hist.iter().enumerate().take(n_bins - 1) {
                left.grad += stats.grad;
                left.hess += stats.hess;
                left.count += stats.count;

                let right_count = rows.len() - left.count;
                if left.count < min_leaf {
                    continue;
                }
                if right_count < min_leaf {
                    break;
                }

                let gain = self.score(left.grad, left.hess)
                    + self.score(g_total - left.grad, h_total - left.hess)
                    - parent;
                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }

        best
    }

    /// Grow the subtree for `rows` and return its node index
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();

        let idx = self.nodes.len();
        let value = self.leaf_value(g, h);
        self.nodes.push(Node::Leaf { value });

        let can_split =
            depth < self.params.max_depth && rows.len() >= 2 * self.params.min_samples_leaf.max(1);
        let split = if can_split {
            self.best_split(&rows, g, h)
        } else {
            None
        };

        if let Some(split) = split {
            let col = &self.bins[split.feature];
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                rows.into_iter().partition(|&r| (col[r] as usize) <= split.bin);

            let left = self.grow(left_rows, depth + 1);
            let right = self.grow(right_rows, depth + 1);
            self.nodes[idx] = Node::Split {
                feature: split.feature,
                threshold: self.binner.thresholds[split.feature][split.bin],
                left,
                right,
            };
        }

        idx
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for GradientBoostedTrees {
    type Model = GbtModel;

    fn train(&self, x: &DesignMatrix, y: &[u8]) -> Result<GbtModel> {
        check_training_data(x, y)?;
        let n = x.n_rows();

        let positive = y.iter().filter(|&&v| v == 1).count() as f64;
        let base_rate = (positive / n as f64).clamp(1e-6, 1.0 - 1e-6);
        let baseline = (base_rate / (1.0 - base_rate)).ln();

        let binner = Binner::fit(x);
        let bins = binner.transform(x);

        let mut raw = vec![baseline; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut trees = Vec::with_capacity(self.max_iter);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let n_sample = ((n as f64 * self.subsample).round() as usize).clamp(1, n);
        let all_rows: Vec<usize> = (0..n).collect();

        for iter in 0..self.max_iter {
            for i in 0..n {
                let p = sigmoid(raw[i]);
                grad[i] = p - f64::from(y[i]);
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let rows = if n_sample < n {
                let mut sampled = rand::seq::index::sample(&mut rng, n, n_sample).into_vec();
                sampled.sort_unstable();
                sampled
            } else {
                all_rows.clone()
            };

            let mut grower = TreeGrower {
                params: self,
                binner: &binner,
                bins: &bins,
                grad: &grad,
                hess: &hess,
                nodes: Vec::new(),
            };
            grower.grow(rows, 0);
            let tree = Tree {
                nodes: grower.nodes,
            };

            for (i, r) in raw.iter_mut().enumerate() {
                *r += tree.predict_row(x.row(i));
            }

            log::debug!("Boosting iteration {}: {} leaves", iter + 1, tree.n_leaves());
            trees.push(tree);
        }

        Ok(GbtModel {
            baseline,
            trees,
            n_features: x.n_cols(),
        })
    }

    fn predict(&self, model: &GbtModel, x: &DesignMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != model.n_features {
            return Err(crate::NrlError::Model(format!(
                "model trained on {} features, got {}",
                model.n_features,
                x.n_cols()
            )));
        }
        Ok((0..x.n_rows())
            .map(|i| sigmoid(model.raw_score(x.row(i))))
            .collect())
    }

    fn name(&self) -> &'static str {
        "gbt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn make_data(n: usize, seed: u64) -> (DesignMatrix, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for _ in 0..n {
            let signal: f64 = rng.gen_range(-1.0..1.0);
            let noise: f64 = rng.gen_range(-1.0..1.0);
            rows.push(vec![signal, noise]);
            y.push(u8::from(signal + 0.2 * noise > 0.0));
        }
        (DesignMatrix::from_rows(rows, 2).unwrap(), y)
    }

    fn small_model() -> GradientBoostedTrees {
        GradientBoostedTrees {
            max_iter: 30,
            max_depth: 3,
            min_samples_leaf: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_learns_separable_signal() {
        let (x, y) = make_data(400, 1);
        let gbt = small_model();
        let model = gbt.train(&x, &y).unwrap();
        assert_eq!(model.n_trees(), 30);

        let (x_test, y_test) = make_data(200, 2);
        let probs = gbt.predict(&model, &x_test).unwrap();
        let correct = probs
            .iter()
            .zip(&y_test)
            .filter(|(p, y)| (**p > 0.5) == (**y == 1))
            .count();
        assert!(correct as f64 / 200.0 > 0.85);
        assert!(probs.iter().all(|p| *p > 0.0 && *p < 1.0));
    }

    #[test]
    fn test_deterministic_with_subsample() {
        let (x, y) = make_data(200, 3);
        let gbt = GradientBoostedTrees {
            subsample: 0.5,
            ..small_model()
        };
        let a = gbt.train(&x, &y).unwrap();
        let b = gbt.train(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_features_predict_base_rate() {
        let x = DesignMatrix::from_rows(vec![vec![1.0]; 40], 1).unwrap();
        let y: Vec<u8> = (0..40).map(|i| u8::from(i % 4 == 0)).collect();
        let gbt = small_model();
        let model = gbt.train(&x, &y).unwrap();
        let probs = gbt.predict(&model, &x).unwrap();
        for p in probs {
            assert!((p - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_thresholds_respect_bin_cap() {
        let distinct: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let cuts = column_thresholds(&distinct);
        assert!(cuts.len() < MAX_BINS);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(column_thresholds(&[1.0, 3.0]), vec![2.0]);
        assert!(column_thresholds(&[5.0]).is_empty());
    }

    #[test]
    fn test_rejects_wrong_width() {
        let (x, y) = make_data(50, 4);
        let gbt = small_model();
        let model = gbt.train(&x, &y).unwrap();
        let narrow = DesignMatrix::from_rows(vec![vec![0.0]], 1).unwrap();
        assert!(gbt.predict(&model, &narrow).is_err());
    }
}
