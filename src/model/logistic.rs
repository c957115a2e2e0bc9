//! Logistic regression baseline
//!
//! Inputs are z-scored with training statistics, then a single `Linear`
//! layer with sigmoid output is fit by full-batch SGD on binary
//! cross-entropy.

use burn::backend::{Autodiff, NdArray};
use burn::module::AutodiffModule;
use burn::nn::{Linear, LinearConfig};
use burn::optim::{GradientsParams, Optimizer, SgdConfig};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

use crate::model::{check_training_data, Classifier, DesignMatrix};
use crate::{ModelConfig, NrlError, Result};

type InferBackend = NdArray<f32>;
type TrainBackend = Autodiff<InferBackend>;

#[derive(Debug, Clone)]
pub struct LogisticClassifier {
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl LogisticClassifier {
    pub fn from_config(config: &ModelConfig) -> Self {
        LogisticClassifier {
            epochs: config.logistic_epochs,
            learning_rate: config.logistic_learning_rate,
            seed: config.random_seed,
        }
    }
}

/// Per-column z-score parameters
#[derive(Debug, Clone)]
struct Standardizer {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Standardizer {
    fn fit(x: &DesignMatrix) -> Self {
        let n = x.n_rows() as f64;
        let mut mean = Vec::with_capacity(x.n_cols());
        let mut std = Vec::with_capacity(x.n_cols());
        for j in 0..x.n_cols() {
            let m = x.column(j).sum::<f64>() / n;
            let var = x.column(j).map(|v| (v - m).powi(2)).sum::<f64>() / n;
            mean.push(m);
            // Constant columns are centred but not scaled
            std.push(if var > 1e-12 { var.sqrt() } else { 1.0 });
        }
        Standardizer { mean, std }
    }

    fn transform(&self, x: &DesignMatrix) -> Vec<f32> {
        (0..x.n_rows())
            .flat_map(|i| {
                x.row(i)
                    .iter()
                    .enumerate()
                    .map(|(j, v)| ((v - self.mean[j]) / self.std[j]) as f32)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// Fitted logistic model
#[derive(Debug)]
pub struct LogisticModel {
    linear: Linear<InferBackend>,
    scaler: Standardizer,
    /// Training loss after the final epoch
    pub final_loss: f32,
}

fn to_tensor<B: Backend>(data: &[f32], n_rows: usize, n_cols: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::<B, 1>::from_floats(data, device).reshape([n_rows, n_cols])
}

fn binary_cross_entropy<B: Backend>(probs: Tensor<B, 2>, targets: Tensor<B, 2>) -> Tensor<B, 1> {
    let eps = 1e-7;
    let probs_clamped = probs.clamp(eps, 1.0 - eps);
    let loss = targets.clone().neg() * probs_clamped.clone().log()
        - (targets.neg() + 1.0) * (probs_clamped.neg() + 1.0).log();
    loss.mean()
}

impl Classifier for LogisticClassifier {
    type Model = LogisticModel;

    fn train(&self, x: &DesignMatrix, y: &[u8]) -> Result<LogisticModel> {
        check_training_data(x, y)?;
        TrainBackend::seed(self.seed);
        let device = Default::default();

        let scaler = Standardizer::fit(x);
        let features = scaler.transform(x);
        let labels: Vec<f32> = y.iter().map(|&v| f32::from(v)).collect();

        let x_train = to_tensor::<TrainBackend>(&features, x.n_rows(), x.n_cols(), &device);
        let y_train = to_tensor::<TrainBackend>(&labels, y.len(), 1, &device);

        let mut model: Linear<TrainBackend> = LinearConfig::new(x.n_cols(), 1).init(&device);
        let mut optimizer = SgdConfig::new().init::<TrainBackend, Linear<TrainBackend>>();

        let mut final_loss = f32::NAN;
        for epoch in 0..self.epochs {
            let probs = sigmoid(model.forward(x_train.clone()));
            let loss = binary_cross_entropy(probs, y_train.clone());
            final_loss = loss.clone().into_scalar().elem();

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(self.learning_rate, model, grads);

            if epoch % 100 == 0 || epoch + 1 == self.epochs {
                log::debug!("Logistic epoch {}/{}: loss={:.4}", epoch + 1, self.epochs, final_loss);
            }
        }

        if !final_loss.is_finite() && self.epochs > 0 {
            return Err(NrlError::Model(format!(
                "logistic training diverged (loss {})",
                final_loss
            )));
        }

        Ok(LogisticModel {
            linear: model.valid(),
            scaler,
            final_loss,
        })
    }

    fn predict(&self, model: &LogisticModel, x: &DesignMatrix) -> Result<Vec<f64>> {
        if x.n_cols() != model.scaler.mean.len() {
            return Err(NrlError::Model(format!(
                "model trained on {} features, got {}",
                model.scaler.mean.len(),
                x.n_cols()
            )));
        }
        if x.n_rows() == 0 {
            return Ok(Vec::new());
        }

        let device = Default::default();
        let features = model.scaler.transform(x);
        let input = to_tensor::<InferBackend>(&features, x.n_rows(), x.n_cols(), &device);
        let probs = sigmoid(model.linear.forward(input));

        let data = probs.into_data();
        let values = data
            .as_slice::<f32>()
            .map_err(|e| NrlError::Model(format!("Failed to read predictions: {:?}", e)))?;
        Ok(values.iter().map(|&p| f64::from(p)).collect())
    }

    fn name(&self) -> &'static str {
        "logistic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data() -> (DesignMatrix, Vec<u8>) {
        // Outcome follows the first column, the second is constant
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![(i as f64 - 30.0) / 3.0, 5.0])
            .collect();
        let y: Vec<u8> = (0..60).map(|i| u8::from(i >= 30)).collect();
        (DesignMatrix::from_rows(rows, 2).unwrap(), y)
    }

    #[test]
    fn test_learns_monotone_signal() {
        let (x, y) = make_data();
        let clf = LogisticClassifier {
            epochs: 200,
            learning_rate: 0.5,
            seed: 42,
        };
        let model = clf.train(&x, &y).unwrap();
        let probs = clf.predict(&model, &x).unwrap();

        assert_eq!(probs.len(), 60);
        assert!(probs[0] < 0.2);
        assert!(probs[59] > 0.8);
        assert!(probs.windows(2).all(|w| w[0] <= w[1] + 1e-6));
        assert!(model.final_loss < 0.5);
    }

    #[test]
    fn test_rejects_mismatched_labels() {
        let (x, _) = make_data();
        let clf = LogisticClassifier::from_config(&crate::Config::default().model);
        assert!(clf.train(&x, &[1, 0]).is_err());
    }
}
