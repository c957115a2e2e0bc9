//! One-variable logistic regression
//!
//! Fits `P(y=1) = sigmoid(intercept + slope * x)` by Newton's method,
//! minimising `C * sum(log_loss) + slope^2 / 2`. The intercept is not
//! penalised.

use thiserror::Error;

const MAX_ITER: usize = 100;
const TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegressionError {
    #[error("no data")]
    Empty,
    #[error("x and y differ in length ({0} vs {1})")]
    LengthMismatch(usize, usize),
    #[error("single class in outcomes")]
    SingleClass,
    #[error("non-finite input")]
    NonFinite,
    #[error("did not converge")]
    NoConvergence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticFit {
    pub slope: f64,
    pub intercept: f64,
    pub iterations: usize,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn objective(x: &[f64], y: &[u8], slope: f64, intercept: f64, lambda: f64) -> f64 {
    let loss: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let z = intercept + slope * xi;
            // log(1 + e^z) - y*z, evaluated without overflow
            let softplus = if z > 0.0 {
                z + (-z).exp().ln_1p()
            } else {
                z.exp().ln_1p()
            };
            softplus - f64::from(yi) * z
        })
        .sum();
    loss + 0.5 * lambda * slope * slope
}

/// Fit with inverse regularisation strength `c`
pub fn fit_logistic_1d(x: &[f64], y: &[u8], c: f64) -> Result<LogisticFit, RegressionError> {
    if x.len() != y.len() {
        return Err(RegressionError::LengthMismatch(x.len(), y.len()));
    }
    if x.is_empty() {
        return Err(RegressionError::Empty);
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(RegressionError::NonFinite);
    }
    let positives = y.iter().filter(|&&v| v == 1).count();
    if positives == 0 || positives == y.len() {
        return Err(RegressionError::SingleClass);
    }

    let lambda = 1.0 / c;
    let mut slope = 0.0;
    let mut intercept = 0.0;

    for iteration in 1..=MAX_ITER {
        // Gradient and Hessian of sum(log_loss) + lambda * slope^2 / 2
        let (mut g_s, mut g_b) = (lambda * slope, 0.0);
        let (mut h_ss, mut h_sb, mut h_bb) = (lambda, 0.0, 0.0);
        for (&xi, &yi) in x.iter().zip(y) {
            let p = sigmoid(intercept + slope * xi);
            let r = p - f64::from(yi);
            let w = p * (1.0 - p);
            g_s += r * xi;
            g_b += r;
            h_ss += w * xi * xi;
            h_sb += w * xi;
            h_bb += w;
        }

        let det = h_ss * h_bb - h_sb * h_sb;
        if !det.is_finite() || det.abs() < 1e-300 {
            return Err(RegressionError::NoConvergence);
        }
        let mut step_s = (h_bb * g_s - h_sb * g_b) / det;
        let mut step_b = (h_ss * g_b - h_sb * g_s) / det;

        // Halve the Newton step until the objective does not increase
        let current = objective(x, y, slope, intercept, lambda);
        for _ in 0..30 {
            if objective(x, y, slope - step_s, intercept - step_b, lambda) <= current {
                break;
            }
            step_s /= 2.0;
            step_b /= 2.0;
        }
        slope -= step_s;
        intercept -= step_b;

        if !slope.is_finite() || !intercept.is_finite() {
            return Err(RegressionError::NoConvergence);
        }
        if step_s.abs().max(step_b.abs()) < TOLERANCE {
            return Ok(LogisticFit {
                slope,
                intercept,
                iterations: iteration,
            });
        }
    }

    Err(RegressionError::NoConvergence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_positive_slope() {
        // Outcomes follow x with some overlap
        let x: Vec<f64> = (0..200).map(|i| (i as f64 - 100.0) / 25.0).collect();
        let y: Vec<u8> = (0..200)
            .map(|i| u8::from(if i % 7 == 0 { i < 100 } else { i >= 100 }))
            .collect();
        let fit = fit_logistic_1d(&x, &y, 1.0).unwrap();
        assert!(fit.slope > 0.3);
        assert!(fit.intercept.abs() < 1.0);
    }

    #[test]
    fn test_mirrored_inputs_flip_slope() {
        let x: Vec<f64> = (0..100).map(|i| (i as f64 - 50.0) / 20.0).collect();
        let y: Vec<u8> = (0..100).map(|i| u8::from((i * 37) % 100 < i)).collect();
        let neg: Vec<f64> = x.iter().map(|v| -v).collect();

        let a = fit_logistic_1d(&x, &y, 1.0).unwrap();
        let b = fit_logistic_1d(&neg, &y, 1.0).unwrap();
        assert!((a.slope + b.slope).abs() < 1e-8);
        assert!((a.intercept - b.intercept).abs() < 1e-8);
    }

    #[test]
    fn test_regularisation_keeps_separable_data_finite() {
        let x = vec![-2.0, -1.0, 1.0, 2.0];
        let y = vec![0, 0, 1, 1];
        let fit = fit_logistic_1d(&x, &y, 1.0).unwrap();
        assert!(fit.slope.is_finite() && fit.slope > 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(
            fit_logistic_1d(&[1.0, 2.0], &[1, 1], 1.0),
            Err(RegressionError::SingleClass)
        );
        assert_eq!(fit_logistic_1d(&[], &[], 1.0), Err(RegressionError::Empty));
        assert_eq!(
            fit_logistic_1d(&[1.0], &[1, 0], 1.0),
            Err(RegressionError::LengthMismatch(1, 2))
        );
    }
}
