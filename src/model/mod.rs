//! Match outcome classifiers
//!
//! Two interchangeable models behind [`Classifier`]:
//! - Gradient-boosted trees: default, histogram-binned log-loss boosting
//! - Logistic: single linear layer with sigmoid, trained with burn

pub mod gbt;
pub mod logistic;

pub use gbt::{GbtModel, GradientBoostedTrees};
pub use logistic::{LogisticClassifier, LogisticModel};

use crate::{NrlError, Result};

/// Dense row-major feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    n_rows: usize,
    n_cols: usize,
    data: Vec<f64>,
}

impl DesignMatrix {
    pub fn new(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != n_rows * n_cols {
            return Err(NrlError::Model(format!(
                "design matrix data has {} values, expected {}x{}",
                data.len(),
                n_rows,
                n_cols
            )));
        }
        Ok(DesignMatrix {
            n_rows,
            n_cols,
            data,
        })
    }

    /// Build from rows that must all have `n_cols` values
    pub fn from_rows(rows: Vec<Vec<f64>>, n_cols: usize) -> Result<Self> {
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(NrlError::Model(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    n_cols
                )));
            }
            data.extend(row);
        }
        Ok(DesignMatrix {
            n_rows,
            n_cols,
            data,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.n_cols..(row + 1) * self.n_cols]
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        (0..self.n_rows).map(move |r| self.get(r, col))
    }
}

/// A trainable binary classifier producing P(home win)
pub trait Classifier {
    type Model;

    /// Fit a fresh model on labelled rows
    fn train(&self, x: &DesignMatrix, y: &[u8]) -> Result<Self::Model>;

    /// Probability of the positive class for each row
    fn predict(&self, model: &Self::Model, x: &DesignMatrix) -> Result<Vec<f64>>;

    fn name(&self) -> &'static str;
}

/// Shared input checks for `train`
pub(crate) fn check_training_data(x: &DesignMatrix, y: &[u8]) -> Result<()> {
    if x.n_rows() != y.len() {
        return Err(NrlError::Model(format!(
            "{} training rows but {} labels",
            x.n_rows(),
            y.len()
        )));
    }
    if x.n_rows() == 0 {
        return Err(NrlError::Model("no training rows".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_matrix_layout() {
        let x = DesignMatrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
        assert_eq!(x.n_rows(), 2);
        assert_eq!(x.get(1, 0), 3.0);
        assert_eq!(x.row(0), &[1.0, 2.0]);
        assert_eq!(x.column(1).collect::<Vec<_>>(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_design_matrix_rejects_ragged_rows() {
        assert!(DesignMatrix::from_rows(vec![vec![1.0], vec![3.0, 4.0]], 2).is_err());
        assert!(DesignMatrix::new(2, 2, vec![0.0; 3]).is_err());
    }
}
