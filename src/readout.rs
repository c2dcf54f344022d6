//! Linear readout — the only trainable component of the reservoir.
//!
//! Maps the reservoir state to the output vector via y = W·x + b.
//! Training is closed-form ridge regression over a batch of collected
//! states, centered on both sides: solve (X̃ᵀX̃ + λI) W = X̃ᵀ(Y − ȳ) per
//! output column, then recover the intercept as b = ȳ − W·x̄.
//!
//! A solve never mutates an existing readout; it produces a fresh one that
//! the owner installs in a single swap. A singular normal matrix (pivot
//! below 1e-12 under Gauss-Jordan) is reported as `EchoError::Training`.

use serde::{Deserialize, Serialize};

use crate::errors::{EchoError, Result};

/// Linear readout projection: y = W·x + b.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearReadout {
    /// Input dimension (reservoir size)
    pub feature_dim: usize,
    /// Output dimension (one channel per cognitive domain)
    pub output_dim: usize,
    /// Weight matrix, output_dim × feature_dim, row-major
    pub weights: Vec<f64>,
    /// Bias vector, output_dim
    pub bias: Vec<f64>,
    /// Whether this readout came out of a successful solve
    pub trained: bool,
}

impl LinearReadout {
    /// A zeroed, untrained readout.
    pub fn new(feature_dim: usize, output_dim: usize) -> Self {
        Self {
            feature_dim,
            output_dim,
            weights: vec![0.0; output_dim * feature_dim],
            bias: vec![0.0; output_dim],
            trained: false,
        }
    }

    /// Forward pass. `features` must have length `feature_dim`.
    pub fn forward(&self, features: &[f64]) -> Vec<f64> {
        let mut output = vec![0.0; self.output_dim];
        for (o, out) in output.iter_mut().enumerate() {
            let row = &self.weights[o * self.feature_dim..(o + 1) * self.feature_dim];
            let mut sum = self.bias[o];
            for (w, x) in row.iter().zip(features) {
                sum += w * x;
            }
            *out = sum;
        }
        output
    }

    /// Closed-form ridge solve over a state/target batch.
    ///
    /// Every row of `states` must have length `feature_dim` and every row
    /// of `targets` length `output_dim`; a misshapen row is rejected as
    /// `EchoError::Shape`. Returns a fresh trained readout, or
    /// `EchoError::Training` when the batch is empty or the regularized
    /// normal matrix is singular — the caller's previous readout stays
    /// untouched either way.
    pub fn solve_ridge(
        states: &[Vec<f64>],
        targets: &[Vec<f64>],
        feature_dim: usize,
        output_dim: usize,
        lambda: f64,
    ) -> Result<Self> {
        let n = states.len();
        if n == 0 || targets.len() != n {
            return Err(EchoError::Training(
                "empty or mismatched training batch".into(),
            ));
        }
        for row in states {
            if row.len() != feature_dim {
                return Err(EchoError::Shape {
                    expected: feature_dim,
                    got: row.len(),
                });
            }
        }
        for target in targets {
            if target.len() != output_dim {
                return Err(EchoError::Shape {
                    expected: output_dim,
                    got: target.len(),
                });
            }
        }

        // Center states and targets; the intercept is recovered afterwards
        // as b = ȳ − W·x̄.
        let fd = feature_dim;
        let mut mean_state = vec![0.0; fd];
        for row in states {
            for (m, &x) in mean_state.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in mean_state.iter_mut() {
            *m /= n as f64;
        }
        let mut mean_target = vec![0.0; output_dim];
        for target in targets {
            for (m, &t) in mean_target.iter_mut().zip(target) {
                *m += t;
            }
        }
        for m in mean_target.iter_mut() {
            *m /= n as f64;
        }

        let centered: Vec<Vec<f64>> = states
            .iter()
            .map(|row| row.iter().zip(&mean_state).map(|(x, m)| x - m).collect())
            .collect();

        // X̃ᵀX̃ + λI (feature_dim × feature_dim)
        let mut xtx = vec![0.0f64; fd * fd];
        for row in &centered {
            for i in 0..fd {
                for j in i..fd {
                    xtx[i * fd + j] += row[i] * row[j];
                }
            }
        }
        for i in 0..fd {
            for j in 0..i {
                xtx[i * fd + j] = xtx[j * fd + i];
            }
            xtx[i * fd + i] += lambda;
        }

        let xtx_inv = invert_matrix(&xtx, fd).ok_or_else(|| {
            EchoError::Training("singular design matrix, readout unchanged".into())
        })?;

        // Per output channel: w_o = (X̃ᵀX̃ + λI)⁻¹ X̃ᵀ(y_o − ȳ_o)
        let mut weights = vec![0.0f64; output_dim * fd];
        let mut bias = vec![0.0f64; output_dim];
        for o in 0..output_dim {
            let mut xty = vec![0.0f64; fd];
            for (row, target) in centered.iter().zip(targets) {
                let t = target[o] - mean_target[o];
                for (acc, &x) in xty.iter_mut().zip(row) {
                    *acc += x * t;
                }
            }
            let mut dot_mean = 0.0;
            for j in 0..fd {
                let mut val = 0.0;
                for i in 0..fd {
                    val += xtx_inv[j * fd + i] * xty[i];
                }
                weights[o * fd + j] = val;
                dot_mean += val * mean_state[j];
            }
            bias[o] = mean_target[o] - dot_mean;
        }

        Ok(Self {
            feature_dim: fd,
            output_dim,
            weights,
            bias,
            trained: true,
        })
    }
}

// ---------------------------------------------------------------------------
// Gauss-Jordan inversion
// ---------------------------------------------------------------------------

/// Invert a dim×dim matrix with partial pivoting.
/// Returns None when a pivot falls below 1e-12 (singular).
fn invert_matrix(a: &[f64], dim: usize) -> Option<Vec<f64>> {
    let stride = 2 * dim;
    let mut aug = vec![0.0f64; dim * stride];
    for i in 0..dim {
        aug[i * stride..i * stride + dim].copy_from_slice(&a[i * dim..(i + 1) * dim]);
        aug[i * stride + dim + i] = 1.0;
    }

    for col in 0..dim {
        let mut pivot_row = col;
        for row in (col + 1)..dim {
            if aug[row * stride + col].abs() > aug[pivot_row * stride + col].abs() {
                pivot_row = row;
            }
        }
        if aug[pivot_row * stride + col].abs() < 1e-12 {
            return None;
        }
        if pivot_row != col {
            for j in 0..stride {
                aug.swap(col * stride + j, pivot_row * stride + j);
            }
        }

        let pivot = aug[col * stride + col];
        for j in 0..stride {
            aug[col * stride + j] /= pivot;
        }
        for row in 0..dim {
            if row == col {
                continue;
            }
            let factor = aug[row * stride + col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..stride {
                aug[row * stride + j] -= factor * aug[col * stride + j];
            }
        }
    }

    let mut inv = vec![0.0f64; dim * dim];
    for i in 0..dim {
        inv[i * dim..(i + 1) * dim]
            .copy_from_slice(&aug[i * stride + dim..i * stride + stride]);
    }
    Some(inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_applies_weights_and_bias() {
        let mut readout = LinearReadout::new(4, 2);
        readout.weights = vec![
            1.0, 0.0, 0.0, 0.0, // output 0 = feature 0
            0.0, 1.0, 0.0, 0.0, // output 1 = feature 1
        ];
        readout.bias = vec![0.1, 0.2];

        let output = readout.forward(&[0.5, 0.3, 0.1, 0.1]);
        assert!((output[0] - 0.6).abs() < 1e-12, "output[0] = {}", output[0]);
        assert!((output[1] - 0.5).abs() < 1e-12, "output[1] = {}", output[1]);
    }

    #[test]
    fn untrained_readout_outputs_zero() {
        let readout = LinearReadout::new(3, 2);
        assert!(!readout.trained);
        assert_eq!(readout.forward(&[1.0, 2.0, 3.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn solve_recovers_linear_map() {
        // y0 = 2*x0, y1 = 3*x1
        let states = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![1.0, 1.0, 0.2],
            vec![0.5, 0.5, 0.7],
            vec![0.2, 0.9, 0.4],
        ];
        let targets: Vec<Vec<f64>> = states
            .iter()
            .map(|s| vec![2.0 * s[0], 3.0 * s[1]])
            .collect();

        let readout = LinearReadout::solve_ridge(&states, &targets, 3, 2, 1e-9).unwrap();
        assert!(readout.trained);

        let pred = readout.forward(&[0.4, 0.6, 0.1]);
        assert!((pred[0] - 0.8).abs() < 1e-3, "pred[0] = {}", pred[0]);
        assert!((pred[1] - 1.8).abs() < 1e-3, "pred[1] = {}", pred[1]);
    }

    #[test]
    fn identical_rows_without_ridge_are_singular() {
        let states = vec![vec![0.3, 0.3, 0.3]; 8];
        let targets = vec![vec![1.0]; 8];
        let err = LinearReadout::solve_ridge(&states, &targets, 3, 1, 0.0).unwrap_err();
        assert!(matches!(err, EchoError::Training(_)), "got {err:?}");
    }

    #[test]
    fn ridge_term_rescues_rank_deficiency() {
        let states = vec![vec![0.3, 0.3, 0.3]; 8];
        let targets = vec![vec![1.0]; 8];
        let readout = LinearReadout::solve_ridge(&states, &targets, 3, 1, 1e-3).unwrap();
        assert!(readout.trained);
    }

    #[test]
    fn empty_batch_is_a_training_error() {
        let err = LinearReadout::solve_ridge(&[], &[], 3, 1, 1e-3).unwrap_err();
        assert!(matches!(err, EchoError::Training(_)), "got {err:?}");
    }

    #[test]
    fn misshapen_rows_are_shape_errors_not_panics() {
        let good = vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]];

        let short_state = vec![vec![0.1, 0.2, 0.3], vec![0.4]];
        let targets = vec![vec![1.0], vec![0.0]];
        let err = LinearReadout::solve_ridge(&short_state, &targets, 3, 1, 1e-3).unwrap_err();
        assert_eq!(err, EchoError::Shape { expected: 3, got: 1 });

        let wide_target = vec![vec![1.0], vec![0.0, 9.0]];
        let err = LinearReadout::solve_ridge(&good, &wide_target, 3, 1, 1e-3).unwrap_err();
        assert_eq!(err, EchoError::Shape { expected: 1, got: 2 });
    }

    #[test]
    fn invert_identity_roundtrip() {
        let a = vec![1.0, 0.0, 0.0, 1.0];
        let inv = invert_matrix(&a, 2).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((inv[i * 2 + j] - expected).abs() < 1e-9);
            }
        }
    }
}
