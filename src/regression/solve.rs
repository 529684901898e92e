use log::trace;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::preprocess::Standardized;
use crate::error::{LassoError, LassoResult};

pub const DEFAULT_MAX_ITER: usize = 100_000;
pub const DEFAULT_TOLERANCE: f64 = 1e-7;

/// Stopping rules for the coordinate descent solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Converged once the largest squared coefficient update, relative to
    /// the response variance, drops below this value.
    pub tolerance: f64,
    /// Full sweeps over the active predictors allowed per lambda.
    pub max_iter: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iter: DEFAULT_MAX_ITER,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> LassoResult<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(LassoError::InvalidParameter {
                name: "tolerance",
                value: self.tolerance,
            });
        }
        if self.max_iter == 0 {
            return Err(LassoError::InvalidParameter {
                name: "max_iter",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Cyclic coordinate descent for `(1/2n)||y - X b||^2 + lambda ||b||_1` on
/// standardized predictors and a centred response.
pub(crate) struct CoordinateDescent<'a> {
    data: &'a Standardized,
    options: SolverOptions,
    threshold: f64,
}

impl<'a> CoordinateDescent<'a> {
    pub fn new(data: &'a Standardized, options: SolverOptions) -> Self {
        let n = data.n_rows().max(1) as f64;
        let variance = data.y.norm_squared() / n;
        Self {
            data,
            options,
            threshold: options.tolerance * variance,
        }
    }

    /// Solve at `lambda`, warm-started from `beta`. `residual` must equal
    /// `y - X beta` on entry and is kept in sync. Returns the sweeps used.
    pub fn solve(
        &self,
        lambda: f64,
        beta: &mut DVector<f64>,
        residual: &mut DVector<f64>,
    ) -> LassoResult<usize> {
        let n = self.data.n_rows() as f64;
        let x = &self.data.x;

        for sweep in 1..=self.options.max_iter {
            let mut max_change = 0.0_f64;

            for j in 0..x.ncols() {
                if !self.data.is_active(j) {
                    continue;
                }
                let column = x.column(j);
                let old = beta[j];
                // Unit-variance columns make the coordinate curvature exactly one.
                let z = column.dot(&*residual) / n + old;
                let new = soft_threshold(z, lambda);
                let delta = new - old;

                if delta != 0.0 {
                    beta[j] = new;
                    residual.axpy(-delta, &column, 1.0);
                    max_change = max_change.max(delta * delta);
                }
            }

            if max_change <= self.threshold {
                trace!("lambda {:.6e}: converged after {} sweeps", lambda, sweep);
                return Ok(sweep);
            }
        }

        Err(LassoError::ConvergenceFailure {
            lambda,
            iterations: self.options.max_iter,
        })
    }
}

/// Smallest lambda at which every coefficient is zero.
pub(crate) fn lambda_max(data: &Standardized) -> f64 {
    let n = data.n_rows().max(1) as f64;
    (0..data.n_features())
        .filter(|j| data.is_active(*j))
        .map(|j| data.x.column(j).dot(&data.y).abs() / n)
        .fold(0.0, f64::max)
}

/// `count` values decreasing geometrically from `max` to `max * min_ratio`.
pub(crate) fn lambda_path(max: f64, count: usize, min_ratio: f64) -> Vec<f64> {
    if count <= 1 {
        return vec![max];
    }
    let step = min_ratio.ln() / (count - 1) as f64;
    (0..count)
        .map(|l| max * (step * l as f64).exp())
        .collect()
}

pub(crate) fn soft_threshold(value: f64, lambda: f64) -> f64 {
    if value > lambda {
        value - lambda
    } else if value < -lambda {
        value + lambda
    } else {
        0.0
    }
}
