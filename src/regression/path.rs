//! Lasso fits along a decreasing penalty path.
//!
//! Every point on the path is warm-started from the previous one, so the
//! whole path costs little more than the densest single fit.

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::preprocess::{feature_scaling, standardize, Standardized};
use super::report::FeatureScaling;
use super::solve::{lambda_max, lambda_path, CoordinateDescent, SolverOptions};
use crate::error::{LassoError, LassoResult};

pub const DEFAULT_N_LAMBDA: usize = 100;
pub const INTERCEPT_LABEL: &str = "(Intercept)";

/// How the penalty path is generated and solved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathOptions {
    pub n_lambda: usize,
    /// Ratio of the smallest to the largest lambda. `None` picks 1e-4 when
    /// there are more rows than predictors and 1e-2 otherwise.
    pub lambda_min_ratio: Option<f64>,
    pub solver: SolverOptions,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            n_lambda: DEFAULT_N_LAMBDA,
            lambda_min_ratio: None,
            solver: SolverOptions::default(),
        }
    }
}

impl PathOptions {
    pub fn validate(&self) -> LassoResult<()> {
        if self.n_lambda == 0 {
            return Err(LassoError::InvalidParameter {
                name: "n_lambda",
                value: 0.0,
            });
        }
        if let Some(ratio) = self.lambda_min_ratio {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(LassoError::InvalidParameter {
                    name: "lambda_min_ratio",
                    value: ratio,
                });
            }
        }
        self.solver.validate()
    }

    pub(crate) fn resolved_ratio(&self, rows: usize, features: usize) -> f64 {
        self.lambda_min_ratio
            .unwrap_or(if rows > features { 1e-4 } else { 1e-2 })
    }
}

/// Intercept and per-predictor weights on the input scale at one lambda.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    pub lambda: f64,
    pub intercept: f64,
    pub weights: Vec<f64>,
}

impl Coefficients {
    pub fn nonzero(&self) -> usize {
        self.weights.iter().filter(|w| **w != 0.0).count()
    }

    pub fn predict(&self, x: &DMatrix<f64>) -> DVector<f64> {
        let weights = DVector::from_column_slice(&self.weights);
        (x * weights).add_scalar(self.intercept)
    }
}

/// A fitted lasso path: one coefficient column per lambda.
#[derive(Debug, Clone)]
pub struct LassoPath {
    feature_names: Vec<String>,
    lambdas: Vec<f64>,
    /// (p + 1) x L, intercept in row 0.
    coefficients: DMatrix<f64>,
    dev_ratio: Vec<f64>,
    nonzero: Vec<usize>,
    data: Standardized,
    /// p x L coefficients on the standardized scale, kept for warm starts.
    standardized_betas: DMatrix<f64>,
    solver: SolverOptions,
}

/// Fit the lasso over its full penalty path, without cross-validation.
pub fn fit_path(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    feature_names: &[String],
    options: &PathOptions,
) -> LassoResult<LassoPath> {
    check_inputs(x, y, feature_names)?;
    options.validate()?;

    let data = standardize(x, y);
    if data.y.norm_squared() == 0.0 {
        return Err(LassoError::ConstantResponse);
    }
    let max = lambda_max(&data);
    if max <= 0.0 {
        return Err(LassoError::EmptyInput {
            field: "non-constant predictors",
        });
    }

    let ratio = options.resolved_ratio(x.nrows(), x.ncols());
    let lambdas = lambda_path(max, options.n_lambda, ratio);
    debug!(
        "lambda path: {} points from {:.6} to {:.6}",
        lambdas.len(),
        lambdas[0],
        lambdas[lambdas.len() - 1]
    );

    solve_path(data, lambdas, feature_names.to_vec(), options.solver)
}

/// Fit on a caller-supplied, decreasing lambda sequence (used by the folds).
pub(crate) fn fit_on_lambdas(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    feature_names: &[String],
    lambdas: &[f64],
    solver: SolverOptions,
) -> LassoResult<LassoPath> {
    check_inputs(x, y, feature_names)?;
    solve_path(standardize(x, y), lambdas.to_vec(), feature_names.to_vec(), solver)
}

fn check_inputs(x: &DMatrix<f64>, y: &DVector<f64>, feature_names: &[String]) -> LassoResult<()> {
    if x.nrows() != y.len() {
        return Err(LassoError::DimensionMismatch {
            y_len: y.len(),
            x_rows: x.nrows(),
        });
    }
    if x.nrows() == 0 {
        return Err(LassoError::EmptyInput { field: "rows" });
    }
    if x.ncols() == 0 {
        return Err(LassoError::EmptyInput { field: "predictors" });
    }
    if feature_names.len() != x.ncols() {
        return Err(LassoError::SchemaMismatch {
            expected: format!("{} columns", x.ncols()),
            found: feature_names.join(", "),
        });
    }
    Ok(())
}

fn solve_path(
    data: Standardized,
    lambdas: Vec<f64>,
    feature_names: Vec<String>,
    solver: SolverOptions,
) -> LassoResult<LassoPath> {
    let p = data.n_features();
    let count = lambdas.len();
    let null_deviance = data.y.norm_squared();

    let mut coefficients = DMatrix::zeros(p + 1, count);
    let mut standardized_betas = DMatrix::zeros(p, count);
    let mut dev_ratio = Vec::with_capacity(count);
    let mut nonzero = Vec::with_capacity(count);

    let mut beta = DVector::zeros(p);
    let mut residual = data.y.clone();
    {
        let descent = CoordinateDescent::new(&data, solver);
        for (l, lambda) in lambdas.iter().enumerate() {
            let sweeps = descent.solve(*lambda, &mut beta, &mut residual)?;
            let (intercept, weights) = data.unstandardize(&beta);

            coefficients[(0, l)] = intercept;
            for (j, w) in weights.iter().enumerate() {
                coefficients[(j + 1, l)] = *w;
            }
            standardized_betas.set_column(l, &beta);

            let ratio = if null_deviance > 0.0 {
                1.0 - residual.norm_squared() / null_deviance
            } else {
                0.0
            };
            dev_ratio.push(ratio);
            nonzero.push(weights.iter().filter(|w| **w != 0.0).count());

            debug!(
                "lambda[{}] = {:.6}: {} nonzero, dev ratio {:.4}, {} sweeps",
                l, lambda, nonzero[l], ratio, sweeps
            );
        }
    }

    Ok(LassoPath {
        feature_names,
        lambdas,
        coefficients,
        dev_ratio,
        nonzero,
        data,
        standardized_betas,
        solver,
    })
}

impl LassoPath {
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn lambdas(&self) -> &[f64] {
        &self.lambdas
    }

    pub fn len(&self) -> usize {
        self.lambdas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lambdas.is_empty()
    }

    /// Coefficient matrix, (p + 1) rows with the intercept first, one column per lambda.
    pub fn coefficient_matrix(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    /// Number of nonzero predictor weights at each lambda.
    pub fn nonzero(&self) -> &[usize] {
        &self.nonzero
    }

    /// Fraction of null deviance explained at each lambda.
    pub fn dev_ratio(&self) -> &[f64] {
        &self.dev_ratio
    }

    /// Means and standard deviations used to standardize each predictor.
    pub fn scaling(&self) -> Vec<FeatureScaling> {
        feature_scaling(&self.data, &self.feature_names)
    }

    pub fn column(&self, index: usize) -> Coefficients {
        let column = self.coefficients.column(index);
        Coefficients {
            lambda: self.lambdas[index],
            intercept: column[0],
            weights: column.iter().skip(1).copied().collect(),
        }
    }

    /// Row labels of the coefficient matrix.
    pub fn row_labels(&self) -> Vec<String> {
        std::iter::once(INTERCEPT_LABEL.to_string())
            .chain(self.feature_names.iter().cloned())
            .collect()
    }

    /// Coefficients at an arbitrary lambda.
    ///
    /// Values on the path are returned as stored; anything else is solved
    /// exactly, warm-started from the nearest larger path point.
    pub fn coefficients_at(&self, lambda: f64) -> LassoResult<Coefficients> {
        if lambda.is_nan() || lambda < 0.0 {
            return Err(LassoError::InvalidParameter {
                name: "lambda",
                value: lambda,
            });
        }

        let on_path = lambda.is_finite().then(|| {
            self.lambdas
                .iter()
                .position(|l| (l - lambda).abs() <= 1e-12 * lambda.max(1.0))
        });
        if let Some(Some(index)) = on_path {
            return Ok(self.column(index));
        }

        let p = self.data.n_features();
        let mut beta = match self.lambdas.iter().rposition(|l| *l > lambda) {
            Some(index) => self.standardized_betas.column(index).into_owned(),
            None => DVector::zeros(p),
        };
        let mut residual = &self.data.y - &self.data.x * &beta;

        CoordinateDescent::new(&self.data, self.solver).solve(lambda, &mut beta, &mut residual)?;
        let (intercept, weights) = self.data.unstandardize(&beta);
        Ok(Coefficients {
            lambda,
            intercept,
            weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::fixtures::synthetic;
    use approx::assert_abs_diff_eq;

    #[test]
    fn first_point_has_only_intercept() {
        let (x, y, names) = synthetic(64);
        let path = fit_path(&x, &y, &names, &PathOptions::default()).expect("path");

        assert_eq!(path.len(), DEFAULT_N_LAMBDA);
        assert_eq!(path.nonzero()[0], 0);
        assert_abs_diff_eq!(path.column(0).intercept, y.mean(), epsilon = 1e-10);
        assert_eq!(path.coefficient_matrix().shape(), (5, DEFAULT_N_LAMBDA));
    }

    #[test]
    fn sparsity_is_monotone_along_path() {
        let (x, y, names) = synthetic(80);
        let path = fit_path(&x, &y, &names, &PathOptions::default()).expect("path");

        // Lambdas decrease along the path, so nonzero counts must not decrease.
        assert!(path.nonzero().windows(2).all(|w| w[0] <= w[1]));
        assert!(path.dev_ratio().windows(2).all(|w| w[0] <= w[1] + 1e-9));
    }

    #[test]
    fn dense_end_recovers_true_weights() {
        let (x, y, names) = synthetic(120);
        let path = fit_path(&x, &y, &names, &PathOptions::default()).expect("path");
        let last = path.column(path.len() - 1);

        assert_abs_diff_eq!(last.weights[0], 3.0, epsilon = 0.05);
        assert_abs_diff_eq!(last.weights[1], -2.0, epsilon = 0.05);
        assert!(path.dev_ratio()[path.len() - 1] > 0.99);
    }

    #[test]
    fn off_path_lambda_matches_fresh_solve() {
        let (x, y, names) = synthetic(64);
        let path = fit_path(&x, &y, &names, &PathOptions::default()).expect("path");
        let target = (path.lambdas()[10] + path.lambdas()[11]) / 2.0;

        let warm = path.coefficients_at(target).expect("warm");
        let fresh = fit_on_lambdas(&x, &y, &names, &[target], SolverOptions::default())
            .expect("fresh")
            .column(0);

        assert_abs_diff_eq!(warm.intercept, fresh.intercept, epsilon = 1e-4);
        for (a, b) in warm.weights.iter().zip(&fresh.weights) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn on_path_lambda_returns_stored_column() {
        let (x, y, names) = synthetic(64);
        let path = fit_path(&x, &y, &names, &PathOptions::default()).expect("path");
        let at = path.coefficients_at(path.lambdas()[42]).expect("coefficients");
        assert_eq!(at, path.column(42));
    }

    #[test]
    fn infinite_lambda_keeps_only_intercept() {
        let (x, y, names) = synthetic(40);
        let path = fit_path(&x, &y, &names, &PathOptions::default()).expect("path");
        let coefficients = path.coefficients_at(f64::INFINITY).expect("coefficients");
        assert_eq!(coefficients.nonzero(), 0);
        assert_abs_diff_eq!(coefficients.intercept, y.mean(), epsilon = 1e-10);
    }

    #[test]
    fn rejects_mismatched_rows_and_constant_response() {
        let (x, _, names) = synthetic(10);
        let short = DVector::from_element(9, 1.0);
        assert!(matches!(
            fit_path(&x, &short, &names, &PathOptions::default()),
            Err(LassoError::DimensionMismatch { y_len: 9, x_rows: 10 })
        ));

        let flat = DVector::from_element(10, 4.2);
        assert!(matches!(
            fit_path(&x, &flat, &names, &PathOptions::default()),
            Err(LassoError::ConstantResponse)
        ));
    }

    #[test]
    fn lambda_min_ratio_defaults_depend_on_shape() {
        let options = PathOptions::default();
        assert_eq!(options.resolved_ratio(100, 10), 1e-4);
        assert_eq!(options.resolved_ratio(10, 10), 1e-2);

        let bad = PathOptions {
            lambda_min_ratio: Some(1.5),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
