pub mod cv;
mod diagnostics;
pub mod model;
pub mod path;
mod preprocess;
mod report;
mod solve;

use anyhow::{Context, Result};
use log::info;

use crate::config::RunConfig;
use crate::data::{warn_constant_columns, Dataset};
use crate::Selection;

pub use cv::{cross_validate, fold_assignment, CvLasso, CvOptions};
pub use model::FittedModel;
pub use path::{fit_path, Coefficients, LassoPath, PathOptions};
pub use report::{
    write_curve_csv, write_path_csv, CvReport, FeatureScaling, PathReport, RegressionMetrics,
    ResidualSummary, SelectionRow,
};
pub(crate) use report::create_file;
pub use solve::{SolverOptions, DEFAULT_MAX_ITER, DEFAULT_TOLERANCE};

/// Everything a `fit` run produces.
#[derive(Debug, Clone)]
pub struct CvOutcome {
    pub report: CvReport,
    pub cv: CvLasso,
    pub model: FittedModel,
}

pub fn fit_cross_validated(config: &RunConfig) -> Result<CvOutcome> {
    let dataset = Dataset::from_csv(&config.dataset)?;
    let training = dataset
        .split_response(&config.target)
        .with_context(|| {
            format!(
                "{}: cannot use '{}' as response",
                config.dataset.display(),
                config.target
            )
        })?;
    warn_constant_columns(&training.feature_names, &training.x);

    let cv = cross_validate(
        &training.x,
        &training.y,
        &training.feature_names,
        &config.cv_options(),
    )?;
    info!(
        "lambda.min = {:.4}, lambda.1se = {:.4}",
        cv.lambda_min(),
        cv.lambda_1se()
    );

    let model = FittedModel::new(
        &training.response,
        &training.feature_names,
        cv.coefficients(config.selection),
    );
    let fitted = model.predict_matrix(&training.x)?;
    let metrics = diagnostics::compute_metrics(&training.y, &fitted, model.nonzero())?;

    let solver = config.solver_options();
    let mut notes = vec![format!(
        "Coordinate descent on standardized predictors (tol {:e}, max {} sweeps per lambda).",
        solver.tolerance, solver.max_iter
    )];
    if config.parallel {
        notes.push("Folds evaluated in parallel.".to_string());
    }
    let dropped = model.feature_names.len() - model.nonzero();
    if dropped > 0 {
        notes.push(format!("{} predictor(s) shrunk to exactly zero.", dropped));
    }

    let report = CvReport {
        target: training.response.clone(),
        rows: training.n_rows(),
        features: training.feature_names.clone(),
        timestamp: chrono::Utc::now(),
        folds: cv.folds(),
        seed: config.seed,
        selection: config.selection,
        table: vec![
            SelectionRow::from_cv(&cv, Selection::Min),
            SelectionRow::from_cv(&cv, Selection::OneSe),
        ],
        coefficients: model.sparse_coefficients(),
        metrics,
        scaling: cv.path().scaling(),
        notes,
    };

    Ok(CvOutcome { report, cv, model })
}

pub fn fit_full_path(config: &RunConfig) -> Result<(PathReport, LassoPath)> {
    let dataset = Dataset::from_csv(&config.dataset)?;
    let training = dataset
        .split_response(&config.target)
        .with_context(|| {
            format!(
                "{}: cannot use '{}' as response",
                config.dataset.display(),
                config.target
            )
        })?;
    warn_constant_columns(&training.feature_names, &training.x);

    let path = fit_path(
        &training.x,
        &training.y,
        &training.feature_names,
        &config.path_options(),
    )?;
    info!("fitted {} path points", path.len());

    Ok((PathReport::new(&training.response, training.n_rows(), &path), path))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use nalgebra::{DMatrix, DVector};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Four mutually orthogonal +/-1 predictors (exactly so when `rows` is a
    /// multiple of 8); y depends on `a` and `b` only.
    pub fn synthetic(rows: usize) -> (DMatrix<f64>, DVector<f64>, Vec<String>) {
        let sign = |bit: bool| if bit { 1.0 } else { -1.0 };
        let x = DMatrix::from_fn(rows, 4, |i, j| {
            let (b0, b1, b2) = (i & 1 == 1, i & 2 == 2, i & 4 == 4);
            match j {
                0 => sign(b0),
                1 => sign(b1),
                2 => sign(b2),
                _ => sign(b0 ^ b1),
            }
        });
        let y = DVector::from_fn(rows, |i, _| {
            3.0 * x[(i, 0)] - 2.0 * x[(i, 1)] + 0.05 * (i as f64 * 1.3).sin() + 10.0
        });
        let names = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        (x, y, names)
    }

    /// Five predictors with `x3` correlated to `x0`, plus uniform noise on y.
    pub fn correlated(rows: usize) -> (DMatrix<f64>, DVector<f64>, Vec<String>) {
        let mut rng = StdRng::seed_from_u64(11);
        let mut x = DMatrix::from_fn(rows, 5, |_, _| rng.gen_range(-2.0..2.0));
        for i in 0..rows {
            x[(i, 3)] = x[(i, 0)] + 0.5 * x[(i, 3)];
        }
        let y = DVector::from_fn(rows, |i, _| {
            4.0 * x[(i, 0)] - 3.0 * x[(i, 1)] + 2.0 * x[(i, 2)] + rng.gen_range(-1.0..1.0)
        });
        let names = (0..5).map(|j| format!("x{}", j)).collect();
        (x, y, names)
    }
}
