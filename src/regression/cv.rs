//! K-fold cross-validation over the lasso penalty path.
//!
//! Folds are fitted on the lambda sequence of the full-data path so the
//! error curves line up point for point. Fold results are reduced in fold
//! order, which makes the outcome independent of whether the folds ran on
//! the rayon pool or sequentially.

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::path::{fit_on_lambdas, fit_path, Coefficients, LassoPath, PathOptions};
use crate::error::{LassoError, LassoResult};
use crate::Selection;

pub const DEFAULT_FOLDS: usize = 10;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CvOptions {
    pub folds: usize,
    pub seed: u64,
    pub parallel: bool,
    pub path: PathOptions,
}

impl Default for CvOptions {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
            seed: DEFAULT_SEED,
            parallel: false,
            path: PathOptions::default(),
        }
    }
}

/// Held-out error of one fold along the path.
#[derive(Debug, Clone)]
struct FoldScore {
    weight: f64,
    mse: Vec<f64>,
}

/// Outcome of cross-validating the lasso path.
#[derive(Debug, Clone)]
pub struct CvLasso {
    path: LassoPath,
    fold_ids: Vec<usize>,
    folds: usize,
    cvm: Vec<f64>,
    cvsd: Vec<f64>,
    index_min: usize,
    index_1se: usize,
}

/// Assign each of `rows` rows to one of `folds` folds, reproducibly for a seed.
///
/// Rows are shuffled and then dealt round-robin, so fold sizes differ by at
/// most one.
pub fn fold_assignment(rows: usize, folds: usize, seed: u64) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let mut ids = vec![0; rows];
    for (position, row) in order.into_iter().enumerate() {
        ids[row] = position % folds;
    }
    ids
}

/// Cross-validate the lasso and select `lambda.min` and `lambda.1se`.
pub fn cross_validate(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    feature_names: &[String],
    options: &CvOptions,
) -> LassoResult<CvLasso> {
    let rows = x.nrows();
    if rows != y.len() {
        return Err(LassoError::DimensionMismatch {
            y_len: y.len(),
            x_rows: rows,
        });
    }
    if options.folds < 2 {
        return Err(LassoError::InvalidFolds(options.folds));
    }
    if rows <= options.folds {
        return Err(LassoError::TooFewRows {
            rows,
            folds: options.folds,
        });
    }

    let path = fit_path(x, y, feature_names, &options.path)?;
    let fold_ids = fold_assignment(rows, options.folds, options.seed);
    info!(
        "cross-validating {} lambdas over {} folds (seed {})",
        path.len(),
        options.folds,
        options.seed
    );

    let evaluate = |fold: usize| {
        score_fold(
            x,
            y,
            feature_names,
            &fold_ids,
            fold,
            path.lambdas(),
            options,
        )
    };
    let scores: Vec<FoldScore> = if options.parallel {
        (0..options.folds)
            .into_par_iter()
            .map(evaluate)
            .collect::<LassoResult<_>>()?
    } else {
        (0..options.folds)
            .map(evaluate)
            .collect::<LassoResult<_>>()?
    };

    let (cvm, cvsd) = aggregate(&scores, path.len());
    let (index_min, index_1se) = select_indices(&cvm, &cvsd);
    debug!(
        "lambda.min index {} (cvm {:.4}), lambda.1se index {} (cvm {:.4})",
        index_min, cvm[index_min], index_1se, cvm[index_1se]
    );

    Ok(CvLasso {
        path,
        fold_ids,
        folds: options.folds,
        cvm,
        cvsd,
        index_min,
        index_1se,
    })
}

fn score_fold(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    feature_names: &[String],
    fold_ids: &[usize],
    fold: usize,
    lambdas: &[f64],
    options: &CvOptions,
) -> LassoResult<FoldScore> {
    let (held_out, training): (Vec<usize>, Vec<usize>) =
        (0..fold_ids.len()).partition(|row| fold_ids[*row] == fold);

    let train_x = x.select_rows(training.iter());
    let train_y = y.select_rows(training.iter());
    let test_x = x.select_rows(held_out.iter());
    let test_y = y.select_rows(held_out.iter());

    let fold_path = fit_on_lambdas(
        &train_x,
        &train_y,
        feature_names,
        lambdas,
        options.path.solver,
    )?;

    let count = held_out.len() as f64;
    let mse = (0..fold_path.len())
        .map(|l| {
            let predictions = fold_path.column(l).predict(&test_x);
            (&test_y - predictions).norm_squared() / count
        })
        .collect();

    debug!(
        "fold {}: {} training rows, {} held out",
        fold,
        training.len(),
        held_out.len()
    );
    Ok(FoldScore { weight: count, mse })
}

/// Fold-size weighted mean error per lambda and its standard error.
fn aggregate(scores: &[FoldScore], points: usize) -> (Vec<f64>, Vec<f64>) {
    let total: f64 = scores.iter().map(|s| s.weight).sum();
    let folds = scores.len() as f64;

    let cvm: Vec<f64> = (0..points)
        .map(|l| scores.iter().map(|s| s.weight * s.mse[l]).sum::<f64>() / total)
        .collect();

    let cvsd = (0..points)
        .map(|l| {
            let spread = scores
                .iter()
                .map(|s| s.weight * (s.mse[l] - cvm[l]).powi(2))
                .sum::<f64>()
                / total;
            (spread / (folds - 1.0)).sqrt()
        })
        .collect();

    (cvm, cvsd)
}

/// Indices of `lambda.min` and `lambda.1se` on a decreasing lambda path.
///
/// Both pick the largest qualifying lambda, i.e. the first qualifying index.
fn select_indices(cvm: &[f64], cvsd: &[f64]) -> (usize, usize) {
    let minimum = cvm.iter().copied().fold(f64::INFINITY, f64::min);
    let index_min = cvm.iter().position(|m| *m <= minimum).unwrap_or(0);
    let bound = cvm[index_min] + cvsd[index_min];
    let index_1se = cvm.iter().position(|m| *m <= bound).unwrap_or(index_min);
    (index_min, index_1se)
}

impl CvLasso {
    /// The full-data path the folds were scored against.
    pub fn path(&self) -> &LassoPath {
        &self.path
    }

    pub fn lambdas(&self) -> &[f64] {
        self.path.lambdas()
    }

    pub fn fold_ids(&self) -> &[usize] {
        &self.fold_ids
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Mean cross-validated error per lambda.
    pub fn cvm(&self) -> &[f64] {
        &self.cvm
    }

    /// Standard error of `cvm`.
    pub fn cvsd(&self) -> &[f64] {
        &self.cvsd
    }

    pub fn cvup(&self) -> Vec<f64> {
        self.cvm.iter().zip(&self.cvsd).map(|(m, s)| m + s).collect()
    }

    pub fn cvlo(&self) -> Vec<f64> {
        self.cvm.iter().zip(&self.cvsd).map(|(m, s)| m - s).collect()
    }

    pub fn index(&self, selection: Selection) -> usize {
        match selection {
            Selection::Min => self.index_min,
            Selection::OneSe => self.index_1se,
        }
    }

    pub fn lambda(&self, selection: Selection) -> f64 {
        self.path.lambdas()[self.index(selection)]
    }

    pub fn lambda_min(&self) -> f64 {
        self.lambda(Selection::Min)
    }

    pub fn lambda_1se(&self) -> f64 {
        self.lambda(Selection::OneSe)
    }

    /// Full-data coefficients at the selected lambda.
    pub fn coefficients(&self, selection: Selection) -> Coefficients {
        self.path.column(self.index(selection))
    }
}
