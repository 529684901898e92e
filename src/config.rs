use std::path::PathBuf;

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{FitArgs, PathArgs, SolverArgs};
use crate::regression::cv::{DEFAULT_FOLDS, DEFAULT_SEED};
use crate::regression::path::DEFAULT_N_LAMBDA;
use crate::regression::{CvOptions, PathOptions, SolverOptions};
use crate::Selection;

pub use crate::regression::{DEFAULT_MAX_ITER, DEFAULT_TOLERANCE};

/// Runtime configuration compiled from CLI input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub dataset: PathBuf,
    pub target: String,
    pub folds: usize,
    pub seed: u64,
    pub n_lambda: usize,
    pub lambda_min_ratio: Option<f64>,
    pub tolerance: Option<f64>,
    pub max_iter: Option<usize>,
    pub parallel: bool,
    pub selection: Selection,
    pub output: Option<PathBuf>,
    pub model_out: Option<PathBuf>,
    pub curve_out: Option<PathBuf>,
    pub coefficients_out: Option<PathBuf>,
    pub dry_run: bool,
}

impl RunConfig {
    /// Configuration for `dataset` with every other setting at its default.
    pub fn for_dataset(dataset: PathBuf, target: &str) -> Self {
        Self {
            dataset,
            target: target.to_string(),
            folds: DEFAULT_FOLDS,
            seed: DEFAULT_SEED,
            n_lambda: DEFAULT_N_LAMBDA,
            lambda_min_ratio: None,
            tolerance: None,
            max_iter: None,
            parallel: false,
            selection: Selection::Min,
            output: None,
            model_out: None,
            curve_out: None,
            coefficients_out: None,
            dry_run: false,
        }
    }

    pub fn from_fit_args(args: FitArgs) -> Self {
        let mut config = Self::from_solver_args(args.solver);
        config.folds = args.folds;
        config.seed = args.seed;
        config.parallel = args.parallel;
        config.selection = args.selection;
        config.model_out = args.model_out;
        config.curve_out = args.curve_out;
        config
    }

    pub fn from_path_args(args: PathArgs) -> Self {
        let mut config = Self::from_solver_args(args.solver);
        config.coefficients_out = args.coefficients_out;
        config
    }

    fn from_solver_args(args: SolverArgs) -> Self {
        let mut config = Self::for_dataset(args.dataset, &args.target);
        config.n_lambda = args.n_lambda;
        config.lambda_min_ratio = args.lambda_min_ratio;
        config.tolerance = args.tolerance;
        config.max_iter = args.max_iter;
        config.output = args.output;
        config.dry_run = args.dry_run;
        config
    }

    /// Fill in solver settings the user omitted.
    pub fn with_defaults(mut self) -> Self {
        self.target = self.target.trim().to_string();
        self.tolerance.get_or_insert(DEFAULT_TOLERANCE);
        self.max_iter.get_or_insert(DEFAULT_MAX_ITER);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.target.trim().is_empty(),
            "target column must be provided"
        );
        ensure!(self.folds >= 2, "--folds must be at least 2 (got {})", self.folds);
        ensure!(self.n_lambda >= 1, "--n-lambda must be at least 1");
        if let Some(tolerance) = self.tolerance {
            ensure!(
                tolerance.is_finite() && tolerance > 0.0,
                "--tolerance must be a positive number (got {})",
                tolerance
            );
        }
        ensure!(self.max_iter != Some(0), "--max-iter must be at least 1");

        if let Some(ratio) = self.lambda_min_ratio {
            ensure!(
                ratio > 0.0 && ratio < 1.0,
                "--lambda-min-ratio must lie strictly between 0 and 1 (got {})",
                ratio
            );
        }

        if !self.dry_run && !self.dataset.exists() {
            bail!(
                "Dataset '{}' does not exist; use --dry-run to preview without the file",
                self.dataset.display()
            );
        }

        Ok(())
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            tolerance: self.tolerance.unwrap_or(DEFAULT_TOLERANCE),
            max_iter: self.max_iter.unwrap_or(DEFAULT_MAX_ITER),
        }
    }

    pub fn path_options(&self) -> PathOptions {
        PathOptions {
            n_lambda: self.n_lambda,
            lambda_min_ratio: self.lambda_min_ratio,
            solver: self.solver_options(),
        }
    }

    pub fn cv_options(&self) -> CvOptions {
        CvOptions {
            folds: self.folds,
            seed: self.seed,
            parallel: self.parallel,
            path: self.path_options(),
        }
    }

    /// Settings echoed before a `fit` run.
    pub fn summary(&self) -> String {
        let mode = if self.parallel { "parallel" } else { "sequential" };
        format!(
            "{}\nFolds: {} (seed {}, {})\nSelection: lambda.{}",
            self.path_summary(),
            self.folds,
            self.seed,
            mode,
            self.selection.label()
        )
    }

    /// Settings echoed before a `path` run; no folds or selection are involved.
    pub fn path_summary(&self) -> String {
        let solver = self.solver_options();
        let ratio_text = match self.lambda_min_ratio {
            Some(ratio) => format!("{}", ratio),
            None => "auto".to_string(),
        };

        format!(
            concat!(
                "Dataset: {}\n",
                "Target: {}\n",
                "Lambda path: {} points, min ratio {}\n",
                "Solver: tol {:e}, max {} sweeps"
            ),
            self.dataset.display(),
            self.target,
            self.n_lambda,
            ratio_text,
            solver.tolerance,
            solver.max_iter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RunConfig {
        let mut config = RunConfig::for_dataset(PathBuf::from("missing.csv"), "medv");
        config.dry_run = true;
        config
    }

    #[test]
    fn defaults_fill_solver_settings() {
        let mut config = config();
        config.max_iter = Some(50);
        let resolved = config.with_defaults();
        assert_eq!(resolved.tolerance, Some(DEFAULT_TOLERANCE));
        assert_eq!(resolved.max_iter, Some(50));
        assert!(resolved.validate().is_ok());

        let mut zero_tolerance = resolved;
        zero_tolerance.tolerance = Some(0.0);
        assert!(zero_tolerance.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut single_fold = config();
        single_fold.folds = 1;
        assert!(single_fold.validate().is_err());

        let mut bad_ratio = config();
        bad_ratio.lambda_min_ratio = Some(1.0);
        assert!(bad_ratio
            .validate()
            .unwrap_err()
            .to_string()
            .contains("--lambda-min-ratio"));

        let mut blank_target = config();
        blank_target.target = "  ".to_string();
        assert!(blank_target.validate().is_err());
    }

    #[test]
    fn validate_requires_dataset_outside_dry_run() {
        let mut config = config();
        config.dry_run = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn options_carry_configuration() {
        let mut config = config();
        config.folds = 5;
        config.seed = 7;
        config.lambda_min_ratio = Some(0.01);
        let options = config.cv_options();
        assert_eq!(options.folds, 5);
        assert_eq!(options.seed, 7);
        assert_eq!(options.path.lambda_min_ratio, Some(0.01));
        assert_eq!(options.path.solver.tolerance, DEFAULT_TOLERANCE);
        assert!(config.summary().contains("Folds: 5 (seed 7, sequential)"));
    }

    #[test]
    fn path_summary_omits_cross_validation_settings() {
        let config = config().with_defaults();
        let path = config.path_summary();
        assert!(path.contains("Lambda path: 100 points, min ratio auto"));
        assert!(!path.contains("Folds"));
        assert!(!path.contains("Selection"));

        let fit = config.summary();
        assert!(fit.starts_with(&path));
        assert!(fit.contains("Selection: lambda.min"));
    }
}
