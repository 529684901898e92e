use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::Selection;

/// Command-line interface definition for lasso-cv.
#[derive(Parser, Debug)]
#[command(
    name = "lasso-cv",
    version,
    about = "Fit cross-validated lasso regressions from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cross-validate the lasso path and select lambda.min / lambda.1se.
    Fit(FitArgs),
    /// Fit the full lambda path without cross-validation.
    Path(PathArgs),
    /// Score a CSV dataset with a saved model.
    Predict(PredictArgs),
    /// Answer JSON scoring requests on stdin, one per line.
    Serve(ServeArgs),
}

/// Dataset and solver settings shared by `fit` and `path`.
#[derive(Args, Debug)]
pub struct SolverArgs {
    /// Path to the CSV dataset; every column other than the target is a predictor.
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    /// Response column.
    #[arg(short, long, value_name = "COLUMN", default_value = crate::data::DEFAULT_RESPONSE)]
    pub target: String,

    /// Number of lambda values on the path.
    #[arg(long, value_name = "N", default_value_t = crate::regression::path::DEFAULT_N_LAMBDA)]
    pub n_lambda: usize,

    /// Smallest lambda as a fraction of the largest (default depends on shape).
    #[arg(long, value_name = "RATIO")]
    pub lambda_min_ratio: Option<f64>,

    /// Convergence threshold for coordinate descent.
    #[arg(long, value_name = "TOL")]
    pub tolerance: Option<f64>,

    /// Maximum coordinate descent sweeps per lambda.
    #[arg(long, value_name = "N")]
    pub max_iter: Option<usize>,

    /// Write the rendered report to this location as well as stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Preview configuration without executing the solver.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct FitArgs {
    #[command(flatten)]
    pub solver: SolverArgs,

    /// Number of cross-validation folds.
    #[arg(short = 'k', long, default_value_t = crate::regression::cv::DEFAULT_FOLDS)]
    pub folds: usize,

    /// Seed for the fold assignment.
    #[arg(long, default_value_t = crate::regression::cv::DEFAULT_SEED)]
    pub seed: u64,

    /// Evaluate folds on the rayon thread pool.
    #[arg(long)]
    pub parallel: bool,

    /// Which lambda the saved model and reported coefficients use.
    #[arg(long, value_enum, default_value = "min")]
    pub selection: Selection,

    /// Save the selected model as JSON.
    #[arg(long, value_name = "PATH")]
    pub model_out: Option<PathBuf>,

    /// Save the cross-validation curve as CSV.
    #[arg(long, value_name = "PATH")]
    pub curve_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    #[command(flatten)]
    pub solver: SolverArgs,

    /// Save the coefficient path as CSV.
    #[arg(long, value_name = "PATH")]
    pub coefficients_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Model file written by `fit --model-out`.
    #[arg(short, long, value_name = "MODEL")]
    pub model: PathBuf,

    /// CSV with the training predictors, in training order.
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    /// Only score the first N rows.
    #[arg(long, value_name = "N")]
    pub head: Option<usize>,

    /// Write predictions as CSV to this location instead of stdout.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Model file written by `fit --model-out`.
    #[arg(short, long, value_name = "MODEL")]
    pub model: PathBuf,

    /// Name the service is published under.
    #[arg(long, default_value = "lasso")]
    pub name: String,

    /// Field name of the predictions in each response.
    #[arg(long, default_value = crate::service::DEFAULT_OUTPUT_FIELD)]
    pub output_field: String,
}
