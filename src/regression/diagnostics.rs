use nalgebra::DVector;

use super::report::{RegressionMetrics, ResidualSummary};
use crate::error::{LassoError, LassoResult};

/// In-sample fit quality of a model with `active` nonzero predictors.
pub(crate) fn compute_metrics(
    actual: &DVector<f64>,
    predicted: &DVector<f64>,
    active: usize,
) -> LassoResult<RegressionMetrics> {
    let n = actual.len();
    if n == 0 {
        return Err(LassoError::EmptyInput { field: "observations" });
    }
    if predicted.len() != n {
        return Err(LassoError::DimensionMismatch {
            y_len: n,
            x_rows: predicted.len(),
        });
    }

    let residuals = actual - predicted;
    let ss_res = residuals.norm_squared();

    let mean_actual = actual.mean();
    let ss_tot = actual.iter().map(|v| (v - mean_actual).powi(2)).sum::<f64>();
    if !(ss_tot.is_finite() && ss_tot > 0.0) {
        return Err(LassoError::ConstantResponse);
    }

    let r2 = 1.0 - ss_res / ss_tot;
    let mse = ss_res / n as f64;
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n as f64;

    let predictors = active + 1; // intercept included
    let adj_r2 = if n > predictors {
        Some(1.0 - (1.0 - r2) * (n as f64 - 1.0) / (n as f64 - predictors as f64))
    } else {
        None
    };

    Ok(RegressionMetrics {
        r2,
        adj_r2,
        mse,
        rmse: mse.sqrt(),
        mae,
        residuals: summarize_residuals(&residuals),
    })
}

pub(crate) fn summarize_residuals(residuals: &DVector<f64>) -> ResidualSummary {
    let n = residuals.len().max(1) as f64;
    let mean = residuals.iter().sum::<f64>() / n;

    let mut variance_sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for value in residuals.iter().copied() {
        variance_sum += (value - mean).powi(2);
        min = min.min(value);
        max = max.max(value);
    }

    ResidualSummary {
        mean,
        std_dev: (variance_sum / n).sqrt(),
        min,
        max,
    }
}
