use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::path::{Coefficients, INTERCEPT_LABEL};
use crate::data::Dataset;
use crate::error::{LassoError, LassoResult};

/// A lasso model frozen at one lambda, ready to score new rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub response: String,
    pub feature_names: Vec<String>,
    pub lambda: f64,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl FittedModel {
    pub fn new(response: &str, feature_names: &[String], fitted: Coefficients) -> Self {
        Self {
            response: response.to_string(),
            feature_names: feature_names.to_vec(),
            lambda: fitted.lambda,
            intercept: fitted.intercept,
            coefficients: fitted.weights,
        }
    }

    pub fn nonzero(&self) -> usize {
        self.coefficients.iter().filter(|c| **c != 0.0).count()
    }

    /// Intercept followed by every predictor with a nonzero weight.
    pub fn sparse_coefficients(&self) -> Vec<(String, f64)> {
        std::iter::once((INTERCEPT_LABEL.to_string(), self.intercept))
            .chain(
                self.feature_names
                    .iter()
                    .zip(&self.coefficients)
                    .filter(|(_, c)| **c != 0.0)
                    .map(|(name, c)| (name.clone(), *c)),
            )
            .collect()
    }

    /// Score a named table. A column named like the response is dropped
    /// first; the rest must match the training predictors in count and order.
    pub fn predict(&self, data: &Dataset) -> LassoResult<Vec<f64>> {
        let (predictors, dropped) = data.without_column(&self.response);
        if dropped {
            warn!(
                "dropping response column '{}' before prediction",
                self.response
            );
        }
        if predictors.columns() != self.feature_names.as_slice() {
            return Err(LassoError::schema(&self.feature_names, predictors.columns()));
        }
        Ok(self.predict_matrix(&predictors.to_matrix())?.iter().copied().collect())
    }

    /// Score an unnamed design matrix whose columns follow the training order.
    pub fn predict_matrix(&self, x: &DMatrix<f64>) -> LassoResult<DVector<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(LassoError::SchemaMismatch {
                expected: format!("{} columns", self.coefficients.len()),
                found: format!("{} columns", x.ncols()),
            });
        }
        let weights = DVector::from_column_slice(&self.coefficients);
        Ok((x * weights).add_scalar(self.intercept))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self).context("failed to serialize model")?;
        fs::write(path, body)
            .with_context(|| format!("failed to write model to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let body = fs::read_to_string(path)
            .with_context(|| format!("failed to read model from {}", path.display()))?;
        serde_json::from_str(&body)
            .with_context(|| format!("{}: not a valid model file", path.display()))
    }
}
