use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::Writer;

use super::cv::CvLasso;
use super::path::LassoPath;
use crate::Selection;

#[derive(Debug, Clone)]
pub struct FeatureScaling {
    pub feature: String,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone)]
pub struct ResidualSummary {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub adj_r2: Option<f64>,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub residuals: ResidualSummary,
}

/// One line of the lambda selection table.
#[derive(Debug, Clone)]
pub struct SelectionRow {
    pub selection: Selection,
    pub lambda: f64,
    pub index: usize,
    pub measure: f64,
    pub se: f64,
    pub nonzero: usize,
}

impl SelectionRow {
    pub fn from_cv(cv: &CvLasso, selection: Selection) -> Self {
        let index = cv.index(selection);
        Self {
            selection,
            lambda: cv.lambda(selection),
            index,
            measure: cv.cvm()[index],
            se: cv.cvsd()[index],
            nonzero: cv.path().nonzero()[index],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CvReport {
    pub(crate) target: String,
    pub(crate) rows: usize,
    pub(crate) features: Vec<String>,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) folds: usize,
    pub(crate) seed: u64,
    pub(crate) selection: Selection,
    pub(crate) table: Vec<SelectionRow>,
    pub(crate) coefficients: Vec<(String, f64)>,
    pub(crate) metrics: RegressionMetrics,
    pub(crate) scaling: Vec<FeatureScaling>,
    pub(crate) notes: Vec<String>,
}

impl CvReport {
    pub fn lambda_min(&self) -> f64 {
        self.lambda_of(Selection::Min)
    }

    pub fn lambda_1se(&self) -> f64 {
        self.lambda_of(Selection::OneSe)
    }

    fn lambda_of(&self, selection: Selection) -> f64 {
        self.table
            .iter()
            .find(|row| row.selection == selection)
            .map(|row| row.lambda)
            .unwrap_or(f64::NAN)
    }

    pub fn metrics(&self) -> &RegressionMetrics {
        &self.metrics
    }

    pub fn coefficients(&self) -> &[(String, f64)] {
        &self.coefficients
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Target: {}", self.target));
        lines.push(format!("Rows: {}", self.rows));
        lines.push(format!("Features: {}", self.features.join(", ")));
        lines.push(format!(
            "Generated at: {}",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));

        lines.push(String::new());
        lines.push(format!(
            "Lambda selection ({}-fold CV, seed {}):",
            self.folds, self.seed
        ));
        lines.push(format!(
            "  {:<6} {:>10} {:>6} {:>10} {:>10} {:>8}",
            "", "Lambda", "Index", "Measure", "SE", "Nonzero"
        ));
        for row in &self.table {
            lines.push(format!(
                "  {:<6} {:>10.4} {:>6} {:>10.4} {:>10.4} {:>8}",
                row.selection.label(),
                row.lambda,
                row.index + 1,
                row.measure,
                row.se,
                row.nonzero
            ));
        }
        lines.push(format!("  lambda.min = {:.4}", self.lambda_min()));
        lines.push(format!("  lambda.1se = {:.4}", self.lambda_1se()));

        lines.push(String::new());
        lines.push(format!(
            "Coefficients at lambda.{}:",
            self.selection.label()
        ));
        for (name, value) in &self.coefficients {
            lines.push(format!("  {:<15} {:>12.6}", name, value));
        }

        lines.push(String::new());
        lines.push("In-sample metrics:".to_string());
        lines.push(format!("  R^2: {:.6}", self.metrics.r2));
        if let Some(adj) = self.metrics.adj_r2 {
            lines.push(format!("  Adjusted R^2: {:.6}", adj));
        }
        lines.push(format!("  MSE: {:.6}", self.metrics.mse));
        lines.push(format!("  RMSE: {:.6}", self.metrics.rmse));
        lines.push(format!("  MAE: {:.6}", self.metrics.mae));
        lines.push(format!(
            "  Residuals: mean={:.6} std={:.6} min={:.6} max={:.6}",
            self.metrics.residuals.mean,
            self.metrics.residuals.std_dev,
            self.metrics.residuals.min,
            self.metrics.residuals.max
        ));

        if !self.scaling.is_empty() {
            lines.push(String::new());
            lines.push("Standardization:".to_string());
            for stat in &self.scaling {
                lines.push(format!(
                    "  {:<15} mean={:>12.6} std={:>12.6}",
                    stat.feature, stat.mean, stat.std_dev
                ));
            }
        }

        if !self.notes.is_empty() {
            lines.push(String::new());
            lines.push("Notes:".to_string());
            for note in &self.notes {
                lines.push(format!("  - {}", note));
            }
        }

        lines.join("\n")
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        persist_text(path, &self.render())
    }
}

/// Degrees of freedom, deviance explained and lambda along a path.
#[derive(Debug, Clone)]
pub struct PathReport {
    pub(crate) target: String,
    pub(crate) rows: usize,
    pub(crate) features: Vec<String>,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) points: Vec<(usize, f64, f64)>,
}

impl PathReport {
    pub fn new(target: &str, rows: usize, path: &LassoPath) -> Self {
        let points = path
            .nonzero()
            .iter()
            .zip(path.dev_ratio())
            .zip(path.lambdas())
            .map(|((df, dev), lambda)| (*df, *dev, *lambda))
            .collect();
        Self {
            target: target.to_string(),
            rows,
            features: path.feature_names().to_vec(),
            timestamp: Utc::now(),
            points,
        }
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Target: {}", self.target));
        lines.push(format!("Rows: {}", self.rows));
        lines.push(format!("Features: {}", self.features.join(", ")));
        lines.push(format!(
            "Generated at: {}",
            self.timestamp
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        ));
        lines.push(String::new());
        lines.push(format!("  {:>4} {:>4} {:>8} {:>10}", "", "Df", "%Dev", "Lambda"));
        for (idx, (df, dev, lambda)) in self.points.iter().enumerate() {
            lines.push(format!(
                "  {:>4} {:>4} {:>8.2} {:>10.4}",
                idx + 1,
                df,
                dev * 100.0,
                lambda
            ));
        }
        lines.join("\n")
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        persist_text(path, &self.render())
    }
}

/// Coefficient trajectories: one row per lambda.
pub fn write_path_csv<W: Write>(path: &LassoPath, sink: W) -> Result<()> {
    let mut writer = Writer::from_writer(sink);
    let mut header = vec!["lambda".to_string(), "df".to_string(), "dev_ratio".to_string()];
    header.extend(path.row_labels());
    writer.write_record(&header)?;

    let matrix = path.coefficient_matrix();
    for l in 0..path.len() {
        let mut record = vec![
            path.lambdas()[l].to_string(),
            path.nonzero()[l].to_string(),
            path.dev_ratio()[l].to_string(),
        ];
        record.extend(matrix.column(l).iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Cross-validation error curve: one row per lambda.
pub fn write_curve_csv<W: Write>(cv: &CvLasso, sink: W) -> Result<()> {
    let mut writer = Writer::from_writer(sink);
    writer.write_record(["lambda", "cvm", "cvsd", "cvup", "cvlo", "nonzero"])?;

    let (cvup, cvlo) = (cv.cvup(), cv.cvlo());
    for l in 0..cv.lambdas().len() {
        writer.write_record(&[
            cv.lambdas()[l].to_string(),
            cv.cvm()[l].to_string(),
            cv.cvsd()[l].to_string(),
            cvup[l].to_string(),
            cvlo[l].to_string(),
            cv.path().nonzero()[l].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub(crate) fn create_file(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

fn persist_text(path: &Path, body: &str) -> Result<()> {
    fs::write(path, body).with_context(|| format!("failed to write report to {}", path.display()))
}
