use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

use crate::error::{LassoError, LassoResult};

/// Response column of the Boston housing table.
pub const DEFAULT_RESPONSE: &str = "medv";

/// A numeric table with named, ordered columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

/// Predictors and response split out of a [`Dataset`], ready for fitting.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub feature_names: Vec<String>,
    pub response: String,
    pub x: DMatrix<f64>,
    pub y: DVector<f64>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> LassoResult<Self> {
        if columns.is_empty() {
            return Err(LassoError::EmptyInput { field: "columns" });
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(LassoError::RaggedRow {
                    row: idx,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(LassoError::NonFinite {
                    row: idx,
                    column: columns[j].clone(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn from_csv(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open dataset {}", path.display()))?;
        Self::from_reader(file, &path.display().to_string())
    }

    /// Parse a headered CSV. `label` names the source in error messages.
    pub fn from_reader<R: Read>(source: R, label: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(source);

        let columns: Vec<String> = reader
            .headers()
            .with_context(|| format!("{}: unable to read CSV header", label))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut seen = HashSet::new();
        for column in &columns {
            ensure!(
                seen.insert(column.as_str()),
                "{}: column '{}' listed multiple times",
                label,
                column
            );
        }

        let mut rows = Vec::new();
        for (row_idx, record) in reader.records().enumerate() {
            let record = record
                .with_context(|| format!("{}: failed to parse CSV row {}", label, row_idx + 2))?;
            let mut row = Vec::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                row.push(parse_numeric_field(&record, idx, label, name, row_idx)?);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            bail!("dataset '{}' does not contain any records after header row", label);
        }

        debug!("{}: loaded {} rows x {} columns", label, rows.len(), columns.len());
        Ok(Self::new(columns, rows)?)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First `n` rows (or all of them when the table is shorter).
    pub fn head(&self, n: usize) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Copy of the table without `name`; the flag reports whether it was present.
    pub fn without_column(&self, name: &str) -> (Dataset, bool) {
        match self.column_index(name) {
            None => (self.clone(), false),
            Some(drop) => {
                let columns = self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| *idx != drop)
                    .map(|(_, c)| c.clone())
                    .collect();
                let rows = self
                    .rows
                    .iter()
                    .map(|row| {
                        row.iter()
                            .enumerate()
                            .filter(|(idx, _)| *idx != drop)
                            .map(|(_, v)| *v)
                            .collect()
                    })
                    .collect();
                (Dataset { columns, rows }, true)
            }
        }
    }

    /// Predictor values as an `n x cols` matrix, in column order.
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.n_rows(), self.n_cols(), |i, j| self.rows[i][j])
    }

    /// Split the response column off; every remaining column is a predictor.
    pub fn split_response(&self, response: &str) -> LassoResult<TrainingData> {
        let target_idx = self
            .column_index(response)
            .ok_or_else(|| LassoError::MissingColumn(response.to_string()))?;
        if self.rows.is_empty() {
            return Err(LassoError::EmptyInput { field: "rows" });
        }
        if self.columns.len() < 2 {
            return Err(LassoError::EmptyInput { field: "predictors" });
        }

        let (predictors, _) = self.without_column(response);
        let y = DVector::from_iterator(self.n_rows(), self.rows.iter().map(|r| r[target_idx]));

        Ok(TrainingData {
            feature_names: predictors.columns.clone(),
            response: response.to_string(),
            x: predictors.to_matrix(),
            y,
        })
    }
}

impl TrainingData {
    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }
}

/// Warn once per constant predictor; the solver leaves those at zero.
pub(crate) fn warn_constant_columns(names: &[String], x: &DMatrix<f64>) {
    for (j, name) in names.iter().enumerate() {
        let column = x.column(j);
        let first = column[0];
        if column.iter().all(|v| *v == first) {
            warn!("predictor '{}' is constant and will not enter the model", name);
        }
    }
}

fn parse_numeric_field(
    record: &StringRecord,
    index: usize,
    label: &str,
    column: &str,
    row_idx: usize,
) -> Result<f64> {
    let raw = record.get(index).ok_or_else(|| {
        anyhow!(
            "{}: column '{}' missing at row {}",
            label,
            column,
            row_idx + 2
        )
    })?;

    let trimmed = raw.trim();
    ensure!(
        !trimmed.is_empty(),
        "{}: column '{}' empty at row {}",
        label,
        column,
        row_idx + 2
    );

    let value = trimmed.parse::<f64>().with_context(|| {
        format!(
            "{}: column '{}' must be numeric at row {} (found '{}')",
            label,
            column,
            row_idx + 2,
            raw
        )
    })?;
    ensure!(
        value.is_finite(),
        "{}: column '{}' must be finite at row {} (found '{}')",
        label,
        column,
        row_idx + 2,
        raw
    );
    Ok(value)
}
