use thiserror::Error;

/// Errors raised while fitting, selecting or applying a lasso model.
#[derive(Error, Debug)]
pub enum LassoError {
    #[error("Dimension mismatch: y has {y_len} elements, X has {x_rows} rows")]
    DimensionMismatch { y_len: usize, x_rows: usize },

    #[error("Empty input: {field} cannot be empty")]
    EmptyInput { field: &'static str },

    #[error("Row {row} has {found} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {row}, column '{column}' holds a non-finite value")]
    NonFinite { row: usize, column: String },

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Invalid fold count: {0} (must be >= 2)")]
    InvalidFolds(usize),

    #[error("Too few rows for cross-validation: {rows} rows, {folds} folds")]
    TooFewRows { rows: usize, folds: usize },

    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Schema mismatch: expected columns [{expected}], found [{found}]")]
    SchemaMismatch { expected: String, found: String },

    #[error("Lasso failed to converge at lambda {lambda} after {iterations} sweeps")]
    ConvergenceFailure { lambda: f64, iterations: usize },

    #[error("Target column has zero variance; regression is undefined")]
    ConstantResponse,

    #[error("Malformed scoring request: {0}")]
    BadRequest(String),

    #[error("No service published under '{0}'")]
    UnknownService(String),
}

pub type LassoResult<T> = Result<T, LassoError>;

impl LassoError {
    pub(crate) fn schema(expected: &[String], found: &[String]) -> Self {
        LassoError::SchemaMismatch {
            expected: expected.join(", "),
            found: found.join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_lists_both_sides() {
        let err = LassoError::schema(
            &["crim".to_string(), "zn".to_string()],
            &["zn".to_string(), "crim".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Schema mismatch: expected columns [crim, zn], found [zn, crim]"
        );
    }

    #[test]
    fn fold_errors_render_counts() {
        assert_eq!(
            LassoError::InvalidFolds(1).to_string(),
            "Invalid fold count: 1 (must be >= 2)"
        );
        assert_eq!(
            LassoError::TooFewRows { rows: 4, folds: 10 }.to_string(),
            "Too few rows for cross-validation: 4 rows, 10 folds"
        );
    }
}
