use std::io;

use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StrokeError>;

#[derive(Error, Debug)]
pub enum StrokeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("dataframe error: {0}")]
    Polars(#[from] PolarsError),
    #[error("artifact encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing column {column:?}")]
    MissingColumn { column: String },
    #[error("column {column:?} has no values to fit on")]
    EmptyColumn { column: String },
    #[error("dataset is empty")]
    EmptyDataset,
    #[error("invalid label {value:?} in row {row}, expected 0 or 1")]
    InvalidLabel { row: usize, value: Option<i64> },
    #[error("feature and label lengths differ: {features} rows vs {labels} labels")]
    LengthMismatch { features: usize, labels: usize },
    #[error("expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("unknown category {value:?} in column {column:?}")]
    UnknownCategory { column: String, value: String },
    #[error("artifact was built for columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
