//! Loading and cleaning of the raw stroke CSV.

use std::fs::File;
use std::path::Path;

use log::{debug, info};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, StrokeError};
use crate::records::{
    FeatureRow, StrokeRecord, CATEGORICAL_FEATURES, ID_COLUMN, LABEL_COLUMN, NUMERIC_FEATURES,
};

pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path)?;

    // read every column as text, then cast to the raw schema once the header
    // is known to be complete
    let mut df = CsvReader::new(file)
        .has_header(true)
        .infer_schema(Some(0))
        .finish()?;

    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for column in StrokeRecord::required_columns() {
        if !present.iter().any(|p| p == column) {
            return Err(StrokeError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    // malformed cells abort the read; `bmi` stays text until `clean`
    let schema = StrokeRecord::raw_schema();
    for (name, dtype) in schema.iter() {
        if !present.iter().any(|p| p == name.as_str()) {
            continue;
        }
        let typed = df.column(name.as_str())?.strict_cast(dtype)?;
        df.with_column(typed)?;
    }
    info!("read {} rows from {}", df.height(), path.display());

    Ok(df)
}

/// Casts `bmi` to numbers (non-numeric tokens become null) and drops the row
/// identifier.
pub fn clean(mut df: DataFrame) -> Result<DataFrame> {
    let bmi = df.column("bmi")?.cast(&DataType::Float64)?;
    df.with_column(bmi)?;
    debug!("bmi has {} missing values after cast", df.column("bmi")?.null_count());

    if df.get_column_names().contains(&ID_COLUMN) {
        df = df.drop(ID_COLUMN)?;
    }

    Ok(df)
}

/// Splits the cleaned frame into feature rows and the 0/1 label vector.
pub fn feature_and_target(df: &DataFrame) -> Result<(Vec<FeatureRow>, Vec<u32>)> {
    let n_rows = df.height();
    if n_rows == 0 {
        return Err(StrokeError::EmptyDataset);
    }
    let mut rows = vec![FeatureRow::default(); n_rows];

    for (slot, name) in NUMERIC_FEATURES.iter().enumerate() {
        let series = df.column(name)?.cast(&DataType::Float64)?;
        for (row, value) in rows.iter_mut().zip(series.f64()?.into_iter()) {
            row.numeric[slot] = value.filter(|v| !v.is_nan());
        }
    }

    for (slot, name) in CATEGORICAL_FEATURES.iter().enumerate() {
        let series = df.column(name)?.cast(&DataType::Utf8)?;
        for (row, value) in rows.iter_mut().zip(series.utf8()?.into_iter()) {
            row.categorical[slot] = value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
        }
    }

    let target = df.column(LABEL_COLUMN)?.cast(&DataType::Int64)?;
    let mut labels = Vec::with_capacity(n_rows);
    for (row, value) in target.i64()?.into_iter().enumerate() {
        match value {
            Some(0) => labels.push(0),
            Some(1) => labels.push(1),
            other => return Err(StrokeError::InvalidLabel { row, value: other }),
        }
    }

    Ok((rows, labels))
}

/// Reads, cleans and splits the CSV at `path`.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<(Vec<FeatureRow>, Vec<u32>)> {
    let df = clean(read_csv(path)?)?;
    feature_and_target(&df)
}

#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train_rows: Vec<FeatureRow>,
    pub train_labels: Vec<u32>,
    pub test_rows: Vec<FeatureRow>,
    pub test_labels: Vec<u32>,
}

/// Shuffles row indices with a seeded generator and holds out the first
/// `ceil(n * test_size)` of them.
pub fn train_test_split(
    rows: &[FeatureRow],
    labels: &[u32],
    test_size: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if rows.len() != labels.len() {
        return Err(StrokeError::LengthMismatch {
            features: rows.len(),
            labels: labels.len(),
        });
    }
    if !(0.0..1.0).contains(&test_size) {
        return Err(StrokeError::InvalidInput(format!(
            "test size {} must be in [0, 1)",
            test_size
        )));
    }

    let n = rows.len();
    let n_test = (n as f64 * test_size).ceil() as usize;
    if n_test >= n {
        return Err(StrokeError::EmptyDataset);
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (test_idx, train_idx) = indices.split_at(n_test);
    let gather = |idx: &[usize]| -> (Vec<FeatureRow>, Vec<u32>) {
        idx.iter().map(|&i| (rows[i].clone(), labels[i])).unzip()
    };
    let (train_rows, train_labels) = gather(train_idx);
    let (test_rows, test_labels) = gather(test_idx);

    debug!("split: train={} test={}", train_rows.len(), test_rows.len());

    Ok(TrainTestSplit {
        train_rows,
        train_labels,
        test_rows,
        test_labels,
    })
}
