//! Column transforms fitted on the training rows and replayed at inference.
//!
//! Output layout is the numeric block (imputed, standardized) followed by one
//! indicator block per categorical column.

use std::collections::BTreeSet;

use log::debug;
use num::{Float, NumCast};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::{Result, StrokeError};
use crate::records::{FeatureRow, CATEGORICAL_FEATURES, NUMERIC_FEATURES};

pub const MISSING_CATEGORY: &str = "missing";

/// What the encoder does with a category it did not see during fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnknownCategory {
    /// Encode as an all-zero indicator block.
    #[default]
    Ignore,
    Error,
}

fn mean<T: Float>(values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    let n = <T as NumCast>::from(values.len())?;
    Some(values.iter().fold(T::zero(), |acc, v| acc + *v) / n)
}

/// Population standard deviation.
fn std_dev<T: Float>(values: &[T], mean: T) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    let n = <T as NumCast>::from(values.len())?;
    let sum_sq = values
        .iter()
        .fold(T::zero(), |acc, v| acc + (*v - mean) * (*v - mean));
    Some((sum_sq / n).sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    pub means: Vec<f64>,
}

impl MeanImputer {
    pub fn fit(columns: &[Vec<Option<f64>>], names: &[&str]) -> Result<Self> {
        let means = columns
            .iter()
            .zip(names)
            .map(|(column, name)| {
                let present: Vec<f64> = column.iter().flatten().copied().collect();
                mean(&present).ok_or_else(|| StrokeError::EmptyColumn {
                    column: name.to_string(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(MeanImputer { means })
    }

    pub fn transform(&self, values: &[Option<f64>]) -> Vec<f64> {
        values
            .iter()
            .zip(&self.means)
            .map(|(v, m)| v.filter(|x| !x.is_nan()).unwrap_or(*m))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(columns: &[Vec<f64>]) -> Self {
        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());
        for column in columns {
            let m = mean(column).unwrap_or(0.0);
            let s = std_dev(column, m).unwrap_or(0.0);
            means.push(m);
            // constant column: leave it centred but unscaled
            scales.push(if s > 0.0 { s } else { 1.0 });
        }
        StandardScaler { means, scales }
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericTransformer {
    pub imputer: MeanImputer,
    pub scaler: StandardScaler,
}

impl NumericTransformer {
    pub fn fit(rows: &[FeatureRow]) -> Result<Self> {
        let columns: Vec<Vec<Option<f64>>> = (0..NUMERIC_FEATURES.len())
            .map(|j| rows.iter().map(|r| r.numeric[j]).collect())
            .collect();
        let imputer = MeanImputer::fit(&columns, &NUMERIC_FEATURES)?;

        let imputed: Vec<Vec<f64>> = columns
            .iter()
            .zip(&imputer.means)
            .map(|(column, m)| column.iter().map(|v| v.unwrap_or(*m)).collect())
            .collect();
        let scaler = StandardScaler::fit(&imputed);

        Ok(NumericTransformer { imputer, scaler })
    }

    pub fn transform(&self, row: &FeatureRow) -> Vec<f64> {
        self.scaler.transform(&self.imputer.transform(&row.numeric))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted categories per column.
    pub categories: Vec<Vec<String>>,
    pub handle_unknown: UnknownCategory,
}

impl OneHotEncoder {
    pub fn fit(columns: &[Vec<String>], handle_unknown: UnknownCategory) -> Self {
        let categories = columns
            .iter()
            .map(|column| {
                column
                    .iter()
                    .cloned()
                    .collect::<BTreeSet<String>>()
                    .into_iter()
                    .collect()
            })
            .collect();
        OneHotEncoder {
            categories,
            handle_unknown,
        }
    }

    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    pub fn transform(&self, values: &[String], names: &[&str]) -> Result<Vec<f64>> {
        let mut out = vec![0.0; self.n_outputs()];
        let mut offset = 0;
        for (j, (value, known)) in values.iter().zip(&self.categories).enumerate() {
            match known.binary_search(value) {
                Ok(pos) => out[offset + pos] = 1.0,
                Err(_) => match self.handle_unknown {
                    UnknownCategory::Ignore => {
                        debug!("unknown category {:?} in column {}", value, names[j]);
                    }
                    UnknownCategory::Error => {
                        return Err(StrokeError::UnknownCategory {
                            column: names[j].to_string(),
                            value: value.clone(),
                        })
                    }
                },
            }
            offset += known.len();
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalTransformer {
    pub fill_value: String,
    pub encoder: OneHotEncoder,
}

impl CategoricalTransformer {
    pub fn fit(rows: &[FeatureRow], handle_unknown: UnknownCategory) -> Self {
        let fill_value = MISSING_CATEGORY.to_string();
        let columns: Vec<Vec<String>> = (0..CATEGORICAL_FEATURES.len())
            .map(|j| {
                rows.iter()
                    .map(|r| r.categorical[j].clone().unwrap_or_else(|| fill_value.clone()))
                    .collect()
            })
            .collect();
        let encoder = OneHotEncoder::fit(&columns, handle_unknown);
        CategoricalTransformer {
            fill_value,
            encoder,
        }
    }

    pub fn transform(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let filled: Vec<String> = row
            .categorical
            .iter()
            .map(|v| v.clone().unwrap_or_else(|| self.fill_value.clone()))
            .collect();
        self.encoder.transform(&filled, &CATEGORICAL_FEATURES)
    }
}

/// Runs both branches and concatenates their outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub numeric: NumericTransformer,
    pub categorical: CategoricalTransformer,
}

impl ColumnTransformer {
    pub fn fit(rows: &[FeatureRow], handle_unknown: UnknownCategory) -> Result<Self> {
        if rows.is_empty() {
            return Err(StrokeError::EmptyDataset);
        }
        let numeric = NumericTransformer::fit(rows)?;
        let categorical = CategoricalTransformer::fit(rows, handle_unknown);
        let transformer = ColumnTransformer {
            numeric_columns: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            categorical_columns: CATEGORICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            numeric,
            categorical,
        };
        debug!(
            "fitted preprocessor with {} output features",
            transformer.n_features()
        );
        Ok(transformer)
    }

    pub fn n_features(&self) -> usize {
        self.numeric_columns.len() + self.categorical.encoder.n_outputs()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric_columns.clone();
        for (column, categories) in self
            .categorical_columns
            .iter()
            .zip(&self.categorical.encoder.categories)
        {
            names.extend(categories.iter().map(|c| format!("{}_{}", column, c)));
        }
        names
    }

    pub fn transform_row(&self, row: &FeatureRow) -> Result<Vec<f64>> {
        let mut out = self.numeric.transform(row);
        out.extend(self.categorical.transform(row)?);
        Ok(out)
    }

    /// Transforms `rows` into a row-major matrix for the classifier.
    pub fn transform(&self, rows: &[FeatureRow]) -> Result<DenseMatrix<f64>> {
        let n_cols = self.n_features();
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            values.extend(self.transform_row(row)?);
        }
        Ok(DenseMatrix::new(rows.len(), n_cols, values, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(age: Option<f64>, work_type: Option<&str>) -> FeatureRow {
        FeatureRow {
            numeric: [age, Some(100.0), Some(25.0)],
            categorical: [
                Some("Male".to_string()),
                Some("0".to_string()),
                Some("0".to_string()),
                Some("Yes".to_string()),
                work_type.map(str::to_string),
                Some("Urban".to_string()),
                Some("never smoked".to_string()),
            ],
        }
    }

    #[test]
    fn test_mean_imputation_uses_training_mean() {
        let rows = vec![
            row(Some(20.0), Some("Private")),
            row(Some(40.0), Some("Private")),
            row(None, Some("Private")),
        ];
        let numeric = NumericTransformer::fit(&rows).unwrap();
        assert_eq!(numeric.imputer.means[0], 30.0);

        // missing value lands on the mean, which standardizes to zero
        let out = numeric.transform(&row(None, None));
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn test_scaler_standardizes() {
        let scaler = StandardScaler::fit(&[vec![1.0, 3.0], vec![5.0, 5.0]]);
        assert_eq!(scaler.transform(&[1.0, 5.0]), vec![-1.0, 0.0]);
        assert_eq!(scaler.scales[1], 1.0);
    }

    #[test]
    fn test_all_missing_numeric_column_fails() {
        let rows = vec![row(None, Some("Private")), row(None, Some("Private"))];
        assert!(matches!(
            NumericTransformer::fit(&rows),
            Err(StrokeError::EmptyColumn { ref column }) if column == "age"
        ));
    }

    #[test]
    fn test_unknown_category_encodes_as_zero() {
        let rows = vec![
            row(Some(20.0), Some("Private")),
            row(Some(40.0), Some("Govt_job")),
        ];
        let transformer = ColumnTransformer::fit(&rows, UnknownCategory::Ignore).unwrap();
        let names = transformer.feature_names();
        let private = names.iter().position(|n| n == "work_type_Private").unwrap();
        let govt = names.iter().position(|n| n == "work_type_Govt_job").unwrap();

        let known = transformer.transform_row(&row(Some(30.0), Some("Private"))).unwrap();
        assert_eq!(known[private], 1.0);
        assert_eq!(known[govt], 0.0);

        let unknown = transformer
            .transform_row(&row(Some(30.0), Some("Unemployed")))
            .unwrap();
        assert_eq!(unknown.len(), transformer.n_features());
        assert_eq!(unknown[private], 0.0);
        assert_eq!(unknown[govt], 0.0);
    }

    #[test]
    fn test_unknown_category_error_policy() {
        let rows = vec![row(Some(20.0), Some("Private"))];
        let transformer = ColumnTransformer::fit(&rows, UnknownCategory::Error).unwrap();
        assert!(matches!(
            transformer.transform_row(&row(Some(30.0), Some("children"))),
            Err(StrokeError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_missing_category_gets_placeholder() {
        let rows = vec![row(Some(20.0), None), row(Some(40.0), Some("Private"))];
        let transformer = ColumnTransformer::fit(&rows, UnknownCategory::Error).unwrap();
        assert!(transformer
            .feature_names()
            .contains(&"work_type_missing".to_string()));
        assert!(transformer.transform_row(&row(Some(1.0), None)).is_ok());
    }

    #[test]
    fn test_feature_layout() {
        let rows = vec![row(Some(20.0), Some("Private"))];
        let transformer = ColumnTransformer::fit(&rows, UnknownCategory::Ignore).unwrap();
        let names = transformer.feature_names();
        assert_eq!(&names[..3], &["age", "avg_glucose_level", "bmi"]);
        assert_eq!(names[3], "gender_Male");
        assert_eq!(names.len(), 3 + 7);
    }
}
