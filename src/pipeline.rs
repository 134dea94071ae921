//! The fitted preprocessing + classifier bundle and its on-disk artifact.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use smartcore::metrics::accuracy;

use crate::config::TrainConfig;
use crate::error::{Result, StrokeError};
use crate::forest::RandomForestClassifier;
use crate::preprocess::ColumnTransformer;
use crate::records::{FeatureRow, PatientRecord, CATEGORICAL_FEATURES, NUMERIC_FEATURES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.3 {
            RiskLevel::Low
        } else if probability < 0.6 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub is_stroke: bool,
    pub probability: f64,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokePipeline {
    preprocessor: ColumnTransformer,
    classifier: RandomForestClassifier,
}

impl StrokePipeline {
    pub fn fit(rows: &[FeatureRow], labels: &[u32], config: &TrainConfig) -> Result<Self> {
        if rows.len() != labels.len() {
            return Err(StrokeError::LengthMismatch {
                features: rows.len(),
                labels: labels.len(),
            });
        }
        let preprocessor = ColumnTransformer::fit(rows, config.handle_unknown)?;
        let x = preprocessor.transform(rows)?;
        let classifier = RandomForestClassifier::fit(&x, labels, config.forest.clone())?;
        info!(
            "fitted pipeline on {} rows, {} features",
            rows.len(),
            preprocessor.n_features()
        );
        Ok(StrokePipeline {
            preprocessor,
            classifier,
        })
    }

    /// Class-1 probability per row.
    pub fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        let x = self.preprocessor.transform(rows)?;
        self.classifier.predict_proba(&x)
    }

    pub fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<u32>> {
        let x = self.preprocessor.transform(rows)?;
        self.classifier.predict(&x)
    }

    /// Validates and scores a single patient.
    pub fn predict_record(&self, record: &PatientRecord) -> Result<Prediction> {
        record.validate()?;
        let features = self
            .preprocessor
            .transform_row(&record.to_feature_row())?;
        let probability = self.classifier.predict_proba_row(&features)?;
        let prediction = Prediction {
            is_stroke: self.classifier.label_for(probability) == 1,
            probability,
            risk_level: RiskLevel::from_probability(probability),
        };
        debug!("{:?} -> {:?}", record, prediction);
        Ok(prediction)
    }

    /// Holdout accuracy.
    pub fn score(&self, rows: &[FeatureRow], labels: &[u32]) -> Result<f64> {
        if rows.is_empty() {
            return Err(StrokeError::EmptyDataset);
        }
        if rows.len() != labels.len() {
            return Err(StrokeError::LengthMismatch {
                features: rows.len(),
                labels: labels.len(),
            });
        }
        let y_true: Vec<i32> = labels.iter().map(|&l| l as i32).collect();
        let y_pred: Vec<i32> = self.predict(rows)?.into_iter().map(|l| l as i32).collect();
        Ok(accuracy(&y_true, &y_pred))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        debug!("wrote artifact {}", path.as_ref().display());
        Ok(())
    }

    /// Reads an artifact and checks it was fitted on the current column set.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let pipeline: StrokePipeline = serde_json::from_reader(reader)?;
        pipeline.check_schema()?;
        if pipeline.preprocessor.n_features() != pipeline.classifier.n_features() {
            return Err(StrokeError::ShapeMismatch {
                expected: pipeline.classifier.n_features(),
                actual: pipeline.preprocessor.n_features(),
            });
        }
        pipeline.classifier.check()?;
        info!(
            "loaded artifact {} ({} trees)",
            path.as_ref().display(),
            pipeline.classifier.trees().len()
        );
        Ok(pipeline)
    }

    fn check_schema(&self) -> Result<()> {
        let expected: Vec<String> = NUMERIC_FEATURES
            .iter()
            .chain(CATEGORICAL_FEATURES.iter())
            .map(|s| s.to_string())
            .collect();
        let found: Vec<String> = self
            .preprocessor
            .numeric_columns
            .iter()
            .chain(self.preprocessor.categorical_columns.iter())
            .cloned()
            .collect();
        if expected != found {
            return Err(StrokeError::SchemaMismatch { expected, found });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestParams;
    use crate::records::{BinaryFlag, WorkType};

    fn rows_and_labels() -> (Vec<FeatureRow>, Vec<u32>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..120 {
            let mut record = PatientRecord::default();
            record.age = (i % 80) as f64;
            record.avg_glucose_level = 70.0 + (i * 7 % 160) as f64;
            record.hypertension = if i % 5 == 0 { BinaryFlag::Yes } else { BinaryFlag::No };
            record.work_type = if i % 3 == 0 { WorkType::Private } else { WorkType::GovtJob };
            let mut row = record.to_feature_row();
            if i % 10 == 0 {
                row.numeric[2] = None;
            }
            rows.push(row);
            labels.push(u32::from(record.age > 70.0));
        }
        (rows, labels)
    }

    fn config() -> TrainConfig {
        TrainConfig {
            forest: ForestParams {
                n_trees: 20,
                ..ForestParams::default()
            },
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_risk_levels() {
        assert_eq!(RiskLevel::from_probability(0.05), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.3), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(0.6), RiskLevel::High);
    }

    #[test]
    fn test_prediction_json_shape() {
        let prediction = Prediction {
            is_stroke: true,
            probability: 0.8,
            risk_level: RiskLevel::High,
        };
        let json = serde_json::to_value(prediction).unwrap();
        assert_eq!(json["isStroke"], true);
        assert_eq!(json["riskLevel"], "High");
    }

    #[test]
    fn test_predict_record_is_deterministic() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let record = PatientRecord::sample();

        let first = pipeline.predict_record(&record).unwrap();
        let second = pipeline.predict_record(&record).unwrap();
        assert_eq!(first, second);
        assert!((0.0..=1.0).contains(&first.probability));
        assert_eq!(first.is_stroke, first.probability > 0.5);
    }

    #[test]
    fn test_unknown_work_type_still_predicts() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();

        let mut row = PatientRecord::sample().to_feature_row();
        row.categorical[4] = Some("Astronaut".to_string());
        let proba = pipeline.predict_proba(&[row]).unwrap();
        assert!((0.0..=1.0).contains(&proba[0]));
    }

    #[test]
    fn test_invalid_record_rejected() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let mut record = PatientRecord::sample();
        record.age = -3.0;
        assert!(matches!(
            pipeline.predict_record(&record),
            Err(StrokeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_artifact_reload_predicts_identically() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");

        pipeline.save(&path).unwrap();
        let loaded = StrokePipeline::load(&path).unwrap();
        assert_eq!(
            pipeline.predict_proba(&rows).unwrap(),
            loaded.predict_proba(&rows).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_foreign_schema() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        pipeline.save(&path).unwrap();

        let mut artifact: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        artifact["preprocessor"]["numeric_columns"][0] = "height".into();
        std::fs::write(&path, artifact.to_string()).unwrap();

        assert!(matches!(
            StrokePipeline::load(&path),
            Err(StrokeError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_load_missing_artifact() {
        assert!(matches!(
            StrokePipeline::load("no-such-model.json"),
            Err(StrokeError::Io(_))
        ));
    }

    #[test]
    fn test_score_on_training_rows() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let score = pipeline.score(&rows, &labels).unwrap();
        assert!(score > 0.9, "score {}", score);
    }

    #[test]
    fn test_score_counts_matching_labels() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let predicted = pipeline.predict(&rows).unwrap();
        let flipped: Vec<u32> = predicted.iter().map(|l| 1 - l).collect();

        assert_eq!(pipeline.score(&rows, &predicted).unwrap(), 1.0);
        assert_eq!(pipeline.score(&rows, &flipped).unwrap(), 0.0);
    }

    #[test]
    fn test_load_rejects_dangling_node() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        pipeline.save(&path).unwrap();

        let mut artifact: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        let nodes = artifact["classifier"]["trees"][0]["nodes"]
            .as_array_mut()
            .unwrap();
        let split = nodes
            .iter_mut()
            .find_map(|node| node.get_mut("Split"))
            .unwrap();
        split["left"] = 0.into();
        std::fs::write(&path, artifact.to_string()).unwrap();

        assert!(matches!(
            StrokePipeline::load(&path),
            Err(StrokeError::CorruptArtifact(_))
        ));
    }

    #[test]
    fn test_load_rejects_out_of_range_feature() {
        let (rows, labels) = rows_and_labels();
        let pipeline = StrokePipeline::fit(&rows, &labels, &config()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        pipeline.save(&path).unwrap();

        let mut artifact: serde_json::Value =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        let nodes = artifact["classifier"]["trees"][0]["nodes"]
            .as_array_mut()
            .unwrap();
        let split = nodes
            .iter_mut()
            .find_map(|node| node.get_mut("Split"))
            .unwrap();
        split["feature"] = 10_000.into();
        std::fs::write(&path, artifact.to_string()).unwrap();

        assert!(matches!(
            StrokePipeline::load(&path),
            Err(StrokeError::CorruptArtifact(_))
        ));
    }
}
