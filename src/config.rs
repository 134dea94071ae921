use serde::{Deserialize, Serialize};

use crate::forest::ForestParams;
use crate::preprocess::UnknownCategory;

/// Artifact written by the trainer and read by the app. Not configurable.
pub const ARTIFACT_FILE: &str = "stroke_model.json";
pub const DATASET_FILE: &str = "healthcare-dataset-stroke-data.csv";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8501;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub test_size: f64,
    pub split_seed: u64,
    pub handle_unknown: UnknownCategory,
    pub forest: ForestParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            test_size: 0.2,
            split_seed: 42,
            handle_unknown: UnknownCategory::Ignore,
            forest: ForestParams::default(),
        }
    }
}
