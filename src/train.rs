//! Offline training run: load, clean, split, fit, score.

use std::path::Path;
use std::time::Instant;

use log::info;

use crate::config::TrainConfig;
use crate::data::{load_dataset, train_test_split};
use crate::error::Result;
use crate::pipeline::StrokePipeline;

#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub positives: usize,
    /// Holdout accuracy.
    pub score: f64,
}

pub fn fit_from_csv<P: AsRef<Path>>(
    path: P,
    config: &TrainConfig,
) -> Result<(StrokePipeline, TrainReport)> {
    let (rows, labels) = load_dataset(path)?;
    let positives = labels.iter().filter(|&&l| l == 1).count();
    info!(
        "dataset has {} rows, {} stroke-positive",
        rows.len(),
        positives
    );

    let split = train_test_split(&rows, &labels, config.test_size, config.split_seed)?;

    let start = Instant::now();
    let pipeline = StrokePipeline::fit(&split.train_rows, &split.train_labels, config)?;
    info!("fit took {:?}", start.elapsed());

    let score = pipeline.score(&split.test_rows, &split.test_labels)?;

    let report = TrainReport {
        train_rows: split.train_rows.len(),
        test_rows: split.test_rows.len(),
        positives,
        score,
    };
    Ok((pipeline, report))
}
