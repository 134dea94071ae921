#![allow(dead_code)]

use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use stroke_prediction::config::TrainConfig;
use stroke_prediction::forest::ForestParams;
use stroke_prediction::StrokePipeline;

const HEADER: [&str; 12] = [
    "id",
    "gender",
    "age",
    "hypertension",
    "heart_disease",
    "ever_married",
    "work_type",
    "Residence_type",
    "avg_glucose_level",
    "bmi",
    "smoking_status",
    "stroke",
];

fn pick<'a>(rng: &mut ChaCha8Rng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

/// Writes a synthetic stroke dataset. Stroke is positive exactly for older
/// patients with high glucose; about one row in ten has `N/A` for bmi.
pub fn write_dataset(path: &Path, n_rows: usize, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(HEADER).unwrap();

    for id in 0..n_rows {
        let age: f64 = rng.gen_range(1.0..82.0);
        let glucose: f64 = rng.gen_range(55.0..270.0);
        let bmi = if rng.gen_bool(0.1) {
            "N/A".to_string()
        } else {
            format!("{:.1}", rng.gen_range(15.0..45.0))
        };
        let stroke = u8::from(age > 60.0 && glucose > 170.0);

        writer
            .write_record([
                (id + 1).to_string(),
                pick(&mut rng, &["Male", "Female"]).to_string(),
                format!("{:.0}", age),
                pick(&mut rng, &["0", "1"]).to_string(),
                pick(&mut rng, &["0", "1"]).to_string(),
                pick(&mut rng, &["Yes", "No"]).to_string(),
                pick(
                    &mut rng,
                    &["Private", "Self-employed", "Govt_job", "children", "Never_worked"],
                )
                .to_string(),
                pick(&mut rng, &["Urban", "Rural"]).to_string(),
                format!("{:.2}", glucose),
                bmi,
                pick(
                    &mut rng,
                    &["formerly smoked", "never smoked", "smokes", "Unknown"],
                )
                .to_string(),
                stroke.to_string(),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
}

pub fn small_config() -> TrainConfig {
    TrainConfig {
        forest: ForestParams {
            n_trees: 30,
            ..ForestParams::default()
        },
        ..TrainConfig::default()
    }
}

pub fn trained_pipeline() -> StrokePipeline {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stroke.csv");
    write_dataset(&path, 600, 7);
    let (pipeline, _) =
        stroke_prediction::train::fit_from_csv(&path, &small_config()).unwrap();
    pipeline
}
