//! Stroke risk prediction: a trainer that fits a preprocessing + random
//! forest pipeline on the stroke dataset, and a web form that serves it.

pub mod config;
pub mod data;
pub mod error;
pub mod forest;
pub mod logging;
pub mod pipeline;
pub mod preprocess;
pub mod records;
pub mod server;
pub mod train;

pub use error::{Result, StrokeError};
pub use pipeline::{Prediction, RiskLevel, StrokePipeline};
pub use records::{FeatureRow, PatientRecord};
