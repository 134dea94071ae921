use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgAction, Parser};
use log::{debug, info};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

use stroke_prediction::config::{TrainConfig, ARTIFACT_FILE, DATASET_FILE};
use stroke_prediction::{logging, train};

/// Train the stroke risk classifier and save it next to the app.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct TrainArgs {
    /// Stroke dataset CSV
    #[arg(default_value = DATASET_FILE)]
    input: PathBuf,
    /// Verbose level
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Resident memory of this process in bytes, 0 if unavailable.
fn monitor_memory() -> u64 {
    let mut system = System::new();
    match get_current_pid() {
        Ok(pid) => {
            system.refresh_process(pid);
            system.process(pid).map(|p| p.memory()).unwrap_or(0)
        }
        Err(_) => 0,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = TrainArgs::parse();
    logging::init("stroke_prediction", args.verbose);
    debug!("Arguments {:#?}", args);

    let start_time = Instant::now();
    let start_memory = monitor_memory();

    let config = TrainConfig::default();
    let input = args.input.clone();
    let (pipeline, report) =
        tokio::task::spawn_blocking(move || train::fit_from_csv(input, &config)).await??;

    println!("Model Score: {}", report.score);

    pipeline.save(ARTIFACT_FILE)?;
    println!("Model saved as {}", ARTIFACT_FILE);

    let end_memory = monitor_memory();
    info!(
        "trained on {} rows, held out {}, in {:?}",
        report.train_rows,
        report.test_rows,
        start_time.elapsed()
    );
    debug!(
        "memory used: {} bytes",
        end_memory.saturating_sub(start_memory)
    );

    Ok(())
}
