use std::sync::Arc;

use clap::{ArgAction, Parser};
use log::{debug, info};

use stroke_prediction::config::{ARTIFACT_FILE, DEFAULT_HOST, DEFAULT_PORT};
use stroke_prediction::{logging, server, StrokePipeline};

/// Serve the stroke prediction form.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct AppArgs {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Verbose level
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = AppArgs::parse();
    logging::init("app", args.verbose);
    debug!("Arguments {:#?}", args);

    // a missing or incompatible artifact is fatal
    let pipeline = StrokePipeline::load(ARTIFACT_FILE)?;
    let app = server::router(Arc::new(pipeline));

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
