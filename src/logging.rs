use env_logger::{Builder, Env};
use log::LevelFilter;

/// Initializes `env_logger` for the library and the calling binary.
/// `verbose` counts `-v` flags; `STROKE_LOG` overrides the result.
pub fn init(binary: &str, verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("STROKE_LOG");
    Builder::new()
        .filter(Some("stroke_prediction"), log_level)
        .filter(Some(binary), log_level)
        .parse_env(env)
        .init();
}
