//! Four-triangle demo
//!
//! Opens an 800x600 window and draws four colored triangles until the window
//! is closed or escape is pressed. Settings are read from `harness.toml` or
//! `harness.ron` in the working directory when one exists.

mod scene;

use gl_harness::prelude::*;
use std::path::Path;
use std::process::ExitCode;

const CONFIG_FILES: [&str; 2] = ["harness.toml", "harness.ron"];

fn load_config() -> Result<HarnessConfig, HarnessError> {
    for file in CONFIG_FILES {
        let path = Path::new(file);
        if path.exists() {
            log::info!("Loading configuration from {}", path.display());
            return Ok(HarnessConfig::load_from_file(path)?);
        }
    }
    log::info!("No configuration file found, using defaults");
    Ok(HarnessConfig::default())
}

fn run() -> Result<RunSummary, HarnessError> {
    let config = load_config()?;
    let harness = Harness::new(config);
    harness.run(Box::new(GlfwWindowSystem::new()), &scene::FOUR_TRIANGLES)
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting triangles demo");

    match run() {
        Ok(summary) => {
            log::info!("Exited cleanly after {} frames", summary.frames);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{}", err);
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
