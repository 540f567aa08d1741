//! Lumina command-line renderer
//!
//! Loads a session configuration and a scene description, builds the
//! scene, renders it and prints statistics.
//!
//! Run with: cargo run -p lumina_runtime -- scene.json

mod args;
mod error;
mod output;
mod runner;
mod scene_file;

use std::path::Path;
use std::process::ExitCode;

use lumina::{Session, SessionConfig};

use crate::args::{Args, USAGE};
use crate::error::Result;
use crate::scene_file::SceneDescription;

/// Picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "lumina.toml";

fn main() -> ExitCode {
    let args = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    lumina::logging::init(&config.log.filter);

    match render(&args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => SessionConfig::load(DEFAULT_CONFIG)?,
        None => SessionConfig::from_env(),
    };
    if let Some(threads) = args.threads {
        config.render.threads = Some(threads);
    }
    Ok(config)
}

fn render(args: &Args, config: SessionConfig) -> Result<()> {
    let description = SceneDescription::load(&args.scene)?;
    let session = Session::with_config(config)?;
    let stats = runner::run(&session, &description, args.output.clone())?;
    println!("{}", stats);

    for report in session.shutdown() {
        if let Some(warning) = report.warning {
            log::warn!("{}", warning);
        }
    }
    Ok(())
}
