mod config;
mod scene;

use std::process::ExitCode;

use anyhow::Result;
use world_engine::logging::init_logging;
use world_engine::window::Runtime;

use crate::config::LauncherConfig;
use crate::scene::CubeField;

const FIELD_SIDE: usize = 7;

fn main() -> ExitCode {
    let mut config = LauncherConfig::default();
    init_logging(config.logging.clone());
    config.apply_env();

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("worldengine failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: LauncherConfig) -> Result<()> {
    log::info!(
        "starting {} ({}x{}, {:?} layout)",
        config.window.title,
        config.window.width,
        config.window.height,
        config.batch.layout
    );
    Runtime::run(config.window, config.batch, || CubeField::new(FIELD_SIDE))?;
    log::info!("clean shutdown");
    Ok(())
}
