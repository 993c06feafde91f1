use world_engine::logging::LoggingConfig;
use world_engine::render::{BatchConfig, VertexLayout};
use world_engine::window::WindowConfig;

const ENV_VSYNC: &str = "WORLDENGINE_VSYNC";
const ENV_MSAA: &str = "WORLDENGINE_MSAA";
const ENV_LAYOUT: &str = "WORLDENGINE_LAYOUT";

/// Everything the launcher configures.
#[derive(Debug, Clone, Default)]
pub struct LauncherConfig {
    pub window: WindowConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig,
}

impl LauncherConfig {
    /// Applies `WORLDENGINE_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var(ENV_VSYNC) {
            match parse_bool(&v) {
                Some(b) => self.window.vsync = b,
                None => log::warn!("ignoring {ENV_VSYNC}={v:?}: expected a boolean"),
            }
        }
        if let Some(v) = var(ENV_MSAA) {
            match v.trim().parse::<u32>() {
                Ok(n) => self.window.msaa_samples = n,
                Err(_) => log::warn!("ignoring {ENV_MSAA}={v:?}: expected a sample count"),
            }
        }
        if let Some(v) = var(ENV_LAYOUT) {
            match VertexLayout::parse(&v) {
                Some(layout) => self.batch.layout = layout,
                None => log::warn!("ignoring {ENV_LAYOUT}={v:?}: expected position or position-color"),
            }
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
