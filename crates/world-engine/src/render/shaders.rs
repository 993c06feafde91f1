//! Embedded WGSL sources for the batch program.

/// Position-only vertex stage; colors fragments by model-space corner.
pub const POSITION_VERT: &str = include_str!("shaders/position.vert.wgsl");

/// Position + color vertex stage.
pub const COLOR_VERT: &str = include_str!("shaders/color.vert.wgsl");

pub const BATCH_FRAG: &str = include_str!("shaders/batch.frag.wgsl");
