use super::layout::VertexLayout;
use super::shader::ShaderSource;
use super::shaders;

/// Batch renderer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Staging stream capacity in float components.
    pub staging_capacity: usize,
    pub layout: VertexLayout,
    pub clear_color: wgpu::Color,
    /// Vertex stage; `None` selects the embedded stage matching `layout`.
    pub vertex_shader: Option<ShaderSource>,
    pub fragment_shader: ShaderSource,
}

impl BatchConfig {
    pub const DEFAULT_STAGING_CAPACITY: usize = 4096;

    pub fn with_layout(mut self, layout: VertexLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Vertex stage source in effect for the configured layout.
    pub fn vertex_source(&self) -> ShaderSource {
        match &self.vertex_shader {
            Some(src) => src.clone(),
            None => match self.layout {
                VertexLayout::Position => ShaderSource::Embedded(shaders::POSITION_VERT),
                VertexLayout::PositionColor => ShaderSource::Embedded(shaders::COLOR_VERT),
            },
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            staging_capacity: Self::DEFAULT_STAGING_CAPACITY,
            layout: VertexLayout::Position,
            clear_color: wgpu::Color::BLACK,
            vertex_shader: None,
            fragment_shader: ShaderSource::Embedded(shaders::BATCH_FRAG),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stage_follows_layout() {
        let cfg = BatchConfig::default();
        assert_eq!(cfg.vertex_source(), ShaderSource::Embedded(shaders::POSITION_VERT));

        let cfg = cfg.with_layout(VertexLayout::PositionColor);
        assert_eq!(cfg.vertex_source(), ShaderSource::Embedded(shaders::COLOR_VERT));
    }

    #[test]
    fn explicit_vertex_stage_wins() {
        let cfg = BatchConfig {
            vertex_shader: Some(ShaderSource::File("custom.wgsl".into())),
            ..BatchConfig::default()
        };
        assert_eq!(cfg.vertex_source(), ShaderSource::File("custom.wgsl".into()));
    }
}
