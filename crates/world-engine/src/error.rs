use std::fmt;

/// Shader pipeline stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Errors raised by the renderer, the shader program and the window coordinator.
///
/// Every variant is either fatal at startup or a protocol violation by the caller.
/// Nothing here is retryable.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Window, context, shader or buffer creation failed.
    #[error("initialization failed: {0}")]
    Initialization(String),

    /// begin/end protocol violation or use of a released resource.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("failed to compile {stage} shader: {message}")]
    Compile { stage: ShaderStage, message: String },

    #[error("failed to link shader program: {0}")]
    Link(String),

    /// Missing uniform or attribute name.
    #[error("no {kind} named `{name}` in shader program")]
    NotFound { kind: &'static str, name: String },

    #[error("window creation failed: {0}")]
    WindowCreation(String),
}

impl RenderError {
    pub(crate) fn init(msg: impl Into<String>) -> Self {
        RenderError::Initialization(msg.into())
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
