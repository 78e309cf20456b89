use std::fmt;

use crate::gfx::GpuError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub(crate) fn naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Program build failure. Fatal for the program it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// A stage failed to parse or validate; `log` is the compiler's rendered diagnostic.
    Compile { stage: Stage, log: String },
    /// The stages do not fit together, or a required name is missing.
    Link { log: String },
    /// The backend refused to create the program object.
    Backend(GpuError),
}

impl ShaderError {
    pub(crate) fn link(log: impl Into<String>) -> Self {
        ShaderError::Link { log: log.into() }
    }
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Compile { stage, log } => write!(f, "{stage} shader failed to compile:\n{log}"),
            ShaderError::Link { log } => write!(f, "program failed to link: {log}"),
            ShaderError::Backend(err) => write!(f, "program creation failed: {err}"),
        }
    }
}

impl std::error::Error for ShaderError {}
