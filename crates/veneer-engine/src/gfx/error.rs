use std::fmt;

/// Failure of a resource-creating call on a [`super::GraphicsApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// Texture could not be allocated or written.
    Texture(String),
    /// Program object could not be created from a linked description.
    Program(String),
    /// The handle does not name a live object.
    UnknownHandle { kind: &'static str, raw: u32 },
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::Texture(msg) => write!(f, "texture error: {msg}"),
            GpuError::Program(msg) => write!(f, "program error: {msg}"),
            GpuError::UnknownHandle { kind, raw } => write!(f, "unknown {kind} handle {raw}"),
        }
    }
}

impl std::error::Error for GpuError {}

/// GPU error state as reported by `get_error`.
///
/// Values follow the GL error enum so logs read the same regardless of backend.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GpuErrorCode {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    StackOverflow,
    StackUnderflow,
    OutOfMemory,
    InvalidFramebufferOperation,
    ContextLost,
    Unknown(u32),
}

impl GpuErrorCode {
    /// Maps a raw GL error value; `0` (no error) maps to `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        let code = match raw {
            0 => return None,
            0x0500 => GpuErrorCode::InvalidEnum,
            0x0501 => GpuErrorCode::InvalidValue,
            0x0502 => GpuErrorCode::InvalidOperation,
            0x0503 => GpuErrorCode::StackOverflow,
            0x0504 => GpuErrorCode::StackUnderflow,
            0x0505 => GpuErrorCode::OutOfMemory,
            0x0506 => GpuErrorCode::InvalidFramebufferOperation,
            0x0507 => GpuErrorCode::ContextLost,
            other => GpuErrorCode::Unknown(other),
        };
        Some(code)
    }

    pub fn raw(self) -> u32 {
        match self {
            GpuErrorCode::InvalidEnum => 0x0500,
            GpuErrorCode::InvalidValue => 0x0501,
            GpuErrorCode::InvalidOperation => 0x0502,
            GpuErrorCode::StackOverflow => 0x0503,
            GpuErrorCode::StackUnderflow => 0x0504,
            GpuErrorCode::OutOfMemory => 0x0505,
            GpuErrorCode::InvalidFramebufferOperation => 0x0506,
            GpuErrorCode::ContextLost => 0x0507,
            GpuErrorCode::Unknown(raw) => raw,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GpuErrorCode::InvalidEnum => "GL_INVALID_ENUM",
            GpuErrorCode::InvalidValue => "GL_INVALID_VALUE",
            GpuErrorCode::InvalidOperation => "GL_INVALID_OPERATION",
            GpuErrorCode::StackOverflow => "GL_STACK_OVERFLOW",
            GpuErrorCode::StackUnderflow => "GL_STACK_UNDERFLOW",
            GpuErrorCode::OutOfMemory => "GL_OUT_OF_MEMORY",
            GpuErrorCode::InvalidFramebufferOperation => "GL_INVALID_FRAMEBUFFER_OPERATION",
            GpuErrorCode::ContextLost => "GL_CONTEXT_LOST",
            GpuErrorCode::Unknown(_) => "unknown GL error",
        }
    }
}

impl fmt::Display for GpuErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.as_str(), self.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_error_is_none() {
        assert_eq!(GpuErrorCode::from_raw(0), None);
    }

    #[test]
    fn known_codes_round_trip_through_raw() {
        for raw in 0x0500..=0x0507u32 {
            let code = GpuErrorCode::from_raw(raw).unwrap();
            assert_eq!(code.raw(), raw);
            assert!(code.as_str().starts_with("GL_"));
        }
    }

    #[test]
    fn unknown_code_keeps_value() {
        let code = GpuErrorCode::from_raw(0x9999).unwrap();
        assert_eq!(code, GpuErrorCode::Unknown(0x9999));
        assert_eq!(code.to_string(), "unknown GL error (0x9999)");
    }

    #[test]
    fn display_includes_name_and_hex() {
        assert_eq!(
            GpuErrorCode::InvalidOperation.to_string(),
            "GL_INVALID_OPERATION (0x0502)"
        );
    }
}
