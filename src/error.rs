use std::fmt;

/// Errors surfaced at the crate's resource-loading boundary. The hot per-sample
/// evaluation path (§7 of the design notes) never constructs one of these; it
/// stays bool/float so a malformed MERL or Fourier table degenerates to an
/// inert, zero-contributing BxDF rather than aborting a render.
#[derive(Debug)]
pub enum ShadingError {
    ResourceIo(std::io::Error),
    ResourceFormat(String),
    ArenaExhausted,
}

impl fmt::Display for ShadingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShadingError::ResourceIo(e) => write!(f, "resource i/o error: {}", e),
            ShadingError::ResourceFormat(msg) => write!(f, "malformed resource: {}", msg),
            ShadingError::ArenaExhausted => write!(f, "render context arena exhausted"),
        }
    }
}

impl std::error::Error for ShadingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShadingError::ResourceIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ShadingError {
    fn from(e: std::io::Error) -> Self {
        ShadingError::ResourceIo(e)
    }
}

pub type Result<T> = std::result::Result<T, ShadingError>;
