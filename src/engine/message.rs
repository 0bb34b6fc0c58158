use crate::error::FormatError;
use crate::math::Mat4;
use crate::texture::TextureUpdate;

/// Requests from the rendering host. Buffers are moved in; the host keeps no
/// reference to them.
#[derive(Debug)]
pub enum HostMessage {
    /// Replace the scene with a `.ply` buffer; `save` also returns the
    /// converted `.splat` bytes.
    LoadStructured { bytes: Vec<u8>, save: bool },
    /// Ingest `.splat` rows up to `declared_count`. `bytes` is the download so
    /// far; rows already in the store are skipped.
    LoadRaw { bytes: Vec<u8>, declared_count: usize },
    /// Request a reorder for a column-major view-projection matrix.
    SetView { view_proj: Mat4 },
    /// Drop the current scene.
    Reset,
}

/// Responses to the host. Every buffer is owned by the receiver.
#[derive(Debug)]
pub enum EngineMessage {
    ExportBytes { bytes: Vec<u8>, save: bool },
    TextureUpdate(TextureUpdate),
    /// Back-to-front permutation of `0..count`.
    OrderUpdate { indices: Vec<u32>, count: usize },
    LoadFailed(FormatError),
}

impl HostMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LoadStructured { .. } => "load-structured",
            Self::LoadRaw { .. } => "load-raw",
            Self::SetView { .. } => "set-view",
            Self::Reset => "reset",
        }
    }
}

impl EngineMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExportBytes { .. } => "export-bytes",
            Self::TextureUpdate(_) => "texture-update",
            Self::OrderUpdate { .. } => "order-update",
            Self::LoadFailed(_) => "load-failed",
        }
    }
}
