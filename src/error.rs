use thiserror::Error;

/// Rejection of an input buffer. The ingestion call that produced it leaves
/// the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("missing 'ply' magic header")]
    MissingMagic,

    #[error("no 'end_header' found before end of buffer")]
    MissingEndHeader,

    #[error("unsupported PLY encoding '{0}' (only binary_little_endian is supported)")]
    UnsupportedEncoding(String),

    #[error("malformed PLY header line: {0}")]
    InvalidHeader(String),

    #[error("unsupported property type '{0}'")]
    UnsupportedPropertyType(String),

    #[error("list property '{0}' cannot be decoded")]
    ListProperty(String),

    #[error("missing vertex element")]
    MissingVertexElement,

    #[error("missing required property '{0}'")]
    MissingProperty(&'static str),

    #[error("payload truncated: need {needed} bytes, have {available}")]
    TruncatedPayload { needed: usize, available: usize },

    #[error("size overflow while computing {0}")]
    SizeOverflow(&'static str),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("engine channel closed")]
    ChannelClosed,

    #[error("engine worker panicked")]
    WorkerPanicked,

    #[error("failed to spawn engine worker: {0}")]
    Spawn(#[from] std::io::Error),
}
