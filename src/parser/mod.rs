pub mod dot_splat;
pub mod ply;

use std::path::Path;

use crate::error::FormatError;
use crate::splat::Splat;

/// Input layouts the engine can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    /// Fixed 32-byte rows (`.splat`).
    Raw,
    /// Header-delimited point cloud (`.ply`).
    Ply,
}

impl SceneFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "ply" => Some(Self::Ply),
            "splat" => Some(Self::Raw),
            _ => None,
        }
    }

    /// Sniffs the format from the leading bytes; anything without the PLY
    /// magic is treated as raw rows.
    pub fn detect(data: &[u8]) -> Self {
        if ply::has_ply_magic(data) {
            Self::Ply
        } else {
            Self::Raw
        }
    }
}

/// Decodes a whole buffer in the given format.
///
/// Raw buffers never fail: a trailing partial row is dropped.
pub fn parse_scene(data: &[u8], format: SceneFormat) -> Result<Vec<Splat>, FormatError> {
    match format {
        SceneFormat::Raw => Ok(dot_splat::decode_rows(data)),
        SceneFormat::Ply => ply::decode_ply(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(
            SceneFormat::from_path(Path::new("scenes/bonsai.SPLAT")),
            Some(SceneFormat::Raw)
        );
        assert_eq!(
            SceneFormat::from_path(Path::new("luigi.ply")),
            Some(SceneFormat::Ply)
        );
        assert_eq!(SceneFormat::from_path(Path::new("notes.txt")), None);
        assert_eq!(SceneFormat::from_path(Path::new("no_extension")), None);
    }

    #[test]
    fn detects_ply_magic() {
        assert_eq!(
            SceneFormat::detect(b"ply\nformat binary_little_endian 1.0\n"),
            SceneFormat::Ply
        );
        assert_eq!(SceneFormat::detect(&[0u8; 64]), SceneFormat::Raw);
    }

    #[test]
    fn both_formats_produce_the_same_canonical_record() {
        let ply = ply::tests::build_ply(&[ply::tests::vertex_at([1.0, -1.0, 2.0])], None);
        let from_ply = parse_scene(&ply, SceneFormat::Ply).expect("valid ply");

        let raw = dot_splat::encode_rows(&from_ply);
        let from_raw = parse_scene(&raw, SceneFormat::Raw).expect("raw never fails");
        assert_eq!(from_ply, from_raw);
    }
}
