//! Incremental RGBA32UI texture packing of the splat store.
//!
//! Every splat occupies two consecutive texels (eight 32-bit words):
//!
//! | word | content |
//! |------|---------|
//! | 0..3 | position x, y, z as `f32` bits |
//! | 3    | reserved, zero |
//! | 4    | half2(4·Σxx, 4·Σxy) |
//! | 5    | half2(4·Σxz, 4·Σyy) |
//! | 6    | half2(4·Σyz, 4·Σzz) |
//! | 7    | RGBA color, R in the low byte |
//!
//! where Σ is the world-space covariance built from scale and rotation.

use half::f16;
use rayon::prelude::*;

use crate::splat::Splat;

pub const WORDS_PER_TEXEL: usize = 4;
pub const TEXELS_PER_SPLAT: usize = 2;
pub const WORDS_PER_SPLAT: usize = WORDS_PER_TEXEL * TEXELS_PER_SPLAT;

/// Whole used texture region, handed to the host by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUpdate {
    pub words: Vec<u32>,
    /// Texels per row.
    pub width: u32,
    /// Used rows.
    pub height: u32,
}

#[inline]
fn pack_half2(lo: f32, hi: f32) -> u32 {
    u32::from(f16::from_f32(lo).to_bits()) | (u32::from(f16::from_f32(hi).to_bits()) << 16)
}

/// Packs one splat. Pure: equal input always yields equal words.
pub fn encode_splat(splat: &Splat) -> [u32; WORDS_PER_SPLAT] {
    let cov = splat.covariance();
    let sigma = [
        4.0 * cov[0][0],
        4.0 * cov[0][1],
        4.0 * cov[0][2],
        4.0 * cov[1][1],
        4.0 * cov[1][2],
        4.0 * cov[2][2],
    ];

    [
        splat.position.x.to_bits(),
        splat.position.y.to_bits(),
        splat.position.z.to_bits(),
        0,
        pack_half2(sigma[0], sigma[1]),
        pack_half2(sigma[2], sigma[3]),
        pack_half2(sigma[4], sigma[5]),
        u32::from_le_bytes(splat.color),
    ]
}

#[derive(Debug)]
pub struct TextureEncoder {
    width: u32,
    words: Vec<u32>,
    allocated_rows: usize,
    encoded: usize,
}

impl TextureEncoder {
    /// `width` must be an even number of texels; the engine only builds
    /// encoders from a validated power-of-two width.
    pub fn new(width: u32) -> Self {
        debug_assert!(width >= 2 && width % 2 == 0);
        Self {
            width,
            words: Vec::new(),
            allocated_rows: 0,
            encoded: 0,
        }
    }

    fn splats_per_row(&self) -> usize {
        self.width as usize / TEXELS_PER_SPLAT
    }

    fn words_per_row(&self) -> usize {
        self.width as usize * WORDS_PER_TEXEL
    }

    /// Number of splats already packed.
    pub fn encoded_count(&self) -> usize {
        self.encoded
    }

    /// Used rows, `ceil(2 * count / width)`.
    pub fn height(&self) -> usize {
        self.encoded.div_ceil(self.splats_per_row())
    }

    pub fn allocated_rows(&self) -> usize {
        self.allocated_rows
    }

    fn ensure_row_capacity(&mut self, rows: usize) {
        if rows <= self.allocated_rows {
            return;
        }
        let mut new_rows = self.allocated_rows.max(1);
        while new_rows < rows {
            new_rows = new_rows.saturating_mul(2);
        }
        self.words.resize(new_rows * self.words_per_row(), 0);
        self.allocated_rows = new_rows;
    }

    /// Packs the records past the cursor and returns the updated region, or
    /// `None` when nothing new arrived.
    pub fn encode_new(&mut self, splats: &[Splat]) -> Option<TextureUpdate> {
        debug_assert!(
            splats.len() >= self.encoded,
            "store shrank without an encoder reset"
        );
        let start = self.encoded;
        let end = splats.len();
        if end <= start {
            return None;
        }

        let rows = end.div_ceil(self.splats_per_row());
        self.ensure_row_capacity(rows);

        self.words[start * WORDS_PER_SPLAT..end * WORDS_PER_SPLAT]
            .par_chunks_exact_mut(WORDS_PER_SPLAT)
            .zip(splats[start..end].par_iter())
            .for_each(|(dst, splat)| dst.copy_from_slice(&encode_splat(splat)));
        self.encoded = end;

        Some(self.snapshot())
    }

    /// Copy of the used region for hand-off to the host.
    pub fn snapshot(&self) -> TextureUpdate {
        let height = self.height();
        TextureUpdate {
            words: self.words[..height * self.words_per_row()].to_vec(),
            width: self.width,
            height: height as u32,
        }
    }

    pub fn words(&self) -> &[u32] {
        &self.words[..self.height() * self.words_per_row()]
    }

    /// Forgets the current scene, keeping the configured width.
    pub fn reset(&mut self) {
        self.words = Vec::new();
        self.allocated_rows = 0;
        self.encoded = 0;
    }
}
