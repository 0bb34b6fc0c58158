//! Fixed-row `.splat` codec: 32 little-endian bytes per record.

use crate::math::Vec3;
use crate::splat::{Splat, ROW_SIZE};

fn read_vec3_f32(bytes: &[u8]) -> Vec3 {
    let x = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let y = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let z = f32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    Vec3::new(x, y, z)
}

fn write_vec3_f32(out: &mut Vec<u8>, v: Vec3) {
    out.extend_from_slice(&v.x.to_le_bytes());
    out.extend_from_slice(&v.y.to_le_bytes());
    out.extend_from_slice(&v.z.to_le_bytes());
}

/// Number of complete rows in a buffer of `len` bytes.
#[inline]
pub fn row_count(len: usize) -> usize {
    len / ROW_SIZE
}

pub fn decode_row(row: &[u8]) -> Splat {
    debug_assert!(row.len() >= ROW_SIZE);
    Splat {
        position: read_vec3_f32(&row[0..12]),
        scale: read_vec3_f32(&row[12..24]),
        color: [row[24], row[25], row[26], row[27]],
        rotation: [row[28], row[29], row[30], row[31]],
    }
}

/// Decodes every complete row; a trailing partial row is ignored.
pub fn decode_rows(bytes: &[u8]) -> Vec<Splat> {
    bytes.chunks_exact(ROW_SIZE).map(decode_row).collect()
}

/// Decodes rows `[start, end)`, clamped to the rows actually present.
pub fn decode_row_range(bytes: &[u8], start: usize, end: usize) -> Vec<Splat> {
    let end = end.min(row_count(bytes.len()));
    if start >= end {
        return Vec::new();
    }
    decode_rows(&bytes[start * ROW_SIZE..end * ROW_SIZE])
}

pub fn encode_row(splat: &Splat, out: &mut Vec<u8>) {
    write_vec3_f32(out, splat.position);
    write_vec3_f32(out, splat.scale);
    out.extend_from_slice(&splat.color);
    out.extend_from_slice(&splat.rotation);
}

pub fn encode_rows(splats: &[Splat]) -> Vec<u8> {
    let mut out = Vec::with_capacity(splats.len() * ROW_SIZE);
    for splat in splats {
        encode_row(splat, &mut out);
    }
    out
}

/// True when row `index` of `bytes` is present and holds exactly `splat`.
pub fn row_matches(bytes: &[u8], index: usize, splat: &Splat) -> bool {
    if index >= row_count(bytes.len()) {
        return false;
    }
    let mut encoded = Vec::with_capacity(ROW_SIZE);
    encode_row(splat, &mut encoded);
    bytes[index * ROW_SIZE..(index + 1) * ROW_SIZE] == encoded[..]
}
