use crate::math::{clamp_u8, mat3_mul, mat3_transpose, quat_normalize, quat_to_rotation_matrix, Vec3};

/// Size of one fixed-row `.splat` record in bytes.
pub const ROW_SIZE: usize = 32;

/// Zeroth-order spherical harmonic basis constant, `1 / (2 * sqrt(pi))`.
pub const SH_C0: f32 = 0.282_094_79;

/// Canonical splat record shared by both input formats.
///
/// Mirrors the fixed-row wire layout one-to-one: `color` is RGBA with alpha
/// holding opacity, `rotation` is a byte-quantized `[w, x, y, z]` quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    pub position: Vec3,
    pub scale: Vec3,
    pub color: [u8; 4],
    pub rotation: [u8; 4],
}

impl Splat {
    /// Dequantized, renormalized `[w, x, y, z]` quaternion.
    pub fn rotation_quat(&self) -> [f32; 4] {
        quat_normalize(self.rotation.map(dequantize_rotation_component))
    }

    /// World-space covariance `R * diag(s^2) * R^T`.
    pub fn covariance(&self) -> [[f32; 3]; 3] {
        compute_3d_covariance(self.scale, self.rotation_quat())
    }
}

#[inline]
pub fn quantize_rotation_component(q: f32) -> u8 {
    clamp_u8(q * 128.0 + 128.0)
}

#[inline]
pub fn dequantize_rotation_component(b: u8) -> f32 {
    (b as f32 - 128.0) / 128.0
}

/// Normalizes `q` and packs it into wire bytes.
pub fn quantize_rotation(q: [f32; 4]) -> [u8; 4] {
    quat_normalize(q).map(quantize_rotation_component)
}

pub fn compute_3d_covariance(scale: Vec3, rotation: [f32; 4]) -> [[f32; 3]; 3] {
    let r = quat_to_rotation_matrix(rotation);
    let mut d = [[0.0; 3]; 3];
    d[0][0] = scale.x * scale.x;
    d[1][1] = scale.y * scale.y;
    d[2][2] = scale.z * scale.z;

    mat3_mul(mat3_mul(r, d), mat3_transpose(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_quantization_matches_wire_convention() {
        assert_eq!(quantize_rotation_component(1.0), 255);
        assert_eq!(quantize_rotation_component(0.0), 128);
        assert_eq!(quantize_rotation_component(-1.0), 0);
        assert_eq!(quantize_rotation([1.0, 0.0, 0.0, 0.0]), [255, 128, 128, 128]);
    }

    #[test]
    fn axis_aligned_covariance_is_squared_scale() {
        let splat = Splat {
            position: Vec3::ZERO,
            scale: Vec3::new(0.5, 2.0, 3.0),
            color: [255; 4],
            rotation: [255, 128, 128, 128],
        };
        let cov = splat.covariance();
        assert!((cov[0][0] - 0.25).abs() < 1e-5);
        assert!((cov[1][1] - 4.0).abs() < 1e-5);
        assert!((cov[2][2] - 9.0).abs() < 1e-5);
        assert!(cov[0][1].abs() < 1e-5 && cov[1][2].abs() < 1e-5);
    }
}
