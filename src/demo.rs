use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;

use crate::math::{clamp_u8, Vec3};
use crate::splat::{quantize_rotation, Splat};

// --- Synthetic scenes ---

fn random_sphere_point(rng: &mut impl Rng) -> Vec3 {
    let z = rng.random_range(-1.0_f32..1.0_f32);
    let theta = rng.random_range(0.0_f32..TAU);
    let r = (1.0 - z * z).sqrt();
    Vec3::new(r * theta.cos(), z, r * theta.sin())
}

fn random_rotation(rng: &mut impl Rng) -> [u8; 4] {
    quantize_rotation([
        rng.random_range(-1.0_f32..1.0_f32),
        rng.random_range(-1.0_f32..1.0_f32),
        rng.random_range(-1.0_f32..1.0_f32),
        rng.random_range(-1.0_f32..1.0_f32),
    ])
}

fn torus_knot_splats(rng: &mut StdRng, count: usize) -> Vec<Splat> {
    let p = 2.0;
    let q = 3.0;
    let major = 1.4;
    let minor = 0.38;

    (0..count)
        .map(|i| {
            let t = i as f32 / count.max(1) as f32 * TAU * 2.0;
            let base = Vec3::new(
                (major + minor * (q * t).cos()) * (p * t).cos(),
                minor * (q * t).sin(),
                (major + minor * (q * t).cos()) * (p * t).sin(),
            );
            let jitter = random_sphere_point(rng) * rng.random_range(0.0_f32..0.04_f32);
            let shade = (q * t).sin() * 0.5 + 0.5;
            let scale = rng.random_range(0.018_f32..0.042_f32);

            Splat {
                position: base + jitter,
                scale: Vec3::new(scale, scale * rng.random_range(0.9..1.2), scale),
                color: [
                    clamp_u8(255.0 * shade),
                    clamp_u8(120.0 + 80.0 * (1.0 - shade)),
                    clamp_u8(255.0 * (1.0 - shade)),
                    clamp_u8(rng.random_range(0.68_f32..0.95_f32) * 255.0),
                ],
                rotation: random_rotation(rng),
            }
        })
        .collect()
}

fn sphere_cluster_splats(rng: &mut StdRng, count: usize) -> Vec<Splat> {
    let centers = [
        Vec3::new(1.8, 0.3, 0.4),
        Vec3::new(-1.6, -0.2, 0.8),
        Vec3::new(0.3, 1.2, -1.6),
        Vec3::new(-0.5, -1.0, -1.4),
    ];
    let palette = [
        [255, 120, 80],
        [100, 210, 255],
        [160, 255, 130],
        [255, 220, 90],
    ];

    (0..count)
        .map(|i| {
            let cluster = i % centers.len();
            let base_color: [u8; 3] = palette[cluster];
            let radius = rng.random::<f32>().cbrt() * rng.random_range(0.5_f32..1.4_f32);
            let position = centers[cluster] + random_sphere_point(rng) * radius;
            let scale = rng.random_range(0.02_f32..0.06_f32);

            Splat {
                position,
                scale: Vec3::new(scale, scale * rng.random_range(0.8..1.3), scale),
                color: [
                    clamp_u8(base_color[0] as f32 + rng.random_range(-25.0_f32..25.0_f32)),
                    clamp_u8(base_color[1] as f32 + rng.random_range(-25.0_f32..25.0_f32)),
                    clamp_u8(base_color[2] as f32 + rng.random_range(-25.0_f32..25.0_f32)),
                    clamp_u8(rng.random_range(0.60_f32..0.95_f32) * 255.0),
                ],
                rotation: random_rotation(rng),
            }
        })
        .collect()
}

/// Deterministic scene of `count` splats: two thirds torus knot, one third
/// sphere clusters.
pub fn generate_seeded_splats(count: usize, seed: u64) -> Vec<Splat> {
    let mut rng = StdRng::seed_from_u64(seed);
    let knot = count * 2 / 3;
    let mut splats = torus_knot_splats(&mut rng, knot);
    splats.extend(sphere_cluster_splats(&mut rng, count - knot));
    splats
}

/// Axis-aligned bounding box center, used as the orbit target.
pub fn scene_center(splats: &[Splat]) -> Vec3 {
    if splats.is_empty() {
        return Vec3::ZERO;
    }
    let mut min = Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY);
    let mut max = Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
    for s in splats {
        min.x = min.x.min(s.position.x);
        min.y = min.y.min(s.position.y);
        min.z = min.z.min(s.position.z);
        max.x = max.x.max(s.position.x);
        max.y = max.y.max(s.position.y);
        max.z = max.z.max(s.position.z);
    }
    (min + max) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_scene() {
        let a = generate_seeded_splats(300, 5);
        let b = generate_seeded_splats(300, 5);
        assert_eq!(a.len(), 300);
        assert_eq!(a, b);
        assert_ne!(a, generate_seeded_splats(300, 6));
    }

    #[test]
    fn scene_center_is_box_midpoint() {
        let mut splats = generate_seeded_splats(2, 0);
        splats[0].position = Vec3::new(-1.0, 0.0, 2.0);
        splats[1].position = Vec3::new(3.0, 4.0, 2.0);
        assert_eq!(scene_center(&splats), Vec3::new(1.0, 2.0, 2.0));
    }
}
