//! Back-to-front depth ordering by 1-pass counting sort.

use rayon::prelude::*;

use crate::math::{Mat4, Vec3};
use crate::splat::Splat;

/// View-space depth of `position` under column-major `view_proj`. Larger is
/// farther.
#[inline]
pub fn depth_key(view_proj: &Mat4, position: Vec3) -> f32 {
    view_proj[2] * position.x + view_proj[6] * position.y + view_proj[10] * position.z + view_proj[14]
}

/// Normalized direction the depth key grows along.
pub fn depth_axis(view_proj: &Mat4) -> Vec3 {
    Vec3::new(view_proj[2], view_proj[6], view_proj[10]).normalize()
}

/// Reusable scratch for repeated sorts over a growing store.
#[derive(Debug)]
pub struct DepthSorter {
    buckets: usize,
    keys: Vec<f32>,
    bucket_of: Vec<u32>,
    counts: Vec<u32>,
}

impl DepthSorter {
    /// `buckets` is the counting-sort resolution; the engine only passes a
    /// validated power of two.
    pub fn new(buckets: u32) -> Self {
        let buckets = buckets.max(1) as usize;
        Self {
            buckets,
            keys: Vec::new(),
            bucket_of: Vec::new(),
            counts: vec![0; buckets],
        }
    }

    /// Returns a back-to-front permutation of `0..splats.len()`.
    ///
    /// Splats whose keys land in the same bucket keep index order, so the
    /// ordering error is bounded by one bucket width,
    /// `(max_key - min_key) / (buckets - 1)`.
    pub fn sort(&mut self, splats: &[Splat], view_proj: &Mat4) -> Vec<u32> {
        let count = splats.len();
        if count == 0 {
            return Vec::new();
        }

        splats
            .par_iter()
            .map(|s| depth_key(view_proj, s.position))
            .collect_into_vec(&mut self.keys);

        let (min_key, max_key) = self
            .keys
            .iter()
            .filter(|k| k.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &k| {
                (lo.min(k), hi.max(k))
            });
        // f64: the f32 range overflows for keys near +-f32::MAX.
        let range = f64::from(max_key) - f64::from(min_key);
        let scale = if range > 0.0 && range.is_finite() {
            (self.buckets - 1) as f64 / range
        } else {
            0.0
        };

        // Pass 1: quantize and tally. NaN lands in bucket 0 and infinities
        // saturate to the end buckets; every index is still counted once.
        self.counts.fill(0);
        self.bucket_of.clear();
        self.bucket_of.reserve(count);
        let last = (self.buckets - 1) as u32;
        for &key in &self.keys {
            let bucket = if key.is_nan() || key <= min_key {
                0
            } else if key >= max_key {
                last
            } else {
                (((f64::from(key) - f64::from(min_key)) * scale) as u32).min(last)
            };
            self.bucket_of.push(bucket);
            self.counts[bucket as usize] += 1;
        }

        // Prefix sum from the farthest bucket down turns tallies into starts.
        let mut offset = 0u32;
        for slot in self.counts.iter_mut().rev() {
            let tally = *slot;
            *slot = offset;
            offset += tally;
        }

        // Pass 2: stable scatter.
        let mut order = vec![0u32; count];
        for (index, &bucket) in self.bucket_of.iter().enumerate() {
            let start = &mut self.counts[bucket as usize];
            order[*start as usize] = index as u32;
            *start += 1;
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{look_at_target, Camera};
    use crate::demo::generate_seeded_splats;
    use crate::math::MAT4_IDENTITY;

    fn splat_at(position: Vec3) -> Splat {
        Splat {
            position,
            scale: Vec3::new(0.1, 0.1, 0.1),
            color: [255; 4],
            rotation: [255, 128, 128, 128],
        }
    }

    fn assert_permutation(order: &[u32], count: usize) {
        assert_eq!(order.len(), count);
        let mut seen = vec![false; count];
        for &i in order {
            assert!(!seen[i as usize], "index {i} emitted twice");
            seen[i as usize] = true;
        }
    }

    #[test]
    fn identity_view_orders_larger_z_first() {
        let splats = [
            splat_at(Vec3::new(0.0, 0.0, 0.0)),
            splat_at(Vec3::new(0.0, 0.0, -5.0)),
            splat_at(Vec3::new(0.0, 0.0, 5.0)),
        ];
        let mut sorter = DepthSorter::new(65_536);
        assert_eq!(sorter.sort(&splats, &MAT4_IDENTITY), vec![2, 0, 1]);
    }

    #[test]
    fn camera_view_projection_draws_far_splats_first() {
        let splats = [
            splat_at(Vec3::new(0.0, 0.0, 5.0)),
            splat_at(Vec3::new(0.0, 0.0, -5.0)),
            splat_at(Vec3::new(0.0, 0.0, 0.0)),
        ];
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 10.0), 0.0, 0.0);
        look_at_target(&mut camera, Vec3::ZERO);
        let view_proj = camera.view_projection(16.0 / 9.0);

        let mut sorter = DepthSorter::new(1024);
        assert_eq!(sorter.sort(&splats, &view_proj), vec![1, 2, 0]);
    }

    #[test]
    fn random_scene_is_ordered_up_to_one_bucket() {
        let splats = generate_seeded_splats(20_000, 1234);
        let mut camera = Camera::new(Vec3::new(3.0, 1.0, 6.0), 0.0, 0.0);
        look_at_target(&mut camera, Vec3::ZERO);
        let view_proj = camera.view_projection(1.0);

        let mut sorter = DepthSorter::new(4096);
        let order = sorter.sort(&splats, &view_proj);
        assert_permutation(&order, splats.len());

        let keys: Vec<f32> = order
            .iter()
            .map(|&i| depth_key(&view_proj, splats[i as usize].position))
            .collect();
        let (lo, hi) = keys
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(a, b), &k| (a.min(k), b.max(k)));
        let bucket_width = (hi - lo) / 4095.0;
        let mut nearest_so_far = f32::INFINITY;
        for &k in &keys {
            // Nothing emitted later may be farther than an earlier key by
            // more than one bucket width.
            assert!(k <= nearest_so_far + bucket_width * 1.001);
            nearest_so_far = nearest_so_far.min(k);
        }
    }

    #[test]
    fn equal_depths_keep_index_order() {
        let splats: Vec<Splat> = (0..10)
            .map(|i| splat_at(Vec3::new(i as f32, 0.0, 1.0)))
            .collect();
        let mut sorter = DepthSorter::new(256);
        let order = sorter.sort(&splats, &MAT4_IDENTITY);
        assert_eq!(order, (0..10).collect::<Vec<u32>>());
    }

    #[test]
    fn non_finite_positions_still_yield_a_permutation() {
        let splats = [
            splat_at(Vec3::new(0.0, 0.0, f32::NAN)),
            splat_at(Vec3::new(0.0, 0.0, 1.0)),
            splat_at(Vec3::new(0.0, 0.0, f32::INFINITY)),
            splat_at(Vec3::new(0.0, 0.0, -2.0)),
            splat_at(Vec3::new(0.0, 0.0, f32::NEG_INFINITY)),
        ];
        let mut sorter = DepthSorter::new(16);
        let order = sorter.sort(&splats, &MAT4_IDENTITY);
        assert_permutation(&order, splats.len());
        // +inf shares the farthest bucket with z = 1, -inf the nearest with NaN.
        assert_eq!(order[..2], [1, 2]);
        assert_eq!(*order.last().expect("non-empty"), 4);
    }

    #[test]
    fn keys_near_the_f32_limits_keep_their_order() {
        let splats = [
            splat_at(Vec3::new(0.0, 0.0, -3.0e38)),
            splat_at(Vec3::new(0.0, 0.0, 0.0)),
            splat_at(Vec3::new(0.0, 0.0, 3.0e38)),
            splat_at(Vec3::new(0.0, 0.0, 1.0e38)),
        ];
        let mut sorter = DepthSorter::new(65_536);
        assert_eq!(sorter.sort(&splats, &MAT4_IDENTITY), vec![2, 3, 1, 0]);
    }

    #[test]
    fn empty_store_sorts_to_empty_order() {
        let mut sorter = DepthSorter::new(16);
        assert!(sorter.sort(&[], &MAT4_IDENTITY).is_empty());
    }

    #[test]
    fn scratch_is_reused_across_growing_stores() {
        let splats = generate_seeded_splats(1_000, 77);
        let mut sorter = DepthSorter::new(512);
        for end in [10, 500, 1_000, 3] {
            let order = sorter.sort(&splats[..end], &MAT4_IDENTITY);
            assert_permutation(&order, end);
        }
    }
}
