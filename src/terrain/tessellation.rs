//! Hardware-adaptive subdivision strategy.
//!
//! The control stage recomputes LOD at each patch corner from the same
//! distance function the patch manager uses, then derives one factor per
//! edge and an inner factor. Because an edge's factor depends only on the
//! world positions of its two corners, the two patches sharing that edge
//! compute identical factors without exchanging any data.

use glam::{Vec2, Vec3};

use crate::maps::MipChain;
use crate::terrain::{
    DrawBatch, DrawSet, GpuPatchInstance, LodStrategy, PatchFrame, TerrainPatchManager,
};

/// Corner indexing: (0,0), (1,0), (0,1), (1,1) in patch-local uv
const CORNER_UV: [Vec2; 4] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(1.0, 1.0),
];

/// Edge -> its two corner indices
const EDGE_CORNERS: [[usize; 2]; 4] = [
    [0, 2], // west:  (0,0)-(0,1)
    [1, 3], // east:  (1,0)-(1,1)
    [0, 1], // south: (0,0)-(1,0)
    [2, 3], // north: (0,1)-(1,1)
];

pub struct TessellationLod {
    patch_size_m: f32,
    max_tess_level: f32,
    lod_falloff_m: f32,
    max_lod: f32,
}

impl TessellationLod {
    pub fn new(manager: &TerrainPatchManager) -> Self {
        let p = manager.params();
        Self {
            patch_size_m: p.patch_size_m,
            max_tess_level: p.max_tess_level,
            lod_falloff_m: p.lod_falloff_m,
            max_lod: p.max_lod,
        }
    }

    /// Continuous LOD at a world-space point (same falloff as the manager)
    fn corner_lod(&self, corner: Vec3, camera: Vec3) -> f32 {
        (1.0 + camera.distance(corner) / self.lod_falloff_m)
            .log2()
            .clamp(0.0, self.max_lod)
    }

    /// Tessellation factor for a corner LOD: finer LOD = larger factor
    fn factor(&self, lod: f32) -> f32 {
        (self.max_tess_level - lod).exp2()
    }

    /// Per-patch control-stage output: four edge factors + inner factor.
    /// Factors are always positive (`exp2` of a clamped LOD); culled
    /// patches never reach this stage, the manager drops them upstream.
    pub fn patch_factors(&self, offset: Vec2, camera: Vec3) -> ([f32; 4], f32) {
        let size = self.patch_size_m;
        let corner_lods: Vec<f32> = CORNER_UV
            .iter()
            .map(|uv| {
                let world = Vec3::new(offset.x + uv.x * size, 0.0, offset.y + uv.y * size);
                self.corner_lod(world, camera)
            })
            .collect();

        let mut edges = [0.0f32; 4];
        for (edge, corners) in EDGE_CORNERS.iter().enumerate() {
            // Min of the two corner factors: the direction is reversed
            // relative to the patch manager's max-merge because a larger
            // factor means finer geometry; the farther corner dominates
            // and both sides of a shared edge agree on it.
            let fa = self.factor(corner_lods[corners[0]]);
            let fb = self.factor(corner_lods[corners[1]]);
            edges[edge] = fa.min(fb);
        }
        let inner = edges.iter().copied().fold(0.0, f32::max);
        (edges, inner)
    }

    /// Mip level for an evaluation-stage vertex: bilinear interpolation of
    /// the four corner LODs at the vertex's patch-local uv. Each mip tap
    /// then applies its own per-level alignment offset (see
    /// `MipChain::sample`), not one blended offset, so the height
    /// derivative stays continuous across mip boundaries.
    pub fn vertex_mip_level(corner_lods: [f32; 4], uv: Vec2) -> f32 {
        let south = corner_lods[0] * (1.0 - uv.x) + corner_lods[1] * uv.x;
        let north = corner_lods[2] * (1.0 - uv.x) + corner_lods[3] * uv.x;
        south * (1.0 - uv.y) + north * uv.y
    }

    /// Corner LODs for a patch, exposed for evaluation-stage sampling
    pub fn corner_lods(&self, offset: Vec2, camera: Vec3) -> [f32; 4] {
        let size = self.patch_size_m;
        let mut lods = [0.0f32; 4];
        for (i, uv) in CORNER_UV.iter().enumerate() {
            let world = Vec3::new(offset.x + uv.x * size, 0.0, offset.y + uv.y * size);
            lods[i] = self.corner_lod(world, camera);
        }
        lods
    }

    /// Height sample for an evaluation-stage vertex at patch-local uv
    pub fn sample_height(
        &self,
        heights: &MipChain<f32>,
        corner_lods: [f32; 4],
        patch_offset: Vec2,
        uv: Vec2,
        tile_size_m: f32,
    ) -> f32 {
        let level = Self::vertex_mip_level(corner_lods, uv);
        let world = patch_offset + uv * self.patch_size_m;
        // World position to periodic tile uv
        let tu = (world.x / tile_size_m).rem_euclid(1.0);
        let tv = (world.y / tile_size_m).rem_euclid(1.0);
        heights.sample(tu, tv, level)
    }
}

/// Fractional-even spacing: effective segment count rounds up to the
/// nearest even number, matching the heightmap's texel grid so vertices
/// land on texel-aligned parameter values.
pub fn fractional_even_segments(factor: f32) -> u32 {
    let f = factor.max(1.0).ceil() as u32;
    (f + 1) & !1
}

impl LodStrategy for TessellationLod {
    fn name(&self) -> &'static str {
        "tessellation"
    }

    fn build(&mut self, frame: &PatchFrame) -> DrawSet {
        let mut instances = Vec::with_capacity(frame.instances.len());
        for record in &frame.instances {
            let offset = Vec2::from_array(record.offset);
            let (edges, inner) = self.patch_factors(offset, frame.camera_pos);
            instances.push(GpuPatchInstance {
                offset: record.offset,
                inner,
                _pad: 0.0,
                edges,
            });
        }
        DrawSet {
            batches: vec![DrawBatch {
                mesh_level: None,
                instances,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::TerrainLodParams;
    use crate::terrain::{Frustum, EDGE_EAST, EDGE_NORTH, EDGE_SOUTH, EDGE_WEST};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn strategy() -> (TerrainPatchManager, TessellationLod) {
        let manager = TerrainPatchManager::new(TerrainLodParams::default()).unwrap();
        let tess = TessellationLod::new(&manager);
        (manager, tess)
    }

    #[test]
    fn test_shared_edges_get_identical_factors() {
        // Two horizontally adjacent patches reference the same two corner
        // positions for their shared edge, so the factors must match
        // bit-for-bit, for any camera.
        let (_, tess) = strategy();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let size = tess.patch_size_m;
        for _ in 0..100 {
            let camera = Vec3::new(
                rng.gen_range(-500.0..500.0),
                rng.gen_range(5.0..200.0),
                rng.gen_range(-500.0..500.0),
            );
            let west = Vec2::new(0.0, 0.0);
            let east = Vec2::new(size, 0.0);
            let (wf, _) = tess.patch_factors(west, camera);
            let (ef, _) = tess.patch_factors(east, camera);
            assert_eq!(wf[EDGE_EAST].to_bits(), ef[EDGE_WEST].to_bits());

            let south = Vec2::new(0.0, 0.0);
            let north = Vec2::new(0.0, size);
            let (sf, _) = tess.patch_factors(south, camera);
            let (nf, _) = tess.patch_factors(north, camera);
            assert_eq!(sf[EDGE_NORTH].to_bits(), nf[EDGE_SOUTH].to_bits());
        }
    }

    #[test]
    fn test_inner_factor_is_max_of_edges() {
        let (_, tess) = strategy();
        let (edges, inner) =
            tess.patch_factors(Vec2::new(100.0, -50.0), Vec3::new(0.0, 30.0, 0.0));
        let max_edge = edges.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(inner, max_edge);
    }

    #[test]
    fn test_nearby_patches_tessellate_finer() {
        let (_, tess) = strategy();
        let camera = Vec3::new(0.0, 20.0, 0.0);
        let (_, near) = tess.patch_factors(Vec2::new(0.0, 0.0), camera);
        let (_, far) = tess.patch_factors(Vec2::new(2000.0, 2000.0), camera);
        assert!(near > far);
    }

    #[test]
    fn test_factors_are_always_positive() {
        // The LOD clamp bounds the exponent, so even patches at extreme
        // distance keep a usable positive factor on every edge.
        let (_, tess) = strategy();
        let mut rng = ChaCha8Rng::seed_from_u64(23);
        for _ in 0..100 {
            let camera = Vec3::new(
                rng.gen_range(-1e5..1e5),
                rng.gen_range(1.0..500.0),
                rng.gen_range(-1e5..1e5),
            );
            let offset = Vec2::new(rng.gen_range(-1e5..1e5), rng.gen_range(-1e5..1e5));
            let (edges, inner) = tess.patch_factors(offset, camera);
            assert!(inner > 0.0);
            assert!(edges.iter().all(|f| *f > 0.0));
        }
    }

    #[test]
    fn test_fractional_even_rounding() {
        assert_eq!(fractional_even_segments(0.5), 2);
        assert_eq!(fractional_even_segments(1.0), 2);
        assert_eq!(fractional_even_segments(2.0), 2);
        assert_eq!(fractional_even_segments(2.1), 4);
        assert_eq!(fractional_even_segments(7.9), 8);
        assert_eq!(fractional_even_segments(8.0), 8);
    }

    #[test]
    fn test_vertex_mip_level_interpolates_corners() {
        let lods = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(
            TessellationLod::vertex_mip_level(lods, Vec2::new(0.0, 0.0)),
            0.0
        );
        assert_eq!(
            TessellationLod::vertex_mip_level(lods, Vec2::new(1.0, 1.0)),
            3.0
        );
        let center = TessellationLod::vertex_mip_level(lods, Vec2::new(0.5, 0.5));
        assert!((center - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_height_reads_mip_chain() {
        // A constant height field must sample to the same constant at any
        // uv, any corner LOD mix, and any patch placement.
        let (_, tess) = strategy();
        let base = vec![2.0f32; 64 * 64];
        let heights = crate::postprocess::bake_mips(&base, 64);
        for &(uv, offset) in &[
            (Vec2::new(0.0, 0.0), Vec2::new(0.0, 0.0)),
            (Vec2::new(0.3, 0.8), Vec2::new(128.0, -64.0)),
            (Vec2::new(1.0, 0.5), Vec2::new(-320.0, 64.0)),
        ] {
            let h = tess.sample_height(&heights, [0.0, 1.0, 2.0, 3.0], offset, uv, 200.0);
            assert!((h - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_build_emits_one_batch_from_frame() {
        let (manager, mut tess) = strategy();
        let frame = manager.update(Vec3::new(0.0, 40.0, 0.0), &Frustum::everything());
        let draw = tess.build(&frame);
        assert_eq!(draw.batches.len(), 1);
        assert!(draw.batches[0].mesh_level.is_none());
        assert_eq!(draw.instance_count(), frame.instances.len());
    }
}
