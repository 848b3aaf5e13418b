//! Derived-map baking: surface normals, Jacobian turbulence, mip chains.
//!
//! Everything here runs on the same data-parallel grid dispatch as the FFT
//! stages. Mips in particular are NOT a rasterizer downsample: each level
//! is an independent kernel over the base map, so vertex-stage consumers
//! never wait on a fragment-stage producer.

use glam::{Vec3, Vec4};

use crate::dispatch;
use crate::maps::{MapSet, MipChain, SpatialMap};
use crate::params::Precision;

/// Bakes normals, the Jacobian map, and origin-anchored mip chains
pub struct PostProcessor {
    /// World-space distance between adjacent texels (meters)
    texel_size_m: f32,
    /// Horizontal displacement scale applied before differencing
    choppiness: f32,
    precision: Precision,
}

impl PostProcessor {
    pub fn new(texel_size_m: f32, choppiness: f32, precision: Precision) -> Self {
        Self {
            texel_size_m,
            choppiness,
            precision,
        }
    }

    /// Derive normal + Jacobian maps and rebuild the mip chains in `maps`.
    ///
    /// Normals combine the spectral height gradient (exact, per-frequency)
    /// with finite-difference displacement derivatives: the horizontal
    /// displacement compresses the parameterization, so the visible slope
    /// is the height gradient over the stretched surface.
    pub fn bake(&self, maps: &mut MapSet) {
        let n = maps.height.size();
        let lambda = self.choppiness;
        let inv_2dx = 1.0 / (2.0 * self.texel_size_m);

        let jacobian = dispatch::map_grid(n, n, |x, z| {
            let (ddxx, ddxz) = central_diff(&maps.displacement_x, x, z, inv_2dx);
            let (ddzx, ddzz) = central_diff(&maps.displacement_z, x, z, inv_2dx);
            // (1 + lambda*dDx/dx)(1 + lambda*dDz/dz) - lambda^2 * dDx/dz * dDz/dx
            // ~0 at squeezed crests, ~1 on undisturbed surface
            (1.0 + lambda * ddxx) * (1.0 + lambda * ddzz) - lambda * lambda * ddxz * ddzx
        });

        let normal: Vec<Vec4> = dispatch::map_grid(n, n, |x, z| {
            let (ddxx, _) = central_diff(&maps.displacement_x, x, z, inv_2dx);
            let (_, ddzz) = central_diff(&maps.displacement_z, x, z, inv_2dx);
            let slope_x = maps.gradient_x.at(x, z) / (1.0 + lambda * ddxx);
            let slope_z = maps.gradient_z.at(x, z) / (1.0 + lambda * ddzz);
            let normal = Vec3::new(-slope_x, 1.0, -slope_z).normalize();
            normal.extend(jacobian[z * n + x])
        });

        let mut jacobian_map = SpatialMap::zeroed(n);
        jacobian_map.store(jacobian, self.precision);
        maps.jacobian = jacobian_map;
        maps.normal = normal;

        maps.height_mips = bake_mips(maps.height.data(), n);
        maps.normal_mips = bake_mips(&maps.normal, n);
    }
}

/// Central differences (d/dx, d/dz) with periodic wrapping
#[inline]
fn central_diff(map: &SpatialMap, x: usize, z: usize, inv_2dx: f32) -> (f32, f32) {
    let (x, z) = (x as isize, z as isize);
    let ddx = (map.at_wrapped(x + 1, z) - map.at_wrapped(x - 1, z)) * inv_2dx;
    let ddz = (map.at_wrapped(x, z + 1) - map.at_wrapped(x, z - 1)) * inv_2dx;
    (ddx, ddz)
}

/// Texel types the mip filter can average and blend
pub trait Filterable: Copy + Send + Sync {
    fn average4(a: Self, b: Self, c: Self, d: Self) -> Self;
    fn lerp(a: Self, b: Self, t: f32) -> Self;
}

impl Filterable for f32 {
    fn average4(a: Self, b: Self, c: Self, d: Self) -> Self {
        (a + b + c + d) * 0.25
    }

    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Filterable for Vec4 {
    fn average4(a: Self, b: Self, c: Self, d: Self) -> Self {
        (a + b + c + d) * 0.25
    }

    fn lerp(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

/// Build an origin-anchored mip chain down to a 1x1 level.
///
/// Each level samples the BASE map (not the previous level) with a 2x2
/// pattern at `texel * 2^level + {0, 2^(level-1)}` per axis. Texel (0,0)
/// of every level therefore anchors at the same grid origin, instead of
/// drifting half a texel per level the way a chained box filter does.
/// That fixed anchoring is what lets the LOD renderers mix mip levels
/// per-vertex without the sample point sliding ("vertex swimming").
pub fn bake_mips<T: Filterable>(base: &[T], n: usize) -> MipChain<T> {
    debug_assert_eq!(base.len(), n * n);
    let mut chain = MipChain::empty(n);
    chain.levels.push(base.to_vec());

    let mut level = 1;
    while (n >> level) >= 1 {
        let size = n >> level;
        let stride = 1usize << level;
        let half = stride / 2;
        let data = dispatch::map_grid(size, size, |x, z| {
            let bx = x * stride;
            let bz = z * stride;
            let wrap = |i: usize| i % n;
            T::average4(
                base[wrap(bz) * n + wrap(bx)],
                base[wrap(bz) * n + wrap(bx + half)],
                base[wrap(bz + half) * n + wrap(bx)],
                base[wrap(bz + half) * n + wrap(bx + half)],
            )
        });
        chain.levels.push(data);
        level += 1;
    }
    chain
}

impl<T: Filterable> MipChain<T> {
    /// Bilinear sample of one level at normalized uv, periodic wrapping.
    ///
    /// Each level applies its own alignment offset (level 0 texels are
    /// point samples at the grid origin; coarser texels are anchored a
    /// quarter texel in from their origin corner by the mip filter).
    pub fn sample_level(&self, u: f32, v: f32, level: usize) -> T {
        let size = self.level_size(level) as isize;
        let offset = if level == 0 { 0.0 } else { 0.25 };
        let xf = u * size as f32 - offset;
        let zf = v * size as f32 - offset;
        let x0 = xf.floor();
        let z0 = zf.floor();
        let fx = xf - x0;
        let fz = zf - z0;
        let (x0, z0) = (x0 as isize, z0 as isize);

        let tex = |x: isize, z: isize| -> T {
            let xi = x.rem_euclid(size) as usize;
            let zi = z.rem_euclid(size) as usize;
            self.levels[level][zi * size as usize + xi]
        };
        let top = T::lerp(tex(x0, z0), tex(x0 + 1, z0), fx);
        let bottom = T::lerp(tex(x0, z0 + 1), tex(x0 + 1, z0 + 1), fx);
        T::lerp(top, bottom, fz)
    }

    /// Sample at a continuous mip level: two independent per-level lookups
    /// (each with its own alignment offset) blended by the fraction. A
    /// single tri-linear fetch with one blended offset would make the
    /// sample point jump as the level crosses an integer.
    pub fn sample(&self, u: f32, v: f32, level: f32) -> T {
        let max_level = (self.level_count() - 1) as f32;
        let level = level.clamp(0.0, max_level);
        let l0 = level.floor() as usize;
        let l1 = (l0 + 1).min(self.level_count() - 1);
        let frac = level.fract();
        T::lerp(
            self.sample_level(u, v, l0),
            self.sample_level(u, v, l1),
            frac,
        )
    }
}
