//! Spatial-domain output maps and frame double buffering.

use glam::Vec4;
use half::f16;

use crate::params::Precision;

/// A real-valued square map with an optional f16 storage round trip.
///
/// `Half` models the half-float textures these maps would occupy on GPU:
/// every store quantizes through f16, so the reduced dynamic range shows
/// up in CPU results exactly as it would on hardware.
#[derive(Debug, Clone)]
pub struct SpatialMap {
    size: usize,
    data: Vec<f32>,
}

impl SpatialMap {
    pub fn zeroed(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size],
        }
    }

    /// Adopt transform output as map contents, quantizing if requested
    pub fn store(&mut self, values: Vec<f32>, precision: Precision) {
        debug_assert_eq!(values.len(), self.size * self.size);
        self.data = values;
        if precision == Precision::Half {
            for v in &mut self.data {
                *v = f16::from_f32(*v).to_f32();
            }
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn at(&self, x: usize, z: usize) -> f32 {
        self.data[z * self.size + x]
    }

    /// Toroidal lookup; the FFT tile is periodic, so gradients at the map
    /// border wrap instead of clamping.
    #[inline]
    pub fn at_wrapped(&self, x: isize, z: isize) -> f32 {
        let n = self.size as isize;
        let xi = x.rem_euclid(n) as usize;
        let zi = z.rem_euclid(n) as usize;
        self.data[zi * self.size + xi]
    }
}

/// One frame's worth of spatial outputs plus derived maps.
///
/// `height`, `displacement_*` and `gradient_*` come straight out of the
/// FFT stage; `normal`/`jacobian` and the mip chains are baked by the
/// post-processor. Renderers read these as read-only textures.
pub struct MapSet {
    pub height: SpatialMap,
    pub displacement_x: SpatialMap,
    pub displacement_z: SpatialMap,
    pub gradient_x: SpatialMap,
    pub gradient_z: SpatialMap,
    pub jacobian: SpatialMap,
    /// Packed surface normals (xyz) + Jacobian in w, full resolution
    pub normal: Vec<Vec4>,
    pub height_mips: MipChain<f32>,
    pub normal_mips: MipChain<Vec4>,
}

impl MapSet {
    pub fn zeroed(size: usize) -> Self {
        Self {
            height: SpatialMap::zeroed(size),
            displacement_x: SpatialMap::zeroed(size),
            displacement_z: SpatialMap::zeroed(size),
            gradient_x: SpatialMap::zeroed(size),
            gradient_z: SpatialMap::zeroed(size),
            jacobian: SpatialMap::zeroed(size),
            normal: vec![Vec4::ZERO; size * size],
            height_mips: MipChain::empty(size),
            normal_mips: MipChain::empty(size),
        }
    }
}

/// Mip pyramid where every level keeps texel (0,0) anchored at the same
/// normalized origin (see `postprocess::bake_mips` for the filter).
#[derive(Debug, Clone)]
pub struct MipChain<T> {
    base_size: usize,
    /// levels[0] is the base map; levels[l] has side base_size >> l
    pub levels: Vec<Vec<T>>,
}

impl<T: Copy> MipChain<T> {
    pub fn empty(base_size: usize) -> Self {
        Self {
            base_size,
            levels: Vec::new(),
        }
    }

    pub fn base_size(&self) -> usize {
        self.base_size
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level_size(&self, level: usize) -> usize {
        self.base_size >> level
    }

    #[inline]
    pub fn at(&self, level: usize, x: usize, z: usize) -> T {
        let size = self.level_size(level);
        self.levels[level][z * size + x]
    }
}

/// Two fixed buffers with a flipping index: the renderer reads the front
/// while the pipeline writes the back, no locks involved.
pub struct DoubleBuffered<T> {
    buffers: [T; 2],
    front: usize,
}

impl<T> DoubleBuffered<T> {
    pub fn new(a: T, b: T) -> Self {
        Self {
            buffers: [a, b],
            front: 0,
        }
    }

    pub fn front(&self) -> &T {
        &self.buffers[self.front]
    }

    pub fn back_mut(&mut self) -> &mut T {
        &mut self.buffers[self.front ^ 1]
    }

    /// Publish the back buffer; call after a frame's writes complete
    pub fn flip(&mut self) {
        self.front ^= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_precision_quantizes() {
        let mut map = SpatialMap::zeroed(16);
        let mut values = vec![0.0f32; 256];
        values[0] = 1.0 + 1e-5; // below f16 resolution at 1.0
        values[1] = 0.5;
        map.store(values, Precision::Half);
        assert_eq!(map.at(0, 0), 1.0);
        assert_eq!(map.at(1, 0), 0.5);
    }

    #[test]
    fn test_full_precision_passes_through() {
        let mut map = SpatialMap::zeroed(16);
        let mut values = vec![0.0f32; 256];
        values[0] = 1.0 + 1e-5;
        map.store(values, Precision::Full);
        assert_eq!(map.at(0, 0), 1.0 + 1e-5);
    }

    #[test]
    fn test_wrapped_lookup() {
        let mut map = SpatialMap::zeroed(4);
        let mut values = vec![0.0f32; 16];
        values[3] = 7.0; // (3, 0)
        map.store(values, Precision::Full);
        assert_eq!(map.at_wrapped(-1, 0), 7.0);
        assert_eq!(map.at_wrapped(3, 4), 7.0);
    }

    #[test]
    fn test_double_buffer_flip() {
        let mut db = DoubleBuffered::new(1, 2);
        assert_eq!(*db.front(), 1);
        *db.back_mut() = 99;
        assert_eq!(*db.front(), 1); // unpublished write invisible
        db.flip();
        assert_eq!(*db.front(), 99);
    }
}
