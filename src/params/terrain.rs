//! Terrain patch layout, LOD falloff, and view configuration.

use glam::{Mat4, Vec3};

use crate::error::ConfigError;

/// Terrain patch grid and LOD configuration
#[derive(Debug, Clone)]
pub struct TerrainLodParams {
    /// World-space edge length of one patch (meters)
    pub patch_size_m: f32,

    /// Quads per patch edge at the finest level. Power of two so every
    /// coarser level is an exact decimation; 64 gives 6 usable LOD levels.
    pub patch_verts: u32,

    /// Patches per side of the camera-centered active window
    pub window_patches: usize,

    /// Distance at which LOD starts coarsening (meters). The continuous
    /// LOD value is log2(1 + distance / this), so doubling distance past
    /// the falloff costs roughly one level.
    pub lod_falloff_m: f32,

    /// Continuous LOD clamp (levels). Must leave at least one quad per
    /// patch: max_lod < log2(patch_verts).
    pub max_lod: f32,

    /// Hardware tessellation clamp for the adaptive strategy (levels)
    pub max_tess_level: f32,

    /// Wave height bound (meters) for patch AABBs during frustum culling
    pub max_wave_height_m: f32,
}

impl Default for TerrainLodParams {
    fn default() -> Self {
        Self {
            patch_size_m: 64.0,
            patch_verts: 64,
            window_patches: 16,
            lod_falloff_m: 96.0,
            max_lod: 5.0,
            max_tess_level: 6.0,
            max_wave_height_m: 20.0,
        }
    }
}

impl TerrainLodParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.patch_size_m > 0.0) {
            return Err(ConfigError::InvalidPatchSize(self.patch_size_m));
        }
        if self.patch_verts < 4 || !self.patch_verts.is_power_of_two() {
            return Err(ConfigError::InvalidPatchVerts(self.patch_verts));
        }
        if self.window_patches < 2 {
            return Err(ConfigError::InvalidWindow(self.window_patches));
        }
        let levels = self.patch_verts.trailing_zeros();
        if !(self.max_lod >= 0.0) || self.max_lod >= levels as f32 {
            return Err(ConfigError::LodOutOfRange {
                max_lod: self.max_lod,
                levels,
                patch_verts: self.patch_verts,
            });
        }
        if !(self.max_tess_level > 0.0) {
            return Err(ConfigError::InvalidTessLevel(self.max_tess_level));
        }
        Ok(())
    }

    /// Number of discrete geomorph mesh levels (floor(max_lod) + 1)
    pub fn mesh_levels(&self) -> u32 {
        self.max_lod as u32 + 1
    }
}

/// Which LOD geometry strategy to run, picked at init from target
/// hardware capability (tessellation shaders available or not).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LodStrategyKind {
    #[default]
    Tessellation,
    Geomorph,
}

/// Perspective view used to build the culling frustum.
///
/// The camera itself is owned by an external subsystem; this is just
/// enough projection state to cull patches against.
#[derive(Debug, Clone)]
pub struct ViewParams {
    /// Field of view (degrees)
    pub fov_degrees: f32,

    /// Width / height
    pub aspect_ratio: f32,

    /// Near clipping plane (meters)
    pub near_plane_m: f32,

    /// Far clipping plane (meters)
    pub far_plane_m: f32,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            aspect_ratio: 16.0 / 9.0,
            near_plane_m: 0.5,
            far_plane_m: 2000.0,
        }
    }
}

impl ViewParams {
    /// View-projection matrix for an eye looking at a target, Y up
    pub fn view_proj(&self, eye: Vec3, target: Vec3) -> Mat4 {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let proj = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect_ratio,
            self.near_plane_m,
            self.far_plane_m,
        );
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_terrain_params_validate() {
        assert!(TerrainLodParams::default().validate().is_ok());
    }

    #[test]
    fn test_max_lod_must_fit_patch() {
        let params = TerrainLodParams {
            patch_verts: 16,
            max_lod: 4.0, // log2(16) = 4, needs to be strictly below
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::LodOutOfRange { .. })
        ));
    }

    #[test]
    fn test_view_proj_is_finite() {
        let view = ViewParams::default();
        let m = view.view_proj(Vec3::new(0.0, 30.0, 0.0), Vec3::new(0.0, 0.0, 100.0));
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
        assert_ne!(m, Mat4::IDENTITY);
    }
}
