//! Camera-relative terrain patch bookkeeping shared by both LOD renderers.
//!
//! Patches live on a fixed world-aligned grid. The active window recenters
//! on the camera in whole-patch steps only, so the mapping from vertex to
//! heightmap texel never slides ("vertex swimming"). Per-patch continuous
//! LOD comes from a logarithmic distance falloff; per-edge LOD is the max
//! of the two adjacent patches, which is what makes shared edges agree
//! exactly on both sides and keeps the seams crack-free.

pub mod geomorph;
pub mod tessellation;

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::params::TerrainLodParams;

/// Edge indexing used by instance records: -x, +x, -z, +z
pub const EDGE_WEST: usize = 0;
pub const EDGE_EAST: usize = 1;
pub const EDGE_SOUTH: usize = 2;
pub const EDGE_NORTH: usize = 3;

/// One cell of the world-aligned patch grid
#[derive(Debug, Clone, Copy)]
pub struct Patch {
    /// Integer grid coordinates (world-absolute, not window-relative)
    pub coord: IVec2,
    /// World-space offset of the patch min corner (meters)
    pub offset: Vec2,
    /// Survived frustum culling this frame
    pub visible: bool,
    /// Continuous LOD at the patch center, 0 = finest
    pub lod: f32,
}

/// Per-drawable-instance payload handed to the LOD renderers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PatchInstanceRecord {
    /// World-space min corner (meters)
    pub offset: [f32; 2],
    /// Continuous LOD at the patch center
    pub inner_lod: f32,
    pub _pad: f32,
    /// Edge LODs in `EDGE_*` order; each is max(center, that neighbor)
    pub edge_lods: [f32; 4],
}

/// Everything one frame of patch bookkeeping produces
pub struct PatchFrame {
    /// Full window grid, row-major (window_patches per side), culled
    /// patches included with `visible = false`
    pub patches: Vec<Patch>,
    pub window_patches: usize,
    /// World-space origin of the window (snapped to whole patches)
    pub origin: Vec2,
    /// World-space edge length of one patch (meters)
    pub patch_size_m: f32,
    /// Records for visible patches only, in window order
    pub instances: Vec<PatchInstanceRecord>,
    /// One texel per window cell holding center LOD; the geomorph shader
    /// samples this to pick heightmap mips at patch granularity
    pub lod_texture: Vec<f32>,
    pub camera_pos: Vec3,
}

impl PatchFrame {
    /// Center LOD stored in the window's LOD texture for the patch whose
    /// min corner sits at `offset`. One value per patch: the geomorph
    /// height sampler reads mips at patch granularity, never interpolated
    /// from edges, so corner vertices see one consistent level.
    pub fn texture_lod(&self, offset: Vec2) -> f32 {
        let cell = (offset - self.origin) / self.patch_size_m;
        let window = self.window_patches as i32;
        let gx = (cell.x.round() as i32).clamp(0, window - 1) as usize;
        let gz = (cell.y.round() as i32).clamp(0, window - 1) as usize;
        self.lod_texture[gz * self.window_patches + gx]
    }
}

/// Shared LOD bookkeeping for the terrain renderers
pub struct TerrainPatchManager {
    params: TerrainLodParams,
}

impl TerrainPatchManager {
    pub fn new(params: TerrainLodParams) -> Result<Self, crate::error::ConfigError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &TerrainLodParams {
        &self.params
    }

    /// Continuous LOD for a point at `distance` meters from the camera
    pub fn continuous_lod(&self, distance: f32) -> f32 {
        (1.0 + distance / self.params.lod_falloff_m)
            .log2()
            .clamp(0.0, self.params.max_lod)
    }

    /// Recenter the window, compute per-patch LOD, cull, and emit the
    /// edge-continuity-safe instance records.
    pub fn update(&self, camera_pos: Vec3, frustum: &Frustum) -> PatchFrame {
        let p = &self.params;
        let window = p.window_patches;
        let size = p.patch_size_m;

        // Snap the window origin to whole patches. Snapping (rather than
        // following the camera continuously) keeps every patch, and so
        // every vertex, on the same world lattice from frame to frame.
        let half_extent = (window as f32) * 0.5 * size;
        let base = IVec2::new(
            ((camera_pos.x - half_extent) / size).floor() as i32,
            ((camera_pos.z - half_extent) / size).floor() as i32,
        );
        let origin = Vec2::new(base.x as f32, base.y as f32) * size;

        let mut patches = Vec::with_capacity(window * window);
        let mut lod_texture = Vec::with_capacity(window * window);
        for gz in 0..window {
            for gx in 0..window {
                let coord = base + IVec2::new(gx as i32, gz as i32);
                let offset = Vec2::new(coord.x as f32, coord.y as f32) * size;
                let center =
                    Vec3::new(offset.x + size * 0.5, 0.0, offset.y + size * 0.5);
                let lod = self.continuous_lod(camera_pos.distance(center));
                let visible = frustum.intersects_aabb(
                    Vec3::new(offset.x, -p.max_wave_height_m, offset.y),
                    Vec3::new(offset.x + size, p.max_wave_height_m, offset.y + size),
                );
                patches.push(Patch {
                    coord,
                    offset,
                    visible,
                    lod,
                });
                lod_texture.push(lod);
            }
        }

        let mut instances = Vec::new();
        for gz in 0..window {
            for gx in 0..window {
                let patch = patches[gz * window + gx];
                if !patch.visible {
                    continue;
                }
                // Neighbor lookup, clamped at the window boundary so rim
                // patches merge against themselves
                let neighbor_lod = |dx: i32, dz: i32| -> f32 {
                    let nx = (gx as i32 + dx).clamp(0, window as i32 - 1) as usize;
                    let nz = (gz as i32 + dz).clamp(0, window as i32 - 1) as usize;
                    patches[nz * window + nx].lod
                };
                let mut edge_lods = [0.0f32; 4];
                edge_lods[EDGE_WEST] = patch.lod.max(neighbor_lod(-1, 0));
                edge_lods[EDGE_EAST] = patch.lod.max(neighbor_lod(1, 0));
                edge_lods[EDGE_SOUTH] = patch.lod.max(neighbor_lod(0, -1));
                edge_lods[EDGE_NORTH] = patch.lod.max(neighbor_lod(0, 1));

                instances.push(PatchInstanceRecord {
                    offset: patch.offset.to_array(),
                    inner_lod: patch.lod,
                    _pad: 0.0,
                    edge_lods,
                });
            }
        }

        let frame = PatchFrame {
            patches,
            window_patches: window,
            origin,
            patch_size_m: size,
            instances,
            lod_texture,
            camera_pos,
        };
        debug_assert!(
            edge_lods_agree(&frame),
            "adjacent patches disagree on a shared edge LOD"
        );
        frame
    }
}

/// Contract check: the emitted instance records of every pair of adjacent
/// visible patches carry bit-identical LODs for their shared edge. A
/// violation here is a programming error, not a runtime condition.
fn edge_lods_agree(frame: &PatchFrame) -> bool {
    let window = frame.window_patches;
    // Map window cells back to their instance, if visible
    let mut instance_of = vec![None; window * window];
    let mut next = 0;
    for (cell, patch) in frame.patches.iter().enumerate() {
        if patch.visible {
            instance_of[cell] = Some(next);
            next += 1;
        }
    }
    let record = |gx: usize, gz: usize| -> Option<&PatchInstanceRecord> {
        instance_of[gz * window + gx].map(|i| &frame.instances[i])
    };
    for gz in 0..window {
        for gx in 0..window - 1 {
            if let (Some(a), Some(b)) = (record(gx, gz), record(gx + 1, gz)) {
                if a.edge_lods[EDGE_EAST].to_bits() != b.edge_lods[EDGE_WEST].to_bits() {
                    return false;
                }
            }
        }
    }
    for gz in 0..window - 1 {
        for gx in 0..window {
            if let (Some(a), Some(b)) = (record(gx, gz), record(gx, gz + 1)) {
                if a.edge_lods[EDGE_NORTH].to_bits() != b.edge_lods[EDGE_SOUTH].to_bits() {
                    return false;
                }
            }
        }
    }
    true
}

/// Six view-frustum planes extracted from a view-projection matrix
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    /// Gribb-Hartmann extraction; works for any perspective or
    /// orthographic view-projection with a 0..1 depth range.
    pub fn from_view_proj(m: &Mat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        let planes = [
            r3 + r0, // left
            r3 - r0, // right
            r3 + r1, // bottom
            r3 - r1, // top
            r2,      // near (z >= 0)
            r3 - r2, // far
        ]
        .map(|p| {
            let len = p.xyz().length();
            if len > 1e-6 {
                p / len
            } else {
                p
            }
        });
        Self { planes }
    }

    /// A frustum that accepts everything (headless/offline runs)
    pub fn everything() -> Self {
        Self {
            planes: [Vec4::new(0.0, 0.0, 0.0, 1.0); 6],
        }
    }

    /// Positive-vertex AABB test: conservative, never culls a visible box
    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        for plane in &self.planes {
            let positive = Vec3::new(
                if plane.x >= 0.0 { max.x } else { min.x },
                if plane.y >= 0.0 { max.y } else { min.y },
                if plane.z >= 0.0 { max.z } else { min.z },
            );
            if plane.xyz().dot(positive) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

/// A strategy that turns one frame's patch set into drawable instances.
/// Picked once at init from hardware capability; both implementations
/// consume the same `PatchFrame` contract.
pub trait LodStrategy {
    fn name(&self) -> &'static str;
    fn build(&mut self, frame: &PatchFrame) -> DrawSet;
}

/// Drawable output: instance batches, each tied to a mesh resolution.
/// Tessellation emits a single batch (the hardware subdivides); geomorph
/// emits one batch per discrete LOD level.
pub struct DrawSet {
    pub batches: Vec<DrawBatch>,
}

pub struct DrawBatch {
    /// Discrete mesh level for geomorph batches; `None` for tessellation
    pub mesh_level: Option<u32>,
    pub instances: Vec<GpuPatchInstance>,
}

impl DrawSet {
    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(|b| b.instances.len()).sum()
    }
}

/// GPU-shaped instance payload shared by both strategies. For geomorph the
/// `edges`/`inner` fields hold LOD values; for tessellation they hold the
/// subdivision factors derived from them.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuPatchInstance {
    pub offset: [f32; 2],
    pub inner: f32,
    pub _pad: f32,
    pub edges: [f32; 4],
}
