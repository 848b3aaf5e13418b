//! Pre-tessellated mesh strategy with vertex morphing.
//!
//! One fixed mesh per discrete LOD level, drawn instanced; continuous LOD
//! comes from warping each vertex between the lattice of the level below
//! and above its fractional LOD value. All meshes share one local
//! coordinate space (0..=patch_verts), so a level-l mesh is just the base
//! grid with stride 2^l.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

use crate::maps::MipChain;
use crate::terrain::{
    DrawBatch, DrawSet, GpuPatchInstance, LodStrategy, PatchFrame, PatchInstanceRecord,
    TerrainPatchManager, EDGE_EAST, EDGE_NORTH, EDGE_SOUTH, EDGE_WEST,
};

/// Vertex of a prebuilt level mesh.
///
/// `local` is the integer lattice position in base-grid units. The edge
/// selector is one-hot for boundary vertices (all-zero for interior ones);
/// dotted against the instance's four edge LODs it picks the LOD that
/// governs this vertex, which for boundary vertices is the merged edge
/// value both neighbors agree on.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GeomorphVertex {
    pub local: [f32; 2],
    pub edge_select: [f32; 4],
}

/// Prebuilt mesh for one discrete LOD level
pub struct LevelMesh {
    pub level: u32,
    pub vertices: Vec<GeomorphVertex>,
    pub indices: Vec<u32>,
}

impl LevelMesh {
    /// Build the decimated grid for `level`: stride-2^level vertices over
    /// the shared 0..=patch_verts coordinate space.
    fn build(level: u32, patch_verts: u32) -> Self {
        let stride = 1u32 << level;
        let side = patch_verts / stride; // quads per side
        let verts_per_side = side + 1;

        let mut vertices = Vec::with_capacity((verts_per_side * verts_per_side) as usize);
        for z in 0..verts_per_side {
            for x in 0..verts_per_side {
                let lx = x * stride;
                let lz = z * stride;
                vertices.push(GeomorphVertex {
                    local: [lx as f32, lz as f32],
                    edge_select: edge_selector(lx, lz, patch_verts),
                });
            }
        }

        let mut indices = Vec::with_capacity((side * side * 6) as usize);
        for z in 0..side {
            for x in 0..side {
                let top_left = z * verts_per_side + x;
                let top_right = top_left + 1;
                let bottom_left = top_left + verts_per_side;
                let bottom_right = bottom_left + 1;
                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        Self {
            level,
            vertices,
            indices,
        }
    }
}

/// One-hot boundary classification; corners resolve to the x-axis edge
/// (their position never morphs, see `snap_toward_center`, so the
/// selector only affects which LOD value they read)
fn edge_selector(x: u32, z: u32, patch_verts: u32) -> [f32; 4] {
    let mut s = [0.0f32; 4];
    if x == 0 {
        s[EDGE_WEST] = 1.0;
    } else if x == patch_verts {
        s[EDGE_EAST] = 1.0;
    } else if z == 0 {
        s[EDGE_SOUTH] = 1.0;
    } else if z == patch_verts {
        s[EDGE_NORTH] = 1.0;
    }
    s
}

/// LOD value governing a vertex: boundary vertices take their edge's
/// merged LOD, interior vertices the instance's inner LOD
pub fn vertex_lod(vertex: &GeomorphVertex, instance: &GpuPatchInstance) -> f32 {
    let s = vertex.edge_select;
    let weight: f32 = s.iter().sum();
    if weight == 0.0 {
        instance.inner
    } else {
        s[0] * instance.edges[0]
            + s[1] * instance.edges[1]
            + s[2] * instance.edges[2]
            + s[3] * instance.edges[3]
    }
}

/// Snap a local lattice coordinate onto the level's grid, always rounding
/// toward the patch center. Coordinates already on the level lattice
/// (corners in particular, which sit on every lattice) never move, and
/// the rounding direction depends only on which half of the patch the
/// vertex is in, so both patches sharing an edge move the shared vertex
/// the same way.
pub fn snap_toward_center(coord: u32, level: u32, patch_verts: u32) -> u32 {
    let mask = (1u32 << level) - 1;
    if coord * 2 < patch_verts {
        (coord + mask) & !mask // lower half rounds up
    } else {
        coord & !mask // upper half rounds down
    }
}

/// Morphed local position for a vertex at fractional LOD `lod`: snap to
/// the floor and ceiling level lattices independently, then blend by the
/// fraction. At lod fractions of exactly 0 or 1 this reproduces the pure
/// floor/ceiling snapped position with no residual offset.
pub fn morph_local(local: [f32; 2], lod: f32, patch_verts: u32) -> Vec2 {
    let l0 = lod.floor().max(0.0) as u32;
    let l1 = l0 + 1;
    let frac = lod - lod.floor();

    let snap = |level: u32| -> Vec2 {
        Vec2::new(
            snap_toward_center(local[0] as u32, level, patch_verts) as f32,
            snap_toward_center(local[1] as u32, level, patch_verts) as f32,
        )
    };
    snap(l0).lerp(snap(l1), frac)
}

pub struct GeomorphLod {
    patch_verts: u32,
    meshes: Vec<LevelMesh>,
}

impl GeomorphLod {
    pub fn new(manager: &TerrainPatchManager) -> Self {
        let p = manager.params();
        let meshes = (0..p.mesh_levels())
            .map(|level| LevelMesh::build(level, p.patch_verts))
            .collect();
        Self {
            patch_verts: p.patch_verts,
            meshes,
        }
    }

    pub fn meshes(&self) -> &[LevelMesh] {
        &self.meshes
    }

    pub fn patch_verts(&self) -> u32 {
        self.patch_verts
    }

    /// World-space XZ position of a mesh vertex under an instance,
    /// applying the morph. `patch_size_m` converts lattice units.
    pub fn world_position(
        &self,
        vertex: &GeomorphVertex,
        instance: &GpuPatchInstance,
        patch_size_m: f32,
    ) -> Vec2 {
        let lod = vertex_lod(vertex, instance);
        let morphed = morph_local(vertex.local, lod, self.patch_verts);
        Vec2::from_array(instance.offset) + morphed * (patch_size_m / self.patch_verts as f32)
    }

    /// Heightmap sample for a morphed vertex. The mip level comes from the
    /// frame's per-patch LOD texture, one value for the whole patch: a
    /// vertex on a patch corner belongs to up to four patches, and a
    /// per-vertex (edge-interpolated) level would give each of them a
    /// different height there.
    pub fn sample_height(
        &self,
        heights: &MipChain<f32>,
        frame: &PatchFrame,
        vertex: &GeomorphVertex,
        instance: &GpuPatchInstance,
        tile_size_m: f32,
    ) -> f32 {
        let level = frame.texture_lod(Vec2::from_array(instance.offset));
        let world = self.world_position(vertex, instance, frame.patch_size_m);
        let (tu, tv) = tile_uv(world, tile_size_m);
        heights.sample(tu, tv, level)
    }

    /// Normal + Jacobian sample for a morphed vertex, same patch-level
    /// mip selection as the height channel
    pub fn sample_normal(
        &self,
        normals: &MipChain<Vec4>,
        frame: &PatchFrame,
        vertex: &GeomorphVertex,
        instance: &GpuPatchInstance,
        tile_size_m: f32,
    ) -> Vec4 {
        let level = frame.texture_lod(Vec2::from_array(instance.offset));
        let world = self.world_position(vertex, instance, frame.patch_size_m);
        let (tu, tv) = tile_uv(world, tile_size_m);
        normals.sample(tu, tv, level)
    }
}

/// World XZ to periodic ocean-tile uv
fn tile_uv(world: Vec2, tile_size_m: f32) -> (f32, f32) {
    (
        (world.x / tile_size_m).rem_euclid(1.0),
        (world.y / tile_size_m).rem_euclid(1.0),
    )
}

impl LodStrategy for GeomorphLod {
    fn name(&self) -> &'static str {
        "geomorph"
    }

    /// Group visible patches into per-level batches keyed by the floor of
    /// their center LOD. Edge LODs ride along unchanged; a neighbor in a
    /// coarser batch contributed its (larger) LOD during the max-merge,
    /// which is exactly what keeps the shared edge crack-free.
    fn build(&mut self, frame: &PatchFrame) -> DrawSet {
        let max_level = (self.meshes.len() - 1) as u32;
        let mut batches: Vec<DrawBatch> = (0..=max_level)
            .map(|level| DrawBatch {
                mesh_level: Some(level),
                instances: Vec::new(),
            })
            .collect();

        for record in &frame.instances {
            let level = (record.inner_lod as u32).min(max_level);
            batches[level as usize].instances.push(to_instance(record));
        }
        batches.retain(|b| !b.instances.is_empty());
        DrawSet { batches }
    }
}

fn to_instance(record: &PatchInstanceRecord) -> GpuPatchInstance {
    GpuPatchInstance {
        offset: record.offset,
        inner: record.inner_lod,
        _pad: 0.0,
        edges: record.edge_lods,
    }
}
