//! Data-parallel 2D kernel dispatch.
//!
//! Every grid-wide stage of the pipeline (spectrum fill, modulation, FFT
//! passes, mip baking) is a pure function over a 2D index plus shared
//! read-only inputs. These helpers dispatch such kernels over the full grid
//! with rayon; there is no shared mutable state, so completion of the
//! parallel iterator is the only barrier a stage needs.

use rayon::prelude::*;

/// Evaluate `kernel(x, z)` for every cell of a `width` x `height` grid and
/// collect the results row-major (index = z * width + x).
pub fn map_grid<T, F>(width: usize, height: usize, kernel: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize, usize) -> T + Sync,
{
    (0..width * height)
        .into_par_iter()
        .map(|i| kernel(i % width, i / width))
        .collect()
}

/// Overwrite `out` in place by evaluating `kernel(x, z)` per cell.
///
/// `out.len()` must be a multiple of `width`; the row count is implied.
pub fn fill_grid<T, F>(out: &mut [T], width: usize, kernel: F)
where
    T: Send,
    F: Fn(usize, usize) -> T + Sync,
{
    debug_assert_eq!(out.len() % width, 0);
    out.par_chunks_mut(width).enumerate().for_each(|(z, row)| {
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = kernel(x, z);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_grid_row_major_order() {
        let grid = map_grid(4, 3, |x, z| (x, z));
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[0], (0, 0));
        assert_eq!(grid[5], (1, 1));
        assert_eq!(grid[11], (3, 2));
    }

    #[test]
    fn test_fill_grid_matches_map_grid() {
        let mapped = map_grid(8, 8, |x, z| (x * 31 + z) as u32);
        let mut filled = vec![0u32; 64];
        fill_grid(&mut filled, 8, |x, z| (x * 31 + z) as u32);
        assert_eq!(mapped, filled);
    }
}
