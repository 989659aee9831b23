//! Sobel 3x3 directional differences shared by the terrain derivatives
//!
//! Kernel neighbourhood:
//! ```text
//! a b c
//! d e f
//! g h i
//! ```
//! Edge cells replicate the nearest row/column. A cell whose 3x3 window
//! holds a NaN is NaN in the output.

use crate::maybe_rayon::*;
use hazmap_core::{Error, Raster, Result};
use ndarray::Array2;

/// Differencing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SobelAxis {
    /// Along columns (west to east): `(c + 2f + i) - (a + 2d + g)`
    X,
    /// Along rows (north to south): `(g + 2h + i) - (a + 2b + c)`
    Y,
}

/// Unscaled Sobel response of `grid` along `axis`
pub(crate) fn sobel(grid: &Array2<f64>, axis: SobelAxis) -> Result<Array2<f64>> {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return Ok(grid.clone());
    }

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let up = row.saturating_sub(1);
            let down = (row + 1).min(rows - 1);
            let mut row_data = vec![f64::NAN; cols];

            for col in 0..cols {
                let left = col.saturating_sub(1);
                let right = (col + 1).min(cols - 1);

                let window = [
                    grid[(up, left)],
                    grid[(up, col)],
                    grid[(up, right)],
                    grid[(row, left)],
                    grid[(row, col)],
                    grid[(row, right)],
                    grid[(down, left)],
                    grid[(down, col)],
                    grid[(down, right)],
                ];
                if window.iter().any(|v| v.is_nan()) {
                    continue;
                }
                let [a, b, c, d, _, f, g, h, i] = window;

                row_data[col] = match axis {
                    SobelAxis::X => (c + 2.0 * f + i) - (a + 2.0 * d + g),
                    SobelAxis::Y => (g + 2.0 * h + i) - (a + 2.0 * b + c),
                };
            }

            row_data
        })
        .collect();

    Array2::from_shape_vec((rows, cols), output_data).map_err(|e| Error::Other(e.to_string()))
}

/// Elevation values with no-data replaced by NaN
pub(crate) fn elevation_grid(dem: &Raster<f64>) -> Array2<f64> {
    dem.to_f64().into_array()
}

pub(crate) fn check_cell_size(cell_size: f64) -> Result<()> {
    if !(cell_size > 0.0 && cell_size.is_finite()) {
        return Err(Error::invalid("cell_size", cell_size, "must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sobel_east_ramp() {
        let grid = Array2::from_shape_fn((5, 5), |(_, c)| c as f64);
        let dx = sobel(&grid, SobelAxis::X).unwrap();
        let dy = sobel(&grid, SobelAxis::Y).unwrap();
        assert_relative_eq!(dx[(2, 2)], 8.0);
        assert_relative_eq!(dy[(2, 2)], 0.0);
        // replicated edge halves the central difference
        assert_relative_eq!(dx[(2, 0)], 4.0);
    }

    #[test]
    fn test_sobel_nan_window() {
        let mut grid = Array2::from_elem((4, 4), 1.0);
        grid[(1, 1)] = f64::NAN;
        let dx = sobel(&grid, SobelAxis::X).unwrap();
        assert!(dx[(0, 0)].is_nan());
        assert!(dx[(2, 2)].is_nan());
        assert!(!dx[(3, 3)].is_nan());
    }
}
