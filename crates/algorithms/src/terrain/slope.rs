//! Slope calculation from DEMs
//!
//! Sobel directional differences along both axes, scaled by `8 * cell_size`.

use super::sobel::{check_cell_size, elevation_grid, sobel, SobelAxis};
use hazmap_core::raster::Raster;
use hazmap_core::{Algorithm, Error, Result};
use ndarray::Zip;

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// Degrees (0-90)
    #[default]
    Degrees,
    /// Percent (0-infinity, typically 0-100+)
    Percent,
    /// Radians (0-π/2)
    Radians,
}

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Ground distance between cell centres, in elevation units
    pub cell_size: f64,
    /// Output units
    pub units: SlopeUnits,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            cell_size: 30.0,
            units: SlopeUnits::Degrees,
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope (rate of change of elevation) from a DEM with Sobel gradients"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Calculate slope from a DEM
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * cellsize)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * cellsize)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
///
/// Edge cells replicate their nearest neighbours. No-data cells and cells
/// whose window touches no-data are NaN.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    check_cell_size(params.cell_size)?;
    let grid = elevation_grid(dem);
    let dx = sobel(&grid, SobelAxis::X)?;
    let dy = sobel(&grid, SobelAxis::Y)?;
    let eight_cell_size = 8.0 * params.cell_size;

    let output = Zip::from(&dx).and(&dy).map_collect(|&gx, &gy| {
        let (gx, gy) = (gx / eight_cell_size, gy / eight_cell_size);
        let slope_rad = (gx * gx + gy * gy).sqrt().atan();
        match params.units {
            SlopeUnits::Degrees => slope_rad.to_degrees(),
            SlopeUnits::Percent => slope_rad.tan() * 100.0,
            SlopeUnits::Radians => slope_rad,
        }
    });

    dem.derive(output, Some(f64::NAN))
}
