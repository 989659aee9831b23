//! Curvature from repeated Sobel differencing

use super::sobel::{check_cell_size, elevation_grid, sobel, SobelAxis};
use hazmap_core::raster::Raster;
use hazmap_core::{Algorithm, Error, Result};

/// Parameters for curvature calculation
#[derive(Debug, Clone)]
pub struct CurvatureParams {
    /// Ground distance between cell centres
    pub cell_size: f64,
}

impl Default for CurvatureParams {
    fn default() -> Self {
        Self { cell_size: 30.0 }
    }
}

/// Curvature algorithm
#[derive(Debug, Clone, Default)]
pub struct Curvature;

impl Algorithm for Curvature {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = CurvatureParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Curvature"
    }

    fn description(&self) -> &'static str {
        "Calculate surface curvature as the sum of second Sobel differences"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        curvature(&input, params)
    }
}

/// Calculate curvature from a DEM
///
/// `sobel_x(sobel_x(z)) / cs² + sobel_y(sobel_y(z)) / cs²`. Positive on
/// concave-up (bowl) surfaces, zero on planes. NaN spreads two cells out
/// from no-data because the kernel is applied twice.
pub fn curvature(dem: &Raster<f64>, params: CurvatureParams) -> Result<Raster<f64>> {
    check_cell_size(params.cell_size)?;
    let grid = elevation_grid(dem);
    let cs2 = params.cell_size * params.cell_size;

    let dxx = sobel(&sobel(&grid, SobelAxis::X)?, SobelAxis::X)?;
    let dyy = sobel(&sobel(&grid, SobelAxis::Y)?, SobelAxis::Y)?;

    dem.derive(dxx / cs2 + dyy / cs2, Some(f64::NAN))
}
