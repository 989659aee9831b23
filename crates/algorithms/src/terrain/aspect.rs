//! Aspect calculation from DEMs

use super::sobel::{elevation_grid, sobel, SobelAxis};
use hazmap_core::raster::Raster;
use hazmap_core::{Algorithm, Error, Result};
use ndarray::Zip;

/// Aspect algorithm
#[derive(Debug, Clone, Default)]
pub struct Aspect;

impl Algorithm for Aspect {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Aspect"
    }

    fn description(&self) -> &'static str {
        "Calculate aspect (gradient bearing) from a DEM"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        aspect(&input)
    }
}

/// Calculate aspect from a DEM as a bearing in degrees, [0, 360)
///
/// The Sobel gradient direction `atan2(-dy, dx)` is converted to a compass
/// bearing `90 - angle`, with negative bearings wrapped by +360. A surface
/// rising eastward yields 90, one rising southward yields 180. Flat cells
/// have a zero gradient and come out as 90.
///
/// Cell size cancels out of the ratio, so none is needed.
pub fn aspect(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let grid = elevation_grid(dem);
    let dx = sobel(&grid, SobelAxis::X)?;
    let dy = sobel(&grid, SobelAxis::Y)?;

    let output = Zip::from(&dx).and(&dy).map_collect(|&gx, &gy| {
        if gx.is_nan() || gy.is_nan() {
            return f64::NAN;
        }
        let bearing = 90.0 - (-gy).atan2(gx).to_degrees();
        if bearing < 0.0 {
            bearing + 360.0
        } else {
            bearing
        }
    });

    dem.derive(output, Some(f64::NAN))
}
