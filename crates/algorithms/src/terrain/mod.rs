//! Terrain analysis algorithms
//!
//! Derivatives of a Digital Elevation Model, all built on the same Sobel
//! 3x3 differencing:
//! - Slope: steepness in degrees
//! - Aspect: gradient bearing in degrees
//! - Curvature: sum of second differences

mod aspect;
mod curvature;
mod slope;
mod sobel;

pub use aspect::{aspect, Aspect};
pub use curvature::{curvature, Curvature, CurvatureParams};
pub use slope::{slope, Slope, SlopeParams, SlopeUnits};

use hazmap_core::{Raster, Result};
use tracing::debug;

/// The three terrain layers used as susceptibility features
#[derive(Debug, Clone)]
pub struct TerrainDerivatives {
    pub slope: Raster<f64>,
    pub aspect: Raster<f64>,
    pub curvature: Raster<f64>,
}

impl TerrainDerivatives {
    /// Compute slope (degrees), aspect and curvature from one DEM
    pub fn compute(dem: &Raster<f64>, cell_size: f64) -> Result<Self> {
        debug!("computing terrain derivatives, cell size {}", cell_size);
        Ok(Self {
            slope: slope(
                dem,
                SlopeParams {
                    cell_size,
                    units: SlopeUnits::Degrees,
                },
            )?,
            aspect: aspect(dem)?,
            curvature: curvature(dem, CurvatureParams { cell_size })?,
        })
    }
}
