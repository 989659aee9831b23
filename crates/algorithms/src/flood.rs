//! Flood detection from SAR backscatter
//!
//! Three stages run in a fixed order:
//! 1. **Segment**: water is valid backscatter strictly below the threshold
//! 2. **ElevationFilter**: water above the elevation ceiling is discarded
//! 3. **Cleanup**: opening then closing with a 4-connected cross

use crate::morphology::clean;
use crate::segmentation::{threshold, ThresholdMode};
use hazmap_core::config::FloodConfig;
use hazmap_core::raster::Raster;
use hazmap_core::{Algorithm, Error, Result};
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodStage {
    Segment,
    ElevationFilter,
    Cleanup,
}

impl FloodStage {
    pub const ORDER: [FloodStage; 3] = [
        FloodStage::Segment,
        FloodStage::ElevationFilter,
        FloodStage::Cleanup,
    ];
}

impl std::fmt::Display for FloodStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FloodStage::Segment => "segment",
            FloodStage::ElevationFilter => "elevation filter",
            FloodStage::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

/// Parameters for flood detection
#[derive(Debug, Clone)]
pub struct FloodParams {
    /// Threshold selection for the segment stage
    pub mode: ThresholdMode,
    /// Water above this elevation (m) is removed
    pub elevation_ceiling: f64,
    /// Opening/closing iterations
    pub kernel_size: usize,
    /// Pixel edge length in metres, for area statistics
    pub pixel_size: f64,
}

impl Default for FloodParams {
    fn default() -> Self {
        Self::from_config(&FloodConfig::default(), 30.0)
    }
}

impl FloodParams {
    pub fn from_config(config: &FloodConfig, pixel_size: f64) -> Self {
        Self {
            mode: if config.use_otsu {
                ThresholdMode::Otsu
            } else {
                ThresholdMode::Manual(config.sar_threshold)
            },
            elevation_ceiling: config.dem_threshold,
            kernel_size: config.morphology_kernel_size,
            pixel_size,
        }
    }
}

/// Summary of a flood mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloodStatistics {
    pub flood_pixels: usize,
    pub flood_area_m2: f64,
    pub flood_area_km2: f64,
    /// All cells of the grid
    pub total_pixels: usize,
    /// Cells with valid backscatter
    pub valid_pixels: usize,
    /// Flooded share of the valid cells, in percent
    pub flood_percentage: f64,
}

/// Output of [`detect_floods`]
#[derive(Debug, Clone)]
pub struct FloodResult {
    /// Final 0/1 water mask
    pub mask: Raster<u8>,
    /// Threshold used by the segment stage
    pub threshold: f64,
    /// Water cells removed by the elevation filter
    pub removed_by_elevation: usize,
    pub statistics: FloodStatistics,
}

/// Flood detection algorithm; input is (backscatter, elevation)
#[derive(Debug, Clone, Default)]
pub struct FloodDetection;

impl Algorithm for FloodDetection {
    type Input = (Raster<f64>, Raster<f64>);
    type Output = FloodResult;
    type Params = FloodParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "FloodDetection"
    }

    fn description(&self) -> &'static str {
        "Water mask from SAR backscatter with elevation filtering and morphological cleanup"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        detect_floods(&input.0, &input.1, &params)
    }
}

/// Run the flood pipeline on a backscatter grid (dB) and a matching DEM
///
/// # Errors
/// - `SizeMismatch` if the two grids differ in shape
/// - `EmptyInput` in Otsu mode when no backscatter cell is valid
/// - `InvalidParameter` for a zero kernel size or bad pixel size
pub fn detect_floods(backscatter: &Raster<f64>, dem: &Raster<f64>, params: &FloodParams) -> Result<FloodResult> {
    backscatter.ensure_same_shape(dem)?;
    if params.kernel_size == 0 {
        return Err(Error::invalid("kernel_size", 0, "must be at least 1"));
    }
    if !(params.pixel_size > 0.0) {
        return Err(Error::invalid("pixel_size", params.pixel_size, "must be positive"));
    }

    let mut mask = None;
    let mut threshold_used = f64::NAN;
    let mut removed = 0;

    for stage in FloodStage::ORDER {
        mask = Some(match (stage, mask) {
            (FloodStage::Segment, _) => {
                let seg = threshold(backscatter, params.mode)?;
                threshold_used = seg.threshold;
                info!(
                    "segment: threshold {:.2} dB, {} water pixels",
                    seg.threshold,
                    count_set(&seg.mask)
                );
                seg.mask
            }
            (FloodStage::ElevationFilter, Some(m)) => {
                let (filtered, n) = elevation_filter(&m, dem, params.elevation_ceiling)?;
                removed = n;
                info!(
                    "elevation filter: removed {} pixels above {} m",
                    n, params.elevation_ceiling
                );
                filtered
            }
            (FloodStage::Cleanup, Some(m)) => {
                let cleaned = clean(&m, params.kernel_size)?;
                info!("cleanup: {} water pixels remain", count_set(&cleaned));
                cleaned
            }
            (_, None) => return Err(Error::Other(format!("stage {} has no input mask", stage))),
        });
    }

    let mask = mask.ok_or_else(|| Error::Other("flood pipeline produced no mask".into()))?;
    let statistics = flood_statistics(&mask, backscatter.valid_count(), params.pixel_size);
    debug!("flood statistics: {:?}", statistics);

    Ok(FloodResult {
        mask,
        threshold: threshold_used,
        removed_by_elevation: removed,
        statistics,
    })
}

/// Zero every mask cell whose elevation is above `ceiling`
///
/// No-data elevation never removes a cell. Returns the filtered mask and
/// the number of cells cleared.
pub fn elevation_filter(mask: &Raster<u8>, dem: &Raster<f64>, ceiling: f64) -> Result<(Raster<u8>, usize)> {
    mask.ensure_same_shape(dem)?;
    let filtered = Zip::from(mask.data()).and(dem.data()).map_collect(|&m, &z| {
        if m != 0 && !dem.is_nodata(z) && z > ceiling {
            0
        } else {
            m
        }
    });
    let removed = count_set(mask) - filtered.iter().filter(|&&v| v != 0).count();
    Ok((mask.derive(filtered, mask.nodata())?, removed))
}

/// Statistics of a final mask; does not modify it
///
/// `valid_pixels` is the number of cells with valid input data and is the
/// denominator of the percentage (0 when there are none).
pub fn flood_statistics(mask: &Raster<u8>, valid_pixels: usize, pixel_size: f64) -> FloodStatistics {
    let flood_pixels = count_set(mask);
    let flood_area_m2 = flood_pixels as f64 * pixel_size * pixel_size;
    let flood_percentage = if valid_pixels > 0 {
        flood_pixels as f64 / valid_pixels as f64 * 100.0
    } else {
        0.0
    };

    FloodStatistics {
        flood_pixels,
        flood_area_m2,
        flood_area_km2: flood_area_m2 / 1_000_000.0,
        total_pixels: mask.len(),
        valid_pixels,
        flood_percentage,
    }
}

/// A flood mask as a 0/1 hazard layer for combination
///
/// A no-data value of 0 is dropped, since there 0 means dry land rather
/// than missing data.
pub fn flood_layer(mask: &Raster<u8>) -> Result<Raster<f64>> {
    let mut mask = mask.clone();
    if mask.nodata() == Some(0) {
        mask.set_nodata(None);
    }
    Ok(mask.to_f64())
}

fn count_set(mask: &Raster<u8>) -> usize {
    mask.data().iter().filter(|&&v| v != 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 10x10 scene: a 6x6 lake of -22 dB in land of -6 dB, DEM at 50 m
    fn scene() -> (Raster<f64>, Raster<f64>) {
        let mut sar = Raster::filled(10, 10, -6.0);
        for row in 2..8 {
            for col in 2..8 {
                sar.set(row, col, -22.0).unwrap();
            }
        }
        (sar, Raster::filled(10, 10, 50.0))
    }

    fn manual(kernel_size: usize) -> FloodParams {
        FloodParams {
            mode: ThresholdMode::Manual(-18.0),
            kernel_size,
            ..FloodParams::default()
        }
    }

    #[test]
    fn test_segment_exactly_on_water() {
        let (sar, _) = scene();
        let seg = threshold(&sar, ThresholdMode::Manual(-18.0)).unwrap();
        for (v, m) in sar.data().iter().zip(seg.mask.data().iter()) {
            assert_eq!(*m == 1, *v == -22.0);
        }
    }

    #[test]
    fn test_lake_survives_pipeline() {
        let (sar, dem) = scene();
        let result = detect_floods(&sar, &dem, &manual(1)).unwrap();
        assert_eq!(result.threshold, -18.0);
        assert_eq!(result.removed_by_elevation, 0);
        assert_eq!(result.mask.get(4, 4).unwrap(), 1);
        assert_eq!(result.mask.get(0, 0).unwrap(), 0);
        assert_eq!(result.mask.shape(), sar.shape());
    }

    #[test]
    fn test_elevation_removes_water() {
        let (sar, mut dem) = scene();
        dem.set(3, 3, 150.0).unwrap();
        let seg = threshold(&sar, ThresholdMode::Manual(-18.0)).unwrap();
        let (filtered, removed) = elevation_filter(&seg.mask, &dem, 100.0).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(filtered.get(3, 3).unwrap(), 0);
        assert_eq!(filtered.get(3, 4).unwrap(), 1);
    }

    #[test]
    fn test_nodata_elevation_keeps_water() {
        let (sar, mut dem) = scene();
        dem.set_nodata(Some(-9999.0));
        dem.set(3, 3, -9999.0).unwrap();
        let seg = threshold(&sar, ThresholdMode::Manual(-18.0)).unwrap();
        let (_, removed) = elevation_filter(&seg.mask, &dem, -10_000.0).unwrap();
        assert_eq!(removed, 35);
    }

    #[test]
    fn test_shape_mismatch() {
        let (sar, _) = scene();
        let dem = Raster::filled(9, 10, 50.0);
        let err = detect_floods(&sar, &dem, &FloodParams::default()).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[test]
    fn test_otsu_mode() {
        let (sar, dem) = scene();
        let params = FloodParams {
            kernel_size: 1,
            ..FloodParams::default()
        };
        let result = detect_floods(&sar, &dem, &params).unwrap();
        assert!(result.threshold > -22.0 && result.threshold < -6.0);
        assert_eq!(result.mask.get(5, 5).unwrap(), 1);
    }

    #[test]
    fn test_statistics() {
        let mut mask = Raster::filled(10, 10, 0u8);
        for col in 0..10 {
            mask.set(0, col, 1).unwrap();
        }
        let stats = flood_statistics(&mask, 80, 30.0);
        assert_eq!(stats.flood_pixels, 10);
        assert_relative_eq!(stats.flood_area_m2, 9000.0);
        assert_relative_eq!(stats.flood_area_km2, 0.009);
        assert_relative_eq!(stats.flood_percentage, 12.5);
        assert_eq!(stats.total_pixels, 100);
        assert_eq!(mask.data().iter().filter(|&&v| v == 1).count(), 10);
    }

    #[test]
    fn test_zero_kernel_rejected() {
        let (sar, dem) = scene();
        assert!(detect_floods(&sar, &dem, &manual(0)).is_err());
    }

    #[test]
    fn test_flood_layer_keeps_dry_cells() {
        let mask = Raster::from_vec(vec![0u8, 1, 1, 0], 2, 2)
            .unwrap()
            .with_nodata(Some(0));
        let layer = flood_layer(&mask).unwrap();
        assert_eq!(layer.valid_count(), 4);
        assert_eq!(layer.get(0, 1).unwrap(), 1.0);
        assert_eq!(layer.get(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(
            FloodStage::ORDER,
            [FloodStage::Segment, FloodStage::ElevationFilter, FloodStage::Cleanup]
        );
    }
}
