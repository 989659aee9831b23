//! Exposure density and risk index
//!
//! Both scale every input by its own maximum (so zero stays zero) and then
//! reuse the weighted combination engine. Missing optional inputs have
//! their weight redistributed.

use crate::fusion::{combine, HazardLayer, LayerRole, WeightSet};
use hazmap_core::config::ExposureConfig;
use hazmap_core::raster::Raster;
use hazmap_core::Result;
use tracing::info;

/// Divide a grid by its largest valid value when that is positive
///
/// No-data cells become NaN. Grids whose maximum is zero or negative are
/// returned unscaled.
pub fn scale_by_max(grid: &Raster<f64>) -> Result<Raster<f64>> {
    let values = grid.to_f64();
    match values.valid_values().fold(None, |m: Option<f64>, v| Some(m.map_or(v, |m| m.max(v)))) {
        Some(max) if max > 0.0 => grid.derive(values.data().mapv(|v| v / max), Some(f64::NAN)),
        _ => Ok(values),
    }
}

/// Exposure from hazard intensity, building density and optional population
///
/// Weights come from `config.weights` (hazard/buildings/population).
///
/// # Errors
/// `SizeMismatch` if the grids differ in shape; `InvalidParameter` for
/// unusable weights.
pub fn exposure_density(
    hazard: &Raster<f64>,
    buildings: &Raster<f64>,
    population: Option<&Raster<f64>>,
    config: &ExposureConfig,
) -> Result<Raster<f64>> {
    let mut layers = vec![
        HazardLayer::new(LayerRole::Hazard, scale_by_max(hazard)?),
        HazardLayer::new(LayerRole::Buildings, scale_by_max(buildings)?),
    ];
    if let Some(pop) = population {
        layers.push(HazardLayer::new(LayerRole::Population, scale_by_max(pop)?));
    }

    let exposure = combine(&layers, &WeightSet::from(&config.weights), None)?;
    log_range("exposure", &exposure);
    Ok(exposure)
}

/// Risk index from landslide, flood and exposure grids
///
/// Weights come from `config.risk_weights`.
pub fn risk_index(
    landslide: &Raster<f64>,
    flood: &Raster<f64>,
    exposure: &Raster<f64>,
    config: &ExposureConfig,
) -> Result<Raster<f64>> {
    let layers = [
        HazardLayer::new(LayerRole::Landslide, scale_by_max(landslide)?),
        HazardLayer::new(LayerRole::Flood, scale_by_max(flood)?),
        HazardLayer::new(LayerRole::Exposure, scale_by_max(exposure)?),
    ];
    let risk = combine(&layers, &WeightSet::from(&config.risk_weights), None)?;
    log_range("risk index", &risk);
    Ok(risk)
}

fn log_range(what: &str, grid: &Raster<f64>) {
    let stats = grid.statistics();
    if let (Some(min), Some(max)) = (stats.min, stats.max) {
        info!("{} range: {:.3} - {:.3}", what, min, max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(values: &[f64]) -> Raster<f64> {
        Raster::from_vec(values.to_vec(), 1, values.len()).unwrap()
    }

    #[test]
    fn test_scale_by_max() {
        let out = scale_by_max(&row(&[0.0, 5.0, 10.0])).unwrap();
        assert_eq!(out.data().iter().copied().collect::<Vec<_>>(), vec![0.0, 0.5, 1.0]);

        let zeros = scale_by_max(&row(&[0.0, 0.0])).unwrap();
        assert!(zeros.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_exposure_two_inputs() {
        let hazard = row(&[0.0, 1.0]);
        let buildings = row(&[4.0, 2.0]);
        let out = exposure_density(&hazard, &buildings, None, &ExposureConfig::default()).unwrap();
        // 0.4 / 0.8 each
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.5);
        assert_relative_eq!(out.get(0, 1).unwrap(), 0.75);
    }

    #[test]
    fn test_exposure_with_population() {
        let hazard = row(&[1.0, 0.0]);
        let buildings = row(&[1.0, 0.0]);
        let pop = row(&[100.0, 50.0]);
        let out = exposure_density(&hazard, &buildings, Some(&pop), &ExposureConfig::default()).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 1.0);
        assert_relative_eq!(out.get(0, 1).unwrap(), 0.1);
    }

    #[test]
    fn test_risk_index_weights() {
        let ones = row(&[1.0]);
        let zero = row(&[0.0]);
        let cfg = ExposureConfig::default();
        assert_relative_eq!(risk_index(&ones, &zero, &zero, &cfg).unwrap().get(0, 0).unwrap(), 0.35);
        assert_relative_eq!(risk_index(&zero, &zero, &ones, &cfg).unwrap().get(0, 0).unwrap(), 0.30);
        assert_relative_eq!(risk_index(&ones, &ones, &ones, &cfg).unwrap().get(0, 0).unwrap(), 1.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = row(&[1.0, 2.0]);
        let b = row(&[1.0]);
        assert!(exposure_density(&a, &b, None, &ExposureConfig::default()).is_err());
    }
}
