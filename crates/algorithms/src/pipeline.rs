//! End-to-end hazard runs
//!
//! Each run takes grids already on a common grid (see
//! [`hazmap_core::align::align`]) and an explicit [`HazardConfig`], and
//! returns every product it derives. Writing files is left to the caller.

use crate::classification::{classify, ClassificationScheme};
use crate::exposure::exposure_density;
use crate::flood::{detect_floods, FloodParams, FloodResult};
use crate::fusion::{combine, HazardLayer, LayerRole, WeightSet};
use crate::landslide::{predict_susceptibility, FeatureStack, ProbabilityModel};
use crate::vectorize::{filter_min_area, vectorize, LabelNames};
use hazmap_core::config::ClassThresholds;
use hazmap_core::raster::Raster;
use hazmap_core::vector::FeatureCollection;
use hazmap_core::{HazardConfig, Result};
use tracing::{debug, info};

/// A continuous hazard grid with its classes and zone polygons
#[derive(Debug, Clone)]
pub struct HazardZones {
    /// Continuous values (probability, exposure or risk)
    pub values: Raster<f64>,
    /// Classes 1..=5, 0 for no-data
    pub classified: Raster<u8>,
    /// One polygon per connected group of equal class
    pub features: FeatureCollection,
}

/// Outputs of [`run_multi_hazard`]
pub type MultiHazardOutputs = HazardZones;

/// Outputs of [`run_flood`]
#[derive(Debug, Clone)]
pub struct FloodOutputs {
    pub result: FloodResult,
    /// Flood polygons labelled `flood`
    pub features: FeatureCollection,
}

fn zones(values: Raster<f64>, thresholds: &ClassThresholds) -> Result<HazardZones> {
    let scheme = ClassificationScheme::from_thresholds(thresholds)?;
    let classified = classify(&values, &scheme)?;
    let features = vectorize(&classified, &scheme.label_names())?;
    debug!("{} zone polygons", features.len());
    Ok(HazardZones {
        values,
        classified,
        features,
    })
}

/// Flood detection followed by vectorization of the mask
///
/// Polygons smaller than `flood.min_flood_area` are dropped when the grid
/// has a projected (metric) CRS or no CRS at all.
pub fn run_flood(backscatter: &Raster<f64>, dem: &Raster<f64>, config: &HazardConfig) -> Result<FloodOutputs> {
    info!("flood pipeline");
    let params = FloodParams::from_config(&config.flood, config.raster.pixel_size);
    let result = detect_floods(backscatter, dem, &params)?;

    let mut mask = result.mask.clone();
    mask.set_nodata(Some(0));
    let mut features = vectorize(&mask, &LabelNames::flood())?;
    if !backscatter.crs().is_some_and(|c| c.is_geographic()) {
        features = filter_min_area(features, config.flood.min_flood_area);
    }

    info!(
        "flood pipeline complete: {:.1}% flooded, {} polygons",
        result.statistics.flood_percentage,
        features.len()
    );
    Ok(FloodOutputs { result, features })
}

/// Susceptibility prediction, classification and vectorization
pub fn run_landslide<M: ProbabilityModel + ?Sized>(
    stack: &FeatureStack,
    model: &M,
    config: &HazardConfig,
) -> Result<HazardZones> {
    info!("landslide pipeline");
    let probability = predict_susceptibility(stack, model)?;
    zones(probability, &config.landslide.classification_thresholds)
}

/// Exposure density, classification and vectorization
pub fn run_exposure(
    hazard: &Raster<f64>,
    buildings: &Raster<f64>,
    population: Option<&Raster<f64>>,
    config: &HazardConfig,
) -> Result<HazardZones> {
    info!("exposure pipeline");
    let exposure = exposure_density(hazard, buildings, population, &config.exposure)?;
    zones(exposure, &config.exposure.classification_thresholds)
}

/// Composite risk from landslide, flood and optional exposure
///
/// Layers are normalized with `multi_hazard.normalization_method` and
/// combined with `multi_hazard.weights`, renormalized over the layers
/// given.
pub fn run_multi_hazard(
    landslide: &Raster<f64>,
    flood: &Raster<f64>,
    exposure: Option<&Raster<f64>>,
    config: &HazardConfig,
) -> Result<MultiHazardOutputs> {
    info!(
        "multi-hazard integration ({} layers)",
        if exposure.is_some() { 3 } else { 2 }
    );
    let cfg = &config.multi_hazard;

    let mut layers = vec![
        HazardLayer::new(LayerRole::Landslide, landslide.clone()),
        HazardLayer::new(LayerRole::Flood, flood.clone()),
    ];
    if let Some(e) = exposure {
        layers.push(HazardLayer::new(LayerRole::Exposure, e.clone()));
    }

    let risk = combine(&layers, &WeightSet::from(&cfg.weights), Some(cfg.normalization_method))?;
    zones(risk, &cfg.classification_thresholds)
}
