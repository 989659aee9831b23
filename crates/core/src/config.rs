//! Run configuration
//!
//! A [`HazardConfig`] is passed explicitly to every pipeline run. Defaults
//! reproduce the standard parameter set (30 m pixels, -18 dB SAR threshold,
//! 100 m elevation ceiling, 0.2/0.4/0.6/0.8 class cut points).

use crate::error::{Error, Result};
use crate::io::{Compression, GeoTiffOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rescaling applied to hazard layers before they are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// `(x - min) / (max - min)` over valid cells
    #[default]
    MinMax,
    /// `(x - mean) / std`, clipped to [0, 1]
    ZScore,
}

impl std::str::FromStr for NormalizationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "min_max" | "minmax" => Ok(NormalizationMethod::MinMax),
            "z_score" | "zscore" => Ok(NormalizationMethod::ZScore),
            other => Err(Error::invalid(
                "normalization_method",
                other,
                "expected min_max or z_score",
            )),
        }
    }
}

impl std::fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizationMethod::MinMax => write!(f, "min_max"),
            NormalizationMethod::ZScore => write!(f, "z_score"),
        }
    }
}

/// Four ascending cut points splitting [0, 1] into five classes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassThresholds {
    pub very_low: f64,
    pub low: f64,
    pub moderate: f64,
    pub high: f64,
}

impl ClassThresholds {
    /// Class names, lowest first; the last one absorbs values above `high`
    pub const LABELS: [&'static str; 5] = ["very_low", "low", "moderate", "high", "very_high"];

    /// Upper bounds in ascending order
    pub fn bounds(&self) -> [f64; 4] {
        [self.very_low, self.low, self.moderate, self.high]
    }

    pub fn validate(&self) -> Result<()> {
        let bounds = self.bounds();
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(Error::invalid(
                "classification_thresholds",
                format!("{:?}", bounds),
                "bounds must be finite",
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::invalid(
                "classification_thresholds",
                format!("{:?}", bounds),
                "bounds must be strictly increasing",
            ));
        }
        Ok(())
    }
}

impl Default for ClassThresholds {
    fn default() -> Self {
        Self {
            very_low: 0.2,
            low: 0.4,
            moderate: 0.6,
            high: 0.8,
        }
    }
}

/// Raster output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Pixel edge length in metres, used for areas and terrain gradients
    pub pixel_size: f64,
    pub compression: Compression,
    /// Rows per written block
    pub block_size: u32,
}

impl RasterConfig {
    pub fn geotiff_options(&self) -> GeoTiffOptions {
        GeoTiffOptions {
            compression: self.compression,
            block_size: self.block_size,
        }
    }
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            pixel_size: 30.0,
            compression: Compression::Lzw,
            block_size: 256,
        }
    }
}

/// SAR flood mapping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodConfig {
    /// Manual backscatter threshold in dB
    pub sar_threshold: f64,
    /// Select the threshold with Otsu's method instead
    pub use_otsu: bool,
    /// Elevation ceiling in metres; water above it is discarded
    pub dem_threshold: f64,
    /// Iterations of erosion/dilation in the cleanup stage
    pub morphology_kernel_size: usize,
    /// Flood polygons smaller than this (m²) are dropped from vector output
    pub min_flood_area: f64,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            sar_threshold: -18.0,
            use_otsu: true,
            dem_threshold: 100.0,
            morphology_kernel_size: 3,
            min_flood_area: 1000.0,
        }
    }
}

/// Landslide susceptibility settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LandslideConfig {
    pub classification_thresholds: ClassThresholds,
}

/// Weights of the three hazard-level layers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardWeights {
    pub landslide: f64,
    pub flood: f64,
    pub exposure: f64,
}

impl HazardWeights {
    fn validate(&self, name: &'static str) -> Result<()> {
        for w in [self.landslide, self.flood, self.exposure] {
            if !(w >= 0.0 && w.is_finite()) {
                return Err(Error::invalid(name, w, "weights must be non-negative"));
            }
        }
        Ok(())
    }
}

impl Default for HazardWeights {
    fn default() -> Self {
        Self {
            landslide: 0.4,
            flood: 0.4,
            exposure: 0.2,
        }
    }
}

/// Weights of the exposure inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureWeights {
    pub hazard: f64,
    pub buildings: f64,
    pub population: f64,
}

impl Default for ExposureWeights {
    fn default() -> Self {
        Self {
            hazard: 0.4,
            buildings: 0.4,
            population: 0.2,
        }
    }
}

/// Exposure analysis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    pub weights: ExposureWeights,
    /// Weights of the landslide/flood/exposure risk index
    pub risk_weights: HazardWeights,
    pub classification_thresholds: ClassThresholds,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            weights: ExposureWeights::default(),
            risk_weights: HazardWeights {
                landslide: 0.35,
                flood: 0.35,
                exposure: 0.30,
            },
            classification_thresholds: ClassThresholds::default(),
        }
    }
}

/// Multi-hazard integration settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiHazardConfig {
    pub weights: HazardWeights,
    pub normalization_method: NormalizationMethod,
    pub classification_thresholds: ClassThresholds,
}

/// Complete configuration for a pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub raster: RasterConfig,
    pub flood: FloodConfig,
    pub landslide: LandslideConfig,
    pub exposure: ExposureConfig,
    pub multi_hazard: MultiHazardConfig,
}

impl HazardConfig {
    /// Parse a JSON document; missing sections and fields take their defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: HazardConfig = serde_json::from_str(text)
            .map_err(|e| Error::Other(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Other(e.to_string()))
    }

    /// Reject configurations no pipeline could run with
    pub fn validate(&self) -> Result<()> {
        if !(self.raster.pixel_size > 0.0 && self.raster.pixel_size.is_finite()) {
            return Err(Error::invalid(
                "raster.pixel_size",
                self.raster.pixel_size,
                "must be positive",
            ));
        }
        if self.raster.block_size == 0 {
            return Err(Error::invalid("raster.block_size", 0, "must be positive"));
        }
        if self.flood.morphology_kernel_size == 0 {
            return Err(Error::invalid(
                "flood.morphology_kernel_size",
                0,
                "must be at least 1",
            ));
        }
        if !self.flood.sar_threshold.is_finite() {
            return Err(Error::invalid(
                "flood.sar_threshold",
                self.flood.sar_threshold,
                "must be finite",
            ));
        }
        if self.flood.min_flood_area < 0.0 {
            return Err(Error::invalid(
                "flood.min_flood_area",
                self.flood.min_flood_area,
                "must be non-negative",
            ));
        }

        self.landslide.classification_thresholds.validate()?;
        self.exposure.classification_thresholds.validate()?;
        self.multi_hazard.classification_thresholds.validate()?;

        self.multi_hazard.weights.validate("multi_hazard.weights")?;
        self.exposure.risk_weights.validate("exposure.risk_weights")?;
        let ew = self.exposure.weights;
        for w in [ew.hazard, ew.buildings, ew.population] {
            if !(w >= 0.0 && w.is_finite()) {
                return Err(Error::invalid(
                    "exposure.weights",
                    w,
                    "weights must be non-negative",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HazardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.flood.sar_threshold, -18.0);
        assert!(config.flood.use_otsu);
        assert_eq!(config.flood.morphology_kernel_size, 3);
        assert_eq!(config.multi_hazard.weights.exposure, 0.2);
        assert_eq!(config.exposure.risk_weights.exposure, 0.30);
        assert_eq!(config.raster.compression, Compression::Lzw);
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{ "flood": { "use_otsu": false, "sar_threshold": -20.0 } }"#;
        let config = HazardConfig::from_json_str(json).unwrap();
        assert!(!config.flood.use_otsu);
        assert_eq!(config.flood.sar_threshold, -20.0);
        assert_eq!(config.flood.dem_threshold, 100.0);
        assert_eq!(config.raster.block_size, 256);
    }

    #[test]
    fn test_raster_section_fields() {
        let text = serde_json::to_string(&RasterConfig::default()).unwrap();
        assert!(!text.contains("nodata"));
        // older files carrying a nodata key still load
        let json = r#"{ "raster": { "nodata": -9999.0, "compression": "deflate" } }"#;
        let config = HazardConfig::from_json_str(json).unwrap();
        assert_eq!(config.raster.compression, Compression::Deflate);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = HazardConfig::default();
        let text = config.to_json_string().unwrap();
        assert!(text.contains("\"min_max\""));
        let back = HazardConfig::from_json_str(&text).unwrap();
        assert_eq!(back.multi_hazard.weights, config.multi_hazard.weights);
    }

    #[test]
    fn test_unknown_normalization_rejected() {
        let json = r#"{ "multi_hazard": { "normalization_method": "log" } }"#;
        assert!(HazardConfig::from_json_str(json).is_err());
        assert!("log".parse::<NormalizationMethod>().is_err());
        assert_eq!(
            "z_score".parse::<NormalizationMethod>().unwrap(),
            NormalizationMethod::ZScore
        );
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = HazardConfig::default();
        config.flood.morphology_kernel_size = 0;
        assert!(config.validate().is_err());

        let mut config = HazardConfig::default();
        config.landslide.classification_thresholds.low = 0.1;
        assert!(config.validate().is_err());

        let mut config = HazardConfig::default();
        config.multi_hazard.weights.flood = -0.4;
        assert!(config.validate().is_err());
    }
}
