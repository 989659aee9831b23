//! # HazMap Algorithms
//!
//! Hazard mapping algorithms for HazMap.
//!
//! ## Available Algorithm Categories
//!
//! - **terrain**: Slope, aspect, curvature
//! - **segmentation**: Manual and Otsu thresholding
//! - **morphology**: Erosion, dilation, opening, closing
//! - **flood**: SAR flood detection with elevation filtering
//! - **fusion**: Normalization and weighted layer combination
//! - **classification**: Ordinal hazard classes
//! - **vectorize**: Class groups to GeoJSON-ready polygons
//! - **landslide**: Feature stacks, susceptibility prediction, training samples
//! - **exposure**: Exposure density and risk index
//! - **pipeline**: End-to-end flood, landslide, exposure and multi-hazard runs

pub mod classification;
pub mod exposure;
pub mod flood;
pub mod fusion;
pub mod landslide;
pub(crate) mod maybe_rayon;
pub mod morphology;
pub mod pipeline;
pub mod segmentation;
pub mod terrain;
pub mod vectorize;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{classify, ClassificationScheme, Classify};
    pub use crate::exposure::{exposure_density, risk_index};
    pub use crate::flood::{
        detect_floods, flood_layer, flood_statistics, FloodDetection, FloodParams, FloodResult,
        FloodStage, FloodStatistics,
    };
    pub use crate::fusion::{
        combine, normalize, renormalize, HazardLayer, LayerRole, NormalizationMethod, WeightSet,
    };
    pub use crate::landslide::{
        predict_susceptibility, training_samples, FeatureStack, LogisticModel, ProbabilityModel,
        TrainingSet,
    };
    pub use crate::morphology::{
        clean, closing, dilate, erode, opening, Closing, Opening, StructuringElement,
    };
    pub use crate::pipeline::{
        run_exposure, run_flood, run_landslide, run_multi_hazard, FloodOutputs, HazardZones,
        MultiHazardOutputs,
    };
    pub use crate::segmentation::{otsu_threshold, threshold, Threshold, ThresholdMode};
    pub use crate::terrain::{
        aspect, curvature, slope, Aspect, Curvature, CurvatureParams, Slope, SlopeParams,
        SlopeUnits, TerrainDerivatives,
    };
    pub use crate::vectorize::{filter_min_area, vectorize, LabelNames, Vectorize};
    pub use hazmap_core::prelude::*;
}
