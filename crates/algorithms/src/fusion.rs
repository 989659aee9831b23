//! Normalization and weighted combination of hazard layers
//!
//! Layers are rescaled to a common range, then summed with weights that
//! are renormalized over exactly the layers present. A missing optional
//! layer (e.g. exposure) therefore redistributes its share to the others.

use hazmap_core::config::{ExposureWeights, HazardWeights};
use hazmap_core::raster::Raster;
use hazmap_core::{Error, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

pub use hazmap_core::config::NormalizationMethod;

/// What a layer represents in a combination
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    Landslide,
    Flood,
    Exposure,
    Hazard,
    Buildings,
    Population,
}

impl std::fmt::Display for LayerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LayerRole::Landslide => "landslide",
            LayerRole::Flood => "flood",
            LayerRole::Exposure => "exposure",
            LayerRole::Hazard => "hazard",
            LayerRole::Buildings => "buildings",
            LayerRole::Population => "population",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for LayerRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "landslide" => Ok(LayerRole::Landslide),
            "flood" => Ok(LayerRole::Flood),
            "exposure" => Ok(LayerRole::Exposure),
            "hazard" => Ok(LayerRole::Hazard),
            "buildings" => Ok(LayerRole::Buildings),
            "population" => Ok(LayerRole::Population),
            other => Err(Error::invalid("role", other, "unknown layer role")),
        }
    }
}

/// A grid tagged with its role
#[derive(Debug, Clone)]
pub struct HazardLayer {
    pub role: LayerRole,
    pub grid: Raster<f64>,
}

impl HazardLayer {
    pub fn new(role: LayerRole, grid: Raster<f64>) -> Self {
        Self { role, grid }
    }
}

/// Role → weight mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightSet(BTreeMap<LayerRole, f64>);

impl WeightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, role: LayerRole, weight: f64) -> Self {
        self.0.insert(role, weight);
        self
    }

    pub fn insert(&mut self, role: LayerRole, weight: f64) {
        self.0.insert(role, weight);
    }

    pub fn get(&self, role: LayerRole) -> Option<f64> {
        self.0.get(&role).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerRole, f64)> + '_ {
        self.0.iter().map(|(r, w)| (*r, *w))
    }
}

impl From<&HazardWeights> for WeightSet {
    fn from(w: &HazardWeights) -> Self {
        WeightSet::new()
            .with(LayerRole::Landslide, w.landslide)
            .with(LayerRole::Flood, w.flood)
            .with(LayerRole::Exposure, w.exposure)
    }
}

impl From<&ExposureWeights> for WeightSet {
    fn from(w: &ExposureWeights) -> Self {
        WeightSet::new()
            .with(LayerRole::Hazard, w.hazard)
            .with(LayerRole::Buildings, w.buildings)
            .with(LayerRole::Population, w.population)
    }
}

/// Weights for exactly `roles`, scaled to sum to 1
///
/// Entries for roles not listed are ignored.
///
/// # Errors
/// `InvalidParameter` for an empty or duplicated role list, a role with no
/// weight, a negative weight, or a zero total.
pub fn renormalize(weights: &WeightSet, roles: &[LayerRole]) -> Result<BTreeMap<LayerRole, f64>> {
    if roles.is_empty() {
        return Err(Error::invalid("layers", "[]", "at least one layer is required"));
    }

    let mut selected = BTreeMap::new();
    for &role in roles {
        let w = weights
            .get(role)
            .ok_or_else(|| Error::invalid("weights", role, "no weight for a supplied layer"))?;
        if !(w >= 0.0 && w.is_finite()) {
            return Err(Error::invalid("weights", w, format!("weight for {} must be non-negative", role)));
        }
        if selected.insert(role, w).is_some() {
            return Err(Error::invalid("layers", role, "role supplied more than once"));
        }
    }

    let total: f64 = selected.values().sum();
    if total <= 0.0 {
        return Err(Error::invalid("weights", total, "weights of the supplied layers sum to zero"));
    }

    Ok(selected.into_iter().map(|(r, w)| (r, w / total)).collect())
}

/// Rescale a grid to a common range
///
/// No-data cells become NaN. A degenerate distribution (constant values,
/// zero standard deviation, or no valid cells) is returned unchanged.
pub fn normalize(grid: &Raster<f64>, method: NormalizationMethod) -> Result<Raster<f64>> {
    let values = grid.to_f64();
    let stats = values.statistics();

    let scaled = match (method, stats.min, stats.max, stats.mean, stats.std_dev) {
        (NormalizationMethod::MinMax, Some(min), Some(max), _, _) if max > min => {
            let range = max - min;
            values.data().mapv(|v| (v - min) / range)
        }
        (NormalizationMethod::ZScore, _, _, Some(mean), Some(std)) if std > 0.0 => {
            values.data().mapv(|v| ((v - mean) / std).clamp(0.0, 1.0))
        }
        _ => {
            debug!("{} normalization is the identity on a degenerate grid", method);
            return Ok(values);
        }
    };

    grid.derive(scaled, Some(f64::NAN))
}

/// Weighted sum of layers after renormalizing the weights over them
///
/// With `Some(method)` each layer is normalized first; with `None` the
/// layers are summed as given. Layers are processed in role order so the
/// result does not depend on the order of `layers`. A cell that is no-data
/// in any layer is NaN in the output.
///
/// # Errors
/// - `InvalidParameter` from [`renormalize`]
/// - `SizeMismatch` if the layers differ in shape
pub fn combine(
    layers: &[HazardLayer],
    weights: &WeightSet,
    method: Option<NormalizationMethod>,
) -> Result<Raster<f64>> {
    let roles: Vec<LayerRole> = layers.iter().map(|l| l.role).collect();
    let effective = renormalize(weights, &roles)?;

    let mut ordered: Vec<&HazardLayer> = layers.iter().collect();
    ordered.sort_by_key(|l| l.role);
    let base = &ordered[0].grid;
    for layer in &ordered[1..] {
        base.ensure_same_shape(&layer.grid)?;
    }

    debug!(
        "combining {} layers with weights {:?}",
        ordered.len(),
        effective
    );

    let mut sum = Array2::<f64>::zeros(base.shape());
    for layer in ordered {
        let grid = match method {
            Some(m) => normalize(&layer.grid, m)?,
            None => layer.grid.to_f64(),
        };
        let w = effective[&layer.role];
        sum.zip_mut_with(grid.data(), |acc, &v| *acc += w * v);
    }

    base.derive(sum, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(values: &[f64]) -> Raster<f64> {
        Raster::from_vec(values.to_vec(), 1, values.len()).unwrap()
    }

    #[test]
    fn test_min_max_range() {
        let out = normalize(&grid(&[2.0, 4.0, 6.0, 10.0]), NormalizationMethod::MinMax).unwrap();
        let values: Vec<f64> = out.data().iter().copied().collect();
        assert_eq!(values, vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_min_max_constant_is_identity() {
        let out = normalize(&grid(&[7.0, 7.0, 7.0]), NormalizationMethod::MinMax).unwrap();
        assert!(out.data().iter().all(|&v| v == 7.0));
    }

    #[test]
    fn test_min_max_skips_nodata() {
        let g = grid(&[0.0, -9999.0, 5.0]).with_nodata(Some(-9999.0));
        let out = normalize(&g, NormalizationMethod::MinMax).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 0.0);
        assert!(out.get(0, 1).unwrap().is_nan());
        assert_eq!(out.get(0, 2).unwrap(), 1.0);
    }

    #[test]
    fn test_z_score_clipped() {
        let out = normalize(&grid(&[1.0, 2.0, 3.0, 4.0, 100.0]), NormalizationMethod::ZScore).unwrap();
        for &v in out.data().iter() {
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(out.get(0, 0).unwrap(), 0.0);
        assert_eq!(out.get(0, 4).unwrap(), 1.0);

        let flat = normalize(&grid(&[3.0, 3.0]), NormalizationMethod::ZScore).unwrap();
        assert!(flat.data().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_renormalize_three_and_two() {
        let weights = WeightSet::new()
            .with(LayerRole::Landslide, 0.35)
            .with(LayerRole::Flood, 0.35)
            .with(LayerRole::Exposure, 0.30);

        let all = renormalize(
            &weights,
            &[LayerRole::Landslide, LayerRole::Flood, LayerRole::Exposure],
        )
        .unwrap();
        assert_relative_eq!(all.values().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(all[&LayerRole::Exposure], 0.30, epsilon = 1e-12);

        let two = renormalize(&weights, &[LayerRole::Landslide, LayerRole::Flood]).unwrap();
        assert_relative_eq!(two.values().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(two[&LayerRole::Landslide], 0.5, epsilon = 1e-12);
        assert_relative_eq!(two[&LayerRole::Flood], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_renormalize_errors() {
        let weights = WeightSet::new().with(LayerRole::Flood, 0.4);
        assert!(renormalize(&weights, &[]).is_err());
        assert!(renormalize(&weights, &[LayerRole::Landslide]).is_err());
        assert!(renormalize(&weights, &[LayerRole::Flood, LayerRole::Flood]).is_err());

        let negative = WeightSet::new().with(LayerRole::Flood, -1.0);
        assert!(renormalize(&negative, &[LayerRole::Flood]).is_err());

        let zero = WeightSet::new().with(LayerRole::Flood, 0.0);
        assert!(renormalize(&zero, &[LayerRole::Flood]).is_err());
    }

    #[test]
    fn test_combine_order_invariant() {
        let a = HazardLayer::new(LayerRole::Landslide, grid(&[0.0, 1.0, 3.0]));
        let b = HazardLayer::new(LayerRole::Flood, grid(&[1.0, 0.0, 1.0]));
        let weights = WeightSet::from(&HazardWeights::default());

        let ab = combine(&[a.clone(), b.clone()], &weights, Some(NormalizationMethod::MinMax)).unwrap();
        let ba = combine(&[b, a], &weights, Some(NormalizationMethod::MinMax)).unwrap();
        assert_eq!(ab.data(), ba.data());
        // landslide normalizes to [0, 1/3, 1], flood stays [1, 0, 1]
        assert_relative_eq!(ab.get(0, 1).unwrap(), 0.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(ab.get(0, 2).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_absent_layer_weight_ignored() {
        let a = HazardLayer::new(LayerRole::Landslide, grid(&[0.2, 0.8]));
        let b = HazardLayer::new(LayerRole::Flood, grid(&[1.0, 0.0]));
        let with_exposure = WeightSet::new()
            .with(LayerRole::Landslide, 0.4)
            .with(LayerRole::Flood, 0.4)
            .with(LayerRole::Exposure, 0.2);
        let without = WeightSet::new()
            .with(LayerRole::Landslide, 0.4)
            .with(LayerRole::Flood, 0.4);

        let x = combine(&[a.clone(), b.clone()], &with_exposure, None).unwrap();
        let y = combine(&[a, b], &without, None).unwrap();
        assert_eq!(x.data(), y.data());
        assert_relative_eq!(x.get(0, 0).unwrap(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_combine_nodata_propagates() {
        let a = HazardLayer::new(LayerRole::Landslide, grid(&[0.5, f64::NAN]));
        let b = HazardLayer::new(LayerRole::Flood, grid(&[0.5, 0.5]));
        let out = combine(&[a, b], &WeightSet::from(&HazardWeights::default()), None).unwrap();
        assert!(!out.get(0, 0).unwrap().is_nan());
        assert!(out.get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn test_combine_shape_mismatch() {
        let a = HazardLayer::new(LayerRole::Landslide, grid(&[0.5, 0.5]));
        let b = HazardLayer::new(LayerRole::Flood, grid(&[0.5, 0.5, 0.5]));
        let err = combine(&[a, b], &WeightSet::from(&HazardWeights::default()), None).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("population".parse::<LayerRole>().unwrap(), LayerRole::Population);
        assert!("rainfall".parse::<LayerRole>().is_err());
    }
}
