//! Landslide susceptibility
//!
//! Terrain derivatives and optional environmental layers are stacked into
//! per-cell feature vectors. A [`ProbabilityModel`] turns the valid vectors
//! into probabilities; classification and vectorization happen downstream.
//!
//! A cell is valid when every feature is finite and none equals
//! [`FEATURE_NODATA`].

use crate::terrain::TerrainDerivatives;
use hazmap_core::raster::{Raster, RasterElement};
use hazmap_core::{Error, Result};
use ndarray::Array2;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Sentinel treated as missing in any feature layer
pub const FEATURE_NODATA: f64 = -9999.0;

/// Anything that maps feature vectors to landslide probabilities
pub trait ProbabilityModel {
    /// One probability in [0, 1] per sample, in input order
    fn predict_probability(&self, samples: &[Vec<f64>]) -> Result<Vec<f64>>;
}

impl<F> ProbabilityModel for F
where
    F: Fn(&[f64]) -> f64,
{
    fn predict_probability(&self, samples: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(samples.iter().map(|s| self(s)).collect())
    }
}

/// Logistic regression with fixed coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl ProbabilityModel for LogisticModel {
    fn predict_probability(&self, samples: &[Vec<f64>]) -> Result<Vec<f64>> {
        samples
            .iter()
            .map(|s| {
                if s.len() != self.coefficients.len() {
                    return Err(Error::invalid(
                        "features",
                        s.len(),
                        format!("model expects {} features", self.coefficients.len()),
                    ));
                }
                let z: f64 = self.intercept
                    + s.iter().zip(&self.coefficients).map(|(x, b)| x * b).sum::<f64>();
                Ok(1.0 / (1.0 + (-z).exp()))
            })
            .collect()
    }
}

/// Named, co-registered feature layers
#[derive(Debug, Clone)]
pub struct FeatureStack {
    names: Vec<String>,
    layers: Vec<Raster<f64>>,
}

impl FeatureStack {
    /// Empty stack; the first layer fixes the grid
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            layers: Vec::new(),
        }
    }

    /// Slope, aspect and curvature of `dem`, in that order
    pub fn from_dem(dem: &Raster<f64>, cell_size: f64) -> Result<Self> {
        let terrain = TerrainDerivatives::compute(dem, cell_size)?;
        Self::new()
            .with_layer("slope", &terrain.slope)?
            .with_layer("aspect", &terrain.aspect)?
            .with_layer("curvature", &terrain.curvature)
    }

    /// Append a layer; no-data cells are stored as NaN
    ///
    /// # Errors
    /// `SizeMismatch` if the layer does not match the stack's grid.
    pub fn with_layer<T: RasterElement>(mut self, name: impl Into<String>, layer: &Raster<T>) -> Result<Self> {
        self.push(name, layer)?;
        Ok(self)
    }

    pub fn push<T: RasterElement>(&mut self, name: impl Into<String>, layer: &Raster<T>) -> Result<()> {
        if let Some(first) = self.layers.first() {
            first.ensure_same_shape(layer)?;
        }
        self.names.push(name.into());
        self.layers.push(layer.to_f64());
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_features(&self) -> usize {
        self.layers.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.layers.first().map_or((0, 0), |l| l.shape())
    }

    /// Grid the stack lives on
    pub fn template(&self) -> Result<&Raster<f64>> {
        self.layers.first().ok_or(Error::EmptyInput("feature stack"))
    }

    /// Feature vector at a cell, `None` if any feature is missing
    pub fn sample(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        self.layers
            .iter()
            .map(|l| {
                let v = l.data().get((row, col)).copied()?;
                (v.is_finite() && v != FEATURE_NODATA).then_some(v)
            })
            .collect()
    }

    /// Valid cells in scan order with their feature vectors
    fn valid_samples(&self) -> (Vec<(usize, usize)>, Vec<Vec<f64>>) {
        let (rows, cols) = self.shape();
        let mut cells = Vec::new();
        let mut samples = Vec::new();
        for row in 0..rows {
            for col in 0..cols {
                if let Some(s) = self.sample(row, col) {
                    cells.push((row, col));
                    samples.push(s);
                }
            }
        }
        (cells, samples)
    }
}

impl Default for FeatureStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Probability grid from a feature stack and a model
///
/// Invalid cells are NaN, which is also the output's no-data value.
///
/// # Errors
/// - `EmptyInput` for a stack without layers
/// - whatever the model returns, or `Other` if it returns the wrong number
///   of probabilities
/// - `InvalidParameter` for a probability outside [0, 1]
pub fn predict_susceptibility<M: ProbabilityModel + ?Sized>(stack: &FeatureStack, model: &M) -> Result<Raster<f64>> {
    let template = stack.template()?;
    let (cells, samples) = stack.valid_samples();
    info!(
        "predicting susceptibility for {} of {} cells ({} features)",
        cells.len(),
        template.len(),
        stack.n_features()
    );

    let probabilities = model.predict_probability(&samples)?;
    if probabilities.len() != samples.len() {
        return Err(Error::Other(format!(
            "model returned {} probabilities for {} samples",
            probabilities.len(),
            samples.len()
        )));
    }

    let mut grid = Array2::from_elem(template.shape(), f64::NAN);
    for (&(row, col), &p) in cells.iter().zip(&probabilities) {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::invalid("probability", p, "must lie in [0, 1]"));
        }
        grid[(row, col)] = p;
    }

    template.derive(grid, Some(f64::NAN))
}

/// Labelled feature vectors for fitting an external classifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub samples: Vec<Vec<f64>>,
    /// 1 for landslide, 0 for not
    pub labels: Vec<u8>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    pub fn negatives(&self) -> usize {
        self.len() - self.positives()
    }
}

/// Positive samples at inventory points plus as many negatives
///
/// Points are in the stack's CRS. Points outside the grid or on invalid
/// cells are skipped, and a cell hit by several points counts once.
/// Negatives are spread evenly over the valid cells without a landslide,
/// in scan order, so the result is reproducible.
///
/// # Errors
/// - `MissingDependency` when `inventory` is `None`
/// - `EmptyInput` when no point lands on a valid cell
pub fn training_samples(stack: &FeatureStack, inventory: Option<&[(f64, f64)]>) -> Result<TrainingSet> {
    let points = inventory.ok_or_else(|| {
        Error::MissingDependency("landslide inventory is required for training samples".into())
    })?;
    let template = stack.template()?;

    let mut hit = HashSet::new();
    let mut set = TrainingSet::default();
    for &(x, y) in points {
        let Some((row, col)) = template.cell_at(x, y) else {
            debug!("inventory point ({}, {}) is outside the grid", x, y);
            continue;
        };
        if !hit.insert((row, col)) {
            continue;
        }
        match stack.sample(row, col) {
            Some(s) => {
                set.samples.push(s);
                set.labels.push(1);
            }
            None => debug!("inventory point ({}, {}) is on an invalid cell", x, y),
        }
    }

    let positives = set.len();
    if positives == 0 {
        return Err(Error::EmptyInput("inventory points inside the grid"));
    }

    let (cells, samples) = stack.valid_samples();
    let candidates: Vec<Vec<f64>> = cells
        .into_iter()
        .zip(samples)
        .filter(|(cell, _)| !hit.contains(cell))
        .map(|(_, s)| s)
        .collect();

    let wanted = positives.min(candidates.len());
    if wanted < positives {
        warn!(
            "only {} negative candidates for {} positives",
            candidates.len(),
            positives
        );
    }
    for i in 0..wanted {
        set.samples.push(candidates[i * candidates.len() / wanted].clone());
        set.labels.push(0);
    }

    info!(
        "training set: {} positive, {} negative samples",
        set.positives(),
        set.negatives()
    );
    Ok(set)
}
