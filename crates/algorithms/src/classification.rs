//! Threshold classification of continuous grids into ordinal classes
//!
//! A scheme holds ascending upper bounds; a value takes the first class
//! whose bound is >= the value, and anything above the last bound takes the
//! terminal class. Classes are numbered from 1; 0 marks no-data.

use crate::maybe_rayon::*;
use crate::vectorize::LabelNames;
use hazmap_core::config::ClassThresholds;
use hazmap_core::raster::Raster;
use hazmap_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Class value written for no-data cells
pub const NODATA_CLASS: u8 = 0;

/// Ordered (label, upper bound) bins plus a terminal label
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationScheme {
    bins: Vec<(String, f64)>,
    terminal: String,
}

impl ClassificationScheme {
    /// Build a scheme from bins in ascending order
    ///
    /// # Errors
    /// `InvalidParameter` if bounds are not finite and strictly increasing,
    /// or if there are more classes than fit in a `u8`.
    pub fn new<S: Into<String>>(bins: Vec<(S, f64)>, terminal: impl Into<String>) -> Result<Self> {
        let bins: Vec<(String, f64)> = bins.into_iter().map(|(l, b)| (l.into(), b)).collect();

        if bins.len() >= u8::MAX as usize {
            return Err(Error::invalid("bins", bins.len(), "too many classes"));
        }
        if let Some((label, bound)) = bins.iter().find(|(_, b)| !b.is_finite()) {
            return Err(Error::invalid("bounds", bound, format!("bound of {} must be finite", label)));
        }
        if let Some(w) = bins.windows(2).find(|w| w[0].1 >= w[1].1) {
            return Err(Error::invalid(
                "bounds",
                format!("{} >= {}", w[0].1, w[1].1),
                "bounds must be strictly increasing",
            ));
        }

        Ok(Self {
            bins,
            terminal: terminal.into(),
        })
    }

    /// Five-class scheme very_low..very_high from four cut points
    pub fn from_thresholds(thresholds: &ClassThresholds) -> Result<Self> {
        let labels = ClassThresholds::LABELS;
        let bins: Vec<(&str, f64)> = labels[..4]
            .iter()
            .zip(thresholds.bounds())
            .map(|(l, b)| (*l, b))
            .collect();
        Self::new(bins, labels[4])
    }

    /// Number of classes, terminal included
    pub fn len(&self) -> usize {
        self.bins.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Labels in class order (class 1 first)
    pub fn labels(&self) -> Vec<&str> {
        self.bins
            .iter()
            .map(|(l, _)| l.as_str())
            .chain(std::iter::once(self.terminal.as_str()))
            .collect()
    }

    /// Class value → label, for vectorization
    pub fn label_names(&self) -> LabelNames {
        self.labels()
            .into_iter()
            .enumerate()
            .map(|(i, l)| ((i + 1) as i64, l.to_string()))
            .collect()
    }

    /// Class of a value, `None` for NaN
    pub fn class_of(&self, value: f64) -> Option<u8> {
        if value.is_nan() {
            return None;
        }
        let idx = self
            .bins
            .iter()
            .position(|(_, bound)| value <= *bound)
            .unwrap_or(self.bins.len());
        Some(idx as u8 + 1)
    }
}

impl Default for ClassificationScheme {
    fn default() -> Self {
        let labels = ClassThresholds::LABELS;
        let bounds = ClassThresholds::default().bounds();
        Self {
            bins: labels[..4]
                .iter()
                .zip(bounds)
                .map(|(l, b)| (l.to_string(), b))
                .collect(),
            terminal: labels[4].to_string(),
        }
    }
}

/// Classification algorithm
#[derive(Debug, Clone, Default)]
pub struct Classify;

impl Algorithm for Classify {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ClassificationScheme;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Classify"
    }

    fn description(&self) -> &'static str {
        "Discretize a continuous grid into ordinal classes by upper bounds"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        classify(&input, &params)
    }
}

/// Classify a grid; the result has no-data value 0
pub fn classify(grid: &Raster<f64>, scheme: &ClassificationScheme) -> Result<Raster<u8>> {
    let (rows, cols) = grid.shape();
    let data = grid.data();

    let classes: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let v = data[(row, col)];
                    if grid.is_nodata(v) {
                        NODATA_CLASS
                    } else {
                        scheme.class_of(v).unwrap_or(NODATA_CLASS)
                    }
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), classes).map_err(|e| Error::Other(e.to_string()))?;
    grid.derive(array, Some(NODATA_CLASS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scheme() {
        let scheme = ClassificationScheme::default();
        assert_eq!(scheme.len(), 5);
        assert_eq!(scheme.class_of(0.0), Some(1));
        assert_eq!(scheme.class_of(0.2), Some(1));
        assert_eq!(scheme.class_of(0.2000001), Some(2));
        assert_eq!(scheme.class_of(0.8), Some(4));
        assert_eq!(scheme.class_of(0.81), Some(5));
        assert_eq!(scheme.class_of(f64::INFINITY), Some(5));
        assert_eq!(scheme.class_of(f64::NEG_INFINITY), Some(1));
        assert_eq!(scheme.class_of(f64::NAN), None);
        assert_eq!(
            scheme,
            ClassificationScheme::from_thresholds(&ClassThresholds::default()).unwrap()
        );
    }

    #[test]
    fn test_monotone_labels() {
        let scheme = ClassificationScheme::default();
        let mut last = 0;
        for i in -10..=110 {
            let class = scheme.class_of(i as f64 / 100.0).unwrap();
            assert!(class >= last);
            assert!((1..=5).contains(&class));
            last = class;
        }
    }

    #[test]
    fn test_invalid_bounds() {
        assert!(ClassificationScheme::new(vec![("a", 0.5), ("b", 0.5)], "c").is_err());
        assert!(ClassificationScheme::new(vec![("a", 0.6), ("b", 0.4)], "c").is_err());
        assert!(ClassificationScheme::new(vec![("a", f64::NAN)], "b").is_err());
    }

    #[test]
    fn test_classify_grid() {
        let grid = Raster::from_vec(vec![0.1, 0.5, f64::NAN, -9999.0, 0.95, 0.4], 2, 3)
            .unwrap()
            .with_nodata(Some(-9999.0));
        let classes = classify(&grid, &ClassificationScheme::default()).unwrap();
        let values: Vec<u8> = classes.data().iter().copied().collect();
        assert_eq!(values, vec![1, 3, 0, 0, 5, 2]);
        assert_eq!(classes.nodata(), Some(0));
    }

    #[test]
    fn test_label_names() {
        let names = ClassificationScheme::default().label_names();
        assert_eq!(names.get(1), Some("very_low"));
        assert_eq!(names.get(5), Some("very_high"));
        assert_eq!(names.label(9), "Class_9");
    }
}
