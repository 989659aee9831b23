//! Binary segmentation by thresholding
//!
//! One entry point covers both manual and automatic (Otsu) threshold
//! selection. A cell is flagged iff it is valid and strictly below the
//! threshold, so low-backscatter water comes out as 1.

use hazmap_core::raster::Raster;
use hazmap_core::{Algorithm, Error, Result};
use tracing::debug;

/// Number of histogram bins used by Otsu's method
pub const OTSU_BINS: usize = 256;

/// How the threshold is chosen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdMode {
    /// Fixed threshold in raster units
    Manual(f64),
    /// Otsu's method over the valid cells
    Otsu,
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Otsu
    }
}

/// A binary mask together with the threshold that produced it
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// 1 where valid and below the threshold, else 0
    pub mask: Raster<u8>,
    /// Threshold actually applied
    pub threshold: f64,
}

/// Threshold segmentation algorithm
#[derive(Debug, Clone, Default)]
pub struct Threshold;

impl Algorithm for Threshold {
    type Input = Raster<f64>;
    type Output = Segmentation;
    type Params = ThresholdMode;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Threshold"
    }

    fn description(&self) -> &'static str {
        "Binary mask of valid cells strictly below a manual or Otsu threshold"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        threshold(&input, params)
    }
}

/// Segment a raster into a 0/1 mask
///
/// # Errors
/// - `EmptyInput` in Otsu mode when the raster has no valid cells
/// - `InvalidParameter` for a non-finite manual threshold
pub fn threshold(grid: &Raster<f64>, mode: ThresholdMode) -> Result<Segmentation> {
    let threshold = match mode {
        ThresholdMode::Manual(t) => {
            if !t.is_finite() {
                return Err(Error::invalid("threshold", t, "must be finite"));
            }
            t
        }
        ThresholdMode::Otsu => otsu_threshold(grid)?,
    };
    debug!("segmenting with threshold {:.4} ({:?})", threshold, mode);

    let mask = grid
        .data()
        .map(|&v| u8::from(!grid.is_nodata(v) && v < threshold));

    Ok(Segmentation {
        mask: grid.derive(mask, None)?,
        threshold,
    })
}

fn finite_values(grid: &Raster<f64>) -> impl Iterator<Item = f64> + '_ {
    grid.valid_values().filter(|v| v.is_finite())
}

/// Otsu threshold over the valid cells of a raster
///
/// Builds a 256-bin histogram spanning [min, max] of the valid values and
/// returns the centre of the bin that maximizes between-class variance.
/// The first maximum wins on ties. A single-valued raster yields that value.
///
/// Infinite values carry no histogram position and are skipped.
///
/// # Errors
/// `EmptyInput` if the raster has no valid finite cells.
pub fn otsu_threshold(grid: &Raster<f64>) -> Result<f64> {
    let (min, max, total) = finite_values(grid).fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0usize),
        |(lo, hi, n), v| (lo.min(v), hi.max(v), n + 1),
    );
    if total == 0 {
        return Err(Error::EmptyInput("otsu threshold"));
    }
    if max <= min {
        return Ok(min);
    }

    let bin_width = (max - min) / OTSU_BINS as f64;
    let mut histogram = [0usize; OTSU_BINS];
    for v in finite_values(grid) {
        let bin = (((v - min) / bin_width) as usize).min(OTSU_BINS - 1);
        histogram[bin] += 1;
    }
    let center = |i: usize| min + bin_width * (i as f64 + 0.5);

    let total = total as f64;
    let sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| center(i) * count as f64)
        .sum();

    let mut sum_b = 0.0;
    let mut weight_b = 0.0;
    let mut max_variance = f64::NEG_INFINITY;
    let mut best = 0;

    // Split after bin i: background is bins 0..=i
    for (i, &count) in histogram.iter().enumerate().take(OTSU_BINS - 1) {
        weight_b += count as f64;
        sum_b += center(i) * count as f64;

        let weight_f = total - weight_b;
        if weight_b == 0.0 || weight_f == 0.0 {
            continue;
        }
        let mean_b = sum_b / weight_b;
        let mean_f = (sum - sum_b) / weight_f;
        let variance = weight_b * weight_f * (mean_b - mean_f).powi(2);

        if variance > max_variance {
            max_variance = variance;
            best = i;
        }
    }

    Ok(center(best))
}
