//! Binary erosion and dilation
//!
//! Masks are `Raster<u8>` where any non-zero value is foreground. Cells
//! outside the grid count as background, so erosion eats foreground that
//! touches the border.

use crate::maybe_rayon::*;
use hazmap_core::raster::Raster;
use hazmap_core::{Algorithm, Error, Result};
use ndarray::Array2;

use super::element::StructuringElement;

/// Parameters shared by the binary morphology operations
#[derive(Debug, Clone)]
pub struct MorphologyParams {
    /// Structuring element shape
    pub element: StructuringElement,
    /// Number of times the base operation is repeated
    pub iterations: usize,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            element: StructuringElement::default(),
            iterations: 1,
        }
    }
}

#[derive(Clone, Copy)]
enum Rule {
    /// Every element cell in bounds and set
    All,
    /// Any in-bounds element cell set
    Any,
}

fn filter(mask: &Raster<u8>, offsets: &[(isize, isize)], rule: Rule) -> Result<Raster<u8>> {
    let (rows, cols) = mask.shape();
    let data = mask.data();

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let mut hits = offsets.iter().map(|&(dr, dc)| {
                    let r = row as isize + dr;
                    let c = col as isize + dc;
                    r >= 0
                        && c >= 0
                        && (r as usize) < rows
                        && (c as usize) < cols
                        && data[(r as usize, c as usize)] != 0
                });
                let set = match rule {
                    Rule::All => hits.all(|h| h),
                    Rule::Any => hits.any(|h| h),
                };
                *out = u8::from(set);
            }

            row_data
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;
    mask.derive(array, mask.nodata())
}

fn repeat(
    mask: &Raster<u8>,
    element: &StructuringElement,
    iterations: usize,
    rule: Rule,
) -> Result<Raster<u8>> {
    element.validate()?;
    if iterations == 0 {
        return Err(Error::invalid("iterations", 0, "must be at least 1"));
    }
    let offsets = element.offsets();
    let mut current = filter(mask, &offsets, rule)?;
    for _ in 1..iterations {
        current = filter(&current, &offsets, rule)?;
    }
    Ok(current)
}

/// Binary erosion, applied `iterations` times
pub fn erode(mask: &Raster<u8>, element: &StructuringElement, iterations: usize) -> Result<Raster<u8>> {
    repeat(mask, element, iterations, Rule::All)
}

/// Binary dilation, applied `iterations` times
pub fn dilate(mask: &Raster<u8>, element: &StructuringElement, iterations: usize) -> Result<Raster<u8>> {
    repeat(mask, element, iterations, Rule::Any)
}

/// Opening: erosion×k then dilation×k. Removes specks narrower than the element.
pub fn opening(mask: &Raster<u8>, element: &StructuringElement, iterations: usize) -> Result<Raster<u8>> {
    let eroded = erode(mask, element, iterations)?;
    dilate(&eroded, element, iterations)
}

/// Closing: dilation×k then erosion×k. Fills gaps narrower than the element.
pub fn closing(mask: &Raster<u8>, element: &StructuringElement, iterations: usize) -> Result<Raster<u8>> {
    let dilated = dilate(mask, element, iterations)?;
    erode(&dilated, element, iterations)
}

/// Opening algorithm
#[derive(Debug, Clone, Default)]
pub struct Opening;

impl Algorithm for Opening {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = MorphologyParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Opening"
    }

    fn description(&self) -> &'static str {
        "Binary opening (erosion then dilation) to remove small foreground specks"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        opening(&input, &params.element, params.iterations)
    }
}

/// Closing algorithm
#[derive(Debug, Clone, Default)]
pub struct Closing;

impl Algorithm for Closing {
    type Input = Raster<u8>;
    type Output = Raster<u8>;
    type Params = MorphologyParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Closing"
    }

    fn description(&self) -> &'static str {
        "Binary closing (dilation then erosion) to fill small background gaps"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        closing(&input, &params.element, params.iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Raster<u8> {
        let cols = rows[0].len();
        let data: Vec<u8> = rows
            .iter()
            .flat_map(|r| r.bytes().map(|b| u8::from(b == b'#')))
            .collect();
        Raster::from_vec(data, rows.len(), cols).unwrap()
    }

    fn count(mask: &Raster<u8>) -> usize {
        mask.data().iter().filter(|&&v| v != 0).count()
    }

    #[test]
    fn test_erode_cross() {
        let mask = mask_from(&[
            ".....",
            ".###.",
            ".###.",
            ".###.",
            ".....",
        ]);
        let out = erode(&mask, &StructuringElement::Cross(1), 1).unwrap();
        assert_eq!(count(&out), 1);
        assert_eq!(out.get(2, 2).unwrap(), 1);
    }

    #[test]
    fn test_border_is_background() {
        let full = Raster::filled(3, 3, 1u8);
        let out = erode(&full, &StructuringElement::Cross(1), 1).unwrap();
        assert_eq!(count(&out), 1);
    }

    #[test]
    fn test_dilate_cross() {
        let mask = mask_from(&[".....", ".....", "..#..", ".....", "....."]);
        let out = dilate(&mask, &StructuringElement::Cross(1), 2).unwrap();
        // diamond of radius 2
        assert_eq!(count(&out), 13);
        assert_eq!(out.get(0, 2).unwrap(), 1);
        assert_eq!(out.get(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_opening_removes_speck() {
        let mask = mask_from(&[
            "#.......",
            "........",
            "...###..",
            "...###..",
            "...###..",
            "........",
        ]);
        let out = opening(&mask, &StructuringElement::Cross(1), 1).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), 0);
        assert_eq!(out.get(3, 4).unwrap(), 1);
        assert_eq!(out.shape(), mask.shape());
    }

    #[test]
    fn test_closing_fills_hole() {
        let mask = mask_from(&[
            ".......",
            ".#####.",
            ".#####.",
            ".##.##.",
            ".#####.",
            ".#####.",
            ".......",
        ]);
        let out = closing(&mask, &StructuringElement::Cross(1), 1).unwrap();
        assert_eq!(out.get(3, 3).unwrap(), 1);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mask = Raster::filled(3, 3, 0u8);
        assert!(erode(&mask, &StructuringElement::Cross(1), 0).is_err());
        assert!(dilate(&mask, &StructuringElement::Cross(0), 1).is_err());
    }
}
