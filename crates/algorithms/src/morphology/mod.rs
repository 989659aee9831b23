//! Binary mathematical morphology for mask cleanup
//!
//! - **Erosion**: keep a cell only if its whole element is foreground
//! - **Dilation**: set a cell if any element cell is foreground
//! - **Opening**: erosion then dilation (removes small specks)
//! - **Closing**: dilation then erosion (fills small gaps)
//! - **Clean**: opening then closing with a 4-connected cross

mod binary;
mod element;

pub use binary::{closing, dilate, erode, opening, Closing, MorphologyParams, Opening};
pub use element::StructuringElement;

use hazmap_core::raster::Raster;
use hazmap_core::{Error, Result};

/// Opening followed by closing, each with `kernel_size` iterations of the
/// 4-connected cross. Output has the input's shape.
///
/// # Errors
/// `InvalidParameter` if `kernel_size` is 0.
pub fn clean(mask: &Raster<u8>, kernel_size: usize) -> Result<Raster<u8>> {
    if kernel_size == 0 {
        return Err(Error::invalid("kernel_size", 0, "must be at least 1"));
    }
    let element = StructuringElement::Cross(1);
    let opened = opening(mask, &element, kernel_size)?;
    closing(&opened, &element, kernel_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_keeps_large_blob() {
        let mut mask = Raster::filled(20, 20, 0u8);
        for row in 4..16 {
            for col in 4..16 {
                mask.set(row, col, 1).unwrap();
            }
        }
        mask.set(0, 19, 1).unwrap();

        let out = clean(&mask, 1).unwrap();
        assert_eq!(out.shape(), (20, 20));
        assert_eq!(out.get(0, 19).unwrap(), 0);
        assert_eq!(out.get(10, 10).unwrap(), 1);
    }

    #[test]
    fn test_clean_zero_kernel() {
        let mask = Raster::filled(4, 4, 1u8);
        assert!(clean(&mask, 0).is_err());
    }

    #[test]
    fn test_clean_empty_mask_stays_empty() {
        let mask = Raster::filled(8, 8, 0u8);
        let out = clean(&mask, 3).unwrap();
        assert!(out.data().iter().all(|&v| v == 0));
    }
}
