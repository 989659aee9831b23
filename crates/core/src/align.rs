//! Grid alignment: resample rasters onto a reference grid
//!
//! Alignment never reprojects. Rasters with differing known CRS are rejected;
//! rasters with an unknown CRS are assumed to share the reference's.

use crate::error::{Error, Result};
use crate::raster::{Raster, RasterElement};
use ndarray::Array2;
use tracing::debug;

/// Resample every raster onto the grid of `rasters[reference]`.
///
/// The output rasters are f64 with NaN no-data, sharing the reference's
/// shape, transform and CRS. Values are bilinearly interpolated between the
/// four source cell centres around each target cell centre; targets whose
/// interpolation touches a no-data cell, or that fall outside the source
/// footprint, become NaN.
///
/// # Errors
/// - `InvalidParameter` if `reference` is out of range
/// - `CrsMismatch` if a raster's CRS differs from the reference's
/// - `NoOverlap` if a raster's footprint does not intersect the reference
pub fn align<T: RasterElement>(rasters: &[Raster<T>], reference: usize) -> Result<Vec<Raster<f64>>> {
    let target = rasters.get(reference).ok_or_else(|| {
        Error::invalid(
            "reference",
            reference,
            format!("only {} rasters supplied", rasters.len()),
        )
    })?;

    rasters
        .iter()
        .enumerate()
        .map(|(i, src)| {
            if i == reference {
                Ok(target.to_f64())
            } else {
                resample_onto(src, target, i)
            }
        })
        .collect()
}

fn resample_onto<T: RasterElement, R: RasterElement>(
    src: &Raster<T>,
    target: &Raster<R>,
    index: usize,
) -> Result<Raster<f64>> {
    if let (Some(a), Some(b)) = (src.crs(), target.crs()) {
        if !a.is_equivalent(b) {
            return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
        }
    }

    let (sx0, sy0, sx1, sy1) = src.bounds();
    let (tx0, ty0, tx1, ty1) = target.bounds();
    if sx0 >= tx1 || tx0 >= sx1 || sy0 >= ty1 || ty0 >= sy1 {
        return Err(Error::NoOverlap(format!(
            "raster {} ({:.3}, {:.3}, {:.3}, {:.3}) vs reference ({:.3}, {:.3}, {:.3}, {:.3})",
            index, sx0, sy0, sx1, sy1, tx0, ty0, tx1, ty1
        )));
    }

    let values = src.to_f64();
    let (src_rows, src_cols) = values.shape();
    let (rows, cols) = target.shape();

    if src.shape() == target.shape() && src.transform() == target.transform() {
        debug!("raster {} already on the reference grid", index);
        return target.derive(values.into_array(), Some(f64::NAN));
    }

    debug!(
        "resampling raster {} from {}x{} onto {}x{}",
        index, src_cols, src_rows, cols, rows
    );

    let grid = values.data();
    let mut out = Array2::from_elem((rows, cols), f64::NAN);
    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = target.pixel_to_geo(col, row);
            let (fc, fr) = src.geo_to_pixel(x, y);
            if !(0.0..=src_cols as f64).contains(&fc) || !(0.0..=src_rows as f64).contains(&fr) {
                continue;
            }
            out[(row, col)] = bilinear(grid, fc - 0.5, fr - 0.5);
        }
    }

    target.derive(out, Some(f64::NAN))
}

/// Bilinear interpolation at a centre-based fractional position, clamped to
/// the grid edges. NaN in any contributing cell yields NaN.
fn bilinear(grid: &Array2<f64>, col: f64, row: f64) -> f64 {
    let (rows, cols) = grid.dim();
    let col = col.clamp(0.0, (cols - 1) as f64);
    let row = row.clamp(0.0, (rows - 1) as f64);

    let c0 = col.floor() as usize;
    let r0 = row.floor() as usize;
    let c1 = (c0 + 1).min(cols - 1);
    let r1 = (r0 + 1).min(rows - 1);
    let tc = col - c0 as f64;
    let tr = row - r0 as f64;

    let top = grid[(r0, c0)] * (1.0 - tc) + grid[(r0, c1)] * tc;
    let bottom = grid[(r1, c0)] * (1.0 - tc) + grid[(r1, c1)] * tc;
    top * (1.0 - tr) + bottom * tr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::raster::GeoTransform;
    use approx::assert_relative_eq;

    fn ramp(rows: usize, cols: usize, gt: GeoTransform) -> Raster<f64> {
        let data: Vec<f64> = (0..rows * cols).map(|i| (i % cols) as f64).collect();
        Raster::from_vec(data, rows, cols)
            .unwrap()
            .with_transform(gt)
            .with_crs(Some(CRS::from_epsg(32645)))
    }

    #[test]
    fn test_identity_alignment() {
        let gt = GeoTransform::new(0.0, 100.0, 10.0, -10.0);
        let a = ramp(10, 10, gt);
        let b = ramp(10, 10, gt);
        let out = align(&[a.clone(), b], 0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].data(), a.data());
        assert_eq!(out[1].transform(), a.transform());
    }

    #[test]
    fn test_upsample_bilinear() {
        // 2x2 source of 20 m cells onto a 4x4 reference of 10 m cells
        let coarse = ramp(2, 2, GeoTransform::new(0.0, 40.0, 20.0, -20.0));
        let fine: Raster<f64> =
            Raster::new(4, 4).with_transform(GeoTransform::new(0.0, 40.0, 10.0, -10.0));
        let out = align(&[fine, coarse], 0).unwrap();
        let resampled = &out[1];
        assert_eq!(resampled.shape(), (4, 4));
        assert_relative_eq!(resampled.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(resampled.get(0, 1).unwrap(), 0.25);
        assert_relative_eq!(resampled.get(0, 2).unwrap(), 0.75);
        assert_relative_eq!(resampled.get(3, 3).unwrap(), 1.0);
    }

    #[test]
    fn test_no_overlap() {
        let a = ramp(5, 5, GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        let b = ramp(5, 5, GeoTransform::new(1000.0, 50.0, 10.0, -10.0));
        assert!(matches!(align(&[a, b], 0), Err(Error::NoOverlap(_))));
    }

    #[test]
    fn test_crs_mismatch() {
        let gt = GeoTransform::new(0.0, 50.0, 10.0, -10.0);
        let a = ramp(5, 5, gt);
        let b = ramp(5, 5, gt).with_crs(Some(CRS::wgs84()));
        assert!(matches!(align(&[a, b], 0), Err(Error::CrsMismatch(_, _))));
    }

    #[test]
    fn test_bad_reference_index() {
        let a = ramp(2, 2, GeoTransform::default());
        assert!(align(&[a], 3).is_err());
    }
}
