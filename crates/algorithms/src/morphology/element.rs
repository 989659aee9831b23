//! Structuring elements for binary morphology

use hazmap_core::raster::Neighborhood;
use hazmap_core::{Error, Result};

/// Shape of a structuring element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuringElement {
    /// Plus-shaped element of given radius; `Cross(1)` is 4-connectivity
    Cross(usize),
    /// Square element of given radius (side = 2*radius + 1), 8-connectivity
    Square(usize),
    /// Disk element of given radius
    Disk(usize),
}

impl Default for StructuringElement {
    fn default() -> Self {
        StructuringElement::Cross(1)
    }
}

impl StructuringElement {
    pub fn validate(&self) -> Result<()> {
        if self.radius() == 0 {
            return Err(Error::invalid(
                "radius",
                0,
                "structuring element radius must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn radius(&self) -> usize {
        match self {
            StructuringElement::Cross(r)
            | StructuringElement::Square(r)
            | StructuringElement::Disk(r) => *r,
        }
    }

    /// (dr, dc) offsets of the active cells, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        match self {
            StructuringElement::Cross(1) => Neighborhood::Rook3x3.offsets(),
            StructuringElement::Cross(r) => {
                let r = *r as isize;
                Neighborhood::Square(r as usize)
                    .offsets()
                    .into_iter()
                    .filter(|&(dr, dc)| dr == 0 || dc == 0)
                    .collect()
            }
            StructuringElement::Square(r) => Neighborhood::Square(*r).offsets(),
            StructuringElement::Disk(r) => Neighborhood::Circle(*r).offsets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_offsets() {
        let offsets = StructuringElement::Cross(1).offsets();
        assert_eq!(offsets.len(), 5);
        assert!(offsets.contains(&(0, 0)));
        assert!(offsets.contains(&(-1, 0)));
        assert!(offsets.contains(&(0, 1)));
        assert!(!offsets.contains(&(1, 1)));

        assert_eq!(StructuringElement::Cross(2).offsets().len(), 9);
    }

    #[test]
    fn test_square_offsets() {
        assert_eq!(StructuringElement::Square(1).offsets().len(), 9);
    }

    #[test]
    fn test_validate_zero_radius() {
        assert!(StructuringElement::Cross(0).validate().is_err());
        assert!(StructuringElement::Square(0).validate().is_err());
        assert!(StructuringElement::default().validate().is_ok());
    }
}
