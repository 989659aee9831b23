//! Neighborhood shapes for raster analysis

/// Defines a neighborhood pattern around a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighborhood {
    /// 3x3 neighborhood (8 neighbors + center)
    Queen3x3,
    /// 3x3 without corners (4 neighbors + center)
    Rook3x3,
    /// Custom square neighborhood of given radius
    Square(usize),
    /// Circular neighborhood of given radius (in cells)
    Circle(usize),
}

impl Neighborhood {
    /// Get the radius of the neighborhood
    pub fn radius(&self) -> usize {
        match self {
            Neighborhood::Queen3x3 | Neighborhood::Rook3x3 => 1,
            Neighborhood::Square(r) | Neighborhood::Circle(r) => *r,
        }
    }

    /// Check if a relative position is within this neighborhood
    pub fn contains(&self, dr: isize, dc: isize) -> bool {
        match self {
            Neighborhood::Queen3x3 => dr.abs() <= 1 && dc.abs() <= 1,
            Neighborhood::Rook3x3 => dr.abs() + dc.abs() <= 1,
            Neighborhood::Square(r) => {
                let r = *r as isize;
                dr.abs() <= r && dc.abs() <= r
            }
            Neighborhood::Circle(r) => {
                let r = *r as f64;
                (((dr * dr + dc * dc) as f64).sqrt()) <= r
            }
        }
    }

    /// Relative positions in this neighborhood, row-major, center included
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius() as isize;
        (-r..=r)
            .flat_map(|dr| (-r..=r).map(move |dc| (dr, dc)))
            .filter(|&(dr, dc)| self.contains(dr, dc))
            .collect()
    }

    /// Relative positions excluding the center cell
    pub fn offsets_no_center(&self) -> Vec<(isize, isize)> {
        self.offsets()
            .into_iter()
            .filter(|&(dr, dc)| dr != 0 || dc != 0)
            .collect()
    }

    /// Neighbors of `(row, col)` that fall inside a `rows x cols` grid
    pub fn neighbors(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        self.offsets_no_center().into_iter().filter_map(move |(dr, dc)| {
            let r = row as isize + dr;
            let c = col as isize + dc;
            (r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols)
                .then(|| (r as usize, c as usize))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighborhood_offsets() {
        assert_eq!(Neighborhood::Queen3x3.offsets().len(), 9);
        assert_eq!(Neighborhood::Rook3x3.offsets().len(), 5);
        assert_eq!(Neighborhood::Square(2).offsets().len(), 25);
        assert_eq!(Neighborhood::Circle(1).offsets().len(), 5);
    }

    #[test]
    fn test_rook_neighbors_clip_at_border() {
        let corner: Vec<_> = Neighborhood::Rook3x3.neighbors(0, 0, 4, 4).collect();
        assert_eq!(corner, vec![(0, 1), (1, 0)]);

        let inner: Vec<_> = Neighborhood::Rook3x3.neighbors(1, 1, 4, 4).collect();
        assert_eq!(inner.len(), 4);
    }
}
