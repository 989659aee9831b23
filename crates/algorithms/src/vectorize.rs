//! Raster to polygon conversion
//!
//! Cells with equal value that touch along an edge (4-connectivity) form one
//! group; each group becomes one polygon, with holes where other values are
//! enclosed. Features come out in raster scan order of each group's first
//! cell.
//!
//! Boundaries are traced on the cell-corner lattice, so polygon areas are
//! exact multiples of the cell area.

use geo::Area;
use geo_types::{Coord, LineString, Polygon};
use hazmap_core::raster::{GeoTransform, Neighborhood, Raster, RasterElement};
use hazmap_core::vector::{Feature, FeatureCollection};
use hazmap_core::{Algorithm, Error, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

/// Class value → class name used for the `class` property
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelNames(BTreeMap<i64, String>);

impl LabelNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names for a binary flood mask
    pub fn flood() -> Self {
        [(0, "no_flood"), (1, "flood")].into_iter().collect()
    }

    pub fn insert(&mut self, value: i64, name: impl Into<String>) {
        self.0.insert(value, name.into());
    }

    pub fn get(&self, value: i64) -> Option<&str> {
        self.0.get(&value).map(String::as_str)
    }

    /// Name for `value`, falling back to `Class_<value>`
    pub fn label(&self, value: i64) -> String {
        self.get(value)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Class_{}", value))
    }
}

impl<S: Into<String>> FromIterator<(i64, S)> for LabelNames {
    fn from_iter<I: IntoIterator<Item = (i64, S)>>(iter: I) -> Self {
        LabelNames(iter.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Vectorization algorithm
#[derive(Debug, Clone, Default)]
pub struct Vectorize;

impl Algorithm for Vectorize {
    type Input = Raster<u8>;
    type Output = FeatureCollection;
    type Params = LabelNames;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Vectorize"
    }

    fn description(&self) -> &'static str {
        "Convert 4-connected groups of equal-valued cells into polygons"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        vectorize(&input, &params)
    }
}

/// Lattice vertex: (x = column, y = row) of a cell corner
type Vertex = (i64, i64);

/// Polygonize a classified grid
///
/// No-data cells belong to no polygon. Each feature carries `value` (the
/// cell value as an integer) and `class` (its name from `names`, or
/// `Class_<value>`). Coordinates are in the grid's CRS.
pub fn vectorize<T: RasterElement>(grid: &Raster<T>, names: &LabelNames) -> Result<FeatureCollection> {
    let (labels, groups) = label_groups(grid);
    let transform = grid.transform();

    let mut collection = FeatureCollection::new().with_crs(grid.crs().cloned());
    for (id, group) in groups.iter().enumerate() {
        let rings = trace_rings(&group.cells, &labels, id);
        let polygon = build_polygon(rings, transform).ok_or_else(|| {
            Error::Other(format!("group {} has no boundary", id))
        })?;

        let value = group
            .value
            .to_f64()
            .map(|v| v.round() as i64)
            .ok_or_else(|| Error::UnsupportedDataType(format!("{:?}", group.value)))?;

        collection.push(
            Feature::new(polygon)
                .with_property("value", value)
                .with_property("class", names.label(value)),
        );
    }

    debug!("vectorized {} groups", collection.len());
    Ok(collection)
}

/// Drop polygon features smaller than `min_area` (CRS units squared)
pub fn filter_min_area(collection: FeatureCollection, min_area: f64) -> FeatureCollection {
    let crs = collection.crs.clone();
    let before = collection.len();
    let features: Vec<Feature> = collection
        .into_iter()
        .filter(|f| f.geometry.as_ref().map_or(0.0, |g| g.unsigned_area()) >= min_area)
        .collect();
    debug!("min area {}: kept {} of {} features", min_area, features.len(), before);
    FeatureCollection { features, crs }
}

struct Group<T> {
    value: T,
    cells: Vec<(usize, usize)>,
}

const UNLABELED: usize = usize::MAX;

/// Label 4-connected groups of equal valid values in scan order
fn label_groups<T: RasterElement>(grid: &Raster<T>) -> (ndarray::Array2<usize>, Vec<Group<T>>) {
    let (rows, cols) = grid.shape();
    let data = grid.data();
    let mut labels = ndarray::Array2::from_elem((rows, cols), UNLABELED);
    let mut groups = Vec::new();
    let mut queue = VecDeque::new();

    for row in 0..rows {
        for col in 0..cols {
            let value = data[(row, col)];
            if labels[(row, col)] != UNLABELED || grid.is_nodata(value) {
                continue;
            }

            let id = groups.len();
            let mut cells = Vec::new();
            labels[(row, col)] = id;
            queue.push_back((row, col));

            while let Some((r, c)) = queue.pop_front() {
                cells.push((r, c));
                for (nr, nc) in Neighborhood::Rook3x3.neighbors(r, c, rows, cols) {
                    if labels[(nr, nc)] == UNLABELED && data[(nr, nc)] == value {
                        labels[(nr, nc)] = id;
                        queue.push_back((nr, nc));
                    }
                }
            }

            groups.push(Group { value, cells });
        }
    }

    (labels, groups)
}

/// Closed boundary rings of one group, each without a repeated end vertex
///
/// Edges are directed with the group on the right-hand side (screen
/// orientation, y down). Where two cells of the group meet only at a
/// corner the trace turns left, so an enclosed area that touches the
/// exterior at a single vertex becomes a hole rather than a self-touching
/// exterior.
fn trace_rings(cells: &[(usize, usize)], labels: &ndarray::Array2<usize>, id: usize) -> Vec<Vec<Vertex>> {
    let (rows, cols) = labels.dim();
    let outside = |r: i64, c: i64| {
        r < 0 || c < 0 || r >= rows as i64 || c >= cols as i64 || labels[(r as usize, c as usize)] != id
    };

    let mut edges: Vec<(Vertex, Vertex)> = Vec::new();
    for &(row, col) in cells {
        let (r, c) = (row as i64, col as i64);
        if outside(r - 1, c) {
            edges.push(((c, r), (c + 1, r)));
        }
        if outside(r, c + 1) {
            edges.push(((c + 1, r), (c + 1, r + 1)));
        }
        if outside(r + 1, c) {
            edges.push(((c + 1, r + 1), (c, r + 1)));
        }
        if outside(r, c - 1) {
            edges.push(((c, r + 1), (c, r)));
        }
    }

    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut current = start;
        loop {
            used[current] = true;
            let (from, to) = edges[current];
            ring.push(from);

            let heading = (to.0 - from.0, to.1 - from.1);
            let next = match outgoing.get(&to) {
                Some(candidates) => *candidates
                    .iter()
                    .min_by_key(|&&e| {
                        let (a, b) = edges[e];
                        turn_rank(heading, (b.0 - a.0, b.1 - a.1))
                    })
                    .unwrap_or(&start),
                None => start,
            };
            if next == start || used[next] {
                break;
            }
            current = next;
        }
        rings.push(drop_collinear(ring));
    }
    rings
}

/// Left turn first, then straight ahead, then right
fn turn_rank(heading: Vertex, next: Vertex) -> u8 {
    let (dx, dy) = heading;
    if next == (dy, -dx) {
        0
    } else if next == heading {
        1
    } else {
        2
    }
}

fn drop_collinear(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    let dir = |a: Vertex, b: Vertex| ((b.0 - a.0).signum(), (b.1 - a.1).signum());
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            dir(prev, ring[i]) != dir(ring[i], next)
        })
        .map(|i| ring[i])
        .collect()
}

fn signed_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

/// Largest ring is the exterior, the rest are holes
fn build_polygon(mut rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Option<Polygon<f64>> {
    let outer_idx = rings
        .iter()
        .enumerate()
        .max_by_key(|(i, r)| (signed_area(r).abs(), std::cmp::Reverse(*i)))
        .map(|(i, _)| i)?;
    let outer = rings.remove(outer_idx);

    let to_line = |ring: Vec<Vertex>| -> LineString<f64> {
        ring.into_iter()
            .map(|(x, y)| {
                let (gx, gy) = transform.apply(x as f64, y as f64);
                Coord { x: gx, y: gy }
            })
            .collect()
    };

    let holes = rings.into_iter().map(to_line).collect();
    Some(Polygon::new(to_line(outer), holes))
}
