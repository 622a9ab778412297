//! Grid coverage map
//!
//! The map is the reference coverage collaborator: it paints the ground swept by applying
//! sections and turns each section polygon into an on or off demand depending on how much of it
//! has already been covered.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::{HashMap, HashSet};
use log::trace;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// Internal
use crate::params::ConfigError;
use crate::section::{Polygon, SectionDemand, SectionId, MAX_SECTIONS};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Polygons spanning more cells than this along either axis are not painted or sampled.
const MAX_CELLS_PER_AXIS: i64 = 4096;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the coverage map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CoverageMapParams {
    /// Size of a grid cell.
    ///
    /// Units: meters
    pub cell_size_m: f64,

    /// Fraction of a section polygon which must already be covered for the section to be
    /// demanded off.
    pub covered_threshold: f64,
}

/// Current state of one section as seen by the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionStrip {
    pub id: SectionId,
    pub is_on: bool,

    /// Left and right edge of the section at the implement.
    pub edges: (Point2<f64>, Point2<f64>),
}

/// A set of covered grid cells.
#[derive(Debug, Clone)]
pub struct CoverageMap {
    params: CoverageMapParams,
    cells: HashSet<(i64, i64)>,
    last_edges: HashMap<SectionId, (Point2<f64>, Point2<f64>)>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for CoverageMapParams {
    fn default() -> Self {
        Self {
            cell_size_m: 0.5,
            covered_threshold: 0.8,
        }
    }
}

impl CoverageMapParams {
    /// Check the parameters, the cell size must be positive and the threshold a fraction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cell_size_m.is_finite() || self.cell_size_m <= 0.0 {
            return Err(ConfigError::InvalidParam {
                name: "cell_size_m",
                value: self.cell_size_m,
            });
        }

        if !(0.0..=1.0).contains(&self.covered_threshold) {
            return Err(ConfigError::InvalidParam {
                name: "covered_threshold",
                value: self.covered_threshold,
            });
        }

        Ok(())
    }
}

impl Default for CoverageMap {
    fn default() -> Self {
        Self::new(CoverageMapParams::default())
    }
}

impl CoverageMap {
    pub fn new(params: CoverageMapParams) -> Self {
        Self {
            params,
            cells: HashSet::new(),
            last_edges: HashMap::new(),
        }
    }

    /// Forget all covered ground.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.last_edges.clear();
    }

    pub fn num_covered_cells(&self) -> usize {
        self.cells.len()
    }

    /// Covered area.
    ///
    /// Units: square meters
    pub fn covered_area_m2(&self) -> f64 {
        self.cells.len() as f64 * self.params.cell_size_m.powi(2)
    }

    /// Paint the ground swept by each applying section since its previous update.
    pub fn update(&mut self, strips: &[SectionStrip]) {
        for strip in strips {
            if !strip.is_on {
                self.last_edges.remove(&strip.id);
                continue;
            }

            if let Some((last_left, last_right)) = self.last_edges.get(&strip.id).copied() {
                let (left, right) = strip.edges;
                self.mark(&Polygon {
                    corners: [last_left, last_right, right, left],
                });
            }

            self.last_edges.insert(strip.id, strip.edges);
        }
    }

    /// Mark every cell whose centre lies inside the polygon.
    pub fn mark(&mut self, polygon: &Polygon) {
        let cells = self.cells_in(polygon);
        trace!("Marking {} cells", cells.len());
        self.cells.extend(cells);
    }

    /// Fraction of the polygon's cells which are already covered, zero for a polygon containing
    /// no cell centres.
    pub fn covered_fraction(&self, polygon: &Polygon) -> f64 {
        let cells = self.cells_in(polygon);
        if cells.is_empty() {
            return 0.0;
        }

        let covered = cells.iter().filter(|c| self.cells.contains(c)).count();
        covered as f64 / cells.len() as f64
    }

    /// Demand for each section from its look-ahead polygon.
    pub fn demands(&self, polygons: &[Polygon]) -> [SectionDemand; MAX_SECTIONS] {
        let mut demands = [SectionDemand::None; MAX_SECTIONS];

        for (d, p) in demands.iter_mut().zip(polygons.iter()) {
            *d = if self.covered_fraction(p) >= self.params.covered_threshold {
                SectionDemand::Off
            }
            else {
                SectionDemand::On
            };
        }

        demands
    }

    fn cells_in(&self, polygon: &Polygon) -> Vec<(i64, i64)> {
        let cs = self.params.cell_size_m;
        if !cs.is_finite() || cs <= 0.0 {
            return Vec::new();
        }

        let (min, max) = polygon.bounding_box();

        let x0 = (min.x / cs).floor() as i64;
        let x1 = (max.x / cs).floor() as i64;
        let y0 = (min.y / cs).floor() as i64;
        let y1 = (max.y / cs).floor() as i64;

        match (x1.checked_sub(x0), y1.checked_sub(y0)) {
            (Some(dx), Some(dy)) if dx <= MAX_CELLS_PER_AXIS && dy <= MAX_CELLS_PER_AXIS => (),
            _ => return Vec::new(),
        }

        let mut cells = Vec::new();
        for ix in x0..=x1 {
            for iy in y0..=y1 {
                let centre = Point2::new((ix as f64 + 0.5) * cs, (iy as f64 + 0.5) * cs);
                if polygon.contains(&centre) {
                    cells.push((ix, iy));
                }
            }
        }

        cells
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::section::SectionIndex;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon {
        Polygon {
            corners: [
                Point2::new(x0, y0),
                Point2::new(x1, y0),
                Point2::new(x1, y1),
                Point2::new(x0, y1),
            ],
        }
    }

    #[test]
    fn test_mark_and_fraction() {
        let mut map = CoverageMap::default();
        map.mark(&rect(0.0, 0.0, 2.0, 2.0));

        assert_eq!(map.num_covered_cells(), 16);
        assert!((map.covered_area_m2() - 4.0).abs() < 1e-9);

        assert_eq!(map.covered_fraction(&rect(0.0, 0.0, 2.0, 2.0)), 1.0);
        assert_eq!(map.covered_fraction(&rect(0.0, 0.0, 4.0, 2.0)), 0.5);
        assert_eq!(map.covered_fraction(&rect(10.0, 10.0, 11.0, 11.0)), 0.0);

        map.clear();
        assert_eq!(map.num_covered_cells(), 0);
    }

    #[test]
    fn test_demands() {
        let mut map = CoverageMap::default();
        map.mark(&rect(0.0, 0.0, 2.0, 10.0));

        let demands = map.demands(&[rect(0.0, 5.0, 2.0, 6.0), rect(2.0, 5.0, 4.0, 6.0)]);
        assert_eq!(demands[0], SectionDemand::Off);
        assert_eq!(demands[1], SectionDemand::On);
        assert_eq!(demands[2], SectionDemand::None);
    }

    #[test]
    fn test_params_validation() {
        CoverageMapParams::default().validate().unwrap();

        let bad = |cell_size_m: f64, covered_threshold: f64| {
            CoverageMapParams {
                cell_size_m,
                covered_threshold,
            }
            .validate()
        };
        assert!(matches!(
            bad(0.0, 0.8),
            Err(ConfigError::InvalidParam { name: "cell_size_m", .. })
        ));
        assert!(bad(-0.5, 0.8).is_err());
        assert!(bad(f64::NAN, 0.8).is_err());
        assert!(matches!(
            bad(0.5, 1.5),
            Err(ConfigError::InvalidParam { name: "covered_threshold", .. })
        ));
        assert!(bad(0.5, -0.1).is_err());
        assert!(bad(0.5, f64::NAN).is_err());
    }

    #[test]
    fn test_degenerate_cells_do_not_panic() {
        // A zero cell size slips past validation when the map is built directly
        let mut map = CoverageMap::new(CoverageMapParams {
            cell_size_m: 0.0,
            covered_threshold: 0.8,
        });
        map.mark(&rect(0.0, 0.0, 2.0, 2.0));
        assert_eq!(map.num_covered_cells(), 0);
        assert_eq!(map.demands(&[rect(0.0, 0.0, 2.0, 2.0)])[0], SectionDemand::On);

        // Huge coordinates overflow the cell span
        let map = CoverageMap::default();
        assert_eq!(map.covered_fraction(&rect(-1e300, -1e300, 1e300, 1e300)), 0.0);
    }

    #[test]
    fn test_update_paints_swept_ground() {
        let mut map = CoverageMap::default();
        let id = SectionId::Individual(SectionIndex::new(0).unwrap());

        let strip = |y: f64, is_on: bool| SectionStrip {
            id,
            is_on,
            edges: (Point2::new(0.0, y), Point2::new(2.0, y)),
        };

        // The first update only records the edges
        map.update(&[strip(0.0, true)]);
        assert_eq!(map.num_covered_cells(), 0);

        map.update(&[strip(3.0, true)]);
        assert_eq!(map.num_covered_cells(), 24);

        // Off then on again starts a new strip, the gap is not painted
        map.update(&[strip(4.0, false)]);
        map.update(&[strip(6.0, true)]);
        map.update(&[strip(7.0, true)]);
        assert_eq!(map.num_covered_cells(), 32);
    }
}
