//! Lateral section geometry and the per-tick section polygons

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Point2;
use serde::Serialize;

// Internal
use super::{SectionId, SectionIndex, MAX_SECTIONS};
use crate::params::{ConfigError, ToolParams};
use crate::pose::VehiclePose;
use util::maths::body_to_world;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Left and right edge of a section relative to the implement centreline, positive to the right.
#[derive(Debug, Copy, Clone, Default, Serialize, PartialEq)]
pub struct SectionBounds {
    pub left_m: f64,
    pub right_m: f64,
}

/// The lateral layout of all sections of the implement.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SectionLayout {
    bounds: Vec<SectionBounds>,
}

/// A convex quadrilateral in the local frame.
///
/// Corners are stored rear-left, rear-right, front-right, front-left.
#[derive(Debug, Copy, Clone, Serialize, PartialEq)]
pub struct Polygon {
    pub corners: [Point2<f64>; 4],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SectionBounds {
    pub fn width_m(&self) -> f64 {
        self.right_m - self.left_m
    }

    pub fn centre_m(&self) -> f64 {
        0.5 * (self.left_m + self.right_m)
    }
}

impl SectionLayout {
    /// Build the layout from the tool parameters, applying the tool offset to every boundary.
    pub fn from_params(tool: &ToolParams) -> Result<Self, ConfigError> {
        let positions: Vec<f64> = tool
            .section_boundaries_m
            .iter()
            .map(|b| b + tool.tool_offset_m)
            .collect();

        if positions.len() < 2 || positions.len() > MAX_SECTIONS + 1 {
            return Err(ConfigError::InconsistentGeometry(format!(
                "{} boundaries cannot describe between 1 and {} sections",
                positions.len(),
                MAX_SECTIONS
            )));
        }

        let bounds = positions
            .windows(2)
            .map(|w| SectionBounds {
                left_m: w[0],
                right_m: w[1],
            })
            .collect::<Vec<_>>();

        if let Some(b) = bounds.iter().find(|b| !(b.width_m() > 0.0)) {
            return Err(ConfigError::InconsistentGeometry(format!(
                "section from {} m to {} m has no width",
                b.left_m, b.right_m
            )));
        }

        Ok(Self { bounds })
    }

    pub fn num_sections(&self) -> usize {
        self.bounds.len()
    }

    /// Bounds of a single section, `None` if the implement has no such section.
    pub fn bounds(&self, index: SectionIndex) -> Option<SectionBounds> {
        self.bounds.get(index.get()).copied()
    }

    /// Bounds of any section including the full-width one.
    pub fn bounds_of(&self, id: SectionId) -> Option<SectionBounds> {
        match id {
            SectionId::Individual(i) => self.bounds(i),
            SectionId::FullWidth => self.full_width(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SectionIndex, SectionBounds)> + '_ {
        SectionIndex::iter(self.bounds.len()).zip(self.bounds.iter().copied())
    }

    /// The full-width section, spanning from the leftmost to the rightmost edge.
    ///
    /// Always derived from the individual sections so it can never disagree with them.
    pub fn full_width(&self) -> Option<SectionBounds> {
        let first = self.bounds.first()?;
        let last = self.bounds.last()?;

        Some(SectionBounds {
            left_m: first.left_m,
            right_m: last.right_m,
        })
    }

    /// Total working width of the implement.
    pub fn tool_width_m(&self) -> f64 {
        self.full_width().map_or(0.0, |b| b.width_m())
    }
}

impl Polygon {
    /// Build the polygon covering the ground from the implement reference line forward by
    /// `length_m`, between the given lateral bounds.
    pub fn ahead_of(pose: &VehiclePose, bounds: &SectionBounds, length_m: f64) -> Self {
        let (rear_left, rear_right) = section_edges(pose, bounds);
        let front_left =
            body_to_world(pose.tool_m, pose.heading_rad, bounds.left_m, length_m);
        let front_right =
            body_to_world(pose.tool_m, pose.heading_rad, bounds.right_m, length_m);

        Self {
            corners: [rear_left, rear_right, front_right, front_left],
        }
    }

    /// Area of the polygon, using the shoelace formula.
    pub fn area_m2(&self) -> f64 {
        let mut sum = 0.0;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            sum += a.x * b.y - b.x * a.y;
        }

        0.5 * sum.abs()
    }

    /// Returns true if the point lies inside or on the edge of the polygon.
    pub fn contains(&self, point: &Point2<f64>) -> bool {
        let mut sign = 0.0f64;

        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let cross = (b - a).perp(&(*point - a));

            if cross.abs() < 1e-12 {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            }
            else if cross.signum() != sign {
                return false;
            }
        }

        true
    }

    /// Axis aligned bounding box as `(min, max)`.
    pub fn bounding_box(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = self.corners[0];
        let mut max = self.corners[0];

        for c in self.corners.iter().skip(1) {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }

        (min, max)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute one polygon per section projected ahead of the implement.
///
/// The polygons are returned in section order and are exactly adjacent: the right rear corner
/// of one section is the left rear corner of the next.
pub fn compute_section_polygons(
    pose: &VehiclePose,
    layout: &SectionLayout,
    length_m: f64,
) -> Vec<Polygon> {
    layout
        .iter()
        .map(|(_, b)| Polygon::ahead_of(pose, &b, length_m))
        .collect()
}

/// World positions of the left and right edges of a section at the implement reference line.
pub fn section_edges(pose: &VehiclePose, bounds: &SectionBounds) -> (Point2<f64>, Point2<f64>) {
    (
        body_to_world(pose.tool_m, pose.heading_rad, bounds.left_m, 0.0),
        body_to_world(pose.tool_m, pose.heading_rad, bounds.right_m, 0.0),
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
