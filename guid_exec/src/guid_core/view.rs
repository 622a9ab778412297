//! Read-only snapshot of the core for display and collaborators

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::coverage::{CoverageRecord, SectionStrip};
use crate::pose::VehiclePose;
use crate::section::{section_edges, Polygon, SectionBounds, SectionId};
use comms_if::tc::section::{ButtonState, MasterMode};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything a display needs after a tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GuidanceView {
    /// Number of ticks processed since configuration.
    pub tick: u64,

    pub job_open: bool,
    pub master: MasterMode,
    pub pose: Option<VehiclePose>,
    pub sections: Vec<SectionView>,
    pub full_width: Option<SectionView>,

    /// Look-ahead polygons of the individual sections, in section order.
    pub polygons: Vec<Polygon>,

    pub coverage: CoverageRecord,
}

/// State of one section.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SectionView {
    pub id: SectionId,
    pub bounds: SectionBounds,
    pub is_on: bool,
    pub button: ButtonState,
    pub on_timer: u32,
    pub off_timer: u32,
    pub on_off_cycle_active: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GuidanceView {
    /// Current strips of the individual sections, for painting a coverage map.
    ///
    /// Empty until the first pose is known.
    pub fn strips(&self) -> Vec<SectionStrip> {
        let pose = match self.pose {
            Some(ref p) => p,
            None => return Vec::new(),
        };

        self.sections
            .iter()
            .map(|s| SectionStrip {
                id: s.id,
                is_on: s.is_on,
                edges: section_edges(pose, &s.bounds),
            })
            .collect()
    }

    /// Bitmask of the individual sections which are on, bit 0 is the leftmost section.
    pub fn sections_on_mask(&self) -> u8 {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_on)
            .fold(0u8, |m, (i, _)| m | (1 << i))
    }
}
