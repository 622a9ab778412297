//! # Section control module
//!
//! Owns the implement's sections: their lateral geometry, the polygons projected ahead of the
//! implement each tick, and the on/off decision engine which debounces coverage demands into
//! section state changes.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod layout;
mod record;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::convert::TryFrom;
use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
pub use layout::*;
pub use record::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The maximum number of individually switched sections.
pub const MAX_SECTIONS: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Index of an individual section, always below [`MAX_SECTIONS`].
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "usize", into = "usize")]
pub struct SectionIndex(u8);

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Identifies either one of the individual sections or the synthetic full-width section.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SectionId {
    Individual(SectionIndex),
    FullWidth,
}

/// What the coverage collaborator wants a section to do on this tick.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SectionDemand {
    /// No opinion, any pending request is left as it is.
    None,

    /// The ground ahead of the section needs application.
    On,

    /// The ground ahead of the section is already covered or outside the field.
    Off,
}

/// Errors raised by section commands.
#[derive(Debug, Error, PartialEq)]
pub enum SectionError {
    #[error("Section index {0} is out of range (maximum {})", MAX_SECTIONS - 1)]
    IndexOutOfRange(usize),

    #[error("Section {index} does not exist, the implement has {num_sections} sections")]
    NoSuchSection {
        index: usize,
        num_sections: usize,
    },
}

/// Timing anomalies of the decision engine. These are never fatal, the engine clamps and goes
/// on.
#[derive(Debug, Copy, Clone, Error, Serialize, PartialEq)]
pub enum TimingError {
    #[error(
        "On timer of {requested} ticks for {section} exceeded the bound, clamped to {clamped} \
        ticks"
    )]
    Overflow {
        section: SectionId,
        requested: f64,
        clamped: u32,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SectionIndex {
    /// Create an index, returning an error if it is not below [`MAX_SECTIONS`].
    pub fn new(index: usize) -> Result<Self, SectionError> {
        if index < MAX_SECTIONS {
            Ok(Self(index as u8))
        }
        else {
            Err(SectionError::IndexOutOfRange(index))
        }
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }

    /// Iterate over the first `num_sections` indices.
    pub fn iter(num_sections: usize) -> impl Iterator<Item = SectionIndex> {
        (0..num_sections.min(MAX_SECTIONS)).map(|i| SectionIndex(i as u8))
    }
}

impl TryFrom<usize> for SectionIndex {
    type Error = SectionError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SectionIndex> for usize {
    fn from(index: SectionIndex) -> Self {
        index.get()
    }
}

impl fmt::Display for SectionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionId::Individual(i) => write!(f, "section {}", i),
            SectionId::FullWidth => write!(f, "the full-width section"),
        }
    }
}

impl Default for SectionDemand {
    fn default() -> Self {
        SectionDemand::None
    }
}
