//! # Telecommand module
//!
//! Telecommands replace the button and menu wiring of the UI layer. Each TC maps onto one explicit
//! call into the guidance core, executed between ticks.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod section;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// Internal
use section::{ButtonState, MasterMode};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the guidance core by the UI layer.
///
/// Serialised as `{"type": "...", "payload": ...}`, with the payload omitted for TCs that don't
/// carry one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tc {
    /// Open a new coverage job.
    OpenJob,

    /// Close the current coverage job, turning every section off.
    CloseJob,

    /// Reset every section's state and timers without closing the job.
    ResetSections,

    /// Ask the core to re-read the vehicle geometry parameters.
    GeometryChanged,

    /// Set the master section switch.
    MasterMode(MasterMode),

    /// Set the manual button of an individual section.
    SectionButton {
        /// Zero based section index
        section: usize,
        state: ButtonState
    },

    /// Reset the user trip area counter.
    ResetUserArea,

    /// Set the user area alarm threshold, zero disables the alarm.
    UserAreaAlarm {
        area_m2: f64
    },
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON or an unknown type: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }
}
