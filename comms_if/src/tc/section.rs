//! # Section switch telecommand payloads

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The master section switch.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum MasterMode {
    /// Every section is held off.
    Off,

    /// Every section is demanded on, regardless of coverage.
    Manual,

    /// Sections follow the demands of the coverage collaborator.
    Auto,
}

/// The manual button of a single section.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ButtonState {
    /// The section is held off whatever the master mode.
    Off,

    /// The section follows the master mode.
    Auto,

    /// The section is demanded on while the master is not `Off`.
    On,
}

impl Default for MasterMode {
    fn default() -> Self {
        MasterMode::Off
    }
}

impl Default for ButtonState {
    fn default() -> Self {
        ButtonState::Auto
    }
}
