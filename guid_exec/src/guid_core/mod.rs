//! # Guidance core
//!
//! The core owns every piece of guidance state and advances it once per accepted fix:
//!
//! - Fix ingest validates the raw fix
//! - Pose estimation projects it and derives heading, speed and step
//! - Coverage accumulates the area swept by the sections that were on
//! - Section control runs the on/off decision engine
//! - Coverage starts and stops streams for the sections that changed state
//! - The section polygons are recomputed for the coverage collaborator
//!
//! A rejected fix stops the tick before any state changes.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;
mod view;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use thiserror::Error;

pub use state::*;
pub use view::*;
use crate::fix_ingest::FixError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which stop a tick. The core's state is unchanged when one is returned.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("The core has not been configured")]
    NotConfigured,

    #[error(transparent)]
    Fix(#[from] FixError),
}
