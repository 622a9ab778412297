//! # Coverage module
//!
//! Accumulates the applied area while sections are on, keeps the covered patches for display,
//! and provides the grid coverage map which turns covered ground into section demands.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod map;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use map::*;
pub use state::*;
