//! # Guidance library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the guidance crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Coverage accounting - job and user area totals, patches and the coverage map
pub mod coverage;

/// Data store - everything the executable keeps between cycles
pub mod data_store;

/// Fix handoff - latest-value channel between the fix source and the control loop
pub mod fix_handoff;

/// Fix ingest - validates raw fixes from the positioning parser
pub mod fix_ingest;

/// Guidance core - runs every module once per accepted fix
pub mod guid_core;

/// Vehicle geometry, tool and fix parameters
pub mod params;

/// Pose estimation - antenna, pivot and tool positions, heading and speed
pub mod pose;

/// Section control - geometry and the on/off decision engine
pub mod section;

/// Simulator - kinematic fix source for running without a receiver
#[cfg(feature = "sim")]
pub mod sim;

/// Telecommand processor - maps job and section commands onto the guidance core
pub mod tc_processor;
