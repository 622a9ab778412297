//! # Communications interface crate.
//!
//! Provides all common interface types shared between the guidance core and
//! its collaborators (positioning parser, UI layer, telecommand scripts).

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands issued by the UI layer or a script
pub mod tc;

/// Records delivered by equipment (like the positioning receiver)
pub mod eqpt;
