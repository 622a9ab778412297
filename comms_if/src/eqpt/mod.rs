//! # Equipment Interface
//!
//! This module defines the interface structures delivered to the guidance core by equipment
//! collaborators.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod gnss;
