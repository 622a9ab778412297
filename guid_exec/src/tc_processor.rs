//! # Telecommand processor module
//!
//! The telecommand processor handles the job and section commands coming from the UI layer or a
//! script, executing them between ticks.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use comms_if::tc::Tc;
use crate::data_store::DataStore;
use crate::params::VehicleGeometryConfig;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to send commands to the guidance core.
pub fn exec(ds: &mut DataStore, tc: &Tc) {
    debug!("Executing TC: {:?}", tc);

    match tc {
        Tc::OpenJob => {
            // The covered ground belongs to the open job until it is closed
            if ds.guid_core.open_job() {
                ds.coverage_map.clear();
            }
        }
        Tc::CloseJob => ds.close_job(),
        Tc::ResetSections => ds.guid_core.reset_all_sections(),
        Tc::GeometryChanged => {
            match VehicleGeometryConfig::load_path(&ds.geometry_path) {
                Ok(config) => match ds.guid_core.geometry_changed(config) {
                    Ok(()) => info!("Geometry reloaded from {:?}", ds.geometry_path),
                    Err(e) => warn!("New geometry rejected, keeping the previous one: {}", e),
                },
                Err(e) => warn!(
                    "Could not reload the geometry from {:?}: {}",
                    ds.geometry_path, e
                ),
            }
        }
        Tc::MasterMode(mode) => ds.guid_core.set_master_mode(*mode),
        Tc::SectionButton { section, state } => {
            if let Err(e) = ds.guid_core.set_section_button(*section, *state) {
                warn!("Cannot set the section button: {}", e);
            }
        }
        Tc::ResetUserArea => ds.guid_core.reset_user_area(),
        Tc::UserAreaAlarm { area_m2 } => ds.guid_core.set_user_area_alarm(*area_m2),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
