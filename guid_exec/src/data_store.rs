//! # Data Store

use std::path::PathBuf;
use log::info;

use crate::{
    coverage::{CoverageMap, CoverageRecord},
    guid_core::{self, GuidCore, GuidanceView},
    section::{SectionDemand, MAX_SECTIONS},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // Configuration
    /// Path the vehicle geometry is (re)loaded from
    pub geometry_path: PathBuf,

    // Guidance
    pub guid_core: GuidCore,
    pub guid_core_output: Option<GuidanceView>,
    pub guid_core_status_rpt: guid_core::StatusReport,

    // Coverage recording
    pub coverage_map: CoverageMap,
    pub coverage_demands: [SectionDemand; MAX_SECTIONS],

    /// Record of the most recently closed job
    pub last_job_record: Option<CoverageRecord>,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of consecutive cycles in which no new fix arrived
    pub num_consec_missing_fixes: u64,

    /// Number of fixes rejected by the core
    pub num_rejected_fixes: u64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.guid_core_status_rpt = guid_core::StatusReport::default();
        self.coverage_demands = [SectionDemand::None; MAX_SECTIONS];
    }

    /// Close the current job, saving its record into the session and clearing the coverage map.
    pub fn close_job(&mut self) {
        if let Some(record) = self.guid_core.close_job() {
            info!("Final coverage: {:#?}", record);
            util::session::save_with_timestamp("jobs/job_record.json", record);
            self.last_job_record = Some(record);
        }
        self.coverage_map.clear();
    }
}
