//! Implementations for the GuidCore state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::{GuidanceView, SectionView, TickError};
use crate::coverage::{CoverageAccounting, CoverageRecord};
use crate::fix_ingest::FixIngest;
use crate::params::{ConfigError, VehicleGeometryConfig};
use crate::pose::{PoseEstimator, VehiclePose};
use crate::section::{
    self, compute_section_polygons, Polygon, Section, SectionBounds, SectionCtrl, SectionDemand,
    SectionError, SectionId, SectionLayout, SectionTiming, SectionTransition, TimingError,
    MAX_SECTIONS,
};
use comms_if::eqpt::gnss::{FixQuality, RawFix};
use comms_if::tc::section::{ButtonState, MasterMode};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Guidance core state.
#[derive(Default)]
pub struct GuidCore {
    config: Option<VehicleGeometryConfig>,

    fix_ingest: FixIngest,
    pose_est: PoseEstimator,
    section_ctrl: SectionCtrl,
    coverage: CoverageAccounting,

    master: MasterMode,
    polygons: Vec<Polygon>,
    num_ticks: u64,

    pub(crate) report: StatusReport,
    arch_tick: Archiver,
}

/// Input data for one tick.
#[derive(Debug, Clone)]
pub struct InputData {
    /// The latest fix from the positioning parser.
    pub fix: RawFix,

    /// Demands from the coverage collaborator for each section.
    pub demands: [SectionDemand; MAX_SECTIONS],
}

/// Status report for a tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Timing anomalies of the decision engine.
    pub timing_errors: Vec<TimingError>,

    /// Section state changes made this tick.
    pub transitions: Vec<SectionTransition>,

    /// Area added this tick.
    ///
    /// Units: square meters
    pub area_added_m2: f64,

    /// True if the fix was discontinuous and no area was added.
    pub discontinuity: bool,

    /// True on the tick the trip area alarm was raised.
    pub user_area_alarm_raised: bool,
}

/// One row of the tick archive.
#[derive(Debug, Clone, Copy, Serialize)]
struct TickRecord {
    tick: u64,
    timestamp_ms: i64,
    x_m: f64,
    y_m: f64,
    heading_deg: f64,
    speed_kmh: f64,
    sections_on: u8,
    full_width_on: bool,
    job_area_m2: f64,
    user_area_m2: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl InputData {
    /// Input with no demands from a coverage collaborator.
    pub fn from_fix(fix: RawFix) -> Self {
        Self {
            fix,
            demands: [SectionDemand::None; MAX_SECTIONS],
        }
    }
}

impl State for GuidCore {
    type InitData = VehicleGeometryConfig;
    type InitError = ConfigError;

    type InputData = InputData;
    type OutputData = GuidanceView;
    type StatusReport = StatusReport;
    type ProcError = TickError;

    /// Configure the core, or reconfigure it after a geometry change.
    ///
    /// All sections are turned off. An invalid configuration is rejected and the previous one
    /// stays in effect.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        init_data.validate()?;
        let layout = SectionLayout::from_params(&init_data.tool)?;

        // Stop any running streams before the sections are rebuilt
        let transitions = self.section_ctrl.reset_all();
        self.apply_transitions(&transitions);

        match self.section_ctrl.init(section::InitData {
            layout,
            timing: SectionTiming::from_config(&init_data),
        }) {
            Ok(()) => (),
            Err(e) => match e {},
        }

        self.coverage
            .configure(init_data.tool.coverage_source, init_data.fix.max_fix_jump_m);
        // The last fix time is kept so that reconfiguring cannot let an old fix through
        self.fix_ingest.set_min_quality(
            FixQuality::from_gga(init_data.fix.min_fix_quality).unwrap_or(FixQuality::Gps),
        );

        self.polygons = match self.pose_est.pose() {
            Some(pose) => compute_section_polygons(
                pose,
                self.section_ctrl.layout(),
                init_data.tool.look_ahead_strip_m,
            ),
            None => Vec::new(),
        };

        info!(
            "GuidCore configured: {} sections, {:.2} m wide, {} Hz",
            self.section_ctrl.num_sections(),
            self.section_ctrl.layout().tool_width_m(),
            init_data.fix.fix_rate_hz
        );

        self.config = Some(init_data);

        Ok(())
    }

    /// Process one fix.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let config = match self.config.as_ref() {
            Some(c) => c,
            None => return Err(TickError::NotConfigured),
        };

        let fix = self.fix_ingest.accept_fix(&input_data.fix)?;

        self.report = StatusReport::default();
        self.num_ticks += 1;

        let pose = self.pose_est.update(&fix, config);

        // Area is accumulated for the sections which were on while the vehicle moved
        let step = self.coverage.accumulate(&pose);
        self.report.area_added_m2 = step.area_m2;
        self.report.user_area_alarm_raised = step.alarm_raised;
        self.report.discontinuity = pose.discontinuity;

        let sc_input = section::InputData {
            speed_kmh: pose.speed_kmh,
            master: self.master,
            demands: input_data.demands,
        };
        let (sc_output, sc_report) = match self.section_ctrl.proc(&sc_input) {
            Ok(o) => o,
            Err(e) => match e {},
        };

        self.polygons = compute_section_polygons(
            &pose,
            self.section_ctrl.layout(),
            config.tool.look_ahead_strip_m,
        );

        self.apply_transitions(&sc_output.transitions);
        self.report.transitions = sc_output.transitions;
        self.report.timing_errors = sc_report.timing_errors;

        trace!(
            "Tick {}: {} sections on, {:.3} m^2 added",
            self.num_ticks,
            sc_report.num_on,
            self.report.area_added_m2
        );

        Ok((self.view(), self.report.clone()))
    }
}

impl GuidCore {
    /// Returns true once a valid configuration has been applied.
    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&VehicleGeometryConfig> {
        self.config.as_ref()
    }

    pub fn pose(&self) -> Option<&VehiclePose> {
        self.pose_est.pose()
    }

    pub fn section_ctrl(&self) -> &SectionCtrl {
        &self.section_ctrl
    }

    pub fn coverage(&self) -> &CoverageAccounting {
        &self.coverage
    }

    pub fn master_mode(&self) -> MasterMode {
        self.master
    }

    pub fn is_job_open(&self) -> bool {
        self.coverage.is_job_open()
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Start writing the tick archive into the session.
    pub fn enable_archives(&mut self, session: &Session) -> Result<(), ArchiveError> {
        self.arch_tick = Archiver::from_path(session, "guid_core/tick.csv")?;
        Ok(())
    }

    /// Apply a new configuration, equivalent to `init`.
    pub fn geometry_changed(&mut self, config: VehicleGeometryConfig) -> Result<(), ConfigError> {
        info!("Geometry changed, reconfiguring");
        self.init(config)
    }

    /// Open a new job. Opening while a job is open has no effect.
    ///
    /// Returns true if a new job was opened.
    pub fn open_job(&mut self) -> bool {
        if self.coverage.is_job_open() {
            warn!("A job is already open");
            return false;
        }

        let transitions = self.section_ctrl.reset_all();
        self.apply_transitions(&transitions);
        self.master = MasterMode::Off;
        self.coverage.open_job();

        info!("Job opened");
        true
    }

    /// Close the current job, turning every section off.
    ///
    /// Returns the final coverage record, or `None` if no job was open. Closing twice is
    /// harmless.
    pub fn close_job(&mut self) -> Option<CoverageRecord> {
        if !self.coverage.is_job_open() {
            debug!("Close job requested with no job open");
            return None;
        }

        let transitions = self.section_ctrl.reset_all();
        self.apply_transitions(&transitions);
        self.section_ctrl.reset_buttons();
        self.master = MasterMode::Off;

        let record = self.coverage.close_job();

        if let Some(r) = record {
            info!(
                "Job closed: {:.1} m^2 applied over {:.1} m",
                r.job_area_m2, r.job_distance_m
            );
        }

        record
    }

    /// Turn every section off immediately.
    pub fn reset_all_sections(&mut self) {
        let transitions = self.section_ctrl.reset_all();
        self.apply_transitions(&transitions);
        info!("All sections reset");
    }

    pub fn set_master_mode(&mut self, mode: MasterMode) {
        if mode != self.master {
            info!("Master switch {:?} -> {:?}", self.master, mode);
        }
        self.master = mode;
    }

    pub fn set_section_button(
        &mut self,
        index: usize,
        state: ButtonState,
    ) -> Result<(), SectionError> {
        self.section_ctrl.set_button(index, state)
    }

    pub fn reset_user_area(&mut self) {
        self.coverage.reset_user_area();
    }

    pub fn set_user_area_alarm(&mut self, area_m2: f64) {
        self.coverage.set_user_area_alarm(area_m2);
    }

    /// Snapshot of the current state.
    pub fn view(&self) -> GuidanceView {
        let layout = self.section_ctrl.layout();

        let sections = self
            .section_ctrl
            .sections()
            .filter_map(|(idx, s)| {
                layout
                    .bounds(idx)
                    .map(|b| section_view(SectionId::Individual(idx), b, s))
            })
            .collect();

        let full_width = layout
            .full_width()
            .map(|b| section_view(SectionId::FullWidth, b, self.section_ctrl.full_width()));

        GuidanceView {
            tick: self.num_ticks,
            job_open: self.coverage.is_job_open(),
            master: self.master,
            pose: self.pose_est.pose().copied(),
            sections,
            full_width,
            polygons: self.polygons.clone(),
            coverage: *self.coverage.record(),
        }
    }

    /// Tell coverage about section state changes.
    fn apply_transitions(&mut self, transitions: &[SectionTransition]) {
        let pose = match self.pose_est.pose() {
            Some(p) => *p,
            None => return,
        };

        for t in transitions {
            if let Some(bounds) = self.section_ctrl.layout().bounds_of(t.id) {
                self.coverage
                    .on_section_state_change(t.id, t.now_on, &pose, &bounds);
            }
        }
    }
}

impl Archived for GuidCore {
    fn write(&mut self) -> Result<(), ArchiveError> {
        if !self.arch_tick.is_active() {
            return Ok(());
        }

        let pose = match self.pose_est.pose() {
            Some(p) => *p,
            None => return Ok(()),
        };

        let view = self.view();
        let record = TickRecord {
            tick: self.num_ticks,
            timestamp_ms: pose.timestamp.timestamp_millis(),
            x_m: pose.pivot_m.x,
            y_m: pose.pivot_m.y,
            heading_deg: pose.heading_deg(),
            speed_kmh: pose.speed_kmh,
            sections_on: view.sections_on_mask(),
            full_width_on: self.section_ctrl.full_width().is_on,
            job_area_m2: view.coverage.job_area_m2,
            user_area_m2: view.coverage.user_area_m2,
        };

        self.arch_tick.serialise(record)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn section_view(id: SectionId, bounds: SectionBounds, s: &Section) -> SectionView {
    SectionView {
        id,
        bounds,
        is_on: s.is_on,
        button: s.button,
        on_timer: s.on_timer,
        off_timer: s.off_timer,
        on_off_cycle_active: s.on_off_cycle_active,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
