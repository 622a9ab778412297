//! Implementations for the SectionCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::convert::Infallible;
use log::{debug, trace, warn};
use serde::Serialize;

// Internal
use super::{
    Section, SectionDemand, SectionError, SectionId, SectionIndex, SectionLayout, SectionTiming,
    TimingError, MAX_SECTIONS,
};
use comms_if::tc::section::{ButtonState, MasterMode};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Section control module state.
#[derive(Debug, Clone, Default)]
pub struct SectionCtrl {
    layout: SectionLayout,
    timing: SectionTiming,

    /// Individual sections, only the first `layout.num_sections()` are in use.
    sections: [Section; MAX_SECTIONS],

    /// The synthetic section spanning the whole implement.
    full_width: Section,

    pub(crate) report: StatusReport,
}

/// Configuration of the section controller.
#[derive(Debug, Clone, Default)]
pub struct InitData {
    pub layout: SectionLayout,
    pub timing: SectionTiming,
}

/// Input data to section control.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// Current vehicle speed.
    ///
    /// Units: kilometers/hour
    pub speed_kmh: f64,

    /// Position of the master switch.
    pub master: MasterMode,

    /// Demands from the coverage collaborator, indexed by section.
    pub demands: [SectionDemand; MAX_SECTIONS],
}

/// A section changing state.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct SectionTransition {
    pub id: SectionId,
    pub now_on: bool,
}

/// Output of section control, every state change made on this tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OutputData {
    pub transitions: Vec<SectionTransition>,
}

/// Status report for section control processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Timing anomalies raised this tick.
    pub timing_errors: Vec<TimingError>,

    /// Number of individual sections currently on.
    pub num_on: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for InputData {
    fn default() -> Self {
        Self {
            speed_kmh: 0.0,
            master: MasterMode::Off,
            demands: [SectionDemand::None; MAX_SECTIONS],
        }
    }
}

impl State for SectionCtrl {
    type InitData = InitData;
    type InitError = Infallible;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// (Re)configure the sections.
    ///
    /// All sections are reset to off. Button states are kept for sections which still exist.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let num_sections = init_data.layout.num_sections();

        for (i, s) in self.sections.iter_mut().enumerate() {
            let button = if i < num_sections {
                s.button
            }
            else {
                ButtonState::default()
            };
            *s = Section {
                button,
                ..Section::default()
            };
        }
        self.full_width = Section::default();

        self.layout = init_data.layout;
        self.timing = init_data.timing;
        self.report = StatusReport::default();

        debug!(
            "SectionCtrl configured with {} sections over {:.2} m, timing {:?}",
            num_sections,
            self.layout.tool_width_m(),
            self.timing
        );

        Ok(())
    }

    /// Run the decision engine for one tick.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport::default();

        let mut output = OutputData::default();
        let mut effective = [SectionDemand::None; MAX_SECTIONS];
        let num_sections = self.layout.num_sections();
        let timing = self.timing;

        for idx in SectionIndex::iter(num_sections) {
            let i = idx.get();
            let id = SectionId::Individual(idx);
            let section = &mut self.sections[i];

            // Off switches bypass the delays
            if input_data.master == MasterMode::Off || section.button == ButtonState::Off {
                if section.force_off() {
                    output.transitions.push(SectionTransition { id, now_on: false });
                }
                effective[i] = SectionDemand::Off;
                continue;
            }

            let demand =
                if input_data.master == MasterMode::Manual || section.button == ButtonState::On {
                    SectionDemand::On
                }
                else {
                    input_data.demands[i]
                };
            effective[i] = demand;

            Self::step_section(
                section,
                id,
                demand,
                input_data.speed_kmh,
                &timing,
                &mut output,
                &mut self.report,
            );
        }

        // The full-width section follows the union of the individual demands
        if input_data.master == MasterMode::Off {
            if self.full_width.force_off() {
                output.transitions.push(SectionTransition {
                    id: SectionId::FullWidth,
                    now_on: false,
                });
            }
        }
        else if num_sections > 0 {
            Self::step_section(
                &mut self.full_width,
                SectionId::FullWidth,
                full_width_demand(&effective[..num_sections]),
                input_data.speed_kmh,
                &timing,
                &mut output,
                &mut self.report,
            );
        }

        self.report.num_on = self.sections[..num_sections]
            .iter()
            .filter(|s| s.is_on)
            .count();

        trace!(
            "SectionCtrl: {} of {} on, full width {}, {} transitions",
            self.report.num_on,
            num_sections,
            self.full_width.is_on,
            output.transitions.len()
        );

        Ok((output, self.report.clone()))
    }
}

impl SectionCtrl {
    pub fn layout(&self) -> &SectionLayout {
        &self.layout
    }

    pub fn timing(&self) -> &SectionTiming {
        &self.timing
    }

    pub fn num_sections(&self) -> usize {
        self.layout.num_sections()
    }

    /// Get a section, `None` if the implement has no such section.
    pub fn section(&self, id: SectionId) -> Option<&Section> {
        match id {
            SectionId::Individual(i) if i.get() < self.num_sections() => {
                Some(&self.sections[i.get()])
            }
            SectionId::Individual(_) => None,
            SectionId::FullWidth => Some(&self.full_width),
        }
    }

    /// Iterate over the individual sections in use.
    pub fn sections(&self) -> impl Iterator<Item = (SectionIndex, &Section)> + '_ {
        SectionIndex::iter(self.num_sections()).zip(self.sections.iter())
    }

    pub fn full_width(&self) -> &Section {
        &self.full_width
    }

    pub fn is_on(&self, id: SectionId) -> bool {
        self.section(id).map_or(false, |s| s.is_on)
    }

    /// Set the manual button of a section, taking effect on the next tick.
    pub fn set_button(&mut self, index: usize, state: ButtonState) -> Result<(), SectionError> {
        let num_sections = self.num_sections();
        let idx = SectionIndex::new(index)?;

        if idx.get() >= num_sections {
            return Err(SectionError::NoSuchSection {
                index,
                num_sections,
            });
        }

        self.sections[idx.get()].button = state;
        debug!("Section {} button set to {:?}", idx, state);

        Ok(())
    }

    /// Return every button to `Auto`.
    pub fn reset_buttons(&mut self) {
        for s in self.sections.iter_mut() {
            s.button = ButtonState::Auto;
        }
    }

    /// Immediately turn every section off, including the full-width section.
    ///
    /// Returns the transitions of the sections which were on.
    pub fn reset_all(&mut self) -> Vec<SectionTransition> {
        let num_sections = self.num_sections();
        let mut transitions = Vec::new();

        for (idx, s) in SectionIndex::iter(num_sections).zip(self.sections.iter_mut()) {
            if s.force_off() {
                transitions.push(SectionTransition {
                    id: SectionId::Individual(idx),
                    now_on: false,
                });
            }
        }

        if self.full_width.force_off() {
            transitions.push(SectionTransition {
                id: SectionId::FullWidth,
                now_on: false,
            });
        }

        transitions
    }

    fn step_section(
        section: &mut Section,
        id: SectionId,
        demand: SectionDemand,
        speed_kmh: f64,
        timing: &SectionTiming,
        output: &mut OutputData,
        report: &mut StatusReport,
    ) {
        section.apply_demand(demand);
        let step = section.step(speed_kmh, timing);

        if let Some((requested, clamped)) = step.on_timer_clamped {
            let e = TimingError::Overflow {
                section: id,
                requested,
                clamped,
            };
            warn!("{}", e);
            report.timing_errors.push(e);
        }

        if let Some(now_on) = step.transition {
            debug!("{} turned {}", id, if now_on { "on" } else { "off" });
            output.transitions.push(SectionTransition { id, now_on });
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Demand for the full-width section given the individual demands.
///
/// On if any section wants to be on, off only once every section wants to be off.
pub fn full_width_demand(demands: &[SectionDemand]) -> SectionDemand {
    if demands.iter().any(|d| *d == SectionDemand::On) {
        SectionDemand::On
    }
    else if !demands.is_empty() && demands.iter().all(|d| *d == SectionDemand::Off) {
        SectionDemand::Off
    }
    else {
        SectionDemand::None
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
