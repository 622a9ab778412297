//! Applied area accounting

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::BTreeMap;
use log::{debug, info, warn};
use nalgebra::Point2;
use serde::Serialize;

// Internal
use crate::params::CoverageSource;
use crate::pose::VehiclePose;
use crate::section::{section_edges, SectionBounds, SectionId};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Running totals of the applied area.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct CoverageRecord {
    /// Area applied in the current job.
    ///
    /// Units: square meters
    pub job_area_m2: f64,

    /// Distance travelled while applying in the current job.
    ///
    /// Units: meters
    pub job_distance_m: f64,

    /// Area applied since the operator last reset the trip counter.
    ///
    /// Units: square meters
    pub user_area_m2: f64,

    /// Trip area at which the alarm is raised, zero disables the alarm.
    ///
    /// Units: square meters
    pub user_area_alarm_m2: f64,

    /// True once the trip area has reached the alarm threshold.
    pub user_area_alarm_raised: bool,
}

/// A covered strip, stored as left/right edge pairs along the track.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Patch {
    pub id: SectionId,
    pub edges: Vec<(Point2<f64>, Point2<f64>)>,
}

/// What one accumulation step added.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoverageStep {
    pub area_m2: f64,

    /// True on the step which raised the trip area alarm.
    pub alarm_raised: bool,
}

/// An applying section.
#[derive(Debug, Clone, Copy)]
struct Stream {
    bounds: SectionBounds,

    /// Index of the patch this stream is extending, `None` outside a job.
    patch: Option<usize>,
}

/// Coverage accounting state.
#[derive(Debug, Clone)]
pub struct CoverageAccounting {
    source: CoverageSource,
    max_jump_m: f64,
    job_open: bool,
    record: CoverageRecord,
    streams: BTreeMap<SectionKey, Stream>,
    patches: Vec<Patch>,
}

/// Orderable form of a section id, the full-width section sorts last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct SectionKey(usize);

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl From<SectionId> for SectionKey {
    fn from(id: SectionId) -> Self {
        match id {
            SectionId::Individual(i) => SectionKey(i.get()),
            SectionId::FullWidth => SectionKey(usize::MAX),
        }
    }
}

impl Default for CoverageAccounting {
    fn default() -> Self {
        Self::new(CoverageSource::Individual, 10.0)
    }
}

impl CoverageAccounting {
    pub fn new(source: CoverageSource, max_jump_m: f64) -> Self {
        Self {
            source,
            max_jump_m,
            job_open: false,
            record: CoverageRecord::default(),
            streams: BTreeMap::new(),
            patches: Vec::new(),
        }
    }

    /// Change the configuration. All streams are stopped, the totals are kept.
    pub fn configure(&mut self, source: CoverageSource, max_jump_m: f64) {
        self.source = source;
        self.max_jump_m = max_jump_m;
        self.streams.clear();
    }

    pub fn record(&self) -> &CoverageRecord {
        &self.record
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn is_job_open(&self) -> bool {
        self.job_open
    }

    /// Number of sections currently contributing area.
    pub fn num_streams(&self) -> usize {
        self.streams.len()
    }

    /// Returns true if the section counts towards the applied area under the configured source.
    pub fn contributes(&self, id: SectionId) -> bool {
        match (self.source, id) {
            (CoverageSource::Individual, SectionId::Individual(_)) => true,
            (CoverageSource::FullWidth, SectionId::FullWidth) => true,
            _ => false,
        }
    }

    /// Start a new job, clearing the job totals and patches.
    pub fn open_job(&mut self) {
        self.job_open = true;
        self.record.job_area_m2 = 0.0;
        self.record.job_distance_m = 0.0;
        self.patches.clear();
        self.streams.clear();
    }

    /// Close the job, returning its final record or `None` if no job was open.
    pub fn close_job(&mut self) -> Option<CoverageRecord> {
        if !self.job_open {
            return None;
        }

        let record = self.record;

        self.job_open = false;
        self.streams.clear();
        self.patches.clear();
        self.record.job_area_m2 = 0.0;
        self.record.job_distance_m = 0.0;

        Some(record)
    }

    /// Start or stop an area stream when a section changes state.
    pub fn on_section_state_change(
        &mut self,
        id: SectionId,
        now_on: bool,
        pose: &VehiclePose,
        bounds: &SectionBounds,
    ) {
        if !self.contributes(id) {
            return;
        }

        let key = SectionKey::from(id);

        if now_on {
            let patch = if self.job_open {
                self.patches.push(Patch {
                    id,
                    edges: vec![section_edges(pose, bounds)],
                });
                Some(self.patches.len() - 1)
            }
            else {
                None
            };

            self.streams.insert(
                key,
                Stream {
                    bounds: *bounds,
                    patch,
                },
            );
            debug!("Coverage stream started for {}", id);
        }
        else if self.streams.remove(&key).is_some() {
            debug!("Coverage stream stopped for {}", id);
        }
    }

    /// Add the area covered by the active streams since the previous pose.
    ///
    /// Nothing is added outside a job or across a discontinuity in the fixes.
    pub fn accumulate(&mut self, pose: &VehiclePose) -> CoverageStep {
        let mut step = CoverageStep::default();

        if !self.job_open || self.streams.is_empty() {
            return step;
        }

        if pose.discontinuity || pose.step_m > self.max_jump_m {
            warn!(
                "Skipping {:.2} m step across a fix discontinuity, no area added",
                pose.step_m
            );
            self.restart_patches(pose);
            return step;
        }

        let width_m: f64 = self.streams.values().map(|s| s.bounds.width_m()).sum();
        step.area_m2 = width_m * pose.step_m;

        self.record.job_area_m2 += step.area_m2;
        self.record.job_distance_m += pose.step_m;
        self.record.user_area_m2 += step.area_m2;

        let patches = &mut self.patches;
        for s in self.streams.values() {
            let patch = match s.patch {
                Some(i) => patches.get_mut(i),
                None => None,
            };
            if let Some(p) = patch {
                p.edges.push(section_edges(pose, &s.bounds));
            }
        }

        if self.record.user_area_alarm_m2 > 0.0
            && !self.record.user_area_alarm_raised
            && self.record.user_area_m2 >= self.record.user_area_alarm_m2
        {
            self.record.user_area_alarm_raised = true;
            step.alarm_raised = true;
            warn!(
                "Trip area of {:.1} m^2 reached the {:.1} m^2 alarm",
                self.record.user_area_m2, self.record.user_area_alarm_m2
            );
        }

        step
    }

    /// Reset the trip area counter and clear a raised alarm.
    pub fn reset_user_area(&mut self) {
        self.record.user_area_m2 = 0.0;
        self.record.user_area_alarm_raised = false;
        info!("Trip area reset");
    }

    /// Set the trip area alarm threshold, zero or less disables it.
    pub fn set_user_area_alarm(&mut self, area_m2: f64) {
        self.record.user_area_alarm_m2 = if area_m2.is_finite() { area_m2.max(0.0) } else { 0.0 };
        self.record.user_area_alarm_raised = self.record.user_area_alarm_m2 > 0.0
            && self.record.user_area_m2 >= self.record.user_area_alarm_m2;
        info!("Trip area alarm set to {:.1} m^2", self.record.user_area_alarm_m2);
    }

    /// Start fresh patches at the current pose so no strip spans a discontinuity.
    fn restart_patches(&mut self, pose: &VehiclePose) {
        let patches = &mut self.patches;
        for s in self.streams.values_mut() {
            let id = match s.patch.and_then(|i| patches.get(i).map(|p| p.id)) {
                Some(id) => id,
                None => continue,
            };
            debug!("Restarting the patch of {} after a discontinuity", id);

            patches.push(Patch {
                id,
                edges: vec![section_edges(pose, &s.bounds)],
            });
            s.patch = Some(patches.len() - 1);
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::pose::test::pose_at;
    use crate::section::SectionIndex;

    fn idx(i: usize) -> SectionId {
        SectionId::Individual(SectionIndex::new(i).unwrap())
    }

    fn bounds(left_m: f64, right_m: f64) -> SectionBounds {
        SectionBounds { left_m, right_m }
    }

    /// A pose `step_m` further north than `y`.
    fn step_north(y: f64, step_m: f64) -> VehiclePose {
        let mut p = pose_at(0.0, y + step_m, 0.0);
        p.step_m = step_m;
        p
    }

    #[test]
    fn test_area_only_while_on() {
        let mut cov = CoverageAccounting::default();
        cov.open_job();

        // Nothing on, nothing added
        assert_eq!(cov.accumulate(&step_north(0.0, 1.0)).area_m2, 0.0);

        cov.on_section_state_change(idx(0), true, &pose_at(0.0, 1.0, 0.0), &bounds(-2.0, 0.0));
        cov.on_section_state_change(idx(1), true, &pose_at(0.0, 1.0, 0.0), &bounds(0.0, 3.0));

        let s = cov.accumulate(&step_north(1.0, 2.0));
        assert!((s.area_m2 - 10.0).abs() < 1e-9);

        cov.on_section_state_change(idx(1), false, &pose_at(0.0, 3.0, 0.0), &bounds(0.0, 3.0));
        cov.accumulate(&step_north(3.0, 1.0));

        let r = cov.record();
        assert!((r.job_area_m2 - 12.0).abs() < 1e-9);
        assert!((r.job_distance_m - 3.0).abs() < 1e-9);
        assert!((r.user_area_m2 - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_coverage_source() {
        let mut cov = CoverageAccounting::new(CoverageSource::FullWidth, 10.0);
        cov.open_job();

        let p = pose_at(0.0, 0.0, 0.0);
        cov.on_section_state_change(idx(0), true, &p, &bounds(-2.0, 0.0));
        cov.on_section_state_change(SectionId::FullWidth, true, &p, &bounds(-2.0, 2.0));
        assert_eq!(cov.num_streams(), 1);

        let s = cov.accumulate(&step_north(0.0, 1.0));
        assert!((s.area_m2 - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_discontinuity_skipped() {
        let mut cov = CoverageAccounting::new(CoverageSource::Individual, 5.0);
        cov.open_job();
        cov.on_section_state_change(idx(0), true, &pose_at(0.0, 0.0, 0.0), &bounds(-1.0, 1.0));

        assert_eq!(cov.accumulate(&step_north(0.0, 20.0)).area_m2, 0.0);

        let mut p = step_north(20.0, 1.0);
        p.discontinuity = true;
        assert_eq!(cov.accumulate(&p).area_m2, 0.0);

        assert_eq!(cov.record().job_area_m2, 0.0);
        // A fresh patch was started after each jump
        assert_eq!(cov.patches().len(), 3);
    }

    #[test]
    fn test_patches() {
        let mut cov = CoverageAccounting::default();
        cov.open_job();
        cov.on_section_state_change(idx(0), true, &pose_at(0.0, 0.0, 0.0), &bounds(-1.0, 1.0));
        cov.accumulate(&step_north(0.0, 1.0));
        cov.accumulate(&step_north(1.0, 1.0));

        let patch = &cov.patches()[0];
        assert_eq!(patch.id, idx(0));
        assert_eq!(patch.edges.len(), 3);
        assert_eq!(patch.edges[2], (Point2::new(-1.0, 2.0), Point2::new(1.0, 2.0)));
    }

    #[test]
    fn test_job_lifecycle() {
        let mut cov = CoverageAccounting::default();

        // Outside a job nothing accumulates
        cov.on_section_state_change(idx(0), true, &pose_at(0.0, 0.0, 0.0), &bounds(-1.0, 1.0));
        assert_eq!(cov.accumulate(&step_north(0.0, 1.0)).area_m2, 0.0);
        assert!(cov.close_job().is_none());

        cov.open_job();
        cov.on_section_state_change(idx(0), true, &pose_at(0.0, 0.0, 0.0), &bounds(-1.0, 1.0));
        cov.accumulate(&step_north(0.0, 1.0));

        let r = cov.close_job().unwrap();
        assert!((r.job_area_m2 - 2.0).abs() < 1e-9);
        assert!(cov.close_job().is_none());

        assert_eq!(cov.record().job_area_m2, 0.0);
        assert!((cov.record().user_area_m2 - 2.0).abs() < 1e-9);
        assert_eq!(cov.num_streams(), 0);
        assert!(cov.patches().is_empty());
    }

    #[test]
    fn test_user_area_alarm() {
        let mut cov = CoverageAccounting::default();
        cov.set_user_area_alarm(5.0);
        cov.open_job();
        cov.on_section_state_change(idx(0), true, &pose_at(0.0, 0.0, 0.0), &bounds(-1.0, 1.0));

        assert!(!cov.accumulate(&step_north(0.0, 2.0)).alarm_raised);
        assert!(cov.accumulate(&step_north(2.0, 1.0)).alarm_raised);
        // Raised once only
        assert!(!cov.accumulate(&step_north(3.0, 1.0)).alarm_raised);
        assert!(cov.record().user_area_alarm_raised);

        cov.reset_user_area();
        assert_eq!(cov.record().user_area_m2, 0.0);
        assert!(!cov.record().user_area_alarm_raised);

        cov.set_user_area_alarm(0.0);
        for i in 0..10 {
            assert!(!cov.accumulate(&step_north(i as f64, 1.0)).alarm_raised);
        }
    }
}
