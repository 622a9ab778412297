//! Per section state and the on/off timing rules

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use super::SectionDemand;
use crate::params::VehicleGeometryConfig;
use comms_if::tc::section::ButtonState;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The switching state of one section.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct Section {
    /// True while the section is applying.
    pub is_on: bool,

    /// An on request was received this tick and has not been consumed yet.
    pub on_request: bool,

    /// An off request is pending.
    pub off_request: bool,

    /// Ticks remaining until the section turns on.
    pub on_timer: u32,

    /// Ticks remaining before a pending off request may take effect.
    pub off_timer: u32,

    /// True from the moment an on request is latched until the section turns off again.
    pub on_off_cycle_active: bool,

    /// The operator's manual button for this section.
    pub button: ButtonState,
}

/// Timing constants of the decision engine, derived from the configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct SectionTiming {
    /// Ticks of delay per km/h of speed.
    pub look_ahead: f64,

    /// Number of ticks a section is held on after its last on request.
    pub turn_off_delay_ticks: u32,

    /// Upper bound of the on timer.
    pub max_on_timer_ticks: u32,
}

/// What happened to a section during one step of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SectionStep {
    /// `Some(true)` if the section turned on, `Some(false)` if it turned off.
    pub transition: Option<bool>,

    /// Set when the on timer had to be clamped, holds the unclamped value and the clamped one.
    pub on_timer_clamped: Option<(f64, u32)>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SectionTiming {
    pub fn from_config(config: &VehicleGeometryConfig) -> Self {
        Self {
            look_ahead: config.tool.look_ahead,
            turn_off_delay_ticks: config.turn_off_delay_ticks(),
            max_on_timer_ticks: config.max_on_timer_ticks(),
        }
    }

    /// Number of ticks to wait before turning a section on at the given speed.
    ///
    /// Returns the clamped tick count, and the unclamped value if clamping to the upper bound was
    /// needed. Negative values (reversing) clamp to zero silently.
    pub fn on_timer_ticks(&self, speed_kmh: f64) -> (u32, Option<f64>) {
        let requested = (speed_kmh * self.look_ahead).ceil() + 1.0;
        let max = self.max_on_timer_ticks;

        if requested.is_nan() || requested > max as f64 {
            (max, Some(requested))
        }
        else if requested <= 0.0 {
            (0, None)
        }
        else {
            (requested as u32, None)
        }
    }
}

impl Section {
    /// Register this tick's demand.
    ///
    /// An on demand cancels any pending off request. An off demand is held until the off timer
    /// allows it to take effect.
    pub fn apply_demand(&mut self, demand: SectionDemand) {
        match demand {
            SectionDemand::On => {
                self.on_request = true;
                self.off_request = false;
            }
            SectionDemand::Off => self.off_request = true,
            SectionDemand::None => (),
        }
    }

    /// Advance the section by one tick.
    pub fn step(&mut self, speed_kmh: f64, timing: &SectionTiming) -> SectionStep {
        let mut out = SectionStep::default();

        // A pending off request takes effect once both timers have run out
        if self.off_request
            && self.on_off_cycle_active
            && self.off_timer == 0
            && self.on_timer == 0
        {
            self.is_on = false;
            self.on_off_cycle_active = false;
            self.off_request = false;
            out.transition = Some(false);
        }

        // Latch a new on request, only one on-off cycle may run at a time
        let mut latched = false;
        if self.on_request && !self.on_off_cycle_active {
            let (ticks, overflow) = timing.on_timer_ticks(speed_kmh);
            self.on_timer = ticks;
            self.on_off_cycle_active = true;
            latched = true;

            if let Some(requested) = overflow {
                out.on_timer_clamped = Some((requested, ticks));
            }
        }

        // Requests are edge triggered
        self.on_request = false;

        self.off_timer = self.off_timer.saturating_sub(1);

        if self.on_timer > 0 && !latched {
            self.on_timer -= 1;
        }

        let mut turned_on = false;
        if self.on_off_cycle_active && self.on_timer == 0 && !self.is_on {
            self.is_on = true;
            turned_on = true;
            out.transition = Some(true);
        }

        // Hold the section on for the full delay after the on timer expires
        if self.on_timer > 0 || turned_on || !self.off_request {
            self.off_timer = timing.turn_off_delay_ticks;
        }

        out
    }

    /// Turn the section off immediately, clearing all timers and requests.
    ///
    /// Returns true if the section was on.
    pub fn force_off(&mut self) -> bool {
        let was_on = self.is_on;

        self.is_on = false;
        self.on_request = false;
        self.off_request = false;
        self.on_timer = 0;
        self.off_timer = 0;
        self.on_off_cycle_active = false;

        was_on
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::test::test_config;

    fn timing(delay: u32) -> SectionTiming {
        SectionTiming {
            look_ahead: 1.0,
            turn_off_delay_ticks: delay,
            max_on_timer_ticks: 13,
        }
    }

    /// Run one tick with the given demand, returning the transition.
    fn tick(s: &mut Section, d: SectionDemand, speed: f64, t: &SectionTiming) -> Option<bool> {
        s.apply_demand(d);
        s.step(speed, t).transition
    }

    #[test]
    fn test_on_timer_ticks() {
        let t = timing(0);
        assert_eq!(t.on_timer_ticks(0.0), (1, None));
        assert_eq!(t.on_timer_ticks(2.0), (3, None));
        assert_eq!(t.on_timer_ticks(2.1), (4, None));
        assert_eq!(t.on_timer_ticks(-5.0), (0, None));
        assert_eq!(t.on_timer_ticks(20.0), (13, Some(21.0)));

        let (ticks, requested) = t.on_timer_ticks(f64::NAN);
        assert_eq!(ticks, 13);
        assert!(requested.unwrap().is_nan());
    }

    #[test]
    fn test_on_timer_from_config() {
        let mut config = test_config();
        config.tool.look_ahead = 3.0;
        let t = SectionTiming::from_config(&config);

        // 10 Hz with the default margin of 3 bounds the timer to 13 ticks
        assert_eq!(t.max_on_timer_ticks, 13);

        // ceil(2.0 * 3.0) + 1
        assert_eq!(t.on_timer_ticks(2.0), (7, None));

        let mut s = Section::default();
        s.apply_demand(SectionDemand::On);
        s.step(2.0, &t);
        assert!(s.on_off_cycle_active);
        assert_eq!(s.on_timer, 7);
    }

    #[test]
    fn test_on_delay_and_hold() {
        let t = timing(4);
        let mut s = Section::default();

        // On request at tick 0, speed 2 gives an on timer of 3
        assert_eq!(tick(&mut s, SectionDemand::On, 2.0, &t), None);
        assert!(s.on_off_cycle_active);
        assert_eq!(s.on_timer, 3);

        assert_eq!(tick(&mut s, SectionDemand::Off, 2.0, &t), None);
        assert_eq!(tick(&mut s, SectionDemand::Off, 2.0, &t), None);
        assert_eq!(tick(&mut s, SectionDemand::Off, 2.0, &t), Some(true));

        // Held on for the full delay (ticks 4 to 7)
        for _ in 0..4 {
            assert_eq!(tick(&mut s, SectionDemand::Off, 2.0, &t), None);
            assert!(s.is_on);
        }

        // Off at tick 8
        assert_eq!(tick(&mut s, SectionDemand::Off, 2.0, &t), Some(false));
        assert!(!s.is_on);
        assert!(!s.on_off_cycle_active);
        assert!(!s.off_request);
    }

    #[test]
    fn test_zero_on_timer_turns_on_immediately() {
        let t = timing(0);
        let mut s = Section::default();

        assert_eq!(tick(&mut s, SectionDemand::On, -3.0, &t), Some(true));
        assert_eq!(tick(&mut s, SectionDemand::Off, -3.0, &t), Some(false));
    }

    #[test]
    fn test_continued_demand_keeps_on() {
        let t = timing(2);
        let mut s = Section::default();

        tick(&mut s, SectionDemand::On, 0.0, &t);
        assert_eq!(tick(&mut s, SectionDemand::On, 0.0, &t), Some(true));

        for _ in 0..50 {
            assert_eq!(tick(&mut s, SectionDemand::On, 0.0, &t), None);
            assert!(s.is_on);
            assert_eq!(s.off_timer, 2);
        }

        // No demand at all leaves the section as it is
        for _ in 0..10 {
            assert_eq!(tick(&mut s, SectionDemand::None, 0.0, &t), None);
        }
        assert!(s.is_on);
    }

    #[test]
    fn test_on_request_cancels_off() {
        let t = timing(2);
        let mut s = Section::default();

        tick(&mut s, SectionDemand::On, 0.0, &t);
        tick(&mut s, SectionDemand::On, 0.0, &t);
        assert!(s.is_on);

        tick(&mut s, SectionDemand::Off, 0.0, &t);
        tick(&mut s, SectionDemand::Off, 0.0, &t);
        assert!(s.off_request);

        // An on demand before the off takes effect cancels it and restarts the hold
        tick(&mut s, SectionDemand::On, 0.0, &t);
        assert!(!s.off_request);
        assert_eq!(s.off_timer, 2);

        assert_eq!(tick(&mut s, SectionDemand::Off, 0.0, &t), None);
        assert_eq!(tick(&mut s, SectionDemand::Off, 0.0, &t), None);
        assert_eq!(tick(&mut s, SectionDemand::Off, 0.0, &t), Some(false));
    }

    #[test]
    fn test_off_without_cycle_is_ignored() {
        let t = timing(2);
        let mut s = Section::default();

        for _ in 0..5 {
            assert_eq!(tick(&mut s, SectionDemand::Off, 5.0, &t), None);
        }
        assert!(!s.is_on);
        assert!(!s.on_off_cycle_active);
    }

    #[test]
    fn test_force_off() {
        let t = timing(2);
        let mut s = Section::default();

        tick(&mut s, SectionDemand::On, 0.0, &t);
        tick(&mut s, SectionDemand::On, 0.0, &t);
        assert!(s.force_off());
        assert!(!s.force_off());

        let cleared = Section {
            button: s.button,
            ..Section::default()
        };
        assert_eq!(s, cleared);
    }
}
