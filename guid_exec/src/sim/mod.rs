//! # Simulator fix source
//!
//! Kinematic bicycle model of the tractor which produces fixes as if a receiver were fitted. Used
//! for development and unattended runs when no positioning parser is attached.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod client;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Duration, Utc};
use nalgebra::Point2;
use serde::Deserialize;

pub use client::*;
use crate::pose::LocalProjection;
use comms_if::eqpt::gnss::{FixPosition, RawFix};
use util::maths::{heading_vector, wrap_2pi};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Largest steer angle the simulated front axle can reach.
///
/// Units: degrees
pub const MAX_STEER_ANGLE_DEG: f64 = 30.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulator.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Units: degrees
    pub start_lat_deg: f64,

    /// Units: degrees
    pub start_lon_deg: f64,

    /// Units: degrees, 0 = north, clockwise
    #[serde(default)]
    pub start_heading_deg: f64,

    /// Units: kilometers/hour
    pub speed_kmh: f64,

    /// Steer angle of the front wheels, positive to the right.
    ///
    /// Units: degrees
    #[serde(default)]
    pub steer_angle_deg: f64,

    /// Units: meters
    pub wheelbase_m: f64,

    /// GGA quality indicator put into each fix.
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Report speed over ground in the fix, otherwise the core derives it.
    #[serde(default = "default_true")]
    pub report_speed: bool,

    /// Report the heading in the fix, otherwise the core derives it.
    #[serde(default = "default_true")]
    pub report_heading: bool,
}

/// The simulated vehicle.
#[derive(Debug, Clone)]
pub struct Simulator {
    params: SimParams,
    projection: LocalProjection,

    time: DateTime<Utc>,

    /// Antenna position in the local frame.
    position_m: Point2<f64>,

    /// Units: radians
    heading_rad: f64,

    steer_angle_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Simulator {
    /// Create a simulator starting at the given time.
    pub fn new(params: SimParams, start_time: DateTime<Utc>) -> Self {
        let projection = LocalProjection::new(params.start_lat_deg, params.start_lon_deg);
        let heading_rad = wrap_2pi(params.start_heading_deg.to_radians());
        let steer_angle_deg = clamp_steer(params.steer_angle_deg);

        Self {
            params,
            projection,
            time: start_time,
            position_m: Point2::origin(),
            heading_rad,
            steer_angle_deg,
        }
    }

    pub fn set_speed_kmh(&mut self, speed_kmh: f64) {
        self.params.speed_kmh = speed_kmh.max(0.0);
    }

    /// Set the steer angle, limited to the axle's range.
    pub fn set_steer_angle_deg(&mut self, steer_angle_deg: f64) {
        self.steer_angle_deg = clamp_steer(steer_angle_deg);
    }

    pub fn steer_angle_deg(&self) -> f64 {
        self.steer_angle_deg
    }

    pub fn heading_deg(&self) -> f64 {
        self.heading_rad.to_degrees()
    }

    pub fn position_m(&self) -> Point2<f64> {
        self.position_m
    }

    /// Advance the vehicle by `dt_s` seconds and return the fix at the new position.
    pub fn step(&mut self, dt_s: f64) -> RawFix {
        let dist_m = self.params.speed_kmh / 3.6 * dt_s;

        if self.params.wheelbase_m > 0.0 {
            self.heading_rad = wrap_2pi(
                self.heading_rad
                    + dist_m * self.steer_angle_deg.to_radians().tan() / self.params.wheelbase_m,
            );
        }
        self.position_m += heading_vector(self.heading_rad) * dist_m;
        self.time = self.time + Duration::microseconds((dt_s * 1e6).round() as i64);

        self.fix()
    }

    /// The fix at the current position.
    pub fn fix(&self) -> RawFix {
        let (lat_deg, lon_deg) = self.projection.unproject(&self.position_m);

        RawFix {
            timestamp: Some(self.time),
            position: FixPosition::Geodetic { lat_deg, lon_deg },
            heading_deg: if self.params.report_heading {
                Some(self.heading_deg())
            }
            else {
                None
            },
            speed_kmh: if self.params.report_speed {
                Some(self.params.speed_kmh)
            }
            else {
                None
            },
            quality: self.params.quality,
            imu_heading_deg: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn clamp_steer(angle_deg: f64) -> f64 {
    angle_deg.max(-MAX_STEER_ANGLE_DEG).min(MAX_STEER_ANGLE_DEG)
}

fn default_quality() -> u8 {
    8
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
