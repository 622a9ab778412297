//! # Pose estimation module
//!
//! Turns validated fixes into the vehicle pose: antenna, pivot and implement reference positions
//! in the local frame, together with the heading, the speed and the distance travelled since the
//! previous fix.
//!
//! Headings follow the navigation convention, 0 is north and angles increase clockwise.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod projection;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use log::{debug, trace};
use nalgebra::Point2;
use serde::Serialize;

// Internal
pub use projection::*;
use crate::fix_ingest::ValidatedFix;
use crate::params::VehicleGeometryConfig;
use util::{maths, time::duration_to_seconds};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Conversion from meters/second to kilometers/hour.
const MPS_TO_KMH: f64 = 3.6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The estimated state of the vehicle at the time of a fix.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct VehiclePose {
    pub timestamp: DateTime<Utc>,

    /// Position of the antenna in the local frame.
    pub antenna_m: Point2<f64>,

    /// Position of the pivot (rear axle centre) in the local frame.
    pub pivot_m: Point2<f64>,

    /// Position of the implement reference point in the local frame.
    pub tool_m: Point2<f64>,

    /// Units: radians in [0, 2pi), 0 = north, clockwise.
    pub heading_rad: f64,

    /// Units: kilometers/hour
    pub speed_kmh: f64,

    /// Distance the implement reference point moved since the previous pose.
    ///
    /// Units: meters
    pub step_m: f64,

    /// True if the antenna moved further than the maximum fix jump since the previous pose.
    pub discontinuity: bool,

    /// Antenna position at the last heading update. Derived headings are measured from here.
    pub heading_anchor_m: Point2<f64>,
}

/// Keeps the projection and the last pose between fixes.
#[derive(Debug, Clone, Default)]
pub struct PoseEstimator {
    projection: Option<LocalProjection>,
    pose: Option<VehiclePose>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehiclePose {
    pub fn heading_deg(&self) -> f64 {
        self.heading_rad.to_degrees()
    }
}

impl PoseEstimator {
    /// Estimate the pose at the given fix and remember it.
    ///
    /// The first geodetic fix sets the projection reference.
    pub fn update(&mut self, fix: &ValidatedFix, config: &VehicleGeometryConfig) -> VehiclePose {
        let projection = match self.projection {
            Some(p) => p,
            None => {
                let p = LocalProjection::from_position(&fix.position);
                debug!("Local projection reference set to {:?}", p.reference_deg());
                self.projection = Some(p);
                p
            }
        };

        let antenna_m = projection.project(&fix.position);
        let pose = update_pose(fix, antenna_m, self.pose.as_ref(), config);

        trace!(
            "Pose: ({:.3}, {:.3}) m, {:.2} deg, {:.2} km/h",
            pose.pivot_m.x,
            pose.pivot_m.y,
            pose.heading_deg(),
            pose.speed_kmh
        );

        self.pose = Some(pose);
        pose
    }

    pub fn pose(&self) -> Option<&VehiclePose> {
        self.pose.as_ref()
    }

    pub fn projection(&self) -> Option<&LocalProjection> {
        self.projection.as_ref()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the pose for a fix whose antenna position has already been projected.
///
/// - A reported heading is used as is, and moves the heading anchor to the antenna.
/// - Otherwise the heading is derived from the heading anchor to the antenna. Until the antenna
///   is the minimum step away from the anchor the previous heading is kept, so a stationary
///   vehicle does not wander while a slow one still turns once it has covered the step.
/// - A reported speed is used as is, otherwise it is derived from the step and elapsed time.
/// - If no time elapsed since the previous fix the previous speed is reused and the step is
///   zero.
/// - A step longer than the maximum fix jump is flagged as a discontinuity, and neither the
///   heading nor the speed is derived from it.
pub fn update_pose(
    fix: &ValidatedFix,
    antenna_m: Point2<f64>,
    previous: Option<&VehiclePose>,
    config: &VehicleGeometryConfig,
) -> VehiclePose {
    let reported_heading = fix.heading_deg.map(f64::to_radians);

    let (heading_rad, speed_kmh, discontinuity, heading_anchor_m) = match previous {
        None => (
            reported_heading.unwrap_or(0.0),
            fix.speed_kmh.unwrap_or(0.0),
            false,
            antenna_m,
        ),
        Some(prev) => {
            let elapsed_s = duration_to_seconds(fix.timestamp - prev.timestamp).unwrap_or(0.0);
            let delta = antenna_m - prev.antenna_m;
            let dist_m = delta.norm();
            let jump = dist_m > config.fix.max_fix_jump_m;

            if jump {
                debug!(
                    "Fix jumped {:.2} m, more than the {:.2} m limit",
                    dist_m, config.fix.max_fix_jump_m
                );
            }

            if elapsed_s <= 0.0 {
                (
                    prev.heading_rad,
                    fix.speed_kmh.unwrap_or(prev.speed_kmh),
                    jump,
                    prev.heading_anchor_m,
                )
            }
            else {
                let from_anchor = antenna_m - prev.heading_anchor_m;

                let (heading, anchor) = if let Some(h) = reported_heading {
                    (fuse_imu(h, fix, config), antenna_m)
                }
                else if jump {
                    // Restart the anchor so the next heading is not taken across the jump
                    (prev.heading_rad, antenna_m)
                }
                else if from_anchor.norm() < config.fix.min_fix_step_dist_m {
                    (prev.heading_rad, prev.heading_anchor_m)
                }
                else {
                    (fuse_imu(from_anchor.x.atan2(from_anchor.y), fix, config), antenna_m)
                };

                let speed = match fix.speed_kmh {
                    Some(s) => s,
                    None if jump => prev.speed_kmh,
                    None => dist_m / elapsed_s * MPS_TO_KMH,
                };

                (heading, speed, jump, anchor)
            }
        }
    };

    let heading_rad = maths::wrap_2pi(heading_rad);

    // Antenna to pivot, then pivot to the implement along the heading
    let pivot_m = maths::body_to_world(
        antenna_m,
        heading_rad,
        -config.vehicle.antenna_offset_m,
        -config.vehicle.antenna_pivot_m,
    );
    let tool_m = maths::body_to_world(pivot_m, heading_rad, 0.0, config.vehicle.hitch_length_m);

    let step_m = match previous {
        Some(prev) if fix.timestamp > prev.timestamp => (tool_m - prev.tool_m).norm(),
        _ => 0.0,
    };

    VehiclePose {
        timestamp: fix.timestamp,
        antenna_m,
        pivot_m,
        tool_m,
        heading_rad,
        speed_kmh,
        step_m,
        discontinuity,
        heading_anchor_m,
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Blend the IMU heading into the GNSS heading along the shortest arc.
fn fuse_imu(heading_rad: f64, fix: &ValidatedFix, config: &VehicleGeometryConfig) -> f64 {
    let weight = config.fix.imu_fusion_weight;

    match fix.imu_heading_deg {
        Some(imu) if weight > 0.0 => {
            let heading_rad = maths::wrap_2pi(heading_rad);
            let delta = maths::get_ang_dist_2pi(heading_rad, imu.to_radians());
            heading_rad + weight * delta
        }
        _ => heading_rad,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::params::test::test_config;
    use chrono::{Duration, TimeZone};
    use comms_if::eqpt::gnss::{FixPosition, FixQuality};
    use nalgebra::Vector2;

    /// A stationary pose with all reference points at the same place.
    pub(crate) fn pose_at(x: f64, y: f64, heading_deg: f64) -> VehiclePose {
        let p = Point2::new(x, y);
        VehiclePose {
            timestamp: Utc.timestamp_millis(0),
            antenna_m: p,
            pivot_m: p,
            tool_m: p,
            heading_rad: heading_deg.to_radians(),
            speed_kmh: 0.0,
            step_m: 0.0,
            discontinuity: false,
            heading_anchor_m: p,
        }
    }

    fn fix(ms: i64, easting_m: f64, northing_m: f64) -> ValidatedFix {
        ValidatedFix {
            timestamp: Utc.timestamp_millis(ms),
            position: FixPosition::Local {
                northing_m,
                easting_m,
            },
            heading_deg: None,
            speed_kmh: None,
            quality: FixQuality::RtkFixed,
            imu_heading_deg: None,
        }
    }

    fn run(fixes: &[ValidatedFix], config: &VehicleGeometryConfig) -> Vec<VehiclePose> {
        let mut est = PoseEstimator::default();
        fixes.iter().map(|f| est.update(f, config)).collect()
    }

    #[test]
    fn test_derived_heading_and_speed() {
        let config = test_config();

        // 1 m east every 100 ms is 36 km/h heading east
        let poses = run(&[fix(0, 0.0, 0.0), fix(100, 1.0, 0.0)], &config);
        let p = poses[1];

        assert!((p.heading_deg() - 90.0).abs() < 1e-9);
        assert!((p.speed_kmh - 36.0).abs() < 1e-9);
        assert!((p.step_m - 1.0).abs() < 1e-9);
        assert!(!p.discontinuity);
    }

    #[test]
    fn test_heading_kept_below_min_step() {
        let config = test_config();

        let poses = run(
            &[
                fix(0, 0.0, 0.0),
                fix(100, 0.0, 1.0),
                fix(200, 0.3, 1.0),
                fix(300, 0.3, 0.9),
            ],
            &config,
        );

        // North, then two sub-threshold steps which must not change it
        assert!(poses[1].heading_rad.abs() < 1e-9);
        assert_eq!(poses[2].heading_rad, poses[1].heading_rad);
        assert_eq!(poses[3].heading_rad, poses[1].heading_rad);
    }

    #[test]
    fn test_heading_follows_slow_curve() {
        let mut config = test_config();
        config.vehicle.antenna_pivot_m = 1.0;
        config.vehicle.hitch_length_m = -2.0;

        // 8 km/h at 10 Hz is 0.22 m per fix, less than the 0.5 m minimum step. Turn right on a
        // 20 m radius starting north at the origin, so the true heading is the arc angle.
        let radius_m = 20.0;
        let step_m = 8.0 / MPS_TO_KMH * 0.1;
        let fixes: Vec<ValidatedFix> = (0..200)
            .map(|k| {
                let theta = k as f64 * step_m / radius_m;
                fix(
                    100 * k as i64,
                    radius_m - radius_m * theta.cos(),
                    radius_m * theta.sin(),
                )
            })
            .collect();

        let poses = run(&fixes, &config);
        let last = poses[199];
        let true_heading_deg = (199.0 * step_m / radius_m).to_degrees();

        assert!(true_heading_deg > 120.0);
        assert!(
            (last.heading_deg() - true_heading_deg).abs() < 3.0,
            "heading {:.2} deg, expected {:.2} deg",
            last.heading_deg(),
            true_heading_deg
        );
        assert!((last.speed_kmh - 8.0).abs() < 0.01);

        // The implement trails 3 m behind the antenna along the true heading
        let h = true_heading_deg.to_radians();
        let expected_tool = last.antenna_m - 3.0 * Vector2::new(h.sin(), h.cos());
        assert!((last.tool_m - expected_tool).norm() < 0.2);
    }

    #[test]
    fn test_reported_heading_below_min_step() {
        let config = test_config();

        let mut f1 = fix(100, 0.0, 0.1);
        f1.heading_deg = Some(30.0);
        let mut f2 = fix(200, 0.05, 0.2);
        f2.heading_deg = Some(35.0);

        let poses = run(&[fix(0, 0.0, 0.0), f1, f2], &config);
        assert!((poses[1].heading_deg() - 30.0).abs() < 1e-9);
        assert!((poses[2].heading_deg() - 35.0).abs() < 1e-9);
    }

    #[test]
    fn test_reported_values() {
        let config = test_config();

        let mut f1 = fix(100, 0.0, 1.0);
        f1.heading_deg = Some(10.0);
        f1.speed_kmh = Some(7.5);

        let poses = run(&[fix(0, 0.0, 0.0), f1], &config);
        assert!((poses[1].heading_deg() - 10.0).abs() < 1e-9);
        assert_eq!(poses[1].speed_kmh, 7.5);
    }

    #[test]
    fn test_zero_elapsed_time() {
        let config = test_config();
        let mut prev = pose_at(0.0, 0.0, 45.0);
        prev.speed_kmh = 12.0;
        prev.timestamp = Utc.timestamp_millis(100);

        let p = update_pose(&fix(100, 5.0, 5.0), Point2::new(5.0, 5.0), Some(&prev), &config);
        assert_eq!(p.speed_kmh, 12.0);
        assert_eq!(p.step_m, 0.0);
        assert!((p.heading_deg() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_jump_flagged() {
        let config = test_config();
        let poses = run(&[fix(0, 0.0, 0.0), fix(100, 0.0, 50.0)], &config);

        assert!(poses[1].discontinuity);
        assert_eq!(poses[1].speed_kmh, 0.0);
        assert!((poses[1].step_m - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_antenna_to_tool() {
        let mut config = test_config();
        config.vehicle.antenna_pivot_m = 2.0;
        config.vehicle.hitch_length_m = -3.0;
        config.vehicle.antenna_offset_m = 0.5;

        let mut f = fix(0, 10.0, 10.0);
        f.heading_deg = Some(90.0);
        let p = run(&[f], &config)[0];

        // Heading east: pivot is 2 m west and 0.5 m north of the antenna
        assert!((p.pivot_m - Point2::new(8.0, 10.5)).norm() < 1e-9);
        assert!((p.tool_m - Point2::new(5.0, 10.5)).norm() < 1e-9);
    }

    #[test]
    fn test_imu_fusion_wraps() {
        let mut config = test_config();
        config.fix.imu_fusion_weight = 0.5;

        let mut f1 = fix(100, 0.0, 1.0);
        f1.heading_deg = Some(350.0);
        f1.imu_heading_deg = Some(10.0);

        let p = run(&[fix(0, 0.0, 0.0), f1], &config)[1];
        assert!(p.heading_deg().abs() < 1e-9 || (p.heading_deg() - 360.0).abs() < 1e-9);
    }

    #[test]
    fn test_geodetic_reference() {
        let config = test_config();
        let mut est = PoseEstimator::default();

        let mut f0 = fix(0, 0.0, 0.0);
        f0.position = FixPosition::Geodetic {
            lat_deg: 53.436026,
            lon_deg: -111.160047,
        };
        let p0 = est.update(&f0, &config);
        assert!(p0.antenna_m.coords.norm() < 1e-9);

        let mut f1 = f0;
        f1.timestamp = f0.timestamp + Duration::milliseconds(100);
        f1.position = FixPosition::Geodetic {
            lat_deg: 53.436036,
            lon_deg: -111.160047,
        };
        let p1 = est.update(&f1, &config);
        assert!((p1.antenna_m.y - 1.1132).abs() < 1e-6);
        assert!(p1.heading_rad.abs() < 1e-9);
    }
}
