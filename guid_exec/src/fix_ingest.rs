//! # Fix ingest
//!
//! Validates raw fixes from the positioning parser before they reach pose estimation. A rejected
//! fix leaves no trace: the previous pose and all section state stay as they were.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::{DateTime, Utc};
use log::trace;
use serde::Serialize;
use thiserror::Error;

// Internal
use comms_if::eqpt::gnss::{FixPosition, FixQuality, RawFix};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A fix which passed validation.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ValidatedFix {
    pub timestamp: DateTime<Utc>,
    pub position: FixPosition,

    /// Reported heading normalised into [0, 360).
    ///
    /// Units: degrees
    pub heading_deg: Option<f64>,

    /// Units: kilometers/hour
    pub speed_kmh: Option<f64>,

    pub quality: FixQuality,

    /// IMU heading normalised into [0, 360).
    ///
    /// Units: degrees
    pub imu_heading_deg: Option<f64>,
}

/// Fix validator, remembers the time of the last accepted fix and the kind of position the
/// first one carried.
#[derive(Debug, Clone)]
pub struct FixIngest {
    min_quality: FixQuality,
    last_timestamp: Option<DateTime<Utc>>,

    /// True once a geodetic fix was accepted, false once a local one was.
    geodetic: Option<bool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a fix can be rejected.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum FixRejectReason {
    #[error("quality indicator {0} is not a valid GGA quality")]
    InvalidQuality(u8),

    #[error("quality {0:?} is below the accepted minimum")]
    QualityTooLow(FixQuality),

    #[error("the fix has no timestamp")]
    MissingTimestamp,

    #[error("timestamp {got} is not after the last accepted fix at {last}")]
    NonMonotonicTimestamp {
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("{0} is not finite")]
    NonFinite(&'static str),

    #[error("{0} of {1} is out of range")]
    OutOfRange(&'static str, f64),

    #[error("speed of {0} km/h is negative")]
    NegativeSpeed(f64),

    #[error("position is {got} but the track started {expected}")]
    PositionKindChanged {
        expected: &'static str,
        got: &'static str,
    },
}

/// Errors raised by fix ingest.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum FixError {
    #[error("Fix rejected: {0}")]
    Invalid(FixRejectReason),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for FixIngest {
    fn default() -> Self {
        Self::new(FixQuality::Gps)
    }
}

impl FixIngest {
    pub fn new(min_quality: FixQuality) -> Self {
        Self {
            min_quality,
            last_timestamp: None,
            geodetic: None,
        }
    }

    pub fn set_min_quality(&mut self, min_quality: FixQuality) {
        self.min_quality = min_quality;
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Forget the last accepted fix, so that the next fix is accepted whatever its time.
    ///
    /// The position kind is kept, the local frame does not change.
    pub fn reset(&mut self) {
        self.last_timestamp = None;
    }

    /// Validate a raw fix.
    pub fn accept_fix(&mut self, raw: &RawFix) -> Result<ValidatedFix, FixError> {
        let fix = self.validate(raw).map_err(FixError::Invalid)?;

        self.last_timestamp = Some(fix.timestamp);
        self.geodetic = Some(is_geodetic(&fix.position));
        trace!("Accepted fix at {}", fix.timestamp);

        Ok(fix)
    }

    fn validate(&self, raw: &RawFix) -> Result<ValidatedFix, FixRejectReason> {
        let quality = FixQuality::from_gga(raw.quality)
            .ok_or(FixRejectReason::InvalidQuality(raw.quality))?;
        if !quality.is_usable() || quality < self.min_quality {
            return Err(FixRejectReason::QualityTooLow(quality));
        }

        let timestamp = raw.timestamp.ok_or(FixRejectReason::MissingTimestamp)?;

        match raw.position {
            FixPosition::Geodetic { lat_deg, lon_deg } => {
                check_finite("latitude", lat_deg)?;
                check_finite("longitude", lon_deg)?;
                if lat_deg.abs() > 90.0 {
                    return Err(FixRejectReason::OutOfRange("latitude", lat_deg));
                }
                if lon_deg.abs() > 180.0 {
                    return Err(FixRejectReason::OutOfRange("longitude", lon_deg));
                }
            }
            FixPosition::Local {
                northing_m,
                easting_m,
            } => {
                check_finite("northing", northing_m)?;
                check_finite("easting", easting_m)?;
            }
        }

        let heading_deg = raw
            .heading_deg
            .map(|h| check_finite("heading", h).map(normalise_deg))
            .transpose()?;
        let imu_heading_deg = raw
            .imu_heading_deg
            .map(|h| check_finite("IMU heading", h).map(normalise_deg))
            .transpose()?;

        if let Some(speed) = raw.speed_kmh {
            check_finite("speed", speed)?;
            if speed < 0.0 {
                return Err(FixRejectReason::NegativeSpeed(speed));
            }
        }

        if let Some(geodetic) = self.geodetic {
            if geodetic != is_geodetic(&raw.position) {
                return Err(FixRejectReason::PositionKindChanged {
                    expected: kind_str(geodetic),
                    got: kind_str(!geodetic),
                });
            }
        }

        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Err(FixRejectReason::NonMonotonicTimestamp {
                    last,
                    got: timestamp,
                });
            }
        }

        Ok(ValidatedFix {
            timestamp,
            position: raw.position,
            heading_deg,
            speed_kmh: raw.speed_kmh,
            quality,
            imu_heading_deg,
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_finite(name: &'static str, value: f64) -> Result<f64, FixRejectReason> {
    if value.is_finite() {
        Ok(value)
    }
    else {
        Err(FixRejectReason::NonFinite(name))
    }
}

fn is_geodetic(position: &FixPosition) -> bool {
    matches!(position, FixPosition::Geodetic { .. })
}

fn kind_str(geodetic: bool) -> &'static str {
    if geodetic {
        "geodetic"
    }
    else {
        "local"
    }
}

fn normalise_deg(value: f64) -> f64 {
    let h = value.rem_euclid(360.0);
    if h >= 360.0 {
        0.0
    }
    else {
        h
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis(1_600_000_000_000 + ms)
    }

    fn raw(ms: i64) -> RawFix {
        RawFix::local(t(ms), 1.0, 2.0, Some(90.0), Some(5.0))
    }

    fn rejected(ingest: &mut FixIngest, fix: &RawFix) -> FixRejectReason {
        match ingest.accept_fix(fix) {
            Err(FixError::Invalid(r)) => r,
            Ok(f) => panic!("Expected the fix to be rejected, got {:?}", f),
        }
    }

    #[test]
    fn test_accept() {
        let mut ingest = FixIngest::default();
        let fix = ingest.accept_fix(&raw(0)).unwrap();

        assert_eq!(fix.timestamp, t(0));
        assert_eq!(fix.quality, FixQuality::Simulation);
        assert_eq!(fix.heading_deg, Some(90.0));
        assert_eq!(ingest.last_timestamp(), Some(t(0)));
    }

    #[test]
    fn test_quality() {
        let mut ingest = FixIngest::new(FixQuality::Dgps);

        let mut fix = raw(0);
        fix.quality = 0;
        assert_eq!(
            rejected(&mut ingest, &fix),
            FixRejectReason::QualityTooLow(FixQuality::Invalid)
        );

        fix.quality = 1;
        assert_eq!(
            rejected(&mut ingest, &fix),
            FixRejectReason::QualityTooLow(FixQuality::Gps)
        );

        fix.quality = 12;
        assert_eq!(rejected(&mut ingest, &fix), FixRejectReason::InvalidQuality(12));

        fix.quality = 4;
        ingest.accept_fix(&fix).unwrap();
    }

    #[test]
    fn test_timestamps() {
        let mut ingest = FixIngest::default();

        let mut fix = raw(0);
        fix.timestamp = None;
        assert_eq!(rejected(&mut ingest, &fix), FixRejectReason::MissingTimestamp);

        ingest.accept_fix(&raw(100)).unwrap();

        // Same and earlier times are rejected, and do not move the last time
        assert!(matches!(
            rejected(&mut ingest, &raw(100)),
            FixRejectReason::NonMonotonicTimestamp { .. }
        ));
        assert!(matches!(
            rejected(&mut ingest, &raw(50)),
            FixRejectReason::NonMonotonicTimestamp { .. }
        ));
        assert_eq!(ingest.last_timestamp(), Some(t(100)));

        ingest.accept_fix(&raw(200)).unwrap();

        ingest.reset();
        ingest.accept_fix(&raw(0)).unwrap();
        assert_eq!(ingest.last_timestamp().unwrap() + Duration::milliseconds(1), t(1));
    }

    #[test]
    fn test_position_kind_fixed_by_first_fix() {
        let mut ingest = FixIngest::default();
        ingest.accept_fix(&raw(0)).unwrap();

        let mut fix = raw(100);
        fix.position = FixPosition::Geodetic {
            lat_deg: 53.4,
            lon_deg: -111.2,
        };
        assert_eq!(
            rejected(&mut ingest, &fix),
            FixRejectReason::PositionKindChanged {
                expected: "local",
                got: "geodetic",
            }
        );
        assert_eq!(ingest.last_timestamp(), Some(t(0)));

        // The kind survives a reset
        ingest.reset();
        assert!(matches!(
            rejected(&mut ingest, &fix),
            FixRejectReason::PositionKindChanged { .. }
        ));

        ingest.accept_fix(&raw(200)).unwrap();
    }

    #[test]
    fn test_values() {
        let mut ingest = FixIngest::default();

        let mut fix = raw(0);
        fix.position = FixPosition::Geodetic {
            lat_deg: 91.0,
            lon_deg: 0.0,
        };
        assert_eq!(
            rejected(&mut ingest, &fix),
            FixRejectReason::OutOfRange("latitude", 91.0)
        );

        let mut fix = raw(0);
        fix.position = FixPosition::Local {
            northing_m: f64::NAN,
            easting_m: 0.0,
        };
        assert_eq!(rejected(&mut ingest, &fix), FixRejectReason::NonFinite("northing"));

        let mut fix = raw(0);
        fix.speed_kmh = Some(-1.0);
        assert_eq!(rejected(&mut ingest, &fix), FixRejectReason::NegativeSpeed(-1.0));

        let mut fix = raw(0);
        fix.heading_deg = Some(f64::INFINITY);
        assert_eq!(rejected(&mut ingest, &fix), FixRejectReason::NonFinite("heading"));

        // Headings are normalised
        let mut fix = raw(0);
        fix.heading_deg = Some(-90.0);
        fix.imu_heading_deg = Some(720.0);
        let v = ingest.accept_fix(&fix).unwrap();
        assert_eq!(v.heading_deg, Some(270.0));
        assert_eq!(v.imu_heading_deg, Some(0.0));
    }
}
