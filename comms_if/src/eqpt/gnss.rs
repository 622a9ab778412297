//! # GNSS Equipment Records
//!
//! The positioning parser decodes receiver sentences into [`RawFix`] records, which are handed to
//! the guidance core once per decode.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds_option, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single decoded positioning update, as produced by the external parser.
///
/// Nothing in this record has been validated yet, the core's fix ingest is responsible for that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFix {
    /// UTC time of the fix, or `None` if the sentence carried no usable time.
    #[serde(with = "ts_milliseconds_option")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Position of the antenna.
    pub position: FixPosition,

    /// Heading (course over ground) reported by the receiver.
    ///
    /// Units: degrees, 0 = north, clockwise.
    pub heading_deg: Option<f64>,

    /// Speed over ground reported by the receiver. `None` if the source does not provide an
    /// authoritative speed, in which case the core derives it from successive positions.
    ///
    /// Units: kilometers/hour
    pub speed_kmh: Option<f64>,

    /// GGA fix quality indicator (0 = invalid, 1 = GPS, 2 = DGPS, ... 8 = simulation).
    pub quality: u8,

    /// Heading from an inertial unit, if one is fitted.
    ///
    /// Units: degrees, 0 = north, clockwise.
    pub imu_heading_deg: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The position carried by a fix.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum FixPosition {
    /// WGS84 latitude and longitude in degrees.
    Geodetic { lat_deg: f64, lon_deg: f64 },

    /// Already projected local coordinates in meters.
    Local { northing_m: f64, easting_m: f64 },
}

/// The decoded GGA fix quality indicator.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum FixQuality {
    Invalid,
    Gps,
    Dgps,
    Pps,
    RtkFixed,
    RtkFloat,
    DeadReckoning,
    Manual,
    Simulation,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FixQuality {
    /// Decode a GGA quality indicator, returning `None` for values outside 0-8.
    pub fn from_gga(indicator: u8) -> Option<Self> {
        match indicator {
            0 => Some(FixQuality::Invalid),
            1 => Some(FixQuality::Gps),
            2 => Some(FixQuality::Dgps),
            3 => Some(FixQuality::Pps),
            4 => Some(FixQuality::RtkFixed),
            5 => Some(FixQuality::RtkFloat),
            6 => Some(FixQuality::DeadReckoning),
            7 => Some(FixQuality::Manual),
            8 => Some(FixQuality::Simulation),
            _ => None,
        }
    }

    /// Returns true if the quality describes a usable position.
    pub fn is_usable(&self) -> bool {
        *self != FixQuality::Invalid
    }
}

impl RawFix {
    /// Build a fix in the local frame, mostly useful for simulators and tests.
    pub fn local(
        timestamp: DateTime<Utc>,
        easting_m: f64,
        northing_m: f64,
        heading_deg: Option<f64>,
        speed_kmh: Option<f64>,
    ) -> Self {
        Self {
            timestamp: Some(timestamp),
            position: FixPosition::Local {
                northing_m,
                easting_m,
            },
            heading_deg,
            speed_kmh,
            quality: 8,
            imu_heading_deg: None,
        }
    }
}
