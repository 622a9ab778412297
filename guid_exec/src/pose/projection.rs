//! Local tangent plane projection of geodetic fixes

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::gnss::FixPosition;
use nalgebra::Point2;
use serde::Serialize;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Length of one degree of latitude.
///
/// Units: meters/degree
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Flat earth projection about a reference point.
///
/// X is easting and Y is northing, both in meters from the reference. The error grows with the
/// distance from the reference but stays well below a centimeter over a field.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct LocalProjection {
    ref_lat_deg: f64,
    ref_lon_deg: f64,
    meters_per_degree_lon: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocalProjection {
    pub fn new(ref_lat_deg: f64, ref_lon_deg: f64) -> Self {
        Self {
            ref_lat_deg,
            ref_lon_deg,
            meters_per_degree_lon: METERS_PER_DEGREE_LAT * ref_lat_deg.to_radians().cos(),
        }
    }

    /// Use the fix as the reference if it is geodetic, local fixes need no reference.
    pub fn from_position(position: &FixPosition) -> Self {
        match position {
            FixPosition::Geodetic { lat_deg, lon_deg } => Self::new(*lat_deg, *lon_deg),
            FixPosition::Local { .. } => Self::new(0.0, 0.0),
        }
    }

    pub fn reference_deg(&self) -> (f64, f64) {
        (self.ref_lat_deg, self.ref_lon_deg)
    }

    /// Project a fix position into the local frame.
    pub fn project(&self, position: &FixPosition) -> Point2<f64> {
        match position {
            FixPosition::Geodetic { lat_deg, lon_deg } => Point2::new(
                (lon_deg - self.ref_lon_deg) * self.meters_per_degree_lon,
                (lat_deg - self.ref_lat_deg) * METERS_PER_DEGREE_LAT,
            ),
            FixPosition::Local {
                northing_m,
                easting_m,
            } => Point2::new(*easting_m, *northing_m),
        }
    }

    /// Convert a local point back into latitude and longitude.
    pub fn unproject(&self, point: &Point2<f64>) -> (f64, f64) {
        let lat = self.ref_lat_deg + point.y / METERS_PER_DEGREE_LAT;
        let lon = if self.meters_per_degree_lon.abs() > f64::EPSILON {
            self.ref_lon_deg + point.x / self.meters_per_degree_lon
        }
        else {
            self.ref_lon_deg
        };

        (lat, lon)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reference_is_origin() {
        let pos = FixPosition::Geodetic {
            lat_deg: 53.436026,
            lon_deg: -111.160047,
        };
        let proj = LocalProjection::from_position(&pos);
        let p = proj.project(&pos);
        assert!(p.x.abs() < 1e-9 && p.y.abs() < 1e-9);
    }

    #[test]
    fn test_project_distances() {
        let proj = LocalProjection::new(53.0, -111.0);

        // 0.001 degrees of latitude is 111.32 m north
        let p = proj.project(&FixPosition::Geodetic {
            lat_deg: 53.001,
            lon_deg: -111.0,
        });
        assert!(p.x.abs() < 1e-9);
        assert!((p.y - 111.32).abs() < 1e-6);

        // Longitude shrinks with the cosine of the latitude
        let p = proj.project(&FixPosition::Geodetic {
            lat_deg: 53.0,
            lon_deg: -110.999,
        });
        assert!((p.x - 111.32 * 53f64.to_radians().cos()).abs() < 1e-6);

        let (lat, lon) = proj.unproject(&p);
        assert!((lat - 53.0).abs() < 1e-12);
        assert!((lon + 110.999).abs() < 1e-12);
    }

    #[test]
    fn test_local_passthrough() {
        let proj = LocalProjection::new(53.0, -111.0);
        let p = proj.project(&FixPosition::Local {
            northing_m: 5.0,
            easting_m: -2.0,
        });
        assert_eq!(p, Point2::new(-2.0, 5.0));
    }
}
