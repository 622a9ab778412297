//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Isometry2, Point2, Vector2};
use num_traits::Float;

/// Get the signed angular distance between two angles in the range of [0, 2pi].
///
/// This function will return the shortest signed distance between a and b accounting for wrapping
/// between 0 and 2pi.
pub fn get_ang_dist_2pi<T>(a: T, b: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();
    
    let c = rem_euclid(a - b, tau_t);
    let d = rem_euclid(b - a, tau_t);

    if c < d {
        return -c
    }
    else {
        return d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
/// This result is not an element of the function's codomain, but it is the
/// closest floating point number in the real numbers and thus fulfills the
/// property `self == self.div_euclid(rhs) * rhs + self.rem_euclid(rhs)`
/// approximatively.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub + std::ops::Rem
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() { r + rhs.abs() } else { r }
}

/// Get the signed shortest angular distance from `a` to `b`, both in degrees.
///
/// The result is in the range (-180, 180], so that going from 359 to 1 degrees gives +2.
pub fn get_ang_dist_deg(a: f64, b: f64) -> f64 {
    get_ang_dist_2pi(a.to_radians(), b.to_radians()).to_degrees()
}

/// Wrap an angle in radians into the range [0, 2pi).
pub fn wrap_2pi(value: f64) -> f64 {
    let w = rem_euclid(value, std::f64::consts::TAU);
    // Round off can give exactly tau for tiny negative inputs
    if w >= std::f64::consts::TAU { 0.0 } else { w }
}

/// Build the rigid transform of a body with the given position and heading.
///
/// Headings follow the navigation convention: 0 is north (+Y), increasing clockwise. The body
/// frame is X right, Y forward, so a body offset of `(right_m, fwd_m)` maps into the world frame
/// through the returned isometry.
pub fn heading_frame(position: Point2<f64>, heading_rad: f64) -> Isometry2<f64> {
    // A clockwise heading is a negative rotation about +Z
    Isometry2::new(position.coords, -heading_rad)
}

/// Transform a body frame offset `(right_m, fwd_m)` into a world frame point.
pub fn body_to_world(
    position: Point2<f64>,
    heading_rad: f64,
    right_m: f64,
    fwd_m: f64
) -> Point2<f64> {
    heading_frame(position, heading_rad) * Point2::new(right_m, fwd_m)
}

/// Unit vector pointing along the given navigation heading.
pub fn heading_vector(heading_rad: f64) -> Vector2<f64> {
    Vector2::new(heading_rad.sin(), heading_rad.cos())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_ang_dist_2pi() {
        const TAU: f64 = std::f64::consts::TAU;
        const PI: f64 = std::f64::consts::PI;

        assert_eq!(get_ang_dist_2pi(1f64, 2f64), 1f64);
        assert_eq!(get_ang_dist_2pi(2f64, 1f64), -1f64);
        assert_eq!(get_ang_dist_2pi(0f64, TAU), 0f64);
        assert_eq!(get_ang_dist_2pi(TAU, 0f64), 0f64);
        assert_eq!(get_ang_dist_2pi(1f64, TAU), -1f64);
        assert_eq!(get_ang_dist_2pi(0f64, TAU - 1f64), -1f64);
        assert_eq!(get_ang_dist_2pi(TAU - 1f64, 1f64), 2f64);
        assert!((get_ang_dist_2pi(0.5 * PI, 1.5 * PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn test_get_ang_dist_deg() {
        assert!((get_ang_dist_deg(359.0, 1.0) - 2.0).abs() < 1e-9);
        assert!((get_ang_dist_deg(1.0, 359.0) + 2.0).abs() < 1e-9);
        assert!((get_ang_dist_deg(90.0, 45.0) + 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_wrap_2pi() {
        const TAU: f64 = std::f64::consts::TAU;

        assert!((wrap_2pi(-0.5) - (TAU - 0.5)).abs() < 1e-12);
        assert!((wrap_2pi(TAU + 0.25) - 0.25).abs() < 1e-12);
        assert!(wrap_2pi(-1e-20) < TAU);
    }

    #[test]
    fn test_body_to_world() {
        const FRAC_PI_2: f64 = std::f64::consts::FRAC_PI_2;
        let origin = Point2::new(10.0, 20.0);

        // Heading north, 1 m forward is +Y, 1 m right is +X
        let p = body_to_world(origin, 0.0, 1.0, 2.0);
        assert!((p.x - 11.0).abs() < 1e-12 && (p.y - 22.0).abs() < 1e-12);

        // Heading east, forward is +X and right is -Y
        let p = body_to_world(origin, FRAC_PI_2, 1.0, 2.0);
        assert!((p.x - 12.0).abs() < 1e-12 && (p.y - 19.0).abs() < 1e-12);

        let v = heading_vector(FRAC_PI_2);
        assert!((v.x - 1.0).abs() < 1e-12 && v.y.abs() < 1e-12);
    }
}