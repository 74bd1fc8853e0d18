//! Transverse electric field of a Gaussian line charge.
//!
//! Elliptical distributions use the Bassetti-Erskine closed form, round
//! ones the radial Gauss-law expression. `q` is a line charge density
//! (C/m); fields are returned in V/m.

use crate::constants::EPSILON_0;
use crate::error::FieldError;
use crate::faddeeva;
use crate::vecmath::Vec2;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Field at `(x, y)` of a distribution with spreads `sx >= sy`.
///
/// Equal spreads route to [`field_circular`]; `sx < sy` is rejected, the
/// caller is responsible for orienting the distribution.
pub fn field(x: f64, y: f64, sx: f64, sy: f64, q: f64) -> Result<Vec2, FieldError> {
    if !(x.is_finite() && y.is_finite()) {
        return Err(FieldError::NonFinite { x, y });
    }
    if !(sx > 0.0 && sy > 0.0) {
        return Err(FieldError::NonPositiveSpread { sx, sy });
    }
    if sx == sy {
        return Ok(field_circular(x, y, sx, q));
    }
    field_elliptical(x, y, sx, sy, q)
}

/// Bassetti-Erskine field, valid for `sx > sy > 0`.
pub fn field_elliptical(x: f64, y: f64, sx: f64, sy: f64, q: f64) -> Result<Vec2, FieldError> {
    if !(sx > sy) {
        return Err(FieldError::Misoriented { sx, sy });
    }
    if x == 0.0 && y == 0.0 {
        return Ok(Vec2::zero());
    }

    let r = sy / sx;
    let k = (2.0 * (sx * sx - sy * sy)).sqrt();
    // Closed form holds in the first quadrant; reflect afterwards.
    let a = x.abs() / k;
    let b = y.abs() / k;

    let z1 = Complex64::new(a, b);
    let z2 = Complex64::new(a * r, b / r);
    // -z1² + z2² has no imaginary part
    let exponent = a * a * (r * r - 1.0) - b * b * (1.0 / (r * r) - 1.0);
    let bracket = faddeeva::w(z1) - faddeeva::w(z2) * exponent.exp();

    let prefactor = q / (2.0 * EPSILON_0 * PI.sqrt() * k);
    let ec = Complex64::new(0.0, -prefactor) * bracket;

    Ok(Vec2::new(ec.re * sign(x), -ec.im * sign(y)))
}

/// Field of a round distribution with spread `sr`. Zero on axis.
pub fn field_circular(x: f64, y: f64, sr: f64, q: f64) -> Vec2 {
    let r = x.hypot(y);
    if r == 0.0 {
        return Vec2::zero();
    }
    let magnitude = q / (2.0 * PI * EPSILON_0 * r) * -(-r * r / (2.0 * sr * sr)).exp_m1();
    Vec2::new(magnitude * x / r, magnitude * y / r)
}

#[inline]
fn sign(v: f64) -> f64 {
    if v < 0.0 { -1.0 } else { 1.0 }
}
