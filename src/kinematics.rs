//! Relativistic motion of a plasma electron in the transverse plane.

use crate::constants::{C, E_CHARGE, M_ELECTRON};
use crate::error::KinematicsError;
use crate::vecmath::Vec2;

/// Lorentz factor for normalized velocity `(bx, by)`.
pub fn gamma(bx: f64, by: f64) -> Result<f64, KinematicsError> {
    let beta_sq = bx * bx + by * by;
    if !(beta_sq < 1.0) {
        return Err(KinematicsError::Superluminal { bx, by, beta_sq });
    }
    Ok((1.0 - beta_sq).sqrt().recip())
}

/// Time derivative of `(bx, by)` under the transverse field `(ex, ey)`.
///
/// The position is accepted for symmetry with the field evaluation and
/// does not enter the force.
pub fn dbeta_dt(
    _x: f64,
    _y: f64,
    bx: f64,
    by: f64,
    ex: f64,
    ey: f64,
) -> Result<Vec2, KinematicsError> {
    let g = gamma(bx, by)?;
    let g2inv = (g * g).recip();
    let coeff = E_CHARGE / (g * M_ELECTRON * C);

    Ok(Vec2::new(
        coeff * (ex * (by * by + g2inv) - ey * bx * by),
        coeff * (ey * (bx * bx + g2inv) - ex * bx * by),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gamma_at_rest_is_one() {
        assert_eq!(gamma(0.0, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn gamma_is_sign_symmetric() {
        let g = gamma(0.3, 0.4).unwrap();
        assert_eq!(gamma(-0.3, 0.4).unwrap(), g);
        assert_eq!(gamma(0.3, -0.4).unwrap(), g);
        assert_eq!(gamma(-0.3, -0.4).unwrap(), g);
        assert_relative_eq!(g, 1.0 / 0.75f64.sqrt(), max_relative = 1e-15);
    }

    #[test]
    fn gamma_diverges_towards_light_speed() {
        let mut previous = 1.0;
        for beta in [0.9, 0.99, 0.999_9, 0.999_999_9] {
            let g = gamma(beta, 0.0).unwrap();
            assert!(g > previous);
            previous = g;
        }
        assert!(previous > 1e3);
    }

    #[test]
    fn rejects_superluminal_velocity() {
        assert!(matches!(gamma(1.0, 0.0), Err(KinematicsError::Superluminal { .. })));
        assert!(matches!(gamma(0.8, 0.7), Err(KinematicsError::Superluminal { .. })));
        assert!(dbeta_dt(0.0, 0.0, 0.6, 0.8, 1.0, 1.0).is_err());
    }

    #[test]
    fn at_rest_follows_field() {
        let ex = 1e6;
        let a = dbeta_dt(0.0, 0.0, 0.0, 0.0, ex, 0.0).unwrap();
        assert_relative_eq!(a.x, E_CHARGE * ex / (M_ELECTRON * C), max_relative = 1e-15);
        assert_eq!(a.y, 0.0);
    }

    #[test]
    fn zero_field_gives_zero_derivative() {
        let a = dbeta_dt(1e-6, -1e-6, 0.2, -0.1, 0.0, 0.0).unwrap();
        assert_eq!(a, Vec2::zero());
    }

    #[test]
    fn longitudinal_push_suppressed_by_gamma_cubed() {
        // Force parallel to motion scales as 1/gamma^3.
        let bx = 0.8;
        let g = gamma(bx, 0.0).unwrap();
        let a = dbeta_dt(0.0, 0.0, bx, 0.0, 1e6, 0.0).unwrap();
        let rest = dbeta_dt(0.0, 0.0, 0.0, 0.0, 1e6, 0.0).unwrap();
        assert_relative_eq!(a.x, rest.x / g.powi(3), max_relative = 1e-12);
    }
}
