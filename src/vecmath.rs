use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Transverse (x, y) vector: fields, accelerations and positions.
#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline(always)]
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
    #[inline(always)]
    pub fn zero() -> Self { Self::new(0.0, 0.0) }
    #[inline(always)]
    pub fn length_squared(self) -> f64 { self.x * self.x + self.y * self.y }
    #[inline(always)]
    pub fn length(self) -> f64 { self.x.hypot(self.y) }
    #[inline(always)]
    pub fn scale(self, scalar: f64) -> Self { Self::new(self.x * scalar, self.y * scalar) }
    #[inline(always)]
    pub fn dot(self, other: Self) -> f64 { self.x * other.x + self.y * other.y }
    #[inline(always)]
    pub fn is_finite(self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self { x: self.x + other.x, y: self.y + other.y }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self { x: self.x - other.x, y: self.y - other.y }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        self.scale(scalar)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y }
    }
}

/// Evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Normal probability density at `x`.
#[inline]
pub fn gaussian_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt())
}

/// Eigen-decomposition of the symmetric matrix `[[a, b], [b, c]]`.
///
/// Returns `(larger, smaller, angle)` where `angle` is the direction of the
/// larger eigenvalue's eigenvector, measured from the first axis towards
/// the second, in `(-pi/2, pi/2]`.
pub fn sym2_eigen(a: f64, b: f64, c: f64) -> (f64, f64, f64) {
    let mean = 0.5 * (a + c);
    let radius = (0.5 * (a - c)).hypot(b);
    (mean + radius, mean - radius, 0.5 * (2.0 * b).atan2(a - c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linspace_endpoints() {
        let v = linspace(-1.0, 1.0, 5);
        assert_eq!(v, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn gaussian_peak() {
        let sigma = 30e-6;
        assert_relative_eq!(
            gaussian_pdf(0.0, 0.0, sigma),
            1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt()),
            max_relative = 1e-12
        );
        assert_relative_eq!(gaussian_pdf(sigma, 0.0, sigma), gaussian_pdf(-sigma, 0.0, sigma));
    }

    #[test]
    fn vector_ops() {
        let a = Vec2::new(3.0, 4.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!(a * 2.0 - a, a);
        assert_eq!(-a + a, Vec2::zero());
    }

    #[test]
    fn symmetric_eigen() {
        let (l1, l2, angle) = sym2_eigen(2.0, 0.0, 1.0);
        assert_eq!((l1, l2, angle), (2.0, 1.0, 0.0));

        // Rotated by 30 degrees: eigenvalues 4 and 1.
        let t = std::f64::consts::PI / 6.0;
        let (c, s) = (t.cos(), t.sin());
        let (l1, l2, angle) = sym2_eigen(4.0 * c * c + s * s, 3.0 * c * s, 4.0 * s * s + c * c);
        assert_relative_eq!(l1, 4.0, epsilon = 1e-12);
        assert_relative_eq!(l2, 1.0, epsilon = 1e-12);
        assert_relative_eq!(angle, t, epsilon = 1e-12);
    }
}
