//! Faddeeva function `w(z) = exp(-z²) erfc(-iz)`.
//!
//! Poppe & Wijers (ACM TOMS 680): a power series near the origin, a
//! Laplace continued fraction far from it and a truncated Taylor
//! expansion in between. Accurate to about 14 significant digits.

use num_complex::Complex64;

/// 2/√π
const FACTOR: f64 = 1.128_379_167_095_512_573_88;

/// Evaluates `w(z)` anywhere in the complex plane.
pub fn w(z: Complex64) -> Complex64 {
    let xabs = z.re.abs();
    let yabs = z.im.abs();
    let x = xabs / 6.3;
    let y = yabs / 4.4;

    let mut qrho = x * x + y * y;
    let mut xquad = xabs * xabs - yabs * yabs;
    let yquad = 2.0 * xabs * yabs;

    let near_origin = qrho < 0.085_264;
    let mut u: f64;
    let mut v: f64;
    // exp(-z²) for the first quadrant, reused by the reflection below
    let (mut u2, mut v2) = (0.0, 0.0);

    if near_origin {
        qrho = (1.0 - 0.85 * y) * qrho.sqrt();
        let n = (6.0 + 72.0 * qrho).round() as usize;
        let mut j = 2 * n + 1;
        let mut xsum = 1.0 / j as f64;
        let mut ysum = 0.0;
        for i in (1..=n).rev() {
            j -= 2;
            let xaux = (xsum * xquad - ysum * yquad) / i as f64;
            ysum = (xsum * yquad + ysum * xquad) / i as f64;
            xsum = xaux + 1.0 / j as f64;
        }
        let u1 = -FACTOR * (xsum * yabs + ysum * xabs) + 1.0;
        let v1 = FACTOR * (xsum * xabs - ysum * yabs);
        let daux = (-xquad).exp();
        u2 = daux * yquad.cos();
        v2 = -daux * yquad.sin();
        u = u1 * u2 - v1 * v2;
        v = u1 * v2 + v1 * u2;
    } else {
        let (h, kapn, nu) = if qrho > 1.0 {
            let qrho = qrho.sqrt();
            (0.0, 0usize, (3.0 + 1442.0 / (26.0 * qrho + 77.0)) as usize)
        } else {
            let qrho = (1.0 - y) * (1.0 - qrho).sqrt();
            (
                1.88 * qrho,
                (7.0 + 34.0 * qrho).round() as usize,
                (16.0 + 26.0 * qrho).round() as usize,
            )
        };
        let h2 = 2.0 * h;
        let taylor = h > 0.0;
        let mut qlambda = if taylor { h2.powi(kapn as i32) } else { 0.0 };

        let (mut rx, mut ry, mut sx, mut sy) = (0.0, 0.0, 0.0, 0.0);
        for n in (0..=nu).rev() {
            let np1 = (n + 1) as f64;
            let tx = yabs + h + np1 * rx;
            let ty = xabs - np1 * ry;
            let c = 0.5 / (tx * tx + ty * ty);
            rx = c * tx;
            ry = c * ty;
            if taylor && n <= kapn {
                let tx = qlambda + sx;
                sx = rx * tx - ry * sy;
                sy = ry * tx + rx * sy;
                qlambda /= h2;
            }
        }

        if taylor {
            u = FACTOR * sx;
            v = FACTOR * sy;
        } else {
            u = FACTOR * rx;
            v = FACTOR * ry;
        }
        if yabs == 0.0 {
            u = (-xabs * xabs).exp();
        }
    }

    // Reflect the first-quadrant value into the quadrant of z.
    if z.im < 0.0 {
        if !near_origin {
            xquad = -xquad;
            let w1 = 2.0 * xquad.exp();
            u2 = w1 * yquad.cos();
            v2 = -w1 * yquad.sin();
        } else {
            u2 *= 2.0;
            v2 *= 2.0;
        }
        u = u2 - u;
        v = v2 - v;
        if z.re > 0.0 {
            v = -v;
        }
    } else if z.re < 0.0 {
        v = -v;
    }

    Complex64::new(u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn imaginary_axis_is_scaled_erfc() {
        // w(iy) = exp(y²) erfc(y)
        let cases = [
            (0.1, 0.896_456_979_969_126_5),
            (0.5, 0.615_690_344_192_925_9),
            (1.0, 0.427_583_576_155_807_0),
            (2.0, 0.255_395_676_310_505_7),
            (5.0, 0.110_704_637_733_068_7),
        ];
        for (y, expected) in cases {
            let value = w(Complex64::new(0.0, y));
            assert_relative_eq!(value.re, expected, max_relative = 1e-12);
            assert_eq!(value.im, 0.0);
        }
    }

    #[test]
    fn real_axis_real_part_is_gaussian() {
        for x in [0.3, 1.0, 3.0] {
            let value = w(Complex64::new(x, 0.0));
            assert_relative_eq!(value.re, (-x * x).exp(), max_relative = 1e-13);
        }
    }

    #[test]
    fn reference_values() {
        let value = w(Complex64::new(1.0, 1.0));
        assert_relative_eq!(value.re, 0.304_744_205_256_912_6, max_relative = 1e-12);
        assert_relative_eq!(value.im, 0.208_218_938_202_831_6, max_relative = 1e-12);
    }

    #[test]
    fn mirror_symmetry() {
        // w(-conj(z)) = conj(w(z))
        let z = Complex64::new(1.3, 0.7);
        let left = w(Complex64::new(-z.re, z.im));
        assert_relative_eq!(left.re, w(z).re, max_relative = 1e-14);
        assert_relative_eq!(left.im, -w(z).im, max_relative = 1e-14);
    }

    #[test]
    fn lower_half_plane_identity() {
        // w(-z) = 2 exp(-z²) - w(z)
        let z = Complex64::new(0.4, 0.9);
        let expected = (-(z * z)).exp() * 2.0 - w(z);
        let value = w(-z);
        assert_relative_eq!(value.re, expected.re, max_relative = 1e-10);
        assert_relative_eq!(value.im, expected.im, max_relative = 1e-10);
    }
}
