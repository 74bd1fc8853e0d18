//! Randomized Hough ellipse fit with a known centre.
//!
//! Each trial draws three boundary points and solves the centred conic
//! `A u² + B uv + C v² = 1` through them. Ellipses are quantized into
//! (semi-major, semi-minor, orientation) bins; bins reaching the vote
//! threshold become candidates, refined to the mean of their members.

use super::EllipseCandidate;
use crate::grid::Raster;
use crate::vecmath::sym2_eigen;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, PI};

const ORIENTATION_BINS: i64 = 36;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoughSettings {
    /// Minimum votes for a bin to become a candidate.
    pub threshold: u32,
    /// Number of random point triples drawn.
    pub iterations: u32,
    pub seed: u64,
    /// Smallest accepted semi-minor axis, in boundary pixels.
    pub min_axis: f64,
}

#[derive(Debug, Default)]
struct Votes {
    count: u32,
    sum_a: f64,
    sum_b: f64,
    // Doubled-angle sums, orientation is defined modulo pi.
    sum_cos: f64,
    sum_sin: f64,
}

impl Votes {
    fn add(&mut self, a: f64, b: f64, orientation: f64) {
        self.count += 1;
        self.sum_a += a;
        self.sum_b += b;
        self.sum_cos += (2.0 * orientation).cos();
        self.sum_sin += (2.0 * orientation).sin();
    }

    fn candidate(&self, (xc, yc): (f64, f64)) -> EllipseCandidate {
        let n = self.count as f64;
        EllipseCandidate {
            xc,
            yc,
            a: self.sum_a / n,
            b: self.sum_b / n,
            orientation: 0.5 * self.sum_sin.atan2(self.sum_cos),
            score: n,
        }
    }
}

/// Candidates centred on `center` (boundary-grid indices), ranked by score.
pub fn fit_ellipses(
    boundary: &Raster<bool>,
    center: (f64, f64),
    settings: &HoughSettings,
) -> Vec<EllipseCandidate> {
    let points: Vec<(f64, f64)> = boundary
        .positions(|set| set)
        .into_iter()
        .map(|(i, j)| (i as f64 - center.0, j as f64 - center.1))
        .collect();
    if points.len() < 3 {
        return Vec::new();
    }
    let max_axis = (boundary.nx() as f64).hypot(boundary.ny() as f64);

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut accumulator: BTreeMap<(i64, i64, i64), Votes> = BTreeMap::new();
    for _ in 0..settings.iterations {
        let picked = index::sample(&mut rng, points.len(), 3);
        let triple = [points[picked.index(0)], points[picked.index(1)], points[picked.index(2)]];
        let Some((a, b, orientation)) = centred_conic(triple).and_then(ellipse_axes) else {
            continue;
        };
        if b < settings.min_axis || a > max_axis {
            continue;
        }
        accumulator.entry(bin_key(a, b, orientation)).or_default().add(a, b, orientation);
    }

    let mut candidates: Vec<EllipseCandidate> = accumulator
        .values()
        .filter(|votes| votes.count >= settings.threshold)
        .map(|votes| votes.candidate(center))
        .collect();
    candidates.sort_by(|l, r| r.score.total_cmp(&l.score));
    candidates
}

/// Coefficients `(A, B, C)` of the centred conic through three points.
fn centred_conic(points: [(f64, f64); 3]) -> Option<(f64, f64, f64)> {
    let rows = points.map(|(u, v)| [u * u, u * v, v * v]);
    let det = det3(rows);
    let scale = rows.iter().flatten().fold(1.0f64, |m, v| m.max(v.abs()));
    if det.abs() <= 1e-12 * scale.powi(3) {
        return None;
    }
    let column = |k: usize| det3(rows.map(|mut r| {
        r[k] = 1.0;
        r
    }));
    Some((column(0) / det, column(1) / det, column(2) / det))
}

/// `(semi_major, semi_minor, orientation)` when the conic is an ellipse.
fn ellipse_axes((a, b, c): (f64, f64, f64)) -> Option<(f64, f64, f64)> {
    if !(a > 0.0 && c > 0.0 && 4.0 * a * c - b * b > 0.0) {
        return None;
    }
    let (large, small, angle) = sym2_eigen(a, 0.5 * b, c);
    if small <= 0.0 {
        return None;
    }
    // The major axis follows the smaller eigenvalue.
    Some((small.sqrt().recip(), large.sqrt().recip(), wrap_half_turn(angle + FRAC_PI_2)))
}

fn bin_key(a: f64, b: f64, orientation: f64) -> (i64, i64, i64) {
    let theta = if a - b < 1.0 {
        0
    } else {
        ((orientation / (PI / ORIENTATION_BINS as f64)).round() as i64).rem_euclid(ORIENTATION_BINS)
    };
    (a.round() as i64, b.round() as i64, theta)
}

/// Maps an angle into `(-pi/2, pi/2]`.
fn wrap_half_turn(angle: f64) -> f64 {
    0.5 * (2.0 * angle).sin().atan2((2.0 * angle).cos())
}

fn det3(m: [[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(seed: u64) -> HoughSettings {
        HoughSettings { threshold: 5, iterations: 2000, seed, min_axis: 2.0 }
    }

    fn drawn_ellipse(a: f64, b: f64, theta: f64, center: (f64, f64)) -> Raster<bool> {
        let mut r = Raster::filled(121, 101, false);
        for k in 0..2000 {
            let t = 2.0 * PI * k as f64 / 2000.0;
            let (u, v) = (a * t.cos(), b * t.sin());
            let i = (center.0 + u * theta.cos() - v * theta.sin()).round() as usize;
            let j = (center.1 + u * theta.sin() + v * theta.cos()).round() as usize;
            r.set(i, j, true);
        }
        r
    }

    #[test]
    fn conic_through_circle_points() {
        let (a, b, c) = centred_conic([(2.0, 0.0), (0.0, 2.0), (2f64.sqrt(), 2f64.sqrt())]).unwrap();
        assert!((a - 0.25).abs() < 1e-12 && b.abs() < 1e-12 && (c - 0.25).abs() < 1e-12);
        assert!(centred_conic([(1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]).is_none());
    }

    #[test]
    fn hyperbolas_are_rejected() {
        assert!(ellipse_axes((1.0, 0.0, -1.0)).is_none());
        let (major, minor, orientation) = ellipse_axes((0.25, 0.0, 1.0)).unwrap();
        assert!((major - 2.0).abs() < 1e-12 && (minor - 1.0).abs() < 1e-12);
        assert!(orientation.abs() < 1e-12);
    }

    #[test]
    fn recovers_drawn_ellipse() {
        let boundary = drawn_ellipse(30.0, 15.0, 0.3, (60.0, 50.0));
        let found = fit_ellipses(&boundary, (60.0, 50.0), &settings(0));
        let best = found.first().unwrap();
        assert!((best.a - 30.0).abs() < 1.5, "a = {}", best.a);
        assert!((best.b - 15.0).abs() < 1.5, "b = {}", best.b);
        assert!((best.orientation - 0.3).abs() < 0.1, "orientation = {}", best.orientation);
        assert_eq!((best.xc, best.yc), (60.0, 50.0));
        assert!(found.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(found.iter().all(|c| c.score >= 5.0));
    }

    #[test]
    fn same_seed_same_candidates() {
        let boundary = drawn_ellipse(25.0, 20.0, -0.5, (60.0, 50.0));
        let first = fit_ellipses(&boundary, (60.0, 50.0), &settings(7));
        let second = fit_ellipses(&boundary, (60.0, 50.0), &settings(7));
        assert_eq!(first, second);
    }

    #[test]
    fn too_few_points_gives_nothing() {
        let mut boundary = Raster::filled(10, 10, false);
        boundary.set(1, 1, true);
        boundary.set(5, 5, true);
        assert!(fit_ellipses(&boundary, (4.0, 4.0), &settings(0)).is_empty());
    }
}
