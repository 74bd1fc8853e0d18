use crate::error::ConfigError;
use crate::schedule::SliceSchedule;
use crate::vecmath::{linspace, Vec2};
use blowout_common::SwarmConfig;
use chrono::{DateTime, Local};
use rand::distr::Uniform;
use rand::prelude::*;
use std::sync::Arc;

/// Largest number of values held by each history array.
pub const MAX_HISTORY: usize = 1 << 28;

/// Time history of every tracked plasma electron.
///
/// Each array is row-major with shape `(num_steps, num_parts)`: one row per
/// slice. Row 0 is set by the initializer, later rows stay NaN until the
/// stepping loop writes them.
#[derive(Debug)] // Large state shouldn't be cloned casually
pub struct ElectronSwarmState {
    schedule: Arc<SliceSchedule>,
    num_parts: usize,
    x: Vec<f64>,
    y: Vec<f64>,
    bx: Vec<f64>,
    by: Vec<f64>,
    filled_rows: usize,
    completed_at: Option<DateTime<Local>>,
}

/// Borrowed view of one slice while stepping: current rows read-only,
/// next velocity rows writable.
pub(crate) struct SliceView<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub bx: &'a [f64],
    pub by: &'a [f64],
    pub bx_next: &'a mut [f64],
    pub by_next: &'a mut [f64],
}

impl ElectronSwarmState {
    /// Creates a swarm seeded according to `init`.
    pub fn new(schedule: Arc<SliceSchedule>, init: &SwarmConfig) -> Result<Self, ConfigError> {
        match *init {
            SwarmConfig::Grid { num_pts, x_mag, y_mag } => {
                Self::grid(schedule, num_pts as usize, x_mag, y_mag)
            }
            SwarmConfig::Random { num_parts, x_mag, y_mag, seed } => {
                Self::random(schedule, num_parts as usize, x_mag, y_mag, seed)
            }
        }
    }

    /// `num_pts x num_pts` electrons evenly spaced over
    /// `[-x_mag, x_mag] x [-y_mag, y_mag]`, at rest.
    pub fn grid(
        schedule: Arc<SliceSchedule>,
        num_pts: usize,
        x_mag: f64,
        y_mag: f64,
    ) -> Result<Self, ConfigError> {
        if num_pts == 0 {
            return Err(ConfigError::ZeroCount { name: "num_pts" });
        }
        let num_parts = num_pts
            .checked_mul(num_pts)
            .ok_or(ConfigError::ExceedsLimit { name: "swarm history", limit: MAX_HISTORY })?;
        history_len(&schedule, num_parts)?;
        let x_vec = linspace(-x_mag, x_mag, num_pts);
        let y_vec = linspace(-y_mag, y_mag, num_pts);

        // Row-major meshgrid: y varies slowest.
        let mut x0 = Vec::with_capacity(num_parts);
        let mut y0 = Vec::with_capacity(num_parts);
        for &yv in &y_vec {
            for &xv in &x_vec {
                x0.push(xv);
                y0.push(yv);
            }
        }
        Self::at_rest(schedule, x0, y0)
    }

    /// Uniform random electrons in the box, at rest.
    ///
    /// `num_parts / 4` points are drawn in the first quadrant and mirrored
    /// into the other three, so the count is rounded down to a multiple of 4.
    pub fn random(
        schedule: Arc<SliceSchedule>,
        num_parts: usize,
        x_mag: f64,
        y_mag: f64,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        if num_parts < 4 {
            return Err(ConfigError::TooFewForQuadrants(num_parts));
        }
        history_len(&schedule, num_parts)?;
        let dist_x = Uniform::new(0.0, x_mag)
            .map_err(|_| ConfigError::NonPositive { name: "x_mag", value: x_mag })?;
        let dist_y = Uniform::new(0.0, y_mag)
            .map_err(|_| ConfigError::NonPositive { name: "y_mag", value: y_mag })?;

        let mut rng = StdRng::seed_from_u64(seed);
        let num_quad = num_parts / 4;
        let xq: Vec<f64> = (0..num_quad).map(|_| rng.sample(dist_x)).collect();
        let yq: Vec<f64> = (0..num_quad).map(|_| rng.sample(dist_y)).collect();

        let mut x0 = Vec::with_capacity(num_quad * 4);
        let mut y0 = Vec::with_capacity(num_quad * 4);
        for (sign_x, sign_y) in [(1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
            x0.extend(xq.iter().map(|v| sign_x * v));
            y0.extend(yq.iter().map(|v| sign_y * v));
        }
        if num_parts % 4 != 0 {
            log::debug!("Random swarm rounded {} particles down to {}.", num_parts, x0.len());
        }
        Self::at_rest(schedule, x0, y0)
    }

    fn at_rest(schedule: Arc<SliceSchedule>, x0: Vec<f64>, y0: Vec<f64>) -> Result<Self, ConfigError> {
        let num_parts = x0.len();
        let size = history_len(&schedule, num_parts)?;
        let mut x = vec![f64::NAN; size];
        let mut y = vec![f64::NAN; size];
        let mut bx = vec![f64::NAN; size];
        let mut by = vec![f64::NAN; size];
        x[..num_parts].copy_from_slice(&x0);
        y[..num_parts].copy_from_slice(&y0);
        bx[..num_parts].fill(0.0);
        by[..num_parts].fill(0.0);
        log::debug!(
            "Allocated swarm of {} particles over {} slices.",
            num_parts,
            schedule.num_steps()
        );
        Ok(Self { schedule, num_parts, x, y, bx, by, filled_rows: 1, completed_at: None })
    }

    /// Rebuilds a completed swarm from its full persisted history.
    pub fn from_parts(
        schedule: Arc<SliceSchedule>,
        num_parts: usize,
        x: Vec<f64>,
        y: Vec<f64>,
        bx: Vec<f64>,
        by: Vec<f64>,
        completed_at: DateTime<Local>,
    ) -> Result<Self, ConfigError> {
        if num_parts == 0 {
            return Err(ConfigError::ZeroCount { name: "num_parts" });
        }
        let expected = history_len(&schedule, num_parts)?;
        for (name, values) in [("x", &x), ("y", &y), ("bx", &bx), ("by", &by)] {
            if values.len() != expected {
                return Err(ConfigError::ShapeMismatch { name, expected, found: values.len() });
            }
        }
        let filled_rows = schedule.num_steps();
        Ok(Self { schedule, num_parts, x, y, bx, by, filled_rows, completed_at: Some(completed_at) })
    }

    pub fn schedule(&self) -> &Arc<SliceSchedule> {
        &self.schedule
    }

    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    pub fn num_steps(&self) -> usize {
        self.schedule.num_steps()
    }

    /// Number of slices whose rows have been written.
    pub fn filled_rows(&self) -> usize {
        self.filled_rows
    }

    pub fn completed_at(&self) -> Option<DateTime<Local>> {
        self.completed_at
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    fn row<'a>(&self, data: &'a [f64], i: usize) -> Option<&'a [f64]> {
        (i < self.num_steps()).then(|| &data[i * self.num_parts..(i + 1) * self.num_parts])
    }

    pub fn x_row(&self, i: usize) -> Option<&[f64]> { self.row(&self.x, i) }
    pub fn y_row(&self, i: usize) -> Option<&[f64]> { self.row(&self.y, i) }
    pub fn bx_row(&self, i: usize) -> Option<&[f64]> { self.row(&self.bx, i) }
    pub fn by_row(&self, i: usize) -> Option<&[f64]> { self.row(&self.by, i) }

    /// Full row-major histories.
    pub fn x(&self) -> &[f64] { &self.x }
    pub fn y(&self) -> &[f64] { &self.y }
    pub fn bx(&self) -> &[f64] { &self.bx }
    pub fn by(&self) -> &[f64] { &self.by }

    /// Position of particle `j` at slice `i`.
    pub fn position(&self, i: usize, j: usize) -> Option<Vec2> {
        (i < self.num_steps() && j < self.num_parts)
            .then(|| Vec2::new(self.x[i * self.num_parts + j], self.y[i * self.num_parts + j]))
    }

    /// Normalized velocity of particle `j` at slice `i`.
    pub fn velocity(&self, i: usize, j: usize) -> Option<Vec2> {
        (i < self.num_steps() && j < self.num_parts)
            .then(|| Vec2::new(self.bx[i * self.num_parts + j], self.by[i * self.num_parts + j]))
    }

    /// Explicit Euler position push from slice `i` to `i + 1` using the
    /// velocity of slice `i`.
    pub(crate) fn advance_positions(&mut self, i: usize) {
        let n = self.num_parts;
        let step = crate::constants::C * self.schedule.dt();
        for (pos, vel) in [(&mut self.x, &self.bx), (&mut self.y, &self.by)] {
            let (head, tail) = pos.split_at_mut((i + 1) * n);
            tail[..n]
                .iter_mut()
                .zip(&head[i * n..])
                .zip(&vel[i * n..(i + 1) * n])
                .for_each(|((next, current), b)| *next = current + b * step);
        }
    }

    /// Splits out the rows needed to update velocities at slice `i`.
    pub(crate) fn slice_view(&mut self, i: usize) -> SliceView<'_> {
        let n = self.num_parts;
        let (bx_head, bx_tail) = self.bx.split_at_mut((i + 1) * n);
        let (by_head, by_tail) = self.by.split_at_mut((i + 1) * n);
        SliceView {
            x: &self.x[i * n..(i + 1) * n],
            y: &self.y[i * n..(i + 1) * n],
            bx: &bx_head[i * n..],
            by: &by_head[i * n..],
            bx_next: &mut bx_tail[..n],
            by_next: &mut by_tail[..n],
        }
    }

    pub(crate) fn mark_filled(&mut self, rows: usize) {
        self.filled_rows = rows.min(self.num_steps());
    }

    pub(crate) fn mark_completed(&mut self, timestamp: DateTime<Local>) {
        self.completed_at = Some(timestamp);
    }
}

/// Values per history array, `num_steps * num_parts`, bounded by [`MAX_HISTORY`].
fn history_len(schedule: &SliceSchedule, num_parts: usize) -> Result<usize, ConfigError> {
    schedule
        .num_steps()
        .checked_mul(num_parts)
        .filter(|&len| len <= MAX_HISTORY)
        .ok_or(ConfigError::ExceedsLimit { name: "swarm history", limit: MAX_HISTORY })
}
