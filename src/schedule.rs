use crate::constants::{C, EPSILON_0, E_CHARGE, M_ELECTRON};
use crate::error::ConfigError;
use blowout_common::ScheduleConfig;
use serde::{Deserialize, Serialize};

/// Largest number of slices a schedule may hold.
pub const MAX_SLICES: usize = 10_000_000;

/// Longitudinal sampling of the simulated plasma.
///
/// Slices run from `xi_start` to `xi_end` inclusive in steps of `dxi`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceSchedule {
    xi_start: f64,
    xi_end: f64,
    dxi: f64,
    /// Plasma density (cm^-3).
    density: f64,
    slices: Vec<f64>,
}

impl SliceSchedule {
    pub fn new(xi_start: f64, xi_end: f64, dxi: f64, density: f64) -> Result<Self, ConfigError> {
        if !(xi_start.is_finite() && xi_end.is_finite() && dxi.is_finite()) || dxi == 0.0 {
            return Err(ConfigError::BadStep { xi_start, xi_end, dxi });
        }
        if !(density > 0.0 && density.is_finite()) {
            return Err(ConfigError::NonPositive { name: "density", value: density });
        }

        // Tolerate rounding in the span so the end point is kept.
        let ratio = (xi_end - xi_start) / dxi;
        if ratio < -1e-9 {
            return Err(ConfigError::BadStep { xi_start, xi_end, dxi });
        }
        let span = (ratio + 1e-9).floor();
        if span >= MAX_SLICES as f64 {
            return Err(ConfigError::ExceedsLimit { name: "slice count", limit: MAX_SLICES });
        }
        let num_steps = span as usize + 1;
        let slices = (0..num_steps).map(|i| xi_start + i as f64 * dxi).collect();

        Ok(Self { xi_start, xi_end, dxi, density, slices })
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        Self::new(config.xi_start, config.xi_end, config.dxi, config.density)
    }

    pub fn xi_start(&self) -> f64 { self.xi_start }
    pub fn xi_end(&self) -> f64 { self.xi_end }
    pub fn dxi(&self) -> f64 { self.dxi }
    pub fn density(&self) -> f64 { self.density }

    /// Ordered slice positions.
    pub fn slices(&self) -> &[f64] {
        &self.slices
    }

    pub fn num_steps(&self) -> usize {
        self.slices.len()
    }

    /// Position of slice `i`.
    pub fn xi(&self, i: usize) -> Option<f64> {
        self.slices.get(i).copied()
    }

    /// Time step between slices (s).
    pub fn dt(&self) -> f64 {
        self.dxi / C
    }

    /// Electron plasma angular frequency (rad/s).
    pub fn plasma_frequency(&self) -> f64 {
        let density_m3 = self.density * 1e6;
        (density_m3 * E_CHARGE * E_CHARGE / (EPSILON_0 * M_ELECTRON)).sqrt()
    }

    /// Collisionless skin depth c/ωp (m).
    pub fn skin_depth(&self) -> f64 {
        C / self.plasma_frequency()
    }
}
