use crate::error::{ConfigError, FieldError};
use crate::field;
use crate::vecmath::{gaussian_pdf, Vec2};
use blowout_common::BunchConfig;
use serde::{Deserialize, Serialize};

/// Parameters of the Gaussian drive bunch, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BunchDescriptor {
    sx: f64,
    sy: f64,
    sz: f64,
    charge: f64,
    gamma: f64,
}

impl BunchDescriptor {
    /// Creates a bunch, rejecting non-positive spreads or gamma and a bunch
    /// wider in y than in x.
    pub fn new(sx: f64, sy: f64, sz: f64, charge: f64, gamma: f64) -> Result<Self, ConfigError> {
        for (name, value) in [("sx", sx), ("sy", sy), ("sz", sz), ("gamma", gamma)] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if sx < sy {
            return Err(ConfigError::Misoriented { sx, sy });
        }
        if !charge.is_finite() {
            return Err(ConfigError::NonPositive { name: "charge", value: charge });
        }
        Ok(Self { sx, sy, sz, charge, gamma })
    }

    pub fn from_config(config: &BunchConfig) -> Result<Self, ConfigError> {
        Self::new(config.sx, config.sy, config.sz, config.charge, config.gamma)
    }

    /// Gaussian spread in x (m).
    pub fn sx(&self) -> f64 { self.sx }
    /// Gaussian spread in y (m).
    pub fn sy(&self) -> f64 { self.sy }
    /// Gaussian spread along the direction of travel (m).
    pub fn sz(&self) -> f64 { self.sz }
    /// Total charge (C).
    pub fn charge(&self) -> f64 { self.charge }
    /// Relativistic gamma of the bunch.
    pub fn gamma(&self) -> f64 { self.gamma }

    /// Line charge density (C/m) at longitudinal offset `xi`.
    pub fn line_density(&self, xi: f64) -> f64 {
        self.charge * gaussian_pdf(xi, 0.0, self.sz)
    }

    /// Transverse field of the bunch slice at `xi`, evaluated at `(x, y)`.
    pub fn e_fields(&self, x: f64, y: f64, xi: f64) -> Result<Vec2, FieldError> {
        field::field(x, y, self.sx, self.sy, self.line_density(xi))
    }
}
