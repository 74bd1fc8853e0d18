//! Physical constants in SI units (CODATA 2018).

/// Speed of light (m/s)
pub const C: f64 = 299_792_458.0;

/// Vacuum permittivity ε₀ (F/m)
pub const EPSILON_0: f64 = 8.854_187_8128e-12;

/// Elementary charge (C)
pub const E_CHARGE: f64 = 1.602_176_634e-19;

/// Electron mass (kg)
pub const M_ELECTRON: f64 = 9.109_383_7015e-31;
