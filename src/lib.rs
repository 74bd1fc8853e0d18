//! Plasma wakefield blowout simulator.
//!
//! A Gaussian drive bunch crosses a plasma slice by slice; its transverse
//! field pushes the plasma electrons outward, and the evacuated ion cavity
//! is extracted from every slice's electron positions.

pub mod bunch;
pub mod constants;
pub mod error;
pub mod faddeeva;
pub mod field;
pub mod grid;
pub mod ions;
pub mod kinematics;
pub mod persist;
pub mod schedule;
pub mod simulation;
pub mod swarm;
pub mod vecmath;

pub use bunch::BunchDescriptor;
pub use error::{CavityError, ConfigError, FieldError, KinematicsError, PersistError, RunError};
pub use ions::{CavitySettings, EllipseCandidate, IonCavitySnapshot, IonCavityTracker};
pub use persist::{RecordPaths, SavedRun};
pub use schedule::SliceSchedule;
pub use simulation::{RunState, SimulationRun};
pub use swarm::ElectronSwarmState;
