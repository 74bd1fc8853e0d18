use thiserror::Error;

/// Invalid input to the transverse field model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("elliptical field requires sx > sy (sx={sx}, sy={sy})")]
    Misoriented { sx: f64, sy: f64 },
    #[error("spreads must be positive (sx={sx}, sy={sy})")]
    NonPositiveSpread { sx: f64, sy: f64 },
    #[error("non-finite field input at ({x}, {y})")]
    NonFinite { x: f64, y: f64 },
}

/// Velocity outside the physical domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KinematicsError {
    #[error("normalized speed squared {beta_sq} is not below 1 (bx={bx}, by={by})")]
    Superluminal { bx: f64, by: f64, beta_sq: f64 },
}

/// Rejected construction parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be greater than 0")]
    ZeroCount { name: &'static str },
    #[error("slice step dxi={dxi} does not advance from {xi_start} towards {xi_end}")]
    BadStep { xi_start: f64, xi_end: f64, dxi: f64 },
    #[error("random swarm needs at least 4 particles, got {0}")]
    TooFewForQuadrants(usize),
    #[error("{name} holds {found} values, expected {expected}")]
    ShapeMismatch { name: &'static str, expected: usize, found: usize },
    #[error("closing size must be odd, got {0}")]
    EvenClosingSize(usize),
    #[error("histogram needs at least 2 bins, got {0}")]
    TooFewBins(usize),
    #[error("bunch major axis must lie along x (sx={sx} < sy={sy})")]
    Misoriented { sx: f64, sy: f64 },
    #[error("{name} exceeds the limit of {limit}")]
    ExceedsLimit { name: &'static str, limit: usize },
}

/// Failure while extracting or rebuilding ion cavity data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CavityError {
    #[error("no particles to bin")]
    NoParticles,
    #[error("position arrays differ in length ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },
    #[error("cavity history inconsistent: {0}")]
    Inconsistent(String),
}

/// Misuse of the run lifecycle or a failure while stepping.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run already started")]
    AlreadyStarted,
    #[error("run not completed")]
    NotCompleted,
    #[error("run aborted at slice {0}")]
    Aborted(usize),
    #[error("run parts disagree: {0}")]
    Inconsistent(String),
    #[error("slice {slice}, particle {particle}: {source}")]
    Field {
        slice: usize,
        particle: usize,
        #[source]
        source: FieldError,
    },
    #[error("slice {slice}, particle {particle}: {source}")]
    Kinematics {
        slice: usize,
        particle: usize,
        #[source]
        source: KinematicsError,
    },
    #[error("slice {slice}: {source}")]
    Cavity {
        slice: usize,
        #[source]
        source: CavityError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure while writing or loading persisted records.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("refusing to persist: {0}")]
    Incomplete(#[from] RunError),
    #[error("record '{path}' has version {found}, expected {expected}")]
    VersionMismatch { path: String, found: String, expected: String },
    #[error("record '{path}' is malformed: {reason}")]
    Malformed { path: String, reason: String },
    #[error("io error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("codec error on '{path}': {reason}")]
    Codec { path: String, reason: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cavity(#[from] CavityError),
}
