use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest histogram side accepted for the cavity extraction.
pub const MAX_BINS: u32 = 4096;
/// Largest closing square accepted for the cavity extraction.
pub const MAX_CLOSING_SIZE: u32 = 255;

// Drive bunch parameters (SI units)
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BunchConfig {
    pub sx: f64,
    pub sy: f64,
    pub sz: f64,
    /// Total bunch charge in Coulombs.
    pub charge: f64,
    pub gamma: f64,
}

// Longitudinal sampling of the plasma
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScheduleConfig {
    pub xi_start: f64,
    pub xi_end: f64,
    pub dxi: f64,
    /// Plasma density in cm^-3.
    pub density: f64,
}

/// How slice 0 of the electron swarm is seeded.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SwarmConfig {
    /// `num_pts x num_pts` evenly spaced electrons over the box.
    Grid { num_pts: u32, x_mag: f64, y_mag: f64 },
    /// Uniform random electrons, mirrored into all four quadrants.
    Random {
        num_parts: u32,
        x_mag: f64,
        y_mag: f64,
        #[serde(default)]
        seed: u64,
    },
}

// Settings for the per-slice ion cavity extraction
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CavityConfig {
    #[serde(default = "default_bins")]
    pub bins: u32,
    #[serde(default = "default_closing_size")]
    pub closing_size: u32,
    #[serde(default = "default_hough_threshold")]
    pub hough_threshold: u32,
    #[serde(default = "default_hough_iterations")]
    pub hough_iterations: u32,
    #[serde(default)]
    pub hough_seed: u64,
    /// Smallest semi-axis (boundary pixels) a candidate may have.
    #[serde(default = "default_min_axis")]
    pub min_axis: f64,
}

impl Default for CavityConfig {
    fn default() -> Self {
        CavityConfig {
            bins: default_bins(),
            closing_size: default_closing_size(),
            hough_threshold: default_hough_threshold(),
            hough_iterations: default_hough_iterations(),
            hough_seed: 0,
            min_axis: default_min_axis(),
        }
    }
}

fn default_bins() -> u32 {
    200
}

fn default_closing_size() -> u32 {
    3
}

fn default_hough_threshold() -> u32 {
    5
}

fn default_hough_iterations() -> u32 {
    2000
}

fn default_min_axis() -> f64 {
    2.0
}

/// Codec used for the persisted records.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Bincode,
    Json,
    MessagePack,
}

impl OutputFormat {
    /// File extension used for records written in this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Bincode => "bin",
            OutputFormat::Json => "json",
            OutputFormat::MessagePack => "msgpack",
        }
    }
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Base name for record files; derived from the completion timestamp when absent.
    #[serde(default)]
    pub base_filename: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub save_positions: bool,
    #[serde(default = "crate::default_format_version")]
    pub format_version: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_directory(),
            base_filename: None,
            format: OutputFormat::default(),
            save_positions: false,
            format_version: crate::default_format_version(),
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

// Main run configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RunConfig {
    pub bunch: BunchConfig,
    pub schedule: ScheduleConfig,
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub cavity: CavityConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    /// Loads the run configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: RunConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        let b = &self.bunch;
        if !(b.sx > 0.0 && b.sy > 0.0 && b.sz > 0.0) {
            anyhow::bail!("bunch spreads sx, sy, sz must be positive.");
        }
        if !(b.gamma > 0.0) {
            anyhow::bail!("bunch gamma must be positive.");
        }
        if b.sx < b.sy {
            anyhow::bail!("bunch sx must not be smaller than sy (major axis along x).");
        }

        let s = &self.schedule;
        if s.dxi == 0.0 || !s.dxi.is_finite() {
            anyhow::bail!("schedule dxi must be finite and non-zero.");
        }
        if (s.xi_end - s.xi_start) * s.dxi < 0.0 {
            anyhow::bail!("schedule dxi points away from xi_end.");
        }
        if !(s.density > 0.0) {
            anyhow::bail!("schedule density must be positive.");
        }

        match &self.swarm {
            SwarmConfig::Grid { num_pts, x_mag, y_mag } => {
                if *num_pts == 0 {
                    anyhow::bail!("grid num_pts must be greater than 0.");
                }
                if *x_mag < 0.0 || *y_mag < 0.0 {
                    anyhow::bail!("grid x_mag and y_mag must not be negative.");
                }
            }
            SwarmConfig::Random { num_parts, x_mag, y_mag, .. } => {
                if *num_parts < 4 {
                    anyhow::bail!("random num_parts must be at least 4 (one per quadrant).");
                }
                if !(*x_mag > 0.0 && *y_mag > 0.0) {
                    anyhow::bail!("random x_mag and y_mag must be positive.");
                }
            }
        }

        let c = &self.cavity;
        if c.bins < 2 || c.bins > MAX_BINS {
            anyhow::bail!("cavity bins must be between 2 and {}.", MAX_BINS);
        }
        if c.closing_size % 2 == 0 || c.closing_size > MAX_CLOSING_SIZE {
            anyhow::bail!("cavity closing_size must be odd and at most {}.", MAX_CLOSING_SIZE);
        }
        if c.hough_iterations == 0 {
            anyhow::bail!("cavity hough_iterations must be greater than 0.");
        }
        if self.output.format_version.is_empty() {
            anyhow::bail!("output format_version must not be empty.");
        }
        Ok(())
    }
}
