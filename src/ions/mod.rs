//! Per-slice extraction of the ion cavity left behind by the expelled
//! plasma electrons.
//!
//! The particle positions of a slice are binned into a square histogram.
//! The pixel holding the axis seeds a connected component of its own
//! occupancy class, which is closed, measured, and reduced to a sub-pixel
//! boundary. A randomized Hough fit centred on the component's centroid
//! then ranks ellipse candidates.

pub mod hough;
pub mod segment;
pub mod table;

use crate::error::{CavityError, ConfigError};
use crate::grid::{BinGrid, Raster};
use blowout_common::{
    CavityConfig, CavityRecord, RecordHeader, RegionProps, ResultsTable, MAX_BINS, MAX_CLOSING_SIZE,
};
use chrono::{DateTime, Local};
use hough::HoughSettings;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Ellipse fitted to a cavity boundary.
///
/// As produced by the fit, centre and semi-axes are in boundary-grid units
/// (half a histogram pixel); see [`EllipseCandidate::to_physical`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EllipseCandidate {
    pub xc: f64,
    pub yc: f64,
    /// Semi-major axis.
    pub a: f64,
    /// Semi-minor axis.
    pub b: f64,
    /// Angle of the major axis from the x axis, in `(-pi/2, pi/2]`.
    pub orientation: f64,
    /// Votes collected by the candidate.
    pub score: f64,
}

impl EllipseCandidate {
    /// Same ellipse in metres, using the histogram grid of its slice.
    pub fn to_physical(&self, grid: &BinGrid) -> EllipseCandidate {
        let (wx, wy) = grid.pixel_size();
        let (xc, yc) = grid.position_of(self.xc / 2.0, self.yc / 2.0);

        // Boundary steps are half a pixel. Non-square pixels shear the
        // axes, so re-diagonalize the scaled shape matrix.
        let (sx, sy) = (wx / 2.0, wy / 2.0);
        let (c, s) = (self.orientation.cos(), self.orientation.sin());
        let (a2, b2) = (self.a * self.a, self.b * self.b);
        let m11 = (a2 * c * c + b2 * s * s) * sx * sx;
        let m12 = (a2 - b2) * c * s * sx * sy;
        let m22 = (a2 * s * s + b2 * c * c) * sy * sy;
        let (major, minor, orientation) = crate::vecmath::sym2_eigen(m11, m12, m22);

        EllipseCandidate {
            xc,
            yc,
            a: major.max(0.0).sqrt(),
            b: minor.max(0.0).sqrt(),
            orientation,
            score: self.score,
        }
    }
}

/// Validated extraction parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CavitySettings {
    bins: usize,
    closing_size: usize,
    hough: HoughSettings,
}

impl CavitySettings {
    /// Checks the histogram size, the closing square and the Hough budget.
    pub fn new(bins: usize, closing_size: usize, hough: HoughSettings) -> Result<Self, ConfigError> {
        if bins < 2 {
            return Err(ConfigError::TooFewBins(bins));
        }
        if bins > MAX_BINS as usize {
            return Err(ConfigError::ExceedsLimit { name: "bins", limit: MAX_BINS as usize });
        }
        if closing_size % 2 == 0 {
            return Err(ConfigError::EvenClosingSize(closing_size));
        }
        if closing_size > MAX_CLOSING_SIZE as usize {
            return Err(ConfigError::ExceedsLimit {
                name: "closing_size",
                limit: MAX_CLOSING_SIZE as usize,
            });
        }
        if hough.iterations == 0 {
            return Err(ConfigError::ZeroCount { name: "hough_iterations" });
        }
        if !(hough.min_axis >= 0.0) {
            return Err(ConfigError::NonPositive { name: "min_axis", value: hough.min_axis });
        }
        Ok(Self { bins, closing_size, hough })
    }

    pub fn from_config(config: &CavityConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.bins as usize,
            config.closing_size as usize,
            HoughSettings {
                threshold: config.hough_threshold,
                iterations: config.hough_iterations,
                seed: config.hough_seed,
                min_axis: config.min_axis,
            },
        )
    }

    /// Same settings with another histogram size.
    pub fn with_bins(self, bins: usize) -> Result<Self, ConfigError> {
        Self::new(bins, self.closing_size, self.hough)
    }

    /// Side of the square histogram.
    pub fn bins(&self) -> usize { self.bins }
    /// Side of the square used to close the cavity mask.
    pub fn closing_size(&self) -> usize { self.closing_size }
    pub fn hough(&self) -> &HoughSettings { &self.hough }
}

impl Default for CavitySettings {
    fn default() -> Self {
        let config = CavityConfig::default();
        Self {
            bins: config.bins as usize,
            closing_size: config.closing_size as usize,
            hough: HoughSettings {
                threshold: config.hough_threshold,
                iterations: config.hough_iterations,
                seed: config.hough_seed,
                min_axis: config.min_axis,
            },
        }
    }
}

/// Everything extracted from one slice. Never modified once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct IonCavitySnapshot {
    image: Raster<f64>,
    grid: BinGrid,
    center_index: (i64, i64),
    closed_mask: Raster<bool>,
    boundary_mask: Raster<bool>,
    region: RegionProps,
    candidates: Vec<EllipseCandidate>,
}

impl IonCavitySnapshot {
    /// Runs the extraction on one slice's positions.
    pub fn extract(xs: &[f64], ys: &[f64], settings: &CavitySettings) -> Result<Self, CavityError> {
        let grid = BinGrid::covering(xs, ys, settings.bins)?;
        let counts = grid.histogram(xs, ys);

        let center_index = grid.pixel_of(0.0, 0.0);
        let seed = clamp_pixel(center_index, settings.bins);
        if (i64::from(seed.0), i64::from(seed.1)) != center_index {
            warn!(
                "Axis maps to pixel {:?}, outside the {}x{} histogram; seeding at {:?}",
                center_index, settings.bins, settings.bins, seed
            );
        }

        let component = segment::component_of(&counts, seed);
        let closed_mask = Raster::from_mask(&segment::closing(&component, settings.closing_size));
        let image = Raster::from_counts(&counts);
        let region = segment::region_props(&closed_mask)
            .ok_or_else(|| CavityError::Inconsistent("closed cavity mask is empty".into()))?;
        let boundary_mask = segment::subpixel_boundary(&closed_mask);

        let centre = (2.0 * region.centroid.0, 2.0 * region.centroid.1);
        let candidates = hough::fit_ellipses(&boundary_mask, centre, &settings.hough);

        debug!(
            "Cavity: area {} px, centroid ({:.1}, {:.1}), {} candidate(s)",
            region.area,
            region.centroid.0,
            region.centroid.1,
            candidates.len()
        );

        Ok(Self { image, grid, center_index, closed_mask, boundary_mask, region, candidates })
    }

    /// Rebuilds a snapshot from persisted parts, checking their shapes agree.
    pub fn from_parts(
        image: Raster<f64>,
        extent: (f64, f64, f64, f64),
        center_index: (i64, i64),
        closed_mask: Raster<bool>,
        boundary_mask: Raster<bool>,
        region: RegionProps,
        candidates: Vec<EllipseCandidate>,
    ) -> Result<Self, CavityError> {
        let bins = image.nx();
        if image.ny() != bins || bins < 2 {
            return Err(CavityError::Inconsistent(format!(
                "image of {}x{} is not a square histogram",
                image.nx(),
                image.ny()
            )));
        }
        if (closed_mask.nx(), closed_mask.ny()) != (bins, bins) {
            return Err(CavityError::Inconsistent("closed mask differs from image shape".into()));
        }
        if (boundary_mask.nx(), boundary_mask.ny()) != (2 * bins - 1, 2 * bins - 1) {
            return Err(CavityError::Inconsistent("boundary mask is not on the doubled grid".into()));
        }
        let (xmin, xmax, ymin, ymax) = extent;
        let grid = BinGrid::from_extent(bins, (xmin, xmax), (ymin, ymax));
        Ok(Self { image, grid, center_index, closed_mask, boundary_mask, region, candidates })
    }

    pub fn image(&self) -> &Raster<f64> { &self.image }
    pub fn grid(&self) -> &BinGrid { &self.grid }
    pub fn center_index(&self) -> (i64, i64) { self.center_index }
    pub fn closed_mask(&self) -> &Raster<bool> { &self.closed_mask }
    pub fn boundary_mask(&self) -> &Raster<bool> { &self.boundary_mask }
    pub fn region(&self) -> &RegionProps { &self.region }
    pub fn candidates(&self) -> &[EllipseCandidate] { &self.candidates }

    /// `(xmin, xmax, ymin, ymax)` of the histogram.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        self.grid.extent()
    }

    /// Highest-ranked candidate, if any reached the vote threshold.
    pub fn best(&self) -> Option<&EllipseCandidate> {
        self.candidates.first()
    }

    /// [`best`](Self::best) converted to metres.
    pub fn best_physical(&self) -> Option<EllipseCandidate> {
        self.best().map(|c| c.to_physical(&self.grid))
    }
}

fn clamp_pixel((i, j): (i64, i64), bins: usize) -> (u32, u32) {
    let last = bins as i64 - 1;
    (i.clamp(0, last) as u32, j.clamp(0, last) as u32)
}

/// Ordered per-slice cavity history of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct IonCavityTracker {
    settings: CavitySettings,
    snapshots: Vec<IonCavitySnapshot>,
    completed_at: Option<DateTime<Local>>,
}

impl IonCavityTracker {
    pub fn new(settings: CavitySettings) -> Self {
        Self { settings, snapshots: Vec::new(), completed_at: None }
    }

    /// Rebuilds a completed tracker from already-extracted snapshots, which
    /// must all use the histogram size of `settings`.
    pub(crate) fn from_parts(
        settings: CavitySettings,
        snapshots: Vec<IonCavitySnapshot>,
        completed_at: DateTime<Local>,
    ) -> Result<Self, CavityError> {
        if snapshots.is_empty() {
            return Err(CavityError::Inconsistent("completed cavity history holds no slices".into()));
        }
        if let Some(k) = snapshots.iter().position(|s| s.grid.bins() != settings.bins) {
            return Err(CavityError::Inconsistent(format!(
                "slice {k} has a {0}x{0} histogram, settings use {1}",
                snapshots[k].grid.bins(),
                settings.bins
            )));
        }
        Ok(Self { settings, snapshots, completed_at: Some(completed_at) })
    }

    pub fn settings(&self) -> &CavitySettings { &self.settings }
    pub fn snapshots(&self) -> &[IonCavitySnapshot] { &self.snapshots }
    pub fn len(&self) -> usize { self.snapshots.len() }
    pub fn is_empty(&self) -> bool { self.snapshots.is_empty() }
    pub fn completed_at(&self) -> Option<DateTime<Local>> { self.completed_at }

    /// Extracts and appends the snapshot of the next slice.
    pub fn add_slice(&mut self, xs: &[f64], ys: &[f64]) -> Result<&IonCavitySnapshot, CavityError> {
        let snapshot = IonCavitySnapshot::extract(xs, ys, &self.settings)?;
        Ok(self.push(snapshot))
    }

    pub(crate) fn push(&mut self, snapshot: IonCavitySnapshot) -> &IonCavitySnapshot {
        self.snapshots.push(snapshot);
        &self.snapshots[self.snapshots.len() - 1]
    }

    pub(crate) fn mark_completed(&mut self, at: DateTime<Local>) {
        self.completed_at = Some(at);
    }

    /// Candidates of every slice flattened into named columns.
    pub fn results_table(&self) -> ResultsTable {
        table::flatten(self.snapshots.iter().map(|s| s.candidates()))
    }

    pub fn to_record(&self, header: RecordHeader) -> CavityRecord {
        CavityRecord {
            header,
            images: self.snapshots.iter().map(|s| s.image.to_record()).collect(),
            extents: self.snapshots.iter().map(|s| s.extent()).collect(),
            center_indices: self.snapshots.iter().map(|s| s.center_index).collect(),
            closed_masks: self.snapshots.iter().map(|s| s.closed_mask.to_record()).collect(),
            boundary_masks: self.snapshots.iter().map(|s| s.boundary_mask.to_record()).collect(),
            regions: self.snapshots.iter().map(|s| s.region).collect(),
            results: self.results_table(),
        }
    }

    pub fn from_record(record: &CavityRecord, settings: CavitySettings) -> Result<Self, CavityError> {
        let n = record.images.len();
        let lengths = [
            record.extents.len(),
            record.center_indices.len(),
            record.closed_masks.len(),
            record.boundary_masks.len(),
            record.regions.len(),
            record.results.num_rows,
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(CavityError::Inconsistent(format!(
                "cavity record covers {n} images but per-slice lengths are {lengths:?}"
            )));
        }

        let candidates = table::unflatten(&record.results)?;
        let snapshots = candidates
            .into_iter()
            .enumerate()
            .map(|(k, candidates)| {
                IonCavitySnapshot::from_parts(
                    Raster::from_record(&record.images[k])?,
                    record.extents[k],
                    record.center_indices[k],
                    Raster::from_record(&record.closed_masks[k])?,
                    Raster::from_record(&record.boundary_masks[k])?,
                    record.regions[k],
                    candidates,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_parts(settings, snapshots, record.header.completed_at)
    }
}
