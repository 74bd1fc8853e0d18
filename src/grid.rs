use crate::error::CavityError;
use blowout_common::Array2Record;
use image::{GrayImage, ImageBuffer, Luma};

/// Per-bin particle counts, `x` along image width and `y` along height.
pub type CountImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Foreground value of a binary mask image.
pub const MASK_ON: Luma<u8> = Luma([255]);
pub const MASK_OFF: Luma<u8> = Luma([0]);

/// Dense 2-D array as persisted, row-major with axis 0 along x and axis 1
/// along y.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    nx: usize,
    ny: usize,
    data: Vec<T>,
}

impl<T: Copy> Raster<T> {
    pub fn filled(nx: usize, ny: usize, value: T) -> Self {
        Self { nx, ny, data: vec![value; nx * ny] }
    }

    pub fn nx(&self) -> usize { self.nx }
    pub fn ny(&self) -> usize { self.ny }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline(always)]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.ny + j
    }

    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[self.idx(i, j)]
    }

    #[inline(always)]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        let k = self.idx(i, j);
        self.data[k] = value;
    }

    /// Indices `(i, j)` of every pixel for which `keep` holds.
    pub fn positions(&self, keep: impl Fn(T) -> bool) -> Vec<(usize, usize)> {
        (0..self.nx)
            .flat_map(|i| (0..self.ny).map(move |j| (i, j)))
            .filter(|&(i, j)| keep(self.get(i, j)))
            .collect()
    }

    pub fn to_record(&self) -> Array2Record<T> {
        Array2Record { rows: self.nx, cols: self.ny, data: self.data.clone() }
    }

    pub fn from_record(record: &Array2Record<T>) -> Result<Self, CavityError> {
        if !record.is_consistent() {
            return Err(CavityError::Inconsistent(format!(
                "raster of {}x{} holds {} values",
                record.rows,
                record.cols,
                record.data.len()
            )));
        }
        Ok(Self { nx: record.rows, ny: record.cols, data: record.data.clone() })
    }
}

impl Raster<f64> {
    pub fn from_counts(image: &CountImage) -> Self {
        let mut raster = Raster::filled(image.width() as usize, image.height() as usize, 0.0);
        for (x, y, count) in image.enumerate_pixels() {
            raster.set(x as usize, y as usize, f64::from(count.0[0]));
        }
        raster
    }
}

impl Raster<bool> {
    /// Set wherever the mask pixel is nonzero.
    pub fn from_mask(mask: &GrayImage) -> Self {
        let mut raster = Raster::filled(mask.width() as usize, mask.height() as usize, false);
        for (x, y, value) in mask.enumerate_pixels() {
            raster.set(x as usize, y as usize, value.0[0] > 0);
        }
        raster
    }

    pub fn to_mask(&self) -> GrayImage {
        GrayImage::from_fn(self.nx as u32, self.ny as u32, |x, y| {
            if self.get(x as usize, y as usize) { MASK_ON } else { MASK_OFF }
        })
    }
}

/// Square histogram grid spanning the bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinGrid {
    bins: usize,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
}

impl BinGrid {
    /// Grid covering every point. A zero-width range is widened by half a
    /// unit on each side.
    pub fn covering(xs: &[f64], ys: &[f64], bins: usize) -> Result<Self, CavityError> {
        if bins < 2 {
            return Err(CavityError::Inconsistent(format!("histogram needs at least 2 bins, got {bins}")));
        }
        if xs.len() != ys.len() {
            return Err(CavityError::LengthMismatch { x: xs.len(), y: ys.len() });
        }
        let (xmin, xmax) = finite_range(xs).ok_or(CavityError::NoParticles)?;
        let (ymin, ymax) = finite_range(ys).ok_or(CavityError::NoParticles)?;
        Ok(Self::from_extent(bins, widen(xmin, xmax), widen(ymin, ymax)))
    }

    pub fn from_extent(bins: usize, (xmin, xmax): (f64, f64), (ymin, ymax): (f64, f64)) -> Self {
        Self { bins, xmin, xmax, ymin, ymax }
    }

    pub fn bins(&self) -> usize { self.bins }

    /// `(xmin, xmax, ymin, ymax)`.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        (self.xmin, self.xmax, self.ymin, self.ymax)
    }

    /// Pixel width along x and y.
    pub fn pixel_size(&self) -> (f64, f64) {
        let n = self.bins as f64;
        ((self.xmax - self.xmin) / n, (self.ymax - self.ymin) / n)
    }

    /// Index of the bin containing `(x, y)`, the upper edges included in
    /// the last bin. `None` outside the extent.
    pub fn bin_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let i = axis_bin(x, self.xmin, self.xmax, self.bins)?;
        let j = axis_bin(y, self.ymin, self.ymax, self.bins)?;
        Some((i, j))
    }

    /// Nearest pixel index of a physical position, `round(scale * x + offset)`.
    /// May fall outside the raster.
    pub fn pixel_of(&self, x: f64, y: f64) -> (i64, i64) {
        let n = self.bins as f64;
        let sx = n / (self.xmax - self.xmin);
        let sy = n / (self.ymax - self.ymin);
        ((sx * x - sx * self.xmin).round() as i64, (sy * y - sy * self.ymin).round() as i64)
    }

    /// Physical position of a fractional pixel index, pixel centres at
    /// half-integer offsets from the extent.
    pub fn position_of(&self, i: f64, j: f64) -> (f64, f64) {
        let (wx, wy) = self.pixel_size();
        (self.xmin + (i + 0.5) * wx, self.ymin + (j + 0.5) * wy)
    }

    /// Counts of the points falling in each bin.
    pub fn histogram(&self, xs: &[f64], ys: &[f64]) -> CountImage {
        let side = self.bins as u32;
        let mut image = CountImage::new(side, side);
        for (&x, &y) in xs.iter().zip(ys) {
            if let Some((i, j)) = self.bin_of(x, y) {
                image.get_pixel_mut(i as u32, j as u32).0[0] += 1;
            }
        }
        image
    }
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn widen(lo: f64, hi: f64) -> (f64, f64) {
    if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) }
}

#[inline(always)]
fn axis_bin(v: f64, lo: f64, hi: f64, bins: usize) -> Option<usize> {
    if !(v >= lo && v <= hi) {
        return None;
    }
    let k = ((v - lo) / (hi - lo) * bins as f64).floor() as usize;
    // Clamp so the upper edge lands in the last bin
    Some(k.min(bins - 1))
}
