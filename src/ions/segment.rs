//! Binary image operations behind the cavity extraction.

use crate::grid::{CountImage, Raster, MASK_OFF, MASK_ON};
use crate::vecmath::sym2_eigen;
use blowout_common::RegionProps;
use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};

/// 8-connected component containing `seed`, taken over pixels with the same
/// occupancy (empty or not) as the seed pixel.
pub fn component_of(image: &CountImage, seed: (u32, u32)) -> GrayImage {
    let occupied = |x: u32, y: u32| image.get_pixel(x, y).0[0] > 0;
    let class = occupied(seed.0, seed.1);
    let same_class = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if occupied(x, y) == class { MASK_ON } else { MASK_OFF }
    });

    let labels = connected_components(&same_class, Connectivity::Eight, MASK_OFF);
    let seed_label = labels.get_pixel(seed.0, seed.1).0[0];
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if labels.get_pixel(x, y).0[0] == seed_label { MASK_ON } else { MASK_OFF }
    })
}

/// Morphological closing with a `size`×`size` square.
///
/// Pixels beyond the border never count as set for the dilation nor as
/// unset for the erosion, so closing never removes pixels touching the edge.
pub fn closing(mask: &GrayImage, size: usize) -> GrayImage {
    let radius = u8::try_from(size / 2).unwrap_or(u8::MAX);
    morphology::close(mask, Norm::LInf, radius)
}

/// Area, centroid and second-moment ellipse of the set pixels.
///
/// Axis lengths are those of the ellipse with the same normalized second
/// central moments. `None` for an empty mask.
pub fn region_props(mask: &Raster<bool>) -> Option<RegionProps> {
    let pixels = mask.positions(|set| set);
    if pixels.is_empty() {
        return None;
    }
    let area = pixels.len();
    let n = area as f64;
    let ci = pixels.iter().map(|&(i, _)| i as f64).sum::<f64>() / n;
    let cj = pixels.iter().map(|&(_, j)| j as f64).sum::<f64>() / n;

    let (mut mii, mut mij, mut mjj) = (0.0, 0.0, 0.0);
    for &(i, j) in &pixels {
        let di = i as f64 - ci;
        let dj = j as f64 - cj;
        mii += di * di;
        mij += di * dj;
        mjj += dj * dj;
    }
    let (major, minor, orientation) = sym2_eigen(mii / n, mij / n, mjj / n);

    Some(RegionProps {
        area,
        centroid: (ci, cj),
        orientation,
        major_axis_length: 4.0 * major.max(0.0).sqrt(),
        minor_axis_length: 4.0 * minor.max(0.0).sqrt(),
    })
}

/// Boundary of `mask` on the doubled grid of shape `(2nx-1, 2ny-1)`.
///
/// Pixel `(i, j)` sits at `(2i, 2j)`; the sites between pixels are set when
/// the pixels they touch disagree.
pub fn subpixel_boundary(mask: &Raster<bool>) -> Raster<bool> {
    let (nx, ny) = (2 * mask.nx() - 1, 2 * mask.ny() - 1);
    let mut out = Raster::filled(nx, ny, false);
    for si in 0..nx {
        for sj in 0..ny {
            if si % 2 == 0 && sj % 2 == 0 {
                continue;
            }
            let (i0, i1) = (si / 2, (si + 1) / 2);
            let (j0, j1) = (sj / 2, (sj + 1) / 2);
            let first = mask.get(i0, j0);
            let mixed = [mask.get(i0, j1), mask.get(i1, j0), mask.get(i1, j1)]
                .iter()
                .any(|&v| v != first);
            out.set(si, sj, mixed);
        }
    }
    out
}
