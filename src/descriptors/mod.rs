//! Descriptor extraction for the three descriptor families.
//!
//! Every family samples first (and for G-SURF second) order scale-space
//! derivatives over a square grid around the keypoint, accumulates sums
//! per sub-cell and L2-normalizes the result. The family, the upright
//! flag and the extended flag select one of the concrete routines exactly
//! once per describe call; the workers then run it per keypoint without
//! further branching.

mod gsurf;
mod msurf;
mod orientation;
mod surf;

use crate::evolution::EvolutionStep;
use crate::image::GrayFloatImage;
use crate::{DescriptorFamily, KazeOptions, KeyPoint};
use ndarray::Array2;

#[cfg(feature = "rayon")]
use ndarray::parallel::prelude::*;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

pub(crate) type DescriptorFn = fn(&KazeOptions, &KeyPoint, &[EvolutionStep], &mut [f32]);

/// Bind the concrete extraction routine for the configured family.
///
/// G-SURF has no distinct upright extended routine; the rotated one is
/// used with the angle already zeroed, which samples the same grid.
pub(crate) fn select_descriptor_fn(options: &KazeOptions) -> DescriptorFn {
    match (options.descriptor, options.upright, options.extended) {
        (DescriptorFamily::Surf, true, false) => surf::upright_64,
        (DescriptorFamily::Surf, false, false) => surf::rotated_64,
        (DescriptorFamily::Surf, true, true) => surf::upright_128,
        (DescriptorFamily::Surf, false, true) => surf::rotated_128,
        (DescriptorFamily::Msurf, true, false) => msurf::upright_64,
        (DescriptorFamily::Msurf, false, false) => msurf::rotated_64,
        (DescriptorFamily::Msurf, true, true) => msurf::upright_128,
        (DescriptorFamily::Msurf, false, true) => msurf::rotated_128,
        (DescriptorFamily::Gsurf, true, false) => gsurf::upright_64,
        (DescriptorFamily::Gsurf, false, false) => gsurf::rotated_64,
        (DescriptorFamily::Gsurf, _, true) => gsurf::rotated_128,
    }
}

/// Compute the orientation and the descriptor row of every keypoint.
///
/// Each worker owns exactly one keypoint and the matching matrix row, so
/// the parallel and the serial path produce identical output.
pub(crate) fn extract_descriptors(
    options: &KazeOptions,
    evolutions: &[EvolutionStep],
    keypoints: &mut [KeyPoint],
    descriptors: &mut Array2<f32>,
) {
    let compute = select_descriptor_fn(options);
    let per_keypoint = |keypoint: &mut KeyPoint, row: &mut [f32]| {
        if options.upright {
            keypoint.angle = 0.0;
        } else {
            orientation::compute_main_orientation(keypoint, evolutions);
        }
        compute(options, keypoint, evolutions, row);
    };

    #[cfg(not(feature = "rayon"))]
    for (keypoint, mut row) in keypoints.iter_mut().zip(descriptors.outer_iter_mut()) {
        per_keypoint(
            keypoint,
            row.as_slice_mut().expect("descriptor rows are contiguous"),
        );
    }
    #[cfg(feature = "rayon")]
    descriptors
        .outer_iter_mut()
        .into_par_iter()
        .zip(keypoints.par_iter_mut())
        .for_each(|(mut row, keypoint)| {
            per_keypoint(
                keypoint,
                row.as_slice_mut().expect("descriptor rows are contiguous"),
            );
        });
}

/// Round to nearest by shifting and truncating, for non-negative inputs.
#[inline(always)]
pub(crate) fn fround(value: f32) -> i32 {
    (value + 0.5) as i32
}

/// The unnormalized 2D Gaussian weight used by the orientation scan and
/// the M-SURF cell weighting.
#[inline(always)]
fn gaussian(x: f32, y: f32, sigma: f32) -> f32 {
    (-(x * x + y * y) / (2.0 * sigma * sigma)).exp()
}

/// A bilinear lookup stencil: integer corners clamped into the image and
/// the fractional weights measured from the clamped low corner.
#[derive(Debug, Clone, Copy)]
struct BilinearStencil {
    x1: usize,
    y1: usize,
    x2: usize,
    y2: usize,
    fx: f32,
    fy: f32,
}

#[inline(always)]
fn clamp_to_image(v: i32, limit: usize) -> usize {
    v.clamp(0, limit as i32 - 1) as usize
}

impl BilinearStencil {
    /// Both corners derived by truncation of the shifted sample.
    fn truncated(sample_x: f32, sample_y: f32, width: usize, height: usize) -> Self {
        let x1 = clamp_to_image((sample_x - 0.5) as i32, width);
        let y1 = clamp_to_image((sample_y - 0.5) as i32, height);
        let x2 = clamp_to_image((sample_x + 0.5) as i32, width);
        let y2 = clamp_to_image((sample_y + 0.5) as i32, height);
        BilinearStencil {
            x1,
            y1,
            x2,
            y2,
            fx: sample_x - x1 as f32,
            fy: sample_y - y1 as f32,
        }
    }

    /// Corner convention of the rotated M-SURF grids: the low corner comes
    /// from rounding `sample - 0.5` (which truncates the sample itself for
    /// non-negative coordinates), the high corner from truncating
    /// `sample + 0.5`.
    fn rotated_msurf(sample_x: f32, sample_y: f32, width: usize, height: usize) -> Self {
        let x1 = clamp_to_image(fround(sample_x - 0.5), width);
        let y1 = clamp_to_image(fround(sample_y - 0.5), height);
        let x2 = clamp_to_image((sample_x + 0.5) as i32, width);
        let y2 = clamp_to_image((sample_y + 0.5) as i32, height);
        BilinearStencil {
            x1,
            y1,
            x2,
            y2,
            fx: sample_x - x1 as f32,
            fy: sample_y - y1 as f32,
        }
    }

    fn sample(&self, image: &GrayFloatImage) -> f32 {
        let res1 = image.get(self.x1, self.y1);
        let res2 = image.get(self.x2, self.y1);
        let res3 = image.get(self.x1, self.y2);
        let res4 = image.get(self.x2, self.y2);
        (1.0 - self.fx) * (1.0 - self.fy) * res1
            + self.fx * (1.0 - self.fy) * res2
            + (1.0 - self.fx) * self.fy * res3
            + self.fx * self.fy * res4
    }
}

/// L2-normalize the descriptor and optionally run the iterative clipping
/// renormalization. A zero-length descriptor is left untouched.
fn finish_descriptor(options: &KazeOptions, descriptor: &mut [f32], length_squared: f32) {
    if length_squared > 0.0 {
        let len = length_squared.sqrt();
        for value in descriptor.iter_mut() {
            *value /= len;
        }
    }
    if options.use_clipping_normalization {
        clip_descriptor(descriptor, options.clipping_niter, options.clipping_ratio);
    }
}

/// Iterative clipping: clamp every component to `ratio / sqrt(D)`, then
/// renormalize, a fixed number of rounds.
fn clip_descriptor(descriptor: &mut [f32], niter: usize, ratio: f32) {
    let cratio = ratio / (descriptor.len() as f32).sqrt();
    for _ in 0..niter {
        let mut len = 0f32;
        for value in descriptor.iter_mut() {
            *value = value.clamp(-cratio, cratio);
            len += *value * *value;
        }
        let len = len.sqrt();
        if len > 0.0 {
            for value in descriptor.iter_mut() {
                *value /= len;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{clip_descriptor, BilinearStencil};
    use crate::image::GrayFloatImage;

    #[test]
    fn bilinear_interpolates_between_pixels() {
        let mut image = GrayFloatImage::new(4, 4);
        image.put(1, 1, 1.0);
        image.put(2, 1, 3.0);
        // Exactly between (1,1) and (2,1).
        let stencil = BilinearStencil::truncated(2.0, 1.5, 4, 4);
        assert!((stencil.sample(&image) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn out_of_image_samples_clamp_to_the_border() {
        let mut image = GrayFloatImage::new(4, 4);
        image.put(0, 0, 2.0);
        let stencil = BilinearStencil::truncated(-3.0, -3.0, 4, 4);
        assert!((stencil.sample(&image) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn clipping_flattens_heavy_components() {
        let mut descriptor = [0f32; 64];
        for value in descriptor.iter_mut().take(32) {
            *value = 1.0;
        }
        clip_descriptor(&mut descriptor, 5, 1.6);
        let cratio = 1.6 / 8.0;
        let len: f32 = descriptor.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((len - 1.0).abs() < 1e-5);
        for value in descriptor {
            assert!(value.abs() <= cratio + 1e-6);
        }
    }
}
