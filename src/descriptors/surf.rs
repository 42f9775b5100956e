//! SURF-flavored descriptors over a 20s x 20s grid.
//!
//! 4x4 sub-cells of 5x5 samples each, no Gaussian weighting. The
//! descriptor is inspired from Bay et al., Speeded Up Robust Features,
//! ECCV, 2006.

use super::{finish_descriptor, fround, BilinearStencil};
use crate::evolution::EvolutionStep;
use crate::{KazeOptions, KeyPoint};

const SAMPLE_STEP: i32 = 5;
const PATTERN_SIZE: i32 = 10;

/// Upright descriptor (no rotation invariance), length 64.
pub(super) fn upright_64(
    options: &KazeOptions,
    keypoint: &KeyPoint,
    evolutions: &[EvolutionStep],
    descriptor: &mut [f32],
) {
    let xf = keypoint.point.0;
    let yf = keypoint.point.1;
    let scale = fround(keypoint.size / 2.0) as f32;
    let evolution = &evolutions[keypoint.class_id];
    let (width, height) = (evolution.Lx.width(), evolution.Lx.height());

    let mut dcount = 0;
    let mut length_squared = 0f32;
    for i in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
        for j in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
            let (mut dx, mut dy, mut mdx, mut mdy) = (0f32, 0f32, 0f32, 0f32);
            for k in i..i + SAMPLE_STEP {
                for l in j..j + SAMPLE_STEP {
                    let sample_y = k as f32 * scale + yf;
                    let sample_x = l as f32 * scale + xf;
                    let stencil = BilinearStencil::truncated(sample_x, sample_y, width, height);
                    let rx = stencil.sample(&evolution.Lx);
                    let ry = stencil.sample(&evolution.Ly);

                    dx += rx;
                    dy += ry;
                    mdx += rx.abs();
                    mdy += ry.abs();
                }
            }
            descriptor[dcount] = dx;
            descriptor[dcount + 1] = dy;
            descriptor[dcount + 2] = mdx;
            descriptor[dcount + 3] = mdy;
            dcount += 4;
            length_squared += dx * dx + dy * dy + mdx * mdx + mdy * mdy;
        }
    }
    finish_descriptor(options, descriptor, length_squared);
}

/// Rotation invariant descriptor, length 64.
pub(super) fn rotated_64(
    options: &KazeOptions,
    keypoint: &KeyPoint,
    evolutions: &[EvolutionStep],
    descriptor: &mut [f32],
) {
    let xf = keypoint.point.0;
    let yf = keypoint.point.1;
    let scale = fround(keypoint.size / 2.0) as f32;
    let co = keypoint.angle.cos();
    let si = keypoint.angle.sin();
    let evolution = &evolutions[keypoint.class_id];
    let (width, height) = (evolution.Lx.width(), evolution.Lx.height());

    let mut dcount = 0;
    let mut length_squared = 0f32;
    for i in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
        for j in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
            let (mut dx, mut dy, mut mdx, mut mdy) = (0f32, 0f32, 0f32, 0f32);
            for k in i..i + SAMPLE_STEP {
                for l in j..j + SAMPLE_STEP {
                    // Get the coordinates of the sample point on the rotated axis
                    let (k, l) = (k as f32, l as f32);
                    let sample_y = yf + (l * scale * co + k * scale * si);
                    let sample_x = xf + (-l * scale * si + k * scale * co);
                    let stencil = BilinearStencil::truncated(sample_x, sample_y, width, height);
                    let rx = stencil.sample(&evolution.Lx);
                    let ry = stencil.sample(&evolution.Ly);

                    // Get the x and y derivatives on the rotated axis
                    let rry = rx * co + ry * si;
                    let rrx = -rx * si + ry * co;

                    dx += rrx;
                    dy += rry;
                    mdx += rrx.abs();
                    mdy += rry.abs();
                }
            }
            descriptor[dcount] = dx;
            descriptor[dcount + 1] = dy;
            descriptor[dcount + 2] = mdx;
            descriptor[dcount + 3] = mdy;
            dcount += 4;
            length_squared += dx * dx + dy * dy + mdx * mdx + mdy * mdy;
        }
    }
    finish_descriptor(options, descriptor, length_squared);
}

/// Upright extended descriptor, length 128: every sub-cell sum is split by
/// the sign of the orthogonal derivative.
pub(super) fn upright_128(
    options: &KazeOptions,
    keypoint: &KeyPoint,
    evolutions: &[EvolutionStep],
    descriptor: &mut [f32],
) {
    let xf = keypoint.point.0;
    let yf = keypoint.point.1;
    let scale = fround(keypoint.size / 2.0) as f32;
    let evolution = &evolutions[keypoint.class_id];
    let (width, height) = (evolution.Lx.width(), evolution.Lx.height());

    let mut dcount = 0;
    let mut length_squared = 0f32;
    for i in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
        for j in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
            let (mut dxp, mut dxn, mut mdxp, mut mdxn) = (0f32, 0f32, 0f32, 0f32);
            let (mut dyp, mut dyn_, mut mdyp, mut mdyn) = (0f32, 0f32, 0f32, 0f32);
            for k in i..i + SAMPLE_STEP {
                for l in j..j + SAMPLE_STEP {
                    let sample_y = k as f32 * scale + yf;
                    let sample_x = l as f32 * scale + xf;
                    let stencil = BilinearStencil::truncated(sample_x, sample_y, width, height);
                    let rx = stencil.sample(&evolution.Lx);
                    let ry = stencil.sample(&evolution.Ly);

                    if ry >= 0.0 {
                        dxp += rx;
                        mdxp += rx.abs();
                    } else {
                        dxn += rx;
                        mdxn += rx.abs();
                    }
                    if rx >= 0.0 {
                        dyp += ry;
                        mdyp += ry.abs();
                    } else {
                        dyn_ += ry;
                        mdyn += ry.abs();
                    }
                }
            }
            descriptor[dcount] = dxp;
            descriptor[dcount + 1] = dxn;
            descriptor[dcount + 2] = mdxp;
            descriptor[dcount + 3] = mdxn;
            descriptor[dcount + 4] = dyp;
            descriptor[dcount + 5] = dyn_;
            descriptor[dcount + 6] = mdyp;
            descriptor[dcount + 7] = mdyn;
            dcount += 8;
            length_squared += dxp * dxp + dxn * dxn + mdxp * mdxp + mdxn * mdxn
                + dyp * dyp
                + dyn_ * dyn_
                + mdyp * mdyp
                + mdyn * mdyn;
        }
    }
    finish_descriptor(options, descriptor, length_squared);
}

/// Rotation invariant extended descriptor, length 128.
pub(super) fn rotated_128(
    options: &KazeOptions,
    keypoint: &KeyPoint,
    evolutions: &[EvolutionStep],
    descriptor: &mut [f32],
) {
    let xf = keypoint.point.0;
    let yf = keypoint.point.1;
    let scale = fround(keypoint.size / 2.0) as f32;
    let co = keypoint.angle.cos();
    let si = keypoint.angle.sin();
    let evolution = &evolutions[keypoint.class_id];
    let (width, height) = (evolution.Lx.width(), evolution.Lx.height());

    let mut dcount = 0;
    let mut length_squared = 0f32;
    for i in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
        for j in (-PATTERN_SIZE..PATTERN_SIZE).step_by(SAMPLE_STEP as usize) {
            let (mut dxp, mut dxn, mut mdxp, mut mdxn) = (0f32, 0f32, 0f32, 0f32);
            let (mut dyp, mut dyn_, mut mdyp, mut mdyn) = (0f32, 0f32, 0f32, 0f32);
            for k in i..i + SAMPLE_STEP {
                for l in j..j + SAMPLE_STEP {
                    // Get the coordinates of the sample point on the rotated axis
                    let (k, l) = (k as f32, l as f32);
                    let sample_y = yf + (l * scale * co + k * scale * si);
                    let sample_x = xf + (-l * scale * si + k * scale * co);
                    let stencil = BilinearStencil::truncated(sample_x, sample_y, width, height);
                    let rx = stencil.sample(&evolution.Lx);
                    let ry = stencil.sample(&evolution.Ly);

                    // Get the x and y derivatives on the rotated axis
                    let rry = rx * co + ry * si;
                    let rrx = -rx * si + ry * co;

                    if rry >= 0.0 {
                        dxp += rrx;
                        mdxp += rrx.abs();
                    } else {
                        dxn += rrx;
                        mdxn += rrx.abs();
                    }
                    if rrx >= 0.0 {
                        dyp += rry;
                        mdyp += rry.abs();
                    } else {
                        dyn_ += rry;
                        mdyn += rry.abs();
                    }
                }
            }
            descriptor[dcount] = dxp;
            descriptor[dcount + 1] = dxn;
            descriptor[dcount + 2] = mdxp;
            descriptor[dcount + 3] = mdxn;
            descriptor[dcount + 4] = dyp;
            descriptor[dcount + 5] = dyn_;
            descriptor[dcount + 6] = mdyp;
            descriptor[dcount + 7] = mdyn;
            dcount += 8;
            length_squared += dxp * dxp + dxn * dxn + mdxp * mdxp + mdxn * mdxn
                + dyp * dyp
                + dyn_ * dyn_
                + mdyp * mdyp
                + mdyn * mdyn;
        }
    }
    finish_descriptor(options, descriptor, length_squared);
}
