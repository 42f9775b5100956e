//! G-SURF descriptors over a 20s x 20s grid.
//!
//! The accumulated quantities are the gauge derivatives Lww and Lvv in
//! the frame aligned with the local gradient, which are rotation
//! invariant by construction. See Alcantarilla, Bergasa and Davison,
//! Gauge-SURF Descriptors, Image and Vision Computing 31(1), 2013.

use super::{finish_descriptor, fround, BilinearStencil};
use crate::evolution::EvolutionStep;
use crate::{KazeOptions, KeyPoint};

const SAMPLE_STEP: i32 = 5;
const PATTERN_SIZE: i32 = 10;

/// The gauge derivative pair at one sample.
///
/// ```text
/// Lww = (Lx^2*Lxx + 2*Lx*Lxy*Ly + Ly^2*Lyy) / (Lx^2 + Ly^2)
/// Lvv = (-2*Lx*Lxy*Ly + Lxx*Ly^2 + Lx^2*Lyy) / (Lx^2 + Ly^2)
/// ```
///
/// Where the gradient vanishes the frame is undefined and both values are
/// zero.
fn gauge_derivatives(evolution: &EvolutionStep, stencil: &BilinearStencil) -> (f32, f32) {
    let rx = stencil.sample(&evolution.Lx);
    let ry = stencil.sample(&evolution.Ly);
    let modg = rx * rx + ry * ry;
    if modg != 0.0 {
        let rxx = stencil.sample(&evolution.Lxx);
        let rxy = stencil.sample(&evolution.Lxy);
        let ryy = stencil.sample(&evolution.Lyy);
        let lww = (rx * rx * rxx + 2.0 * rx * rxy * ry + ry * ry * ryy) / modg;
        let lvv = (-2.0 * rx * rxy * ry + rxx * ry * ry + rx * rx * ryy) / modg;
        (lww, lvv)
    } else {
        (0.0, 0.0)
    }
}

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
                    let sample_y = yf + l as f32 * scale;
                    let sample_x = xf + k as f32 * scale;
                    let stencil = BilinearStencil::truncated(sample_x, sample_y, width, height);
                    let (lww, lvv) = gauge_derivatives(evolution, &stencil);

                    dx += lww;
                    dy += lvv;
                    mdx += lww.abs();
                    mdy += lvv.abs();
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
                    let (lww, lvv) = gauge_derivatives(evolution, &stencil);

                    dx += lww;
                    dy += lvv;
                    mdx += lww.abs();
                    mdy += lvv.abs();
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

/// Rotation invariant extended descriptor, length 128.
///
/// The x-half buckets are keyed by the sign of Lww but accumulate Lvv,
/// and the y-half the other way around. Note the swap relative to the
/// 64-length layout.
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
                    let (lww, lvv) = gauge_derivatives(evolution, &stencil);

                    if lww >= 0.0 {
                        dxp += lvv;
                        mdxp += lvv.abs();
                    } else {
                        dxn += lvv;
                        mdxn += lvv.abs();
                    }
                    if lvv >= 0.0 {
                        dyp += lww;
                        mdyp += lww.abs();
                    } else {
                        dyn_ += lww;
                        mdyn += lww.abs();
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
