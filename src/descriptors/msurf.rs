//! M-SURF descriptors over a 24s x 24s grid.
//!
//! 4x4 sub-cells of 9x9 samples with a 4-sample overlap between adjacent
//! cells, an inner Gaussian about each cell anchor and an outer Gaussian
//! over the cell grid. The descriptor is inspired from Agrawal et al.,
//! CenSurE: Center Surround Extremas for Realtime Feature Detection and
//! Matching, ECCV 2008.

use super::{finish_descriptor, fround, gaussian, BilinearStencil};
use crate::evolution::EvolutionStep;
use crate::{KazeOptions, KeyPoint};

const SAMPLE_STEP: i32 = 5;
const PATTERN_SIZE: i32 = 12;

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

    // Subregion centers for the 4x4 gaussian weighting
    let mut cx = -0.5f32;
    let mut cy;

    let mut dcount = 0;
    let mut length_squared = 0f32;
    let mut i = -8i32;
    while i < PATTERN_SIZE {
        let mut j = -8i32;
        i -= 4;
        cx += 1.0;
        cy = -0.5;
        while j < PATTERN_SIZE {
            let (mut dx, mut dy, mut mdx, mut mdy) = (0f32, 0f32, 0f32, 0f32);
            cy += 1.0;
            j -= 4;

            let ky = i + SAMPLE_STEP;
            let kx = j + SAMPLE_STEP;
            let ys = yf + ky as f32 * scale;
            let xs = xf + kx as f32 * scale;

            for k in i..i + 9 {
                for l in j..j + 9 {
                    let sample_y = k as f32 * scale + yf;
                    let sample_x = l as f32 * scale + xf;

                    // Get the gaussian weighted x and y responses
                    let gauss_s1 = gaussian(xs - sample_x, ys - sample_y, 2.5 * scale);
                    let stencil = BilinearStencil::truncated(sample_x, sample_y, width, height);
                    let rx = gauss_s1 * stencil.sample(&evolution.Lx);
                    let ry = gauss_s1 * stencil.sample(&evolution.Ly);

                    dx += rx;
                    dy += ry;
                    mdx += rx.abs();
                    mdy += ry.abs();
                }
            }

            let gauss_s2 = gaussian(cx - 2.0, cy - 2.0, 1.5);
            descriptor[dcount] = dx * gauss_s2;
            descriptor[dcount + 1] = dy * gauss_s2;
            descriptor[dcount + 2] = mdx * gauss_s2;
            descriptor[dcount + 3] = mdy * gauss_s2;
            dcount += 4;
            length_squared += (dx * dx + dy * dy + mdx * mdx + mdy * mdy) * gauss_s2 * gauss_s2;

            j += 9;
        }
        i += 9;
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

    // Subregion centers for the 4x4 gaussian weighting
    let mut cx = -0.5f32;
    let mut cy;

    let mut dcount = 0;
    let mut length_squared = 0f32;
    let mut i = -8i32;
    while i < PATTERN_SIZE {
        let mut j = -8i32;
        i -= 4;
        cx += 1.0;
        cy = -0.5;
        while j < PATTERN_SIZE {
            let (mut dx, mut dy, mut mdx, mut mdy) = (0f32, 0f32, 0f32, 0f32);
            cy += 1.0;
            j -= 4;

            let ky = i + SAMPLE_STEP;
            let kx = j + SAMPLE_STEP;
            let xs = xf + (-kx as f32 * scale * si + ky as f32 * scale * co);
            let ys = yf + (kx as f32 * scale * co + ky as f32 * scale * si);

            for k in i..i + 9 {
                for l in j..j + 9 {
                    // Get coords of sample point on the rotated axis
                    let (k, l) = (k as f32, l as f32);
                    let sample_y = yf + (l * scale * co + k * scale * si);
                    let sample_x = xf + (-l * scale * si + k * scale * co);

                    // Get the gaussian weighted x and y responses
                    let gauss_s1 = gaussian(xs - sample_x, ys - sample_y, 2.5 * scale);
                    let stencil =
                        BilinearStencil::rotated_msurf(sample_x, sample_y, width, height);
                    let rx = stencil.sample(&evolution.Lx);
                    let ry = stencil.sample(&evolution.Ly);

                    // Get the x and y derivatives on the rotated axis
                    let rry = gauss_s1 * (rx * co + ry * si);
                    let rrx = gauss_s1 * (-rx * si + ry * co);

                    dx += rrx;
                    dy += rry;
                    mdx += rrx.abs();
                    mdy += rry.abs();
                }
            }

            let gauss_s2 = gaussian(cx - 2.0, cy - 2.0, 1.5);
            descriptor[dcount] = dx * gauss_s2;
            descriptor[dcount + 1] = dy * gauss_s2;
            descriptor[dcount + 2] = mdx * gauss_s2;
            descriptor[dcount + 3] = mdy * gauss_s2;
            dcount += 4;
            length_squared += (dx * dx + dy * dy + mdx * mdx + mdy * mdy) * gauss_s2 * gauss_s2;

            j += 9;
        }
        i += 9;
    }
    finish_descriptor(options, descriptor, length_squared);
}

/// Upright extended descriptor, length 128.
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

    // Subregion centers for the 4x4 gaussian weighting
    let mut cx = -0.5f32;
    let mut cy;

    let mut dcount = 0;
    let mut length_squared = 0f32;
    let mut i = -8i32;
    while i < PATTERN_SIZE {
        let mut j = -8i32;
        i -= 4;
        cx += 1.0;
        cy = -0.5;
        while j < PATTERN_SIZE {
            let (mut dxp, mut dxn, mut mdxp, mut mdxn) = (0f32, 0f32, 0f32, 0f32);
            let (mut dyp, mut dyn_, mut mdyp, mut mdyn) = (0f32, 0f32, 0f32, 0f32);
            cy += 1.0;
            j -= 4;

            let ky = i + SAMPLE_STEP;
            let kx = j + SAMPLE_STEP;
            let ys = yf + ky as f32 * scale;
            let xs = xf + kx as f32 * scale;

            for k in i..i + 9 {
                for l in j..j + 9 {
                    let sample_y = k as f32 * scale + yf;
                    let sample_x = l as f32 * scale + xf;

                    // Get the gaussian weighted x and y responses
                    let gauss_s1 = gaussian(xs - sample_x, ys - sample_y, 2.5 * scale);
                    let stencil = BilinearStencil::truncated(sample_x, sample_y, width, height);
                    let rx = gauss_s1 * stencil.sample(&evolution.Lx);
                    let ry = gauss_s1 * stencil.sample(&evolution.Ly);

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

            let gauss_s2 = gaussian(cx - 2.0, cy - 2.0, 1.5);
            descriptor[dcount] = dxp * gauss_s2;
            descriptor[dcount + 1] = dxn * gauss_s2;
            descriptor[dcount + 2] = mdxp * gauss_s2;
            descriptor[dcount + 3] = mdxn * gauss_s2;
            descriptor[dcount + 4] = dyp * gauss_s2;
            descriptor[dcount + 5] = dyn_ * gauss_s2;
            descriptor[dcount + 6] = mdyp * gauss_s2;
            descriptor[dcount + 7] = mdyn * gauss_s2;
            dcount += 8;
            length_squared += (dxp * dxp + dxn * dxn + mdxp * mdxp + mdxn * mdxn
                + dyp * dyp
                + dyn_ * dyn_
                + mdyp * mdyp
                + mdyn * mdyn)
                * gauss_s2
                * gauss_s2;

            j += 9;
        }
        i += 9;
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

    // Subregion centers for the 4x4 gaussian weighting
    let mut cx = -0.5f32;
    let mut cy;

    let mut dcount = 0;
    let mut length_squared = 0f32;
    let mut i = -8i32;
    while i < PATTERN_SIZE {
        let mut j = -8i32;
        i -= 4;
        cx += 1.0;
        cy = -0.5;
        while j < PATTERN_SIZE {
            let (mut dxp, mut dxn, mut mdxp, mut mdxn) = (0f32, 0f32, 0f32, 0f32);
            let (mut dyp, mut dyn_, mut mdyp, mut mdyn) = (0f32, 0f32, 0f32, 0f32);
            cy += 1.0;
            j -= 4;

            let ky = i + SAMPLE_STEP;
            let kx = j + SAMPLE_STEP;
            let xs = xf + (-kx as f32 * scale * si + ky as f32 * scale * co);
            let ys = yf + (kx as f32 * scale * co + ky as f32 * scale * si);

            for k in i..i + 9 {
                for l in j..j + 9 {
                    // Get coords of sample point on the rotated axis
                    let (k, l) = (k as f32, l as f32);
                    let sample_y = yf + (l * scale * co + k * scale * si);
                    let sample_x = xf + (-l * scale * si + k * scale * co);

                    // Get the gaussian weighted x and y responses
                    let gauss_s1 = gaussian(xs - sample_x, ys - sample_y, 2.5 * scale);
                    let stencil =
                        BilinearStencil::rotated_msurf(sample_x, sample_y, width, height);
                    let rx = stencil.sample(&evolution.Lx);
                    let ry = stencil.sample(&evolution.Ly);

                    // Get the x and y derivatives on the rotated axis
                    let rry = gauss_s1 * (rx * co + ry * si);
                    let rrx = gauss_s1 * (-rx * si + ry * co);

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

            let gauss_s2 = gaussian(cx - 2.0, cy - 2.0, 1.5);
            descriptor[dcount] = dxp * gauss_s2;
            descriptor[dcount + 1] = dxn * gauss_s2;
            descriptor[dcount + 2] = mdxp * gauss_s2;
            descriptor[dcount + 3] = mdxn * gauss_s2;
            descriptor[dcount + 4] = dyp * gauss_s2;
            descriptor[dcount + 5] = dyn_ * gauss_s2;
            descriptor[dcount + 6] = mdyp * gauss_s2;
            descriptor[dcount + 7] = mdyn * gauss_s2;
            dcount += 8;
            length_squared += (dxp * dxp + dxn * dxn + mdxp * mdxp + mdxn * mdxn
                + dyp * dyp
                + dyn_ * dyn_
                + mdyp * mdyp
                + mdyn * mdyn)
                * gauss_s2
                * gauss_s2;

            j += 9;
        }
        i += 9;
    }
    finish_descriptor(options, descriptor, length_squared);
}
