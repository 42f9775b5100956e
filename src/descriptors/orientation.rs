use super::{fround, gaussian};
use crate::evolution::EvolutionStep;
use crate::KeyPoint;
use std::f32::consts::PI;

/// The angle of the vector (x, y), in `[0, 2*pi)`, built per quadrant so
/// the result never wraps negative.
pub(super) fn vector_angle(x: f32, y: f32) -> f32 {
    if x >= 0.0 && y >= 0.0 {
        (y / x).atan()
    } else if x < 0.0 && y >= 0.0 {
        PI - (-y / x).atan()
    } else if x < 0.0 && y < 0.0 {
        PI + (y / x).atan()
    } else {
        2.0 * PI - (-y / x).atan()
    }
}

/// Number of grid offsets with `i*i + j*j < 36` for `i, j` in `[-6, 6]`.
const DISC_SAMPLES: usize = 109;

/// This function computes the main orientation for a given keypoint.
///
/// The orientation is computed using a similar approach as described in
/// the original SURF method. See Bay et al., Speeded Up Robust Features,
/// ECCV 2006.
pub(crate) fn compute_main_orientation(keypoint: &mut KeyPoint, evolutions: &[EvolutionStep]) {
    let mut res_x = [0f32; DISC_SAMPLES];
    let mut res_y = [0f32; DISC_SAMPLES];
    let mut angs = [0f32; DISC_SAMPLES];

    let level = keypoint.class_id;
    let width = evolutions[level].Lx.width() as i32;
    let height = evolutions[level].Lx.height() as i32;
    let xf = keypoint.point.0;
    let yf = keypoint.point.1;
    let s = fround(keypoint.size / 2.0) as f32;

    // Calculate derivatives responses for points within radius of 6*scale
    let mut idx = 0;
    for i in -6i32..=6 {
        for j in -6i32..=6 {
            if i * i + j * j < 36 {
                let iy = fround(yf + j as f32 * s);
                let ix = fround(xf + i as f32 * s);
                if iy >= 0 && iy < height && ix >= 0 && ix < width {
                    let gweight = gaussian(iy as f32 - yf, ix as f32 - xf, 3.5 * s);
                    res_x[idx] = gweight * evolutions[level].Lx.get(ix as usize, iy as usize);
                    res_y[idx] = gweight * evolutions[level].Ly.get(ix as usize, iy as usize);
                } else {
                    res_x[idx] = 0.0;
                    res_y[idx] = 0.0;
                }
                angs[idx] = vector_angle(res_x[idx], res_y[idx]);
                idx += 1;
            }
        }
    }

    // Loop slides pi/3 window around feature point
    let mut max = 0f32;
    let mut ang1 = 0f32;
    while ang1 < 2.0 * PI {
        let ang2 = if ang1 + PI / 3.0 > 2.0 * PI {
            ang1 - 5.0 * PI / 3.0
        } else {
            ang1 + PI / 3.0
        };
        let mut sum_x = 0f32;
        let mut sum_y = 0f32;
        for k in 0..DISC_SAMPLES {
            let ang = angs[k];
            // Determine whether the point is within the window, which may
            // wrap past 2*pi.
            if (ang1 < ang2 && ang1 < ang && ang < ang2)
                || (ang2 < ang1
                    && ((ang > 0.0 && ang < ang2) || (ang > ang1 && ang < 2.0 * PI)))
            {
                sum_x += res_x[k];
                sum_y += res_y[k];
            }
        }
        // if the vector produced from this window is longer than all
        // previous vectors then this forms the new dominant direction
        let val = sum_x * sum_x + sum_y * sum_y;
        if val > max {
            // store largest orientation
            max = val;
            keypoint.angle = vector_angle(sum_x, sum_y);
        }
        ang1 += 0.15;
    }
}

#[cfg(test)]
mod tests {
    use super::vector_angle;
    use std::f32::consts::PI;

    #[test]
    fn angle_covers_all_four_quadrants() {
        assert!((vector_angle(1.0, 0.0) - 0.0).abs() < 1e-6);
        assert!((vector_angle(1.0, 1.0) - PI / 4.0).abs() < 1e-6);
        assert!((vector_angle(-1.0, 1.0) - 3.0 * PI / 4.0).abs() < 1e-6);
        assert!((vector_angle(-1.0, -1.0) - 5.0 * PI / 4.0).abs() < 1e-6);
        assert!((vector_angle(1.0, -1.0) - 7.0 * PI / 4.0).abs() < 1e-6);
    }

    #[test]
    fn angle_stays_in_range() {
        for quadrant in 0..16 {
            let theta = quadrant as f32 * PI / 8.0 + 0.01;
            let ang = vector_angle(theta.cos(), theta.sin());
            assert!((0.0..2.0 * PI).contains(&ang));
        }
    }
}
