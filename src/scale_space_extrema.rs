use crate::image::GrayFloatImage;
use crate::{Kaze, KeyPoint, DEFAULT_MIN_DETECTOR_THRESHOLD};
use log::*;
use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

impl Kaze {
    /// Scan one interior level for thresholded 3x3x3 maxima of the
    /// Hessian-determinant response.
    fn scan_level(&self, level: usize) -> Vec<KeyPoint> {
        let evolution = &self.evolutions[level];
        let below = &self.evolutions[level - 1];
        let above = &self.evolutions[level + 1];
        let w = evolution.Ldet.width();
        let h = evolution.Ldet.height();
        let mut candidates = Vec::new();
        for y in 1..h - 1 {
            for x in 1..w - 1 {
                let value = evolution.Ldet.get(x, y);
                // Filter the points with the detector threshold
                if value > self.options.detector_threshold
                    && value >= DEFAULT_MIN_DETECTOR_THRESHOLD
                    && value > evolution.Ldet.get(x - 1, y)
                    && is_neighbourhood_maximum(&evolution.Ldet, x, y, value, true)
                    && is_neighbourhood_maximum(&below.Ldet, x, y, value, false)
                    && is_neighbourhood_maximum(&above.Ldet, x, y, value, false)
                {
                    candidates.push(KeyPoint {
                        point: (x as f32, y as f32),
                        response: value.abs(),
                        size: evolution.esigma,
                        octave: evolution.octave as usize,
                        class_id: level,
                        // The angle field carries the sublevel until the
                        // subpixel refinement consumes it.
                        angle: evolution.sublevel as f32,
                    });
                }
            }
        }
        candidates
    }

    /// Find the scale space extrema over all interior levels and merge
    /// duplicates that adjacent levels detected at the same place.
    ///
    /// # Return value
    /// The detected keypoint candidates, in level-then-raster order.
    fn find_scale_space_extrema(&self) -> Vec<KeyPoint> {
        let interior = 1..self.evolutions.len().saturating_sub(1);

        #[cfg(not(feature = "rayon"))]
        let per_level: Vec<Vec<KeyPoint>> =
            interior.map(|level| self.scan_level(level)).collect();
        #[cfg(feature = "rayon")]
        let per_level: Vec<Vec<KeyPoint>> = interior
            .into_par_iter()
            .map(|level| self.scan_level(level))
            .collect();

        let mut keypoints: Vec<KeyPoint> = Vec::new();
        for (offset, bucket) in per_level.iter().enumerate() {
            let level = offset + 1;
            let sigma_size = self.evolutions[level].sigma_size;
            let radius_squared = (sigma_size * sigma_size) as f32;
            for candidate in bucket {
                // Check in case we have the same point as a maximum in an
                // adjacent evolution level already.
                let mut is_extremum = true;
                let mut is_repeated = false;
                let mut id_repeated = 0;
                for (ik, accepted) in keypoints.iter().enumerate() {
                    if accepted.class_id == level
                        || accepted.class_id == level + 1
                        || accepted.class_id + 1 == level
                    {
                        let dist = (candidate.point.0 - accepted.point.0)
                            * (candidate.point.0 - accepted.point.0)
                            + (candidate.point.1 - accepted.point.1)
                                * (candidate.point.1 - accepted.point.1);
                        if dist < radius_squared {
                            if candidate.response > accepted.response {
                                id_repeated = ik;
                                is_repeated = true;
                            } else {
                                is_extremum = false;
                            }
                            break;
                        }
                    }
                }
                if is_extremum {
                    if is_repeated {
                        keypoints[id_repeated] = *candidate;
                    } else {
                        keypoints.push(*candidate);
                    }
                }
            }
        }
        debug!("Extracted {} scale space extrema.", keypoints.len());
        keypoints
    }

    /// Sub-pixel refinement over (x, y, scale).
    ///
    /// Fits a quadratic to the response around each candidate with central
    /// differences (the scale direction reads the adjacent levels) and
    /// keeps the keypoint only if the fitted offset stays within one step
    /// in every direction. Accepted keypoints get their continuous scale
    /// recomputed as a diameter and their stashed sublevel cleared.
    fn do_subpixel_refinement(&self, in_keypoints: &[KeyPoint]) -> Vec<KeyPoint> {
        let num_sublevels = self.options.num_sublevels as f32;
        let mut result: Vec<KeyPoint> = Vec::new();
        for keypoint in in_keypoints {
            let x = keypoint.point.0 as usize;
            let y = keypoint.point.1 as usize;
            let level = keypoint.class_id;
            let at = |l: usize, x: usize, y: usize| self.evolutions[l].Ldet.get(x, y);

            // Gradient
            let dx = 0.5 * (at(level, x + 1, y) - at(level, x - 1, y));
            let dy = 0.5 * (at(level, x, y + 1) - at(level, x, y - 1));
            let ds = 0.5 * (at(level + 1, x, y) - at(level - 1, x, y));
            // Hessian
            let center = at(level, x, y);
            let dxx = at(level, x + 1, y) + at(level, x - 1, y) - 2.0 * center;
            let dyy = at(level, x, y + 1) + at(level, x, y - 1) - 2.0 * center;
            let dss = at(level + 1, x, y) + at(level - 1, x, y) - 2.0 * center;
            let dxy = 0.25 * (at(level, x + 1, y + 1) + at(level, x - 1, y - 1))
                - 0.25 * (at(level, x + 1, y - 1) + at(level, x - 1, y + 1));
            let dxs = 0.25 * (at(level + 1, x + 1, y) + at(level - 1, x - 1, y))
                - 0.25 * (at(level + 1, x - 1, y) + at(level - 1, x + 1, y));
            let dys = 0.25 * (at(level + 1, x, y + 1) + at(level - 1, x, y - 1))
                - 0.25 * (at(level + 1, x, y - 1) + at(level - 1, x, y + 1));

            let hessian = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
            let rhs = Vector3::new(-dx, -dy, -ds);
            let offset = match hessian.lu().solve(&rhs) {
                Some(offset) => offset,
                // A singular fit means the quadratic carries no usable
                // position information; the point is not stable.
                None => continue,
            };
            if offset.x.abs() <= 1.0 && offset.y.abs() <= 1.0 && offset.z.abs() <= 1.0 {
                let mut refined = *keypoint;
                refined.point = (x as f32 + offset.x, y as f32 + offset.y);
                let dsc =
                    refined.octave as f32 + (refined.angle + offset.z) / num_sublevels;
                // The size of a keypoint is its diameter.
                refined.size = 2.0 * self.options.base_scale_offset * 2f32.powf(dsc);
                refined.angle = 0.0;
                result.push(refined);
            }
        }
        debug!(
            "{}/{} remain after subpixel refinement.",
            result.len(),
            in_keypoints.len()
        );
        result
    }

    /// Detect keypoints in the built nonlinear scale space: scale space
    /// extrema followed by sub-pixel refinement.
    ///
    /// # Return value
    /// The resulting keypoints.
    pub(crate) fn detect_keypoints(&self) -> Vec<KeyPoint> {
        let keypoints = self.find_scale_space_extrema();
        self.do_subpixel_refinement(&keypoints)
    }
}

/// Whether `value` is not exceeded anywhere in the 3x3 window around
/// `(x, y)`. On the level that produced `value` the center pixel is
/// skipped; on adjacent levels the center competes as well.
fn is_neighbourhood_maximum(
    response: &GrayFloatImage,
    x: usize,
    y: usize,
    value: f32,
    same_level: bool,
) -> bool {
    for i in (y - 1)..=(y + 1) {
        for j in (x - 1)..=(x + 1) {
            if same_level && i == y && j == x {
                continue;
            }
            if response.get(j, i) > value {
                return false;
            }
        }
    }
    true
}
