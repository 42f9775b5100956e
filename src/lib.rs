//! KAZE feature detection and description in a nonlinear scale space.
//!
//! Instead of the Gaussian pyramid of SIFT/SURF, the scale space is the
//! solution of an edge-preserving anisotropic diffusion equation, advanced
//! with a semi-implicit AOS scheme. Blob-like keypoints are detected as
//! maxima of the scale-normalized Hessian determinant across that space
//! and described with one of the SURF, M-SURF or G-SURF float descriptor
//! families, upright or rotation invariant, in 64 or 128 dimensions.
//!
//! See Alcantarilla, Bartoli and Davison, KAZE Features, ECCV 2012.

pub mod image;

mod aos;
mod contrast_factor;
mod derivatives;
mod descriptors;
mod detector_response;
mod evolution;
mod nonlinear_diffusion;
mod scale_space_extrema;
mod tridiagonal;

pub use evolution::EvolutionStep;

use crate::aos::{aos_step, AosWorkspace};
use crate::image::{gaussian_blur, GrayFloatImage};
use ::image::DynamicImage;
use log::*;
use ndarray::Array2;
use std::path::Path;
use std::time::Instant;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hard floor under the configurable detector threshold.
pub const DEFAULT_MIN_DETECTOR_THRESHOLD: f32 = 1e-5;

/// Contrast factor used when the histogram estimation is disabled.
const DEFAULT_CONTRAST_FACTOR: f32 = 0.01;

/// Below this side length there is no room for the extrema scan and the
/// diffusion stencils to do anything useful.
const MIN_IMAGE_DIM: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidOptions(&'static str),
    #[error("image is {width}x{height} but the scale space was allocated for {expected_width}x{expected_height}")]
    ImageSizeMismatch {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
    #[error("the nonlinear scale space has not been built yet")]
    ScaleSpaceNotBuilt,
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}

/// The conductivity function applied to the gradient magnitude when
/// evolving the scale space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Diffusivity {
    /// `exp(-|dL|^2/k^2)`, favors high-contrast edges.
    PeronaMalikG1,
    /// `1/(1 + |dL|^2/k^2)`, favors wide regions.
    PeronaMalikG2,
    /// Weickert's rapidly decreasing diffusivity, smoothes along edges.
    Weickert,
}

/// Which descriptor family `describe` computes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DescriptorFamily {
    /// 20s x 20s grid, unweighted first-derivative sums.
    Surf,
    /// 24s x 24s grid with overlapping cells and Gaussian weighting.
    Msurf,
    /// 20s x 20s grid over the gauge derivatives Lww/Lvv.
    Gsurf,
}

/// A point of interest in an image.
/// This pretty much follows from OpenCV conventions.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeyPoint {
    /// The horizontal coordinate in a coordinate system is
    /// defined s.t. +x faces right and starts from the top
    /// of the image.
    /// the vertical coordinate in a coordinate system is defined
    /// s.t. +y faces toward the bottom of an image and starts
    /// from the left side of the image.
    pub point: (f32, f32),
    /// The magnitude of response from the detector.
    pub response: f32,

    /// The diameter defining the extent of the keypoint, in pixel units.
    pub size: f32,

    /// The octave of the scale space level the keypoint was detected in.
    pub octave: usize,

    /// The index of the evolution level that detected the keypoint; also
    /// the level the descriptor reads.
    pub class_id: usize,

    /// The orientation angle, radians in `[0, 2*pi)`.
    pub angle: f32,
}

/// Contains the configuration parameters of KAZE.
///
/// The image dimensions are part of the configuration because all level
/// buffers and diffusion scratch are allocated up front, in
/// [`Kaze::new`]. The most important parameter to pay attention to is
/// `detector_threshold`; [`KazeOptions::sparse`] and
/// [`KazeOptions::dense`] preset it.
#[derive(Debug, Copy, Clone)]
pub struct KazeOptions {
    /// Maximum octave evolution of the image, in powers of 2 (coarsest
    /// scale sigma units).
    pub max_octaves: u32,

    /// Number of sublevels per octave.
    pub num_sublevels: u32,

    /// Base scale offset (sigma units).
    pub base_scale_offset: f32,

    /// Smoothing applied before any derivative is taken (sigma units).
    pub derivative_smoothing: f32,

    /// The conductivity function of the diffusion.
    pub diffusivity: Diffusivity,

    /// The descriptor family to extract.
    pub descriptor: DescriptorFamily,

    /// Extended (128-dimensional) descriptors instead of 64.
    pub extended: bool,

    /// Skip orientation estimation and sample axis-aligned grids.
    pub upright: bool,

    /// Detector response threshold to accept a point.
    pub detector_threshold: f32,

    /// Width of the images this instance accepts.
    pub img_width: usize,

    /// Height of the images this instance accepts.
    pub img_height: usize,

    /// Run the iterative clipping renormalization on every descriptor.
    pub use_clipping_normalization: bool,

    /// Rounds of clipping renormalization.
    pub clipping_niter: usize,

    /// Clipping limit as a ratio of the flat unit vector component.
    pub clipping_ratio: f32,

    /// Percentile of the gradient histogram used for the contrast factor.
    pub contrast_percentile: f32,

    /// Number of bins of the contrast factor histogram.
    pub contrast_nbins: usize,

    /// Estimate the contrast factor from the image; otherwise keep the
    /// built-in default.
    pub compute_contrast: bool,
}

impl KazeOptions {
    /// Default options for images of the given dimensions.
    pub fn new(img_width: usize, img_height: usize) -> Self {
        KazeOptions {
            max_octaves: 4,
            num_sublevels: 4,
            base_scale_offset: 1.6,
            derivative_smoothing: 1.0,
            diffusivity: Diffusivity::PeronaMalikG2,
            descriptor: DescriptorFamily::Msurf,
            extended: false,
            upright: false,
            detector_threshold: 0.001,
            img_width,
            img_height,
            use_clipping_normalization: false,
            clipping_niter: 5,
            clipping_ratio: 1.6,
            contrast_percentile: 0.7,
            contrast_nbins: 300,
            compute_contrast: true,
        }
    }

    /// Options that sparsely detect features (threshold `0.01`).
    pub fn sparse(img_width: usize, img_height: usize) -> Self {
        KazeOptions {
            detector_threshold: 0.01,
            ..Self::new(img_width, img_height)
        }
    }

    /// Options that densely detect features (threshold `0.0001`).
    pub fn dense(img_width: usize, img_height: usize) -> Self {
        KazeOptions {
            detector_threshold: 0.0001,
            ..Self::new(img_width, img_height)
        }
    }

    /// The dimension of the descriptors these options produce.
    pub fn descriptor_size(&self) -> usize {
        if self.extended {
            128
        } else {
            64
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.max_octaves == 0 {
            return Err(Error::InvalidOptions("max_octaves must be at least 1"));
        }
        if self.num_sublevels == 0 {
            return Err(Error::InvalidOptions("num_sublevels must be at least 1"));
        }
        if self.img_width < MIN_IMAGE_DIM || self.img_height < MIN_IMAGE_DIM {
            return Err(Error::InvalidOptions("image dimensions are too small"));
        }
        if !(self.base_scale_offset > 0.0) {
            return Err(Error::InvalidOptions("base_scale_offset must be positive"));
        }
        if !(self.derivative_smoothing > 0.0) {
            return Err(Error::InvalidOptions(
                "derivative_smoothing must be positive",
            ));
        }
        Ok(())
    }
}

/// The KAZE detector and descriptor extractor for one image size.
///
/// Owns the evolution levels and the diffusion scratch buffers for the
/// lifetime of an image; one instance can process any number of images of
/// the configured size, one at a time.
pub struct Kaze {
    options: KazeOptions,
    kcontrast: f32,
    evolutions: Vec<EvolutionStep>,
    workspace: AosWorkspace,
    scale_space_ready: bool,
}

impl Kaze {
    /// Validate the options and allocate every evolution level and the
    /// AOS scratch.
    pub fn new(options: KazeOptions) -> Result<Self, Error> {
        options.validate()?;
        let evolutions = Self::allocate_evolutions(&options);
        let workspace = AosWorkspace::new(options.img_width, options.img_height);
        Ok(Kaze {
            options,
            kcontrast: DEFAULT_CONTRAST_FACTOR,
            evolutions,
            workspace,
            scale_space_ready: false,
        })
    }

    pub fn options(&self) -> &KazeOptions {
        &self.options
    }

    /// The contrast factor estimated during the last scale space build.
    pub fn contrast_factor(&self) -> f32 {
        self.kcontrast
    }

    /// The evolution levels, ordered by octave then sublevel.
    pub fn evolutions(&self) -> &[EvolutionStep] {
        &self.evolutions
    }

    /// Evolve the input image through the nonlinear scale space.
    ///
    /// The first level is the Gaussian-prefiltered input; every further
    /// level diffuses the previous one by the evolution time difference
    /// with conductivity derived from the smoothed gradient.
    pub fn build_scale_space(&mut self, image: &GrayFloatImage) -> Result<(), Error> {
        if self.evolutions.is_empty() {
            return Err(Error::ScaleSpaceNotBuilt);
        }
        if image.width() != self.options.img_width || image.height() != self.options.img_height {
            return Err(Error::ImageSizeMismatch {
                width: image.width(),
                height: image.height(),
                expected_width: self.options.img_width,
                expected_height: self.options.img_height,
            });
        }
        let start = Instant::now();
        let sderivatives = self.options.derivative_smoothing;

        trace!("Creating first evolution.");
        self.evolutions[0].Lt = gaussian_blur(image, self.options.base_scale_offset);
        self.evolutions[0].Lsmooth = gaussian_blur(&self.evolutions[0].Lt, sderivatives);

        self.kcontrast = if self.options.compute_contrast {
            contrast_factor::compute_contrast_factor(
                &self.evolutions[0].Lt,
                self.options.contrast_percentile,
                sderivatives,
                self.options.contrast_nbins,
            )
        } else {
            DEFAULT_CONTRAST_FACTOR
        };
        debug!(
            "Contrast percentile={}, num bins={}, contrast factor={}",
            self.options.contrast_percentile, self.options.contrast_nbins, self.kcontrast
        );

        for i in 1..self.evolutions.len() {
            trace!("Creating evolution {}.", i);
            let (head, tail) = self.evolutions.split_at_mut(i);
            let previous = &head[i - 1];
            let current = &mut tail[0];

            current.Lsmooth = gaussian_blur(&previous.Lt, sderivatives);
            #[cfg(not(feature = "rayon"))]
            {
                current.Lx = derivatives::simple_scharr_horizontal(&current.Lsmooth);
                current.Ly = derivatives::simple_scharr_vertical(&current.Lsmooth);
            }
            #[cfg(feature = "rayon")]
            {
                (current.Lx, current.Ly) = rayon::join(
                    || derivatives::simple_scharr_horizontal(&current.Lsmooth),
                    || derivatives::simple_scharr_vertical(&current.Lsmooth),
                );
            }
            current.Lflow = match self.options.diffusivity {
                Diffusivity::PeronaMalikG1 => {
                    nonlinear_diffusion::pm_g1(&current.Lx, &current.Ly, self.kcontrast)
                }
                Diffusivity::PeronaMalikG2 => {
                    nonlinear_diffusion::pm_g2(&current.Lx, &current.Ly, self.kcontrast)
                }
                Diffusivity::Weickert => {
                    nonlinear_diffusion::weickert_diffusivity(
                        &current.Lx,
                        &current.Ly,
                        self.kcontrast,
                    )
                }
            };

            let stepsize = current.etime - previous.etime;
            aos_step(
                &mut self.workspace,
                &mut current.Lt,
                &previous.Lt,
                &current.Lflow,
                stepsize,
            );
            trace!(
                "Evolution {} done. Time {}, sigma {}.",
                i,
                current.etime,
                current.esigma
            );
        }
        self.scale_space_ready = true;
        info!("Created nonlinear scale space in {:?}", start.elapsed());
        Ok(())
    }

    /// Detect keypoints in the built scale space.
    ///
    /// Replaces the contents of `keypoints` with the detections, in
    /// level-then-raster order (after cross-level dedup and sub-pixel
    /// refinement). The `angle` fields are zero until [`Kaze::describe`]
    /// assigns orientations.
    pub fn detect(&mut self, keypoints: &mut Vec<KeyPoint>) -> Result<(), Error> {
        if !self.scale_space_ready {
            return Err(Error::ScaleSpaceNotBuilt);
        }
        let start = Instant::now();
        Self::detector_response(&mut self.evolutions);
        info!("Computed detector response in {:?}", start.elapsed());

        let start = Instant::now();
        keypoints.clear();
        keypoints.extend(self.detect_keypoints());
        info!(
            "Detected {} keypoints in {:?}",
            keypoints.len(),
            start.elapsed()
        );
        Ok(())
    }

    /// Compute a descriptor row per keypoint.
    ///
    /// `descriptors` is reshaped to `keypoints.len() x descriptor_size()`
    /// and its rows align 1:1 with the keypoint order. For non-upright
    /// configurations the dominant orientation is written back into each
    /// keypoint's `angle`.
    pub fn describe(
        &self,
        keypoints: &mut Vec<KeyPoint>,
        descriptors: &mut Array2<f32>,
    ) -> Result<(), Error> {
        if !self.scale_space_ready {
            return Err(Error::ScaleSpaceNotBuilt);
        }
        let start = Instant::now();
        *descriptors = Array2::zeros((keypoints.len(), self.options.descriptor_size()));
        descriptors::extract_descriptors(
            &self.options,
            &self.evolutions,
            keypoints,
            descriptors,
        );
        info!(
            "Extracted {} descriptors in {:?}",
            keypoints.len(),
            start.elapsed()
        );
        Ok(())
    }

    /// Extract features end-to-end: build the scale space, detect and
    /// describe.
    ///
    /// # Example
    /// ```no_run
    /// use image::GenericImageView;
    /// let image = image::open("image.png").unwrap();
    /// let options = kaze::KazeOptions::new(image.width() as usize, image.height() as usize);
    /// let (keypoints, descriptors) = kaze::Kaze::new(options).unwrap().extract(&image).unwrap();
    /// ```
    pub fn extract(
        &mut self,
        image: &DynamicImage,
    ) -> Result<(Vec<KeyPoint>, Array2<f32>), Error> {
        self.extract_from_gray_float_image(&GrayFloatImage::from_dynamic(image))
    }

    /// Extract features end-to-end from an image already in float
    /// grayscale.
    pub fn extract_from_gray_float_image(
        &mut self,
        image: &GrayFloatImage,
    ) -> Result<(Vec<KeyPoint>, Array2<f32>), Error> {
        self.build_scale_space(image)?;
        let mut keypoints = Vec::new();
        self.detect(&mut keypoints)?;
        let mut descriptors = Array2::zeros((0, 0));
        self.describe(&mut keypoints, &mut descriptors)?;
        Ok((keypoints, descriptors))
    }

    /// Extract features end-to-end from an image on disk.
    pub fn extract_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(Vec<KeyPoint>, Array2<f32>), Error> {
        self.extract(&::image::open(path)?)
    }
}

/// Thin out keypoints that sit closer than `min_distance` pixels to a
/// stronger one.
///
/// # Arguments
/// * `keypoints` - the keypoints to filter in place.
/// * `min_distance` - minimum pairwise distance, in pixels.
pub fn suppress_by_distance(keypoints: &mut Vec<KeyPoint>, min_distance: f32) {
    let mut delete = vec![false; keypoints.len()];
    for i in 0..keypoints.len() {
        for j in (i + 1)..keypoints.len() {
            let dx = keypoints[i].point.0 - keypoints[j].point.0;
            let dy = keypoints[i].point.1 - keypoints[j].point.1;
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < min_distance {
                if keypoints[i].response.abs() >= keypoints[j].response.abs() {
                    delete[j] = true;
                } else {
                    delete[i] = true;
                    break;
                }
            }
        }
    }
    let mut index = 0;
    keypoints.retain(|_| {
        let keep = !delete[index];
        index += 1;
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::{suppress_by_distance, Kaze, KazeOptions, KeyPoint};

    fn keypoint(x: f32, y: f32, response: f32) -> KeyPoint {
        KeyPoint {
            point: (x, y),
            response,
            size: 4.0,
            octave: 0,
            class_id: 1,
            angle: 0.0,
        }
    }

    #[test]
    fn construction_rejects_bad_options() {
        let mut options = KazeOptions::new(64, 64);
        options.max_octaves = 0;
        assert!(Kaze::new(options).is_err());

        let mut options = KazeOptions::new(64, 64);
        options.num_sublevels = 0;
        assert!(Kaze::new(options).is_err());

        assert!(Kaze::new(KazeOptions::new(8, 64)).is_err());
        assert!(Kaze::new(KazeOptions::new(64, 64)).is_ok());
    }

    #[test]
    fn detect_before_build_is_an_error() {
        let mut kaze = Kaze::new(KazeOptions::new(64, 64)).unwrap();
        let mut keypoints = Vec::new();
        assert!(kaze.detect(&mut keypoints).is_err());
        assert!(keypoints.is_empty());
    }

    #[test]
    fn suppression_keeps_the_stronger_of_a_close_pair() {
        let mut keypoints = vec![
            keypoint(10.0, 10.0, 1.0),
            keypoint(11.0, 10.0, 2.0),
            keypoint(40.0, 40.0, 0.5),
        ];
        suppress_by_distance(&mut keypoints, 5.0);
        assert_eq!(keypoints.len(), 2);
        assert!((keypoints[0].point.0 - 11.0).abs() < 1e-6);
        assert!((keypoints[1].point.0 - 40.0).abs() < 1e-6);
    }
}
