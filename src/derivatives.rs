use crate::image::{separable_filter, GrayFloatImage};

/// Unit Scharr derivative along x, as used for the conductivity gradients.
///
/// Equivalent to `cv::Scharr` with xorder=1, yorder=0, scale=1, delta=0.
pub fn simple_scharr_horizontal(image: &GrayFloatImage) -> GrayFloatImage {
    separable_filter(image, &[-1., 0., 1.], &[3., 10., 3.])
}

/// Unit Scharr derivative along y, as used for the conductivity gradients.
///
/// Equivalent to `cv::Scharr` with xorder=0, yorder=1, scale=1, delta=0.
pub fn simple_scharr_vertical(image: &GrayFloatImage) -> GrayFloatImage {
    separable_filter(image, &[3., 10., 3.], &[-1., 0., 1.])
}

/// Compute the scale-dilated Scharr derivative horizontally.
///
/// The kernel reach is dilated with `sigma_size` and normalized so that the
/// response magnitude stays comparable across scales. At `sigma_size == 1`
/// this is the normalized 3x3 Scharr pair.
///
/// # Arguments
/// * `image` - the input image.
/// * `sigma_size` - the scale of the derivative.
///
/// # Return value
/// Output image derivative (an image.)
pub fn scharr_horizontal(image: &GrayFloatImage, sigma_size: u32) -> GrayFloatImage {
    let main_kernel = scharr_kernel(sigma_size, FilterOrder::Main);
    let off_kernel = scharr_kernel(sigma_size, FilterOrder::Off);
    separable_filter(image, &main_kernel, &off_kernel)
}

/// Compute the scale-dilated Scharr derivative vertically.
///
/// # Arguments
/// * `image` - the input image.
/// * `sigma_size` - the scale of the derivative.
///
/// # Return value
/// Output image derivative (an image.)
pub fn scharr_vertical(image: &GrayFloatImage, sigma_size: u32) -> GrayFloatImage {
    let main_kernel = scharr_kernel(sigma_size, FilterOrder::Main);
    let off_kernel = scharr_kernel(sigma_size, FilterOrder::Off);
    separable_filter(image, &off_kernel, &main_kernel)
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum FilterOrder {
    Main,
    Off,
}

fn scharr_kernel(sigma_size: u32, order: FilterOrder) -> Vec<f32> {
    // Difference between middle and sides of main axis filter.
    let w = 10.0 / 3.0;
    // Side intensity of filter.
    let norm = (1.0 / (2.0 * f64::from(sigma_size) * (w + 2.0))) as f32;
    // Middle intensity of filter.
    let middle = norm * w as f32;
    // Size of kernel
    let ksize = (3 + 2 * (sigma_size - 1)) as usize;
    let mut kernel = vec![0.0; ksize];
    match order {
        FilterOrder::Main => {
            kernel[0] = -1.0;
            kernel[ksize - 1] = 1.0;
        }
        FilterOrder::Off => {
            kernel[0] = norm;
            kernel[ksize / 2] = middle;
            kernel[ksize - 1] = norm;
        }
    };
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::GrayFloatImage;

    fn ramp_and_bump() -> GrayFloatImage {
        let mut image = GrayFloatImage::new(24, 24);
        for y in 0..24 {
            for x in 0..24 {
                let bump = (-(((x as f32) - 12.0).powi(2) + ((y as f32) - 12.0).powi(2)) / 18.0)
                    .exp();
                image.put(x, y, 0.03 * x as f32 + 0.5 * bump);
            }
        }
        image
    }

    #[test]
    fn horizontal_derivative_sign_follows_the_ramp() {
        let mut image = GrayFloatImage::new(16, 16);
        for y in 0..16 {
            for x in 0..16 {
                image.put(x, y, 0.1 * x as f32);
            }
        }
        let gx = scharr_horizontal(&image, 1);
        let gy = scharr_vertical(&image, 1);
        // Interior response of the normalized kernel on a slope of 0.1/px.
        assert!((gx.get(8, 8) - 0.1).abs() < 1e-4);
        assert!(gy.get(8, 8).abs() < 1e-4);
    }

    #[test]
    fn mixed_partials_commute() {
        let image = ramp_and_bump();
        for &scale in &[1u32, 2, 3] {
            let lx = scharr_horizontal(&image, scale);
            let ly = scharr_vertical(&image, scale);
            let lxy = scharr_vertical(&lx, scale);
            let lyx = scharr_horizontal(&ly, scale);
            for y in 0..24 {
                for x in 0..24 {
                    assert!(
                        (lxy.get(x, y) - lyx.get(x, y)).abs() < 1e-4,
                        "Lxy != Lyx at ({}, {}) scale {}",
                        x,
                        y,
                        scale
                    );
                }
            }
        }
    }
}
