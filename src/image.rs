use derive_more::{Deref, DerefMut};
use image::{DynamicImage, GenericImageView, ImageBuffer, Luma};
use log::*;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use nshare::{MutNdarray2, RefNdarray2};
use std::f32;

/// The image type we use in this library.
///
/// This is a wrapper around a contiguous f32 buffer from the image crate.
/// Every field of the nonlinear scale space (the evolved image, its
/// derivatives, the conductivity, the detector response) is stored in this
/// type, and the filters below operate on it directly. The image crate is
/// only used for loading and pixel storage; the convolutions are
/// implemented here as separable filters because that is where nearly all
/// of the scale-space construction time goes.
#[derive(Debug, Clone, Deref, DerefMut)]
pub struct GrayFloatImage(pub ImageBuffer<Luma<f32>, Vec<f32>>);

impl GrayFloatImage {
    /// Create a unit float image from the image crate's DynamicImage type.
    ///
    /// # Arguments
    /// * `input_image` - the input image.
    /// # Return value
    /// An image with pixel values between 0 and 1.
    pub fn from_dynamic(input_image: &DynamicImage) -> Self {
        Self(match input_image.grayscale() {
            DynamicImage::ImageLuma8(gray_image) => {
                info!(
                    "Loaded a {} x {} 8-bit image",
                    input_image.width(),
                    input_image.height()
                );
                ImageBuffer::from_fn(gray_image.width(), gray_image.height(), |x, y| {
                    Luma([f32::from(gray_image[(x, y)][0]) / 255f32])
                })
            }
            DynamicImage::ImageLuma16(gray_image) => {
                info!(
                    "Loaded a {} x {} 16-bit image",
                    input_image.width(),
                    input_image.height()
                );
                ImageBuffer::from_fn(gray_image.width(), gray_image.height(), |x, y| {
                    Luma([f32::from(gray_image[(x, y)][0]) / 65535f32])
                })
            }
            _ => unreachable!(),
        })
    }

    pub fn from_array2(arr: Array2<f32>) -> Self {
        Self(
            ImageBuffer::from_raw(arr.dim().1 as u32, arr.dim().0 as u32, arr.into_raw_vec())
                .expect("raw vector didn't have enough pixels for the image"),
        )
    }

    pub fn ref_array2(&self) -> ArrayView2<f32> {
        self.0.ref_ndarray2()
    }

    pub fn mut_array2(&mut self) -> ArrayViewMut2<f32> {
        self.0.mut_ndarray2()
    }

    pub fn zero_array(&self) -> Array2<f32> {
        Array2::zeros((self.height(), self.width()))
    }

    pub fn width(&self) -> usize {
        self.0.width() as usize
    }

    pub fn height(&self) -> usize {
        self.0.height() as usize
    }

    pub fn new(width: usize, height: usize) -> Self {
        Self(ImageBuffer::from_pixel(
            width as u32,
            height as u32,
            Luma([0.0]),
        ))
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.get_pixel(x as u32, y as u32)[0]
    }

    pub fn put(&mut self, x: usize, y: usize, pixel_value: f32) {
        self.put_pixel(x as u32, y as u32, Luma([pixel_value]));
    }
}

/// Mirror an out-of-range coordinate back into `[0, n)` without repeating
/// the edge sample (the `gfedcb|abcdefgh|gfedcba` reflection rule).
#[inline(always)]
fn reflect(index: isize, n: isize) -> usize {
    debug_assert!(n > 1);
    let mut index = index;
    while index < 0 || index >= n {
        if index < 0 {
            index = -index;
        }
        if index >= n {
            index = 2 * (n - 1) - index;
        }
    }
    index as usize
}

/// Horizontal image filter for variable kernel sizes with reflected borders.
///
/// # Arguments
/// * `image` - the input image.
/// * `kernel` - the kernel to apply.
/// # Return value
/// The filter result.
pub fn horizontal_filter(image: &GrayFloatImage, kernel: &[f32]) -> GrayFloatImage {
    // Cannot have an even-sized kernel
    debug_assert!(kernel.len() % 2 == 1);
    let half_width = (kernel.len() / 2) as isize;
    let w = image.width() as isize;
    let h = image.height();
    let mut output = GrayFloatImage::new(image.width(), image.height());
    let input = image.ref_array2();
    let mut out = output.mut_array2();
    // The split keeps reflection lookups out of the interior run.
    let interior_end = (w - half_width).max(half_width);
    for y in 0..h {
        let row = input.row(y);
        let mut out_row = out.row_mut(y);
        for x in 0..half_width.min(w) {
            let mut acc = 0f32;
            for (k, &kval) in kernel.iter().enumerate() {
                acc += kval * row[reflect(x + k as isize - half_width, w)];
            }
            out_row[x as usize] = acc;
        }
        for x in half_width..interior_end {
            let mut acc = 0f32;
            for (k, &kval) in kernel.iter().enumerate() {
                acc += kval * row[(x + k as isize - half_width) as usize];
            }
            out_row[x as usize] = acc;
        }
        for x in interior_end..w {
            let mut acc = 0f32;
            for (k, &kval) in kernel.iter().enumerate() {
                acc += kval * row[reflect(x + k as isize - half_width, w)];
            }
            out_row[x as usize] = acc;
        }
    }
    output
}

/// Vertical image filter for variable kernel sizes with reflected borders.
///
/// # Arguments
/// * `image` - the input image.
/// * `kernel` - the kernel to apply.
/// # Return value
/// The filter result.
pub fn vertical_filter(image: &GrayFloatImage, kernel: &[f32]) -> GrayFloatImage {
    // Cannot have an even-sized kernel
    debug_assert!(kernel.len() % 2 == 1);
    let half_width = (kernel.len() / 2) as isize;
    let w = image.width();
    let h = image.height() as isize;
    let mut output = GrayFloatImage::new(image.width(), image.height());
    let input = image.ref_array2();
    let mut out = output.mut_array2();
    for y in 0..h {
        let mut out_row = out.row_mut(y as usize);
        if y >= half_width && y < h - half_width {
            for x in 0..w {
                let mut acc = 0f32;
                for (k, &kval) in kernel.iter().enumerate() {
                    acc += kval * input[((y + k as isize - half_width) as usize, x)];
                }
                out_row[x] = acc;
            }
        } else {
            for x in 0..w {
                let mut acc = 0f32;
                for (k, &kval) in kernel.iter().enumerate() {
                    acc += kval * input[(reflect(y + k as isize - half_width, h), x)];
                }
                out_row[x] = acc;
            }
        }
    }
    output
}

/// Apply a separable filter: `kx` along the rows, then `ky` along the columns.
pub fn separable_filter(image: &GrayFloatImage, kx: &[f32], ky: &[f32]) -> GrayFloatImage {
    vertical_filter(&horizontal_filter(image, kx), ky)
}

/// The Gaussian function.
///
/// # Arguments
/// * `x` - the offset.
/// * `r` - sigma.
/// # Return value
/// The kernel value at x.
fn gaussian(x: f32, r: f32) -> f32 {
    ((2.0 * f32::consts::PI).sqrt() * r).recip() * (-x.powi(2) / (2.0 * r.powi(2))).exp()
}

/// Generate a Gaussian kernel.
///
/// # Arguments
/// * `r` - sigma.
/// * `kernel_size` - The size of the kernel.
/// # Return value
/// The kernel (a vector).
pub fn gaussian_kernel(r: f32, kernel_size: usize) -> Vec<f32> {
    let mut kernel = vec![0f32; kernel_size];
    let half_width = (kernel_size / 2) as i32;
    let mut sum = 0f32;
    for i in -half_width..=half_width {
        let val = gaussian(i as f32, r);
        kernel[(i + half_width) as usize] = val;
        sum += val;
    }
    for val in kernel.iter_mut() {
        *val /= sum;
    }
    kernel
}

/// Perform Gaussian blur on an image.
///
/// The kernel reach grows with sigma, clamped to at least a 3-tap kernel.
///
/// # Arguments
/// * `image` - the image to blur.
/// * `r` - sigma.
/// # Return value
/// The resulting image after the filter was applied.
pub fn gaussian_blur(image: &GrayFloatImage, r: f32) -> GrayFloatImage {
    let mut kernel_size = (2.0 * (1.0 + (r - 0.8) / 0.3)).ceil().max(3.0) as usize;
    if kernel_size % 2 == 0 {
        kernel_size += 1;
    }
    let kernel = gaussian_kernel(r, kernel_size);
    separable_filter(image, &kernel, &kernel)
}

#[cfg(test)]
mod tests {
    use super::{gaussian_blur, gaussian_kernel, reflect, GrayFloatImage};

    #[test]
    fn gaussian_kernel_correct() {
        // test against known correct kernel
        let kernel = gaussian_kernel(3.0, 7);
        let known_correct_kernel = vec![
            0.1062_8852,
            0.1403_2133,
            0.1657_7007,
            0.1752_4014,
            0.1657_7007,
            0.1403_2133,
            0.1062_8852,
        ];
        for it in kernel.iter().zip(known_correct_kernel.iter()) {
            let (i, j) = it;
            assert!(f32::abs(*i - *j) < 0.0001);
        }
    }

    #[test]
    fn reflect_does_not_repeat_the_edge() {
        assert_eq!(reflect(-1, 5), 1);
        assert_eq!(reflect(-2, 5), 2);
        assert_eq!(reflect(5, 5), 3);
        assert_eq!(reflect(6, 5), 2);
        assert_eq!(reflect(3, 5), 3);
    }

    #[test]
    fn blur_preserves_constant_images() {
        let mut image = GrayFloatImage::new(32, 24);
        for y in 0..24 {
            for x in 0..32 {
                image.put(x, y, 0.25);
            }
        }
        let blurred = gaussian_blur(&image, 1.6);
        for y in 0..24 {
            for x in 0..32 {
                assert!((blurred.get(x, y) - 0.25).abs() < 1e-5);
            }
        }
    }
}
