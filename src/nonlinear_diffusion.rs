use crate::image::GrayFloatImage;
use ndarray::azip;

/// This function computes the Perona and Malik conductivity coefficient g1
/// g1 = exp(-|dL|^2 / k^2)
///
/// Favors high-contrast edges over wide regions.
///
/// # Arguments
/// * `Lx` - First order image derivative in X-direction (horizontal)
/// * `Ly` - First order image derivative in Y-direction (vertical)
/// * `k` - Contrast factor parameter
/// # Return value
/// Output image
#[allow(non_snake_case)]
pub fn pm_g1(Lx: &GrayFloatImage, Ly: &GrayFloatImage, k: f32) -> GrayFloatImage {
    assert!(Lx.width() == Ly.width());
    assert!(Lx.height() == Ly.height());
    let inverse_k = 1.0f32 / (k * k);
    let mut conductivities = Lx.zero_array();
    azip!((
        c in &mut conductivities,
        &x in Lx.ref_array2(),
        &y in Ly.ref_array2(),
    ) {
        *c = (-inverse_k * (x * x + y * y)).exp();
    });
    GrayFloatImage::from_array2(conductivities)
}

/// This function computes the Perona and Malik conductivity coefficient g2
/// g2 = 1 / (1 + dL^2 / k^2)
///
/// Favors wide regions over smaller ones.
///
/// # Arguments
/// * `Lx` - First order image derivative in X-direction (horizontal)
/// * `Ly` - First order image derivative in Y-direction (vertical)
/// * `k` - Contrast factor parameter
/// # Return value
/// Output image
#[allow(non_snake_case)]
pub fn pm_g2(Lx: &GrayFloatImage, Ly: &GrayFloatImage, k: f32) -> GrayFloatImage {
    assert!(Lx.width() == Ly.width());
    assert!(Lx.height() == Ly.height());
    let inverse_k = 1.0f32 / (k * k);
    let mut conductivities = Lx.zero_array();
    azip!((
        c in &mut conductivities,
        &x in Lx.ref_array2(),
        &y in Ly.ref_array2(),
    ) {
        *c = 1.0 / (1.0 + inverse_k * (x * x + y * y));
    });
    GrayFloatImage::from_array2(conductivities)
}

/// This function computes Weickert conductivity coefficient
/// g = 1 - exp(-3.315 / (|dL| / k)^8), and 1 where the gradient vanishes.
///
/// Smoothes regions on both sides of an edge stronger than across it.
/// See Weickert, Applications of nonlinear diffusion in image processing
/// and computer vision, 2000.
///
/// # Arguments
/// * `Lx` - First order image derivative in X-direction (horizontal)
/// * `Ly` - First order image derivative in Y-direction (vertical)
/// * `k` - Contrast factor parameter
/// # Return value
/// Output image
#[allow(non_snake_case)]
pub fn weickert_diffusivity(Lx: &GrayFloatImage, Ly: &GrayFloatImage, k: f32) -> GrayFloatImage {
    assert!(Lx.width() == Ly.width());
    assert!(Lx.height() == Ly.height());
    let inverse_k = 1.0f32 / (k * k);
    let mut conductivities = Lx.zero_array();
    azip!((
        c in &mut conductivities,
        &x in Lx.ref_array2(),
        &y in Ly.ref_array2(),
    ) {
        let dl = inverse_k * (x * x + y * y);
        *c = if dl > 0.0 {
            1.0 - (-3.315 / dl.powi(4)).exp()
        } else {
            1.0
        };
    });
    GrayFloatImage::from_array2(conductivities)
}

#[cfg(test)]
mod tests {
    use super::{pm_g1, pm_g2, weickert_diffusivity};
    use crate::image::GrayFloatImage;

    fn gradient_pair(width: usize, height: usize) -> (GrayFloatImage, GrayFloatImage) {
        let mut lx = GrayFloatImage::new(width, height);
        let mut ly = GrayFloatImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                lx.put(x, y, (x as f32 - 4.0) * 0.05);
                ly.put(x, y, (y as f32 - 4.0) * 0.03);
            }
        }
        (lx, ly)
    }

    #[test]
    fn conductivities_stay_in_unit_interval() {
        let (lx, ly) = gradient_pair(9, 9);
        for g in [
            pm_g1(&lx, &ly, 0.1),
            pm_g2(&lx, &ly, 0.1),
            weickert_diffusivity(&lx, &ly, 0.1),
        ] {
            for y in 0..9 {
                for x in 0..9 {
                    let c = g.get(x, y);
                    assert!(c > 0.0 && c <= 1.0, "conductivity {} out of range", c);
                }
            }
        }
    }

    #[test]
    fn zero_gradient_means_full_conductivity() {
        let (lx, ly) = gradient_pair(9, 9);
        // The gradient vanishes at (4, 4) by construction.
        assert!((pm_g1(&lx, &ly, 0.1).get(4, 4) - 1.0).abs() < 1e-6);
        assert!((pm_g2(&lx, &ly, 0.1).get(4, 4) - 1.0).abs() < 1e-6);
        assert!((weickert_diffusivity(&lx, &ly, 0.1).get(4, 4) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn stronger_edges_conduct_less() {
        let (lx, ly) = gradient_pair(9, 9);
        let g2 = pm_g2(&lx, &ly, 0.1);
        assert!(g2.get(0, 0) < g2.get(3, 4));
    }
}
