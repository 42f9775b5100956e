use crate::{derivatives, evolution::EvolutionStep, image::GrayFloatImage, Kaze};
use ndarray::azip;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

impl Kaze {
    /// Compute the scale-normalized derivative set of every level.
    ///
    /// The first-order derivatives are normalized with `sigma_size`, the
    /// second-order ones with `sigma_size^2`, so responses are comparable
    /// across the scale space. The descriptors later read the same fields,
    /// so the normalization happens in place, after the chains are built.
    fn compute_multiscale_derivatives(evolutions: &mut [EvolutionStep]) {
        #[cfg(not(feature = "rayon"))]
        for evolution in evolutions.iter_mut() {
            compute_multiscale_derivatives_for_evolution(evolution);
        }
        #[cfg(feature = "rayon")]
        evolutions.into_par_iter().for_each(|evolution| {
            compute_multiscale_derivatives_for_evolution(evolution);
        });
    }

    /// Compute the detector response - the determinant of the Hessian - and
    /// save the result in the evolutions.
    ///
    /// # Arguments
    /// * `evolutions` - The computed evolutions.
    #[allow(non_snake_case, clippy::suspicious_operation_groupings)]
    pub(crate) fn detector_response(evolutions: &mut [EvolutionStep]) {
        Self::compute_multiscale_derivatives(evolutions);
        let process_evolution = |evolution: &mut EvolutionStep| {
            evolution.Ldet = GrayFloatImage::new(evolution.Lxx.width(), evolution.Lxx.height());
            azip!((
                Ldet in evolution.Ldet.mut_array2(),
                &Lxx in evolution.Lxx.ref_array2(),
                &Lyy in evolution.Lyy.ref_array2(),
                &Lxy in evolution.Lxy.ref_array2(),
            ) {
                *Ldet = Lxx * Lyy - Lxy * Lxy;
            });
        };
        #[cfg(not(feature = "rayon"))]
        for evolution in evolutions.iter_mut() {
            process_evolution(evolution);
        }
        #[cfg(feature = "rayon")]
        evolutions.into_par_iter().for_each(|evolution| {
            process_evolution(evolution);
        });
    }
}

#[allow(non_snake_case)]
fn compute_multiscale_derivatives_for_evolution(evolution: &mut EvolutionStep) {
    let sigma_size = evolution.sigma_size;
    #[cfg(not(feature = "rayon"))]
    {
        evolution.Lx = derivatives::scharr_horizontal(&evolution.Lsmooth, sigma_size);
        evolution.Ly = derivatives::scharr_vertical(&evolution.Lsmooth, sigma_size);
        evolution.Lxx = derivatives::scharr_horizontal(&evolution.Lx, sigma_size);
        evolution.Lyy = derivatives::scharr_vertical(&evolution.Ly, sigma_size);
        evolution.Lxy = derivatives::scharr_vertical(&evolution.Lx, sigma_size);
    }
    #[cfg(feature = "rayon")]
    {
        (evolution.Lx, evolution.Ly) = rayon::join(
            || derivatives::scharr_horizontal(&evolution.Lsmooth, sigma_size),
            || derivatives::scharr_vertical(&evolution.Lsmooth, sigma_size),
        );
        (evolution.Lxx, (evolution.Lyy, evolution.Lxy)) = rayon::join(
            || derivatives::scharr_horizontal(&evolution.Lx, sigma_size),
            || {
                rayon::join(
                    || derivatives::scharr_vertical(&evolution.Ly, sigma_size),
                    || derivatives::scharr_vertical(&evolution.Lx, sigma_size),
                )
            },
        )
    }
    // Derivative-order normalization.
    let order1 = sigma_size as f32;
    let order2 = (sigma_size * sigma_size) as f32;
    evolution.Lx.mut_array2().map_inplace(|v| *v *= order1);
    evolution.Ly.mut_array2().map_inplace(|v| *v *= order1);
    evolution.Lxx.mut_array2().map_inplace(|v| *v *= order2);
    evolution.Lxy.mut_array2().map_inplace(|v| *v *= order2);
    evolution.Lyy.mut_array2().map_inplace(|v| *v *= order2);
}
