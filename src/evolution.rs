use crate::{GrayFloatImage, Kaze, KazeOptions};
use log::*;

/// One level of the nonlinear scale space.
///
/// Every level keeps the full set of fields the detector and the
/// descriptors read later: the evolved image, its smoothed view, first and
/// second order derivatives, the conductivity that produced it and the
/// detector response. All levels share the input resolution; the octave
/// only enters through the evolution time.
#[derive(Debug, Clone)]
#[allow(non_snake_case)]
pub struct EvolutionStep {
    /// Evolution time
    pub etime: f32,
    /// Evolution sigma. For linear diffusion t = sigma^2 / 2
    pub esigma: f32,
    /// Image octave
    pub octave: u32,
    /// Image sublevel in each octave
    pub sublevel: u32,
    /// Integer sigma. For computing the feature detector responses
    pub sigma_size: u32,
    /// Evolution image
    pub Lt: GrayFloatImage,
    /// Smoothed image
    pub Lsmooth: GrayFloatImage,
    /// First order spatial derivative
    pub Lx: GrayFloatImage,
    /// First order spatial derivatives
    pub Ly: GrayFloatImage,
    /// Second order spatial derivative
    pub Lxx: GrayFloatImage,
    /// Second order spatial derivatives
    pub Lyy: GrayFloatImage,
    /// Second order spatial derivatives
    pub Lxy: GrayFloatImage,
    /// Diffusivity image
    pub Lflow: GrayFloatImage,
    /// Detector response
    pub Ldet: GrayFloatImage,
}

impl EvolutionStep {
    /// Construct a new EvolutionStep for a given octave and sublevel
    ///
    /// # Arguments
    /// * `octave` - The target octave.
    /// * `sublevel` - The target sublevel.
    /// * `options` - The options to use.
    fn new(octave: u32, sublevel: u32, options: &KazeOptions) -> EvolutionStep {
        let esigma = options.base_scale_offset
            * f32::powf(
                2.0f32,
                sublevel as f32 / options.num_sublevels as f32 + octave as f32,
            );
        let etime = 0.5 * (esigma * esigma);
        let width = options.img_width;
        let height = options.img_height;
        EvolutionStep {
            etime,
            esigma,
            octave,
            sublevel,
            sigma_size: (esigma + 0.5) as u32,
            Lt: GrayFloatImage::new(width, height),
            Lsmooth: GrayFloatImage::new(width, height),
            Lx: GrayFloatImage::new(width, height),
            Ly: GrayFloatImage::new(width, height),
            Lxx: GrayFloatImage::new(width, height),
            Lyy: GrayFloatImage::new(width, height),
            Lxy: GrayFloatImage::new(width, height),
            Lflow: GrayFloatImage::new(width, height),
            Ldet: GrayFloatImage::new(width, height),
        }
    }
}

impl Kaze {
    /// Allocate every level of the evolution up front.
    ///
    /// The levels are ordered by octave, then sublevel, which makes the
    /// evolution time strictly increasing over the returned vector.
    ///
    /// # Arguments
    /// * `options` - The configuration to use.
    pub(crate) fn allocate_evolutions(options: &KazeOptions) -> Vec<EvolutionStep> {
        let evolutions: Vec<EvolutionStep> = (0..options.max_octaves)
            .flat_map(|octave| {
                (0..options.num_sublevels)
                    .map(move |sublevel| (octave, sublevel))
            })
            .map(|(octave, sublevel)| EvolutionStep::new(octave, sublevel, options))
            .collect();
        debug!(
            "Allocated {} evolution levels of {}x{}",
            evolutions.len(),
            options.img_width,
            options.img_height
        );
        evolutions
    }
}

#[cfg(test)]
mod tests {
    use crate::{Kaze, KazeOptions};

    #[test]
    fn evolution_times_are_strictly_increasing() {
        let options = KazeOptions::new(64, 64);
        let evolutions = Kaze::allocate_evolutions(&options);
        assert_eq!(
            evolutions.len(),
            (options.max_octaves * options.num_sublevels) as usize
        );
        for pair in evolutions.windows(2) {
            assert!(pair[1].etime > pair[0].etime);
        }
    }

    #[test]
    fn sigma_is_strictly_increasing_within_an_octave() {
        let options = KazeOptions::new(64, 64);
        let evolutions = Kaze::allocate_evolutions(&options);
        for pair in evolutions.windows(2) {
            if pair[0].octave == pair[1].octave {
                assert!(pair[1].esigma > pair[0].esigma);
            }
        }
    }

    #[test]
    fn base_level_matches_the_scale_offset() {
        let options = KazeOptions::new(64, 64);
        let evolutions = Kaze::allocate_evolutions(&options);
        assert!((evolutions[0].esigma - options.base_scale_offset).abs() < 1e-6);
        assert!((evolutions[0].etime - 0.5 * 1.6 * 1.6).abs() < 1e-5);
        assert_eq!(evolutions[0].sigma_size, 2);
    }
}
