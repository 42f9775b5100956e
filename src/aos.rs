use crate::image::GrayFloatImage;
use crate::tridiagonal::thomas;
use ndarray::{Array2, ArrayView2, Zip};

/// Scratch for the vertical (row-system) half of an AOS step.
///
/// The systems run down the image: every image column is one tridiagonal
/// system of `height` unknowns.
#[derive(Debug)]
pub struct RowScratch {
    /// Paired conductivities `c[i] + c[i+1]`, `(h-1) x w`.
    qr: Array2<f32>,
    /// Stencil weight sums, `h x w`.
    py: Array2<f32>,
    /// System diagonals, `h x w`.
    ay: Array2<f32>,
    /// System off-diagonals, `(h-1) x w`.
    by: Array2<f32>,
    /// Solution of the vertical half-step, `h x w`.
    lty: Array2<f32>,
}

/// Scratch for the horizontal (column-system) half of an AOS step.
///
/// Built transposed so the solver still walks rows: every image row is one
/// tridiagonal system of `width` unknowns.
#[derive(Debug)]
pub struct ColumnScratch {
    /// Paired conductivities `c[j] + c[j+1]`, `h x (w-1)`.
    qc: Array2<f32>,
    /// Stencil weight sums, `h x w`.
    px: Array2<f32>,
    /// System diagonals, transposed to `w x h`.
    ax: Array2<f32>,
    /// System off-diagonals, transposed to `(w-1) x h`.
    bx: Array2<f32>,
    /// Solution of the horizontal half-step, stored transposed, `w x h`.
    ltx: Array2<f32>,
}

/// Per-instance scratch buffers for the AOS diffusion stepper.
///
/// Overwritten on every step, never observed across steps. The row and
/// column halves live in separate structs so the two passes can borrow
/// them independently.
#[derive(Debug)]
pub struct AosWorkspace {
    rows: RowScratch,
    columns: ColumnScratch,
}

impl AosWorkspace {
    pub fn new(width: usize, height: usize) -> Self {
        AosWorkspace {
            rows: RowScratch {
                qr: Array2::zeros((height - 1, width)),
                py: Array2::zeros((height, width)),
                ay: Array2::zeros((height, width)),
                by: Array2::zeros((height - 1, width)),
                lty: Array2::zeros((height, width)),
            },
            columns: ColumnScratch {
                qc: Array2::zeros((height, width - 1)),
                px: Array2::zeros((height, width)),
                ax: Array2::zeros((width, height)),
                bx: Array2::zeros((width - 1, height)),
                ltx: Array2::zeros((width, height)),
            },
        }
    }
}

/// One scalar nonlinear diffusion step with an AOS scheme.
///
/// Approximates the semi-implicit step
/// `(I - stepsize * (A_x(c) + A_y(c))) * Ld = Ldprev` by averaging the
/// two 1D implicit half-steps. The step size can be arbitrarily large; if
/// `c` is constant the diffusion is linear.
///
/// # Arguments
/// * `workspace` - scratch buffers, overwritten.
/// * `ld` - output image of the evolution step.
/// * `ldprev` - image at the previous evolution step.
/// * `c` - conductivity image.
/// * `stepsize` - the step size in time units.
pub fn aos_step(
    workspace: &mut AosWorkspace,
    ld: &mut GrayFloatImage,
    ldprev: &GrayFloatImage,
    c: &GrayFloatImage,
    stepsize: f32,
) {
    let prev = ldprev.ref_array2();
    let cond = c.ref_array2();

    #[cfg(not(feature = "rayon"))]
    {
        aos_rows(&mut workspace.rows, prev, cond, stepsize);
        aos_columns(&mut workspace.columns, prev, cond, stepsize);
    }
    #[cfg(feature = "rayon")]
    {
        let AosWorkspace { rows, columns } = &mut *workspace;
        rayon::join(
            || aos_rows(rows, prev, cond, stepsize),
            || aos_columns(columns, prev, cond, stepsize),
        );
    }

    // Ld = 0.5 * (Lty + Ltx^T)
    let mut out = ld.mut_array2();
    Zip::from(&mut out)
        .and(&workspace.rows.lty)
        .and(workspace.columns.ltx.t())
        .for_each(|o, &row_half, &col_half| {
            *o = 0.5 * (row_half + col_half);
        });
}

/// The vertical half-step: build and solve the per-column systems.
fn aos_rows(scratch: &mut RowScratch, ldprev: ArrayView2<f32>, c: ArrayView2<f32>, stepsize: f32) {
    let (h, w) = ldprev.dim();
    for i in 0..h - 1 {
        for j in 0..w {
            scratch.qr[(i, j)] = c[(i, j)] + c[(i + 1, j)];
        }
    }
    for j in 0..w {
        scratch.py[(0, j)] = scratch.qr[(0, j)];
        scratch.py[(h - 1, j)] = scratch.qr[(h - 2, j)];
    }
    for i in 1..h - 1 {
        for j in 0..w {
            scratch.py[(i, j)] = scratch.qr[(i - 1, j)] + scratch.qr[(i, j)];
        }
    }

    // a = 1 + t*p, b = -t*q
    Zip::from(&mut scratch.ay)
        .and(&scratch.py)
        .for_each(|a, &p| *a = 1.0 + stepsize * p);
    Zip::from(&mut scratch.by)
        .and(&scratch.qr)
        .for_each(|b, &q| *b = -stepsize * q);

    thomas(
        scratch.ay.view(),
        scratch.by.view(),
        ldprev,
        scratch.lty.view_mut(),
    );
}

/// The horizontal half-step: same construction rotated a quarter turn.
fn aos_columns(
    scratch: &mut ColumnScratch,
    ldprev: ArrayView2<f32>,
    c: ArrayView2<f32>,
    stepsize: f32,
) {
    let (h, w) = ldprev.dim();
    for i in 0..h {
        for j in 0..w - 1 {
            scratch.qc[(i, j)] = c[(i, j)] + c[(i, j + 1)];
        }
    }
    for i in 0..h {
        scratch.px[(i, 0)] = scratch.qc[(i, 0)];
        scratch.px[(i, w - 1)] = scratch.qc[(i, w - 2)];
    }
    for j in 1..w - 1 {
        for i in 0..h {
            scratch.px[(i, j)] = scratch.qc[(i, j - 1)] + scratch.qc[(i, j)];
        }
    }

    // a = 1 + t*p^T, b = -t*q^T; the solver then works along image rows.
    Zip::from(&mut scratch.ax)
        .and(scratch.px.t())
        .for_each(|a, &p| *a = 1.0 + stepsize * p);
    Zip::from(&mut scratch.bx)
        .and(scratch.qc.t())
        .for_each(|b, &q| *b = -stepsize * q);

    thomas(
        scratch.ax.view(),
        scratch.bx.view(),
        ldprev.t(),
        scratch.ltx.view_mut(),
    );
}

#[cfg(test)]
mod tests {
    use super::{aos_step, AosWorkspace};
    use crate::image::GrayFloatImage;

    fn constant_image(width: usize, height: usize, value: f32) -> GrayFloatImage {
        let mut image = GrayFloatImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                image.put(x, y, value);
            }
        }
        image
    }

    #[test]
    fn constant_images_are_fixed_points() {
        let prev = constant_image(20, 14, 0.37);
        let cond = constant_image(20, 14, 1.0);
        let mut out = GrayFloatImage::new(20, 14);
        let mut workspace = AosWorkspace::new(20, 14);
        aos_step(&mut workspace, &mut out, &prev, &cond, 7.5);
        for y in 0..14 {
            for x in 0..20 {
                assert!((out.get(x, y) - 0.37).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn unit_conductivity_diffuses_an_impulse_symmetrically() {
        let mut prev = constant_image(15, 15, 0.0);
        prev.put(7, 7, 1.0);
        let cond = constant_image(15, 15, 1.0);
        let mut out = GrayFloatImage::new(15, 15);
        let mut workspace = AosWorkspace::new(15, 15);
        aos_step(&mut workspace, &mut out, &prev, &cond, 0.8);

        // Mass spreads off the impulse and the result stays symmetric in
        // x, y and under the diagonal flip (the two half-steps average).
        assert!(out.get(7, 7) < 1.0);
        assert!(out.get(6, 7) > 0.0);
        assert!((out.get(6, 7) - out.get(8, 7)).abs() < 1e-6);
        assert!((out.get(7, 6) - out.get(7, 8)).abs() < 1e-6);
        assert!((out.get(6, 7) - out.get(7, 6)).abs() < 1e-6);
    }

    #[test]
    fn low_conductivity_slows_diffusion() {
        let mut prev = constant_image(15, 15, 0.0);
        prev.put(7, 7, 1.0);
        let mut out_fast = GrayFloatImage::new(15, 15);
        let mut out_slow = GrayFloatImage::new(15, 15);
        let mut workspace = AosWorkspace::new(15, 15);
        aos_step(
            &mut workspace,
            &mut out_fast,
            &prev,
            &constant_image(15, 15, 1.0),
            0.8,
        );
        aos_step(
            &mut workspace,
            &mut out_slow,
            &prev,
            &constant_image(15, 15, 0.05),
            0.8,
        );
        assert!(out_slow.get(7, 7) > out_fast.get(7, 7));
    }
}
